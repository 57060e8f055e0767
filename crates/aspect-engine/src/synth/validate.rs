//! Preconditions checked before a proxy type is synthesized

use std::sync::Arc;

use crate::error::{ProxyError, ShapeRule};
use crate::reflect::TypeInfo;

/// Outcome of validating an implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    /// Synthesize a proxy
    Proxy,
    /// Implementation opted out; use it unchanged
    Bypass,
}

/// How an implementation satisfies its service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Contract {
    /// Implementation is assignable to the service
    Assignable,
    /// Open implementation implements an instantiation of an open interface
    Structural,
}

/// Check the implementation side of a pair
///
/// Runs, in order: presence of both types, not sealed, not abstract,
/// publicly visible, has a public constructor, and finally the opt-out
/// marker which turns the request into a bypass.
pub fn check_implementation(
    service: Option<&Arc<TypeInfo>>,
    implementation: Option<&Arc<TypeInfo>>,
) -> Result<(Arc<TypeInfo>, Arc<TypeInfo>, Validation), ProxyError> {
    let service = service
        .ok_or_else(|| ProxyError::InvalidArgument("service type is null".to_string()))?;
    let implementation = implementation
        .ok_or_else(|| ProxyError::InvalidArgument("implementation type is null".to_string()))?;

    if implementation.is_sealed() {
        return Err(ProxyError::shape(implementation.name(), ShapeRule::Sealed));
    }
    if implementation.is_abstract() {
        return Err(ProxyError::shape(implementation.name(), ShapeRule::Abstract));
    }
    if !implementation.is_publicly_visible() {
        return Err(ProxyError::shape(implementation.name(), ShapeRule::NotPublic));
    }
    if implementation.public_constructors().next().is_none() {
        return Err(ProxyError::shape(
            implementation.name(),
            ShapeRule::NoConstructor,
        ));
    }

    let validation = if implementation.markers().ignore_proxy {
        Validation::Bypass
    } else {
        Validation::Proxy
    };
    Ok((service.clone(), implementation.clone(), validation))
}

/// Check that `implementation` can stand in for `service`
pub fn check_contract(
    service: &TypeInfo,
    implementation: &TypeInfo,
) -> Result<Contract, ProxyError> {
    let contract = if service.is_assignable_from(implementation) {
        Contract::Assignable
    } else if service.is_structurally_satisfied_by(implementation) {
        Contract::Structural
    } else {
        return Err(ProxyError::shape(
            implementation.name(),
            ShapeRule::NotAssignable {
                service: service.name().to_string(),
            },
        ));
    };

    if !service.is_interface() && service.key() != implementation.key() {
        if service.is_sealed() {
            return Err(ProxyError::shape(service.name(), ShapeRule::Sealed));
        }
        if service.is_abstract() {
            return Err(ProxyError::shape(service.name(), ShapeRule::Abstract));
        }
    }

    Ok(contract)
}

/// Run every check for a pair
pub fn validate(
    service: Option<&Arc<TypeInfo>>,
    implementation: Option<&Arc<TypeInfo>>,
) -> Result<Validation, ProxyError> {
    let (service, implementation, validation) = check_implementation(service, implementation)?;
    if validation == Validation::Bypass {
        return Ok(Validation::Bypass);
    }
    check_contract(&service, &implementation)?;
    Ok(Validation::Proxy)
}
