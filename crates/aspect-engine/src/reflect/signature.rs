//! Method signature model
//!
//! A [`MethodSignature`] is captured once per member and never changes. Its
//! [`ShapeKey`] is the normalized, comparable part used to match an interface
//! member to an implementation method and to detect overrides.

use std::fmt;
use std::sync::Arc;

use super::generic::{GenericBindings, GenericParam};
use super::metadata::TypeKey;
use super::types::TypeRef;
use crate::value::Value;

/// How an argument is passed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassMode {
    /// By value
    Value,
    /// By reference, input only
    In,
    /// By reference, output only
    Out,
    /// By reference, read and written
    InOut,
}

impl PassMode {
    /// Check for any by-reference mode
    pub fn is_by_ref(&self) -> bool {
        !matches!(self, PassMode::Value)
    }

    /// Slot is read before the original method runs
    pub fn reads(&self) -> bool {
        !matches!(self, PassMode::Out)
    }

    /// Slot is written back after the original method runs
    pub fn writes(&self) -> bool {
        matches!(self, PassMode::Out | PassMode::InOut)
    }
}

/// A single parameter
#[derive(Debug, Clone)]
pub struct ParameterInfo {
    /// Parameter name
    pub name: Arc<str>,
    /// Declared type (element type for by-reference parameters)
    pub ty: TypeRef,
    /// Passing mode
    pub mode: PassMode,
    /// Value used when the caller omits this argument
    pub default: Option<Value>,
}

impl ParameterInfo {
    /// By-value parameter
    pub fn new(name: &str, ty: TypeRef) -> Self {
        Self {
            name: Arc::from(name),
            ty,
            mode: PassMode::Value,
            default: None,
        }
    }

    /// Set the passing mode
    pub fn with_mode(mut self, mode: PassMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set a default value
    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Check if the parameter may be omitted
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

/// Normalized, hashable shape of a member
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShapeKey {
    name: Arc<str>,
    params: Vec<(TypeRef, PassMode)>,
    generic_arity: usize,
}

/// Complete signature of a method
#[derive(Debug, Clone)]
pub struct MethodSignature {
    /// Declaring type
    pub declaring: TypeKey,
    /// Member name
    pub name: Arc<str>,
    /// Parameters in order
    pub params: Vec<ParameterInfo>,
    /// Declared return type
    pub return_type: TypeRef,
    /// Generic parameters of the method itself
    pub generics: Vec<GenericParam>,
}

impl MethodSignature {
    /// Normalized shape used for matching
    pub fn shape_key(&self) -> ShapeKey {
        ShapeKey {
            name: self.name.clone(),
            params: self.params.iter().map(|p| (p.ty.clone(), p.mode)).collect(),
            generic_arity: self.generics.len(),
        }
    }

    /// Declared parameter types in order
    pub fn parameter_types(&self) -> Vec<TypeRef> {
        self.params.iter().map(|p| p.ty.clone()).collect()
    }

    /// Number of leading parameters without defaults
    pub fn required_count(&self) -> usize {
        self.params
            .iter()
            .rposition(|p| !p.has_default())
            .map_or(0, |i| i + 1)
    }

    /// Check if `count` arguments can satisfy this signature
    pub fn accepts_count(&self, count: usize) -> bool {
        count >= self.required_count() && count <= self.params.len()
    }

    /// Check if the signature mentions open generic parameters
    pub fn is_open(&self) -> bool {
        !self.generics.is_empty()
            || self.return_type.is_open()
            || self.params.iter().any(|p| p.ty.is_open())
    }

    /// Apply type-level bindings to every parameter and the return type
    pub fn substitute(&self, bindings: &GenericBindings) -> MethodSignature {
        MethodSignature {
            declaring: self.declaring,
            name: self.name.clone(),
            params: self
                .params
                .iter()
                .map(|p| ParameterInfo {
                    ty: bindings.apply(&p.ty),
                    ..p.clone()
                })
                .collect(),
            return_type: bindings.apply(&self.return_type),
            generics: self.generics.clone(),
        }
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.generics.is_empty() {
            f.write_str("<")?;
            for (i, g) in self.generics.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                f.write_str(&g.name)?;
            }
            f.write_str(">")?;
        }
        f.write_str("(")?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match p.mode {
                PassMode::Value => {}
                PassMode::In => f.write_str("in ")?,
                PassMode::Out => f.write_str("out ")?,
                PassMode::InOut => f.write_str("ref ")?,
            }
            write!(f, "{}", p.ty)?;
        }
        write!(f, ") -> {}", self.return_type)
    }
}
