//! Generic parameters, constraints and bindings
//!
//! Generic members keep their parameters open until a closed instantiation
//! is requested. Closing checks every constraint and refuses arguments that
//! still mention unbound parameters.

use std::fmt;
use std::sync::Arc;

use super::types::TypeRef;

/// Constraint a generic argument must satisfy
#[derive(Clone)]
pub enum TypeConstraint {
    /// Argument must be one of the listed types
    AnyOf(Vec<TypeRef>),
    /// Argument must pass a predicate
    Satisfies {
        /// Human-readable description, used in errors
        description: &'static str,
        /// Predicate over the argument
        check: fn(&TypeRef) -> bool,
    },
}

impl TypeConstraint {
    /// Check an argument
    pub fn allows(&self, arg: &TypeRef) -> bool {
        match self {
            TypeConstraint::AnyOf(types) => types.iter().any(|t| t == arg),
            TypeConstraint::Satisfies { check, .. } => check(arg),
        }
    }
}

impl fmt::Debug for TypeConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeConstraint::AnyOf(types) => {
                f.write_str("one of [")?;
                for (i, t) in types.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", t)?;
                }
                f.write_str("]")
            }
            TypeConstraint::Satisfies { description, .. } => f.write_str(description),
        }
    }
}

/// A generic parameter with its constraints
#[derive(Debug, Clone)]
pub struct GenericParam {
    /// Parameter name (e.g. `T`)
    pub name: Arc<str>,
    /// Constraints, all of which must hold
    pub constraints: Vec<TypeConstraint>,
}

impl GenericParam {
    /// Unconstrained parameter
    pub fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            constraints: Vec::new(),
        }
    }

    /// Add a constraint
    pub fn with_constraint(mut self, constraint: TypeConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Check an argument against every constraint
    pub fn check(&self, arg: &TypeRef) -> Result<(), String> {
        for constraint in &self.constraints {
            if !constraint.allows(arg) {
                return Err(format!(
                    "'{}' does not satisfy constraint {:?} on '{}'",
                    arg, constraint, self.name
                ));
            }
        }
        Ok(())
    }
}

/// Parameter-to-argument assignments for one instantiation
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct GenericBindings {
    pairs: Vec<(Arc<str>, TypeRef)>,
}

impl GenericBindings {
    /// Empty bindings
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `params` to `args` after checking arity, closedness and constraints
    pub fn bind(params: &[GenericParam], args: &[TypeRef]) -> Result<Self, String> {
        if params.len() != args.len() {
            return Err(format!(
                "expected {} generic arguments, got {}",
                params.len(),
                args.len()
            ));
        }

        let mut pairs = Vec::with_capacity(params.len());
        for (param, arg) in params.iter().zip(args) {
            if arg.is_open() {
                let mut open = Vec::new();
                arg.open_params(&mut open);
                return Err(format!(
                    "argument for '{}' mentions unbound parameter(s) {:?}",
                    param.name, open
                ));
            }
            param.check(arg)?;
            pairs.push((param.name.clone(), arg.clone()));
        }
        Ok(Self { pairs })
    }

    /// Bind `params` to `args`, allowing arguments that are still open
    ///
    /// Constraints are only checked for closed arguments; open ones are
    /// checked again when the final instantiation is requested.
    pub fn bind_partial(params: &[GenericParam], args: &[TypeRef]) -> Result<Self, String> {
        if params.len() != args.len() {
            return Err(format!(
                "expected {} generic arguments, got {}",
                params.len(),
                args.len()
            ));
        }

        let mut pairs = Vec::with_capacity(params.len());
        for (param, arg) in params.iter().zip(args) {
            if !arg.is_open() {
                param.check(arg)?;
            }
            pairs.push((param.name.clone(), arg.clone()));
        }
        Ok(Self { pairs })
    }

    /// Look up the argument bound to `name`
    pub fn get(&self, name: &str) -> Option<TypeRef> {
        self.pairs
            .iter()
            .find(|(n, _)| &**n == name)
            .map(|(_, t)| t.clone())
    }

    /// Apply the bindings to a type
    pub fn apply(&self, ty: &TypeRef) -> TypeRef {
        ty.substitute(&|name| self.get(name))
    }

    /// Bound arguments in parameter order
    pub fn arguments(&self) -> Vec<TypeRef> {
        self.pairs.iter().map(|(_, t)| t.clone()).collect()
    }

    /// Check if nothing is bound
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}
