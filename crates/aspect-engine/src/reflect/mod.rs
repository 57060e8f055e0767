//! Reflection model
//!
//! The metadata the engine synthesizes from: type identities and kinds,
//! member signatures with pass modes and generic parameters, constructors,
//! markers and executable bodies.
//!
//! ## Usage
//!
//! ```ignore
//! let contract = TypeBuilder::interface("Calculator")
//!     .declare(MethodBuilder::new("compute").param::<i32>("x").returns::<i32>())
//!     .build();
//!
//! let implementation = TypeBuilder::<Calc>::class("Calc")
//!     .implements(&contract)
//!     .default_constructor()
//!     .method(
//!         MethodBuilder::new("compute").param::<i32>("x").returns::<i32>(),
//!         |_, args| Ok(Returned::value(arg::<i32>(args, 0)?)),
//!     )
//!     .build();
//! ```

mod builder;
mod generic;
mod markers;
mod metadata;
mod registry;
mod signature;
mod types;

pub use builder::{MethodBuilder, PropertyBuilder, TypeBuilder};
pub use generic::{GenericBindings, GenericParam, TypeConstraint};
pub use markers::{InterceptorMarker, Markers};
pub use metadata::{
    object_type, ConstructorBody, ConstructorInfo, Instance, MethodBody, MethodInfo, MethodKey,
    Modifiers, Target, TypeInfo, TypeKey, TypeKind,
};
pub use registry::TypeRegistry;
pub use signature::{MethodSignature, ParameterInfo, PassMode, ShapeKey};
pub use types::{AsyncShape, TypeRef};
