//! Type shapes used in signatures

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::value::{AsyncKind, RustType, Value};

/// Shape of a type appearing in a member signature
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeRef {
    /// No value
    Void,
    /// A concrete Rust type
    Concrete(RustType),
    /// A reflection-only type (service contracts, opaque handles)
    Named {
        /// Type name
        name: Arc<str>,
        /// Type arguments
        args: Vec<TypeRef>,
    },
    /// An open generic parameter
    Param(Arc<str>),
    /// Already-started asynchronous container, optionally wrapping a value
    Task(Option<Box<TypeRef>>),
    /// Lazily-started asynchronous container, optionally wrapping a value
    Deferred(Option<Box<TypeRef>>),
    /// Reference to storage of the inner type
    Ref(Box<TypeRef>),
    /// A named type whose shape is another type
    Alias {
        /// Alias name
        name: Arc<str>,
        /// Aliased shape
        target: Box<TypeRef>,
    },
}

/// Asynchronous shape found in a return type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsyncShape {
    /// Container kind
    pub kind: AsyncKind,
    /// Wrapped value type, `None` for value-less containers
    pub value: Option<TypeRef>,
}

impl TypeRef {
    /// Concrete Rust type `T`
    pub fn of<T: Any>() -> Self {
        TypeRef::Concrete(RustType::of::<T>())
    }

    /// Reflection-only type without arguments
    pub fn named(name: &str) -> Self {
        TypeRef::Named {
            name: Arc::from(name),
            args: Vec::new(),
        }
    }

    /// Reflection-only type with arguments
    pub fn named_with(name: &str, args: Vec<TypeRef>) -> Self {
        TypeRef::Named {
            name: Arc::from(name),
            args,
        }
    }

    /// Generic parameter reference
    pub fn param(name: &str) -> Self {
        TypeRef::Param(Arc::from(name))
    }

    /// Task wrapping `T`
    pub fn task_of<T: Any>() -> Self {
        TypeRef::Task(Some(Box::new(TypeRef::of::<T>())))
    }

    /// Task wrapping an arbitrary shape
    pub fn task(inner: TypeRef) -> Self {
        TypeRef::Task(Some(Box::new(inner)))
    }

    /// Value-less task
    pub fn task_unit() -> Self {
        TypeRef::Task(None)
    }

    /// Deferred task wrapping `T`
    pub fn deferred_of<T: Any>() -> Self {
        TypeRef::Deferred(Some(Box::new(TypeRef::of::<T>())))
    }

    /// Deferred task wrapping an arbitrary shape
    pub fn deferred(inner: TypeRef) -> Self {
        TypeRef::Deferred(Some(Box::new(inner)))
    }

    /// Value-less deferred task
    pub fn deferred_unit() -> Self {
        TypeRef::Deferred(None)
    }

    /// Reference to `inner`
    pub fn by_ref(inner: TypeRef) -> Self {
        TypeRef::Ref(Box::new(inner))
    }

    /// Named alias of another shape
    pub fn alias(name: &str, target: TypeRef) -> Self {
        TypeRef::Alias {
            name: Arc::from(name),
            target: Box::new(target),
        }
    }

    /// Check for `Void`
    pub fn is_void(&self) -> bool {
        matches!(self, TypeRef::Void)
    }

    /// Check whether any generic parameter remains unbound
    pub fn is_open(&self) -> bool {
        match self {
            TypeRef::Param(_) => true,
            TypeRef::Void | TypeRef::Concrete(_) => false,
            TypeRef::Named { args, .. } => args.iter().any(TypeRef::is_open),
            TypeRef::Task(inner) | TypeRef::Deferred(inner) => {
                inner.as_ref().map_or(false, |t| t.is_open())
            }
            TypeRef::Ref(inner) => inner.is_open(),
            TypeRef::Alias { target, .. } => target.is_open(),
        }
    }

    /// Collect the names of unbound generic parameters
    pub fn open_params(&self, out: &mut Vec<Arc<str>>) {
        match self {
            TypeRef::Param(name) => {
                if !out.contains(name) {
                    out.push(name.clone());
                }
            }
            TypeRef::Void | TypeRef::Concrete(_) => {}
            TypeRef::Named { args, .. } => args.iter().for_each(|a| a.open_params(out)),
            TypeRef::Task(inner) | TypeRef::Deferred(inner) => {
                if let Some(t) = inner {
                    t.open_params(out);
                }
            }
            TypeRef::Ref(inner) => inner.open_params(out),
            TypeRef::Alias { target, .. } => target.open_params(out),
        }
    }

    /// Replace generic parameters using `lookup`; unknown names stay open
    pub fn substitute<F>(&self, lookup: &F) -> TypeRef
    where
        F: Fn(&str) -> Option<TypeRef>,
    {
        match self {
            TypeRef::Param(name) => lookup(name).unwrap_or_else(|| self.clone()),
            TypeRef::Void | TypeRef::Concrete(_) => self.clone(),
            TypeRef::Named { name, args } => TypeRef::Named {
                name: name.clone(),
                args: args.iter().map(|a| a.substitute(lookup)).collect(),
            },
            TypeRef::Task(inner) => {
                TypeRef::Task(inner.as_ref().map(|t| Box::new(t.substitute(lookup))))
            }
            TypeRef::Deferred(inner) => {
                TypeRef::Deferred(inner.as_ref().map(|t| Box::new(t.substitute(lookup))))
            }
            TypeRef::Ref(inner) => TypeRef::Ref(Box::new(inner.substitute(lookup))),
            TypeRef::Alias { name, target } => TypeRef::Alias {
                name: name.clone(),
                target: Box::new(target.substitute(lookup)),
            },
        }
    }

    /// Find an asynchronous container, walking through aliases
    pub fn async_shape(&self) -> Option<AsyncShape> {
        let mut current = self;
        loop {
            match current {
                TypeRef::Task(inner) => {
                    return Some(AsyncShape {
                        kind: AsyncKind::Task,
                        value: inner.as_deref().cloned(),
                    })
                }
                TypeRef::Deferred(inner) => {
                    return Some(AsyncShape {
                        kind: AsyncKind::Deferred,
                        value: inner.as_deref().cloned(),
                    })
                }
                TypeRef::Alias { target, .. } => current = target,
                _ => return None,
            }
        }
    }

    /// Strip aliases down to the underlying shape
    pub fn resolved(&self) -> &TypeRef {
        let mut current = self;
        while let TypeRef::Alias { target, .. } = current {
            current = target;
        }
        current
    }

    /// Check whether a slot value fits this shape
    ///
    /// Null fits anything except a concrete Rust type; open parameters and
    /// reflection-only types accept any value.
    pub fn accepts(&self, value: &Value) -> bool {
        match self.resolved() {
            TypeRef::Concrete(ty) => value.rust_type().map_or(false, |t| t == *ty),
            TypeRef::Void => value.is_null(),
            _ => true,
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list(f: &mut fmt::Formatter<'_>, args: &[TypeRef]) -> fmt::Result {
            for (i, a) in args.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}", a)?;
            }
            Ok(())
        }

        match self {
            TypeRef::Void => f.write_str("void"),
            TypeRef::Concrete(ty) => f.write_str(ty.name()),
            TypeRef::Named { name, args } if args.is_empty() => f.write_str(name),
            TypeRef::Named { name, args } => {
                write!(f, "{}<", name)?;
                list(f, args)?;
                f.write_str(">")
            }
            TypeRef::Param(name) => f.write_str(name),
            TypeRef::Task(None) => f.write_str("Task"),
            TypeRef::Task(Some(inner)) => write!(f, "Task<{}>", inner),
            TypeRef::Deferred(None) => f.write_str("Deferred"),
            TypeRef::Deferred(Some(inner)) => write!(f, "Deferred<{}>", inner),
            TypeRef::Ref(inner) => write!(f, "&{}", inner),
            TypeRef::Alias { name, .. } => f.write_str(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_async_shape_detection() {
        let shape = TypeRef::task_of::<i32>().async_shape().unwrap();
        assert_eq!(shape.kind, AsyncKind::Task);
        assert_eq!(shape.value, Some(TypeRef::of::<i32>()));

        let shape = TypeRef::deferred_unit().async_shape().unwrap();
        assert_eq!(shape.kind, AsyncKind::Deferred);
        assert_eq!(shape.value, None);

        assert!(TypeRef::of::<i32>().async_shape().is_none());
        assert!(TypeRef::by_ref(TypeRef::task_unit()).async_shape().is_none());
    }

    #[test]
    fn test_async_shape_walks_aliases() {
        let alias = TypeRef::alias("Job", TypeRef::alias("Pending", TypeRef::task_of::<u8>()));
        let shape = alias.async_shape().unwrap();
        assert_eq!(shape.kind, AsyncKind::Task);
        assert_eq!(shape.value, Some(TypeRef::of::<u8>()));
    }

    #[test]
    fn test_substitute_and_open() {
        let open = TypeRef::named_with("Page", vec![TypeRef::param("T")]);
        assert!(open.is_open());

        let closed = open.substitute(&|name| (name == "T").then(TypeRef::of::<String>));
        assert!(!closed.is_open());
        assert_eq!(
            closed,
            TypeRef::named_with("Page", vec![TypeRef::of::<String>()])
        );

        let mut params = Vec::new();
        TypeRef::task(TypeRef::param("U")).open_params(&mut params);
        assert_eq!(params, vec![Arc::<str>::from("U")]);
    }

    #[test]
    fn test_accepts() {
        let int = TypeRef::of::<i32>();
        assert!(int.accepts(&Value::new(1i32)));
        assert!(!int.accepts(&Value::new(1i64)));
        assert!(!int.accepts(&Value::null()));
        assert!(TypeRef::named("Handle").accepts(&Value::null()));
        assert!(TypeRef::param("T").accepts(&Value::new(1u8)));
    }

    #[test]
    fn test_display() {
        assert_eq!(TypeRef::task_of::<i32>().to_string(), "Task<i32>");
        assert_eq!(
            TypeRef::named_with("Map", vec![TypeRef::param("K"), TypeRef::param("V")]).to_string(),
            "Map<K, V>"
        );
    }
}
