//! Error types for proxy synthesis and intercepted calls

/// Result type for intercepted calls
pub type CallResult<T> = Result<T, CallError>;

/// Rule a type violated during validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShapeRule {
    /// Type cannot be subclassed
    #[error("type is sealed")]
    Sealed,
    /// Type cannot be instantiated
    #[error("type is abstract")]
    Abstract,
    /// Type (or an enclosing type) is not public
    #[error("type is not publicly visible")]
    NotPublic,
    /// Type declares no accessible constructor
    #[error("type declares no accessible constructor")]
    NoConstructor,
    /// Implementation cannot be converted to the service contract
    #[error("type can't be converted to service type '{service}'")]
    NotAssignable {
        /// Name of the service type
        service: String,
    },
    /// Implementation does not provide a member of the service contract
    #[error("type does not implement '{member}'")]
    MissingMember {
        /// Display form of the missing member
        member: String,
    },
}

/// Errors raised while registering interceptors or synthesizing proxy types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProxyError {
    /// Missing service or implementation type
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Type shape cannot be proxied
    #[error("Unsupported shape '{type_name}': {rule}")]
    UnsupportedShape {
        /// Offending type
        type_name: String,
        /// Violated rule
        rule: ShapeRule,
    },

    /// Global interceptor already set, missing, or a binding already exists
    #[error("Configuration conflict: {0}")]
    ConfigurationConflict(String),

    /// A signature could not be resolved to a concrete or constrained shape
    #[error("Synthesis failure in '{member}': {reason}")]
    SynthesisFailure {
        /// Member (or type) being synthesized
        member: String,
        /// Why it failed
        reason: String,
    },
}

impl ProxyError {
    pub(crate) fn shape(type_name: impl Into<String>, rule: ShapeRule) -> Self {
        ProxyError::UnsupportedShape {
            type_name: type_name.into(),
            rule,
        }
    }

    pub(crate) fn synthesis(member: impl Into<String>, reason: impl Into<String>) -> Self {
        ProxyError::SynthesisFailure {
            member: member.into(),
            reason: reason.into(),
        }
    }
}

/// Errors surfacing from a call on a proxy or a plain service object
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    /// Failure raised by the original method or an interceptor, passed through untouched
    #[error(transparent)]
    Raised(#[from] anyhow::Error),

    /// Wrong number of arguments
    #[error("'{member}' expects {expected} arguments, got {got}")]
    ArgumentCount {
        /// Member name
        member: String,
        /// Declared parameter count
        expected: usize,
        /// Supplied argument count
        got: usize,
    },

    /// Argument does not match the declared parameter type
    #[error("argument {index} of '{member}' expects {expected}, got {got}")]
    ArgumentType {
        /// Member name
        member: String,
        /// Parameter position
        index: usize,
        /// Declared type
        expected: String,
        /// Supplied type
        got: String,
    },

    /// Result does not match the declared return type
    #[error("'{member}' produced {got}, expected {expected}")]
    ResultType {
        /// Member name
        member: String,
        /// Declared type
        expected: String,
        /// Produced type
        got: String,
    },

    /// Non-void member completed without anyone setting a result
    #[error("'{member}' completed without a result")]
    MissingResult {
        /// Member name
        member: String,
    },

    /// No member with that name accepts the supplied arguments
    #[error("no member '{member}' on '{type_name}' accepts the supplied arguments")]
    MissingMember {
        /// Requested member name
        member: String,
        /// Type searched
        type_name: String,
    },

    /// Target instance is not of the type a method body expects
    #[error("target is not a '{expected}'")]
    TargetType {
        /// Expected Rust type
        expected: &'static str,
    },

    /// Method body returned a different shape than its signature declares
    #[error("'{member}' returned {got} but is declared to return {expected}")]
    ReturnShape {
        /// Member name
        member: String,
        /// Declared shape
        expected: String,
        /// Produced shape
        got: &'static str,
    },

    /// Closing a generic member at call time failed
    #[error(transparent)]
    Proxy(#[from] ProxyError),
}

impl CallError {
    /// Wrap an arbitrary failure of an original method or interceptor
    pub fn raised<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        CallError::Raised(anyhow::Error::new(error))
    }

    /// The underlying failure, if this error came from user code
    pub fn as_raised(&self) -> Option<&anyhow::Error> {
        match self {
            CallError::Raised(e) => Some(e),
            _ => None,
        }
    }
}
