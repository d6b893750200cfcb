use std::fmt;

use crate::config::ReplacementSource;

macro_rules! err {
    ($base:ident, $msg:literal) => {
        ParseError::with_context($base, $msg.to_string())
    };
    ($base:ident, $fmtstr:literal, $($args:tt)*) => {
        ParseError::with_context($base, format!($fmtstr, $($args)*))
    };
    ($msg:literal) => {
        ParseError::new($msg.to_string())
    };
    ($fmtstr:literal, $($args:tt)*) => {
        ParseError::new(format!($fmtstr, $($args)*))
    };
}

macro_rules! fail {
    ($msg:literal) => {
        return Err(ParseError::new($msg.to_string()))
    };
    ($fmtstr:literal, $($args:tt)*) => {
        return Err(ParseError::new(format!($fmtstr, $($args)*)))
    };
}

#[derive(Clone, Debug, PartialEq)]
pub struct ParseError {
    msg: String,
    contexts: Vec<String>,
}

impl ParseError {
    pub(crate) fn new(msg: String) -> Self {
        ParseError {
            msg,
            contexts: Vec::new(),
        }
    }

    pub(crate) fn with_context(base: ParseError, context: String) -> Self {
        let mut contexts = base.contexts;
        contexts.push(context);
        ParseError {
            msg: base.msg,
            contexts,
        }
    }

    pub fn message(&self) -> &str {
        &self.msg
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.msg)?;
        let mut connector = " for ";
        for context in &self.contexts {
            write!(f, "{}{}", connector, context)?;
            connector = " of ";
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}

/// Every way a single class load can end without a patch.
///
/// None of these escape [`Transformer::transform`](crate::Transformer::transform);
/// they only decide what gets logged before the original bytes are handed back.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("malformed class file: {0}")]
    Parse(#[from] ParseError),
    #[error("class has {found} interfaces, fingerprint requires {required}")]
    NoStructuralMatch { found: usize, required: usize },
    #[error("constant pool lacks fingerprint constant {missing:?}")]
    NoContentMatch { missing: String },
    #[error("no method matches the {shape} shape")]
    MethodNotFound { shape: String },
    #[error("{target} not located in method {method}")]
    NotLocated { method: String, target: String },
    #[error("replacement {value} from {origin} does not fit the target operand")]
    OperandOutOfRange { value: String, origin: ReplacementSource },
    #[error("replacement {value:?} from {origin} is not an integer")]
    InvalidOverride { value: String, origin: ReplacementSource },
    #[error("unexpected internal error: {0}")]
    UnexpectedInternal(String),
}

impl TransformError {
    /// Configuration mistakes are reported loudly; everything else is routine.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            TransformError::OperandOutOfRange { .. } | TransformError::InvalidOverride { .. }
        )
    }
}
