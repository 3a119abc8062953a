//! Error taxonomy: one type per failing stage (tag parsing, inference, flattening, unflattening).

/// Malformed type tag text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid type tag {tag:?} at {fragment:?}: {message}")]
pub struct TypeTagError {
    /// The tag as given by the caller.
    pub tag: String,
    /// Remainder of the tag starting at the offending position.
    pub fragment: String,
    pub message: String,
}

impl TypeTagError {
    pub(crate) fn new(tag: &str, fragment: &str, message: impl Into<String>) -> Self {
        TypeTagError {
            tag: tag.to_string(),
            fragment: fragment.to_string(),
            message: message.into(),
        }
    }
}

/// A value has no representable default type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot infer a type for {0}")]
pub struct InferenceError(pub String);

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FlatteningError {
    #[error(transparent)]
    Tag(#[from] TypeTagError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error("cannot flatten {found} as '{expected}'")]
    Mismatch { expected: String, found: String },
    #[error("integer {value} out of range for '{target}'")]
    OutOfRange { value: i128, target: &'static str },
    #[error("unit mismatch: '{found}' cannot be flattened as '{expected}'")]
    UnitMismatch { expected: String, found: String },
    #[error("cluster '{expected}' has {arity} members, tuple has {found}")]
    ArityMismatch {
        expected: String,
        arity: usize,
        found: usize,
    },
    #[error("{found} is not a list of depth {depth}")]
    NotAList { depth: u8, found: String },
    #[error("ragged data for list of depth {depth}: dimension {level} has lengths {first} and {other}")]
    Ragged {
        depth: u8,
        level: usize,
        first: usize,
        other: usize,
    },
    #[error("list elements disagree: '{unified}' vs {found}")]
    Conflict { unified: String, found: String },
    #[error("type '{0}' is not resolved enough to flatten data")]
    Unresolved(String),
    #[error("{found} matches none of the type hints [{hints}]")]
    NoMatchingHint { found: String, hints: String },
    #[error("write failed: {0}")]
    Io(String),
}

impl From<std::io::Error> for FlatteningError {
    fn from(e: std::io::Error) -> Self {
        FlatteningError::Io(e.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UnflatteningError {
    #[error("truncated buffer: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid bool byte {0:#04x}")]
    InvalidBool(u8),
    #[error("invalid present flag {0:#04x} for error payload")]
    InvalidFlag(u8),
    #[error("negative list length {0}")]
    NegativeLength(i32),
    #[error("list of shape {0:?} is too large")]
    TooLarge(Vec<usize>),
    #[error("list of unknown element type has {0} elements")]
    UnknownElement(usize),
    #[error("timestamp out of range: {seconds}s + {fraction}/2^64")]
    InvalidTime { seconds: i64, fraction: u64 },
    #[error("{0} trailing bytes after value of type '{1}'")]
    TrailingBytes(usize, String),
}
