/// Errors that can occur while building or parsing structured messages.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CodecError {
    /// The buffer is shorter than the structure requires.
    #[error("Not enough data")]
    InsufficientData { needed: usize, available: usize },

    /// A STATIC element did not match its declared bytes (strict mode only).
    #[error("static element '{element}' mismatch (expected {expected}, got {actual})")]
    StaticMismatch {
        element: String,
        expected: String,
        actual: String,
    },

    /// A CHECKSUM element did not match the recomputed value (strict mode only).
    #[error("checksum '{element}' invalid (expected {expected:#x}, got {actual:#x})")]
    ChecksumInvalid {
        element: String,
        expected: u64,
        actual: u64,
    },

    /// An `includeElements` entry names an element that does not exist.
    #[error("unknown element '{0}'")]
    UnknownElement(String),

    /// An `includeElements` entry names an element that has not been processed yet.
    #[error("element '{element}' references '{target}' which does not precede it")]
    ForwardReference { element: String, target: String },

    /// A FIELD/ADDRESS element has no bound or matching parameter value.
    #[error("no value for parameter '{0}'")]
    MissingParameter(String),

    /// A parameter value could not be interpreted as a number.
    #[error("parameter '{name}' is not numeric: {value}")]
    NotNumeric { name: String, value: String },

    /// A transform or condition expression failed to evaluate.
    #[error("expression '{expression}' failed: {message}")]
    Expression { expression: String, message: String },

    /// A hex string could not be parsed.
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    /// The structure itself is not usable (e.g. unresolvable element size).
    #[error("invalid structure: {0}")]
    InvalidStructure(String),
}

pub type Result<T> = std::result::Result<T, CodecError>;
