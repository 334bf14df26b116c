/// Integrity violation surfaced to the relay as an authorization failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityError {
    InvalidInput(String),
    TokenMissing,
    TokenInvalid,
    InstructionMismatch(String),
}

impl std::fmt::Display for IntegrityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Self::TokenMissing => write!(f, "message token missing"),
            Self::TokenInvalid => write!(f, "message token invalid"),
            Self::InstructionMismatch(what) => write!(f, "instruction mismatch: {what}"),
        }
    }
}

impl std::error::Error for IntegrityError {}
