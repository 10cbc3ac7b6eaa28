use thiserror::Error;

/// Errors raised by the J-PAKE rounds and proof verification.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JPakeError {
    /// A zero-knowledge proof failed structural or cryptographic verification.
    /// Which check failed is deliberately not exposed.
    #[error("zero-knowledge proof verification failed")]
    IncorrectZkp,

    /// The peer sent gx3 or gx4 equal to 0 or 1.
    #[error("peer commitment gx3 or gx4 is zero or one")]
    Gx3OrGx4IsZeroOrOne,

    /// A round ran before the value it consumes was populated.
    #[error("missing protocol value: {0}")]
    MissingValue(&'static str),
}
