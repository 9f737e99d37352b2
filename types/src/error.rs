use thiserror::Error;

/// Errors produced when parsing a protocol identifier from its text form.
#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("expected {expected} bytes, got {got}")]
    Length { expected: usize, got: usize },

    #[error("invalid address: {0}")]
    Address(String),
}
