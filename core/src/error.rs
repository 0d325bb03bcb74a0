use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModemError {
    #[error("cipher failure: {0}")]
    Cipher(String),

    #[error("payload CRC mismatch")]
    CrcMismatch,

    #[error("Hamming decode failure: {0}")]
    Hamming(String),

    #[error("malformed frame: {0}")]
    Framing(String),

    #[error("symbol {0} outside the configured alphabet")]
    Symbol(u8),

    #[error("passphrase must not be empty")]
    EmptyPassphrase,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("audio sink failure: {0}")]
    Sink(String),
}

pub type Result<T> = std::result::Result<T, ModemError>;
