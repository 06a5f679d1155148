use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Encryption secret key has not been configured")]
    MissingSecretKey,

    #[error("Unsupported encryption algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Invalid encrypted message: missing {0}")]
    MalformedEnvelope(&'static str),

    #[error("Invalid base64 in {0}")]
    InvalidEncoding(&'static str),

    #[error("Invalid public key")]
    InvalidPublicKey,

    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Decryption failed")]
    DecryptionFailed,

    #[error("Decrypted message is not valid UTF-8")]
    InvalidUtf8,
}

pub type Result<T> = std::result::Result<T, CryptoError>;
