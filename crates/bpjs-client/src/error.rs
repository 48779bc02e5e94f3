use std::fmt;

use thiserror::Error;

/// Failures inside the individual envelope codec steps.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Invalid ciphertext base64: {0}")]
    InvalidBase64(String),

    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("Decompression failed: {0}")]
    Decompression(String),
}

/// Stage of [`crate::envelope::decode_envelope`] that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeStage {
    Base64,
    Decrypt,
    Decompress,
    Parse,
}

impl fmt::Display for EnvelopeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Base64 => write!(f, "base64"),
            Self::Decrypt => write!(f, "decrypt"),
            Self::Decompress => write!(f, "decompress"),
            Self::Parse => write!(f, "parse"),
        }
    }
}

/// Single error surfaced by envelope decoding, tagged with the failing stage.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Envelope decode failed at {stage} stage: {message}")]
pub struct EnvelopeDecodeError {
    pub stage: EnvelopeStage,
    pub message: String,
}

impl EnvelopeDecodeError {
    pub fn new(stage: EnvelopeStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }
}

impl From<CodecError> for EnvelopeDecodeError {
    fn from(err: CodecError) -> Self {
        let stage = match &err {
            CodecError::InvalidBase64(_) => EnvelopeStage::Base64,
            CodecError::Decryption(_) => EnvelopeStage::Decrypt,
            CodecError::Decompression(_) => EnvelopeStage::Decompress,
        };
        Self::new(stage, err.to_string())
    }
}

/// Failure before any upstream response could be read.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),

    #[error("Request failed: {0}")]
    Request(String),
}

impl TransportError {
    /// Returns `true` when the request never reached the upstream.
    pub fn is_connect(&self) -> bool {
        matches!(self, Self::Connect(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let message = err.to_string();
        if err.is_timeout() {
            Self::Timeout(message)
        } else if err.is_connect() {
            Self::Connect(message)
        } else if err.is_builder() {
            Self::InvalidUrl(message)
        } else {
            Self::Request(message)
        }
    }
}

/// Errors raised while building or sending requests.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Invalid client configuration: {0}")]
    Config(String),
}
