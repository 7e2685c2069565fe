use std::path::PathBuf;

use alloy_primitives::Address;

/// Coarse classification of [`SignerError`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ErrorKind {
    /// A field is malformed or out of range. Raised before any hashing happens.
    #[display("construction error")]
    Construction,
    /// Content does not fit a fixed-capacity buffer.
    #[display("encoding overflow")]
    EncodingOverflow,
    /// A cryptographic precondition does not hold (bad key, missing setup, bad scalar).
    #[display("crypto precondition")]
    CryptoPrecondition,
    /// The digest and signature do not yield a consistent public key.
    #[display("recovery failure")]
    RecoveryFailure,
    /// Wire bytes could not be decoded.
    #[display("decode error")]
    Decode,
    /// Configuration could not be loaded.
    #[display("configuration error")]
    Config,
    /// A key, chain state or broadcast provider failed.
    #[display("provider error")]
    Provider,
}

/// Errors produced while building, encoding, signing or recovering.
#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    /// A field failed validation
    #[error("invalid field `{field}`: {reason}")]
    InvalidField {
        /// Name (or path, for typed data) of the offending field
        field: String,
        /// What is wrong with it
        reason: String,
    },

    /// A required field is absent
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    /// Content exceeds the capacity of a fixed-size buffer
    #[error("{what} of {len} bytes exceeds capacity of {capacity} bytes")]
    CapacityExceeded {
        /// The buffer being filled
        what: &'static str,
        /// Length of the content
        len: usize,
        /// Capacity of the buffer
        capacity: usize,
    },

    /// The private key is not a valid secp256k1 scalar
    #[error("invalid private key")]
    InvalidPrivateKey,

    /// A KZG operation was attempted before the trusted setup was loaded
    #[error("KZG trusted setup has not been loaded")]
    TrustedSetupNotLoaded,

    /// The trusted setup was loaded twice
    #[error("KZG trusted setup is already loaded")]
    TrustedSetupAlreadyLoaded,

    /// A KZG stage failed
    #[error("KZG {stage} failed: {reason}")]
    Kzg {
        /// The stage that failed (`setup`, `commit`, `prove`, `verify`)
        stage: &'static str,
        /// Message reported by the KZG backend
        reason: String,
    },

    /// ECDSA signing failed
    #[error("signing failed: {0}")]
    Signing(String),

    /// A signature scalar is zero or not below the curve order
    #[error("signature component `{0}` is out of range")]
    SignatureOutOfRange(&'static str),

    /// The `v` value is not valid for the recovery convention in use
    #[error("invalid signature v value {v} for {convention}")]
    InvalidV {
        /// The offending value
        v: u64,
        /// Name of the convention that rejected it
        convention: &'static str,
    },

    /// No public key could be recovered
    #[error("signer recovery failed: {0}")]
    Recovery(String),

    /// Neither recovery candidate matches the expected signer
    #[error("signature does not recover to expected signer {expected}")]
    SignerMismatch {
        /// The signer the caller expected
        expected: Address,
    },

    /// RLP decoding failed
    #[error("malformed {what}: {source}")]
    Decode {
        /// The structure being decoded
        what: &'static str,
        /// The underlying RLP error
        source: alloy_rlp::Error,
    },

    /// Unknown EIP-2718 type byte
    #[error("unsupported transaction type {0:#04x}")]
    UnsupportedTxType(u8),

    /// Input left over after a complete decode
    #[error("{0} trailing bytes after transaction")]
    TrailingBytes(usize),

    /// Failed to read a configuration file
    #[error("failed to read config file '{}': {source}", path.display())]
    ConfigRead {
        /// The file path that failed to load
        path: PathBuf,
        /// The underlying I/O error
        source: std::io::Error,
    },

    /// A provider call failed
    #[error("provider call `{operation}` failed: {reason}")]
    Provider {
        /// The provider method that failed
        operation: &'static str,
        /// Message reported by the provider
        reason: String,
    },

    /// Failed to parse configuration or request JSON
    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl SignerError {
    /// Shorthand for [`SignerError::InvalidField`].
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField { field: field.into(), reason: reason.into() }
    }

    /// Shorthand for [`SignerError::Kzg`].
    pub fn kzg(stage: &'static str, err: impl core::fmt::Debug) -> Self {
        Self::Kzg { stage, reason: format!("{err:?}") }
    }

    /// Shorthand for [`SignerError::Decode`].
    pub const fn decode(what: &'static str, source: alloy_rlp::Error) -> Self {
        Self::Decode { what, source }
    }

    /// Shorthand for [`SignerError::Provider`].
    pub fn provider(operation: &'static str, err: impl core::fmt::Display) -> Self {
        Self::Provider { operation, reason: err.to_string() }
    }

    /// Returns the [`ErrorKind`] of this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidField { .. } | Self::MissingField(_) => ErrorKind::Construction,
            Self::CapacityExceeded { .. } => ErrorKind::EncodingOverflow,
            Self::InvalidPrivateKey |
            Self::TrustedSetupNotLoaded |
            Self::TrustedSetupAlreadyLoaded |
            Self::Kzg { .. } |
            Self::Signing(_) |
            Self::SignatureOutOfRange(_) => ErrorKind::CryptoPrecondition,
            Self::InvalidV { .. } | Self::Recovery(_) | Self::SignerMismatch { .. } => {
                ErrorKind::RecoveryFailure
            }
            Self::Decode { .. } | Self::UnsupportedTxType(_) | Self::TrailingBytes(_) => {
                ErrorKind::Decode
            }
            Self::ConfigRead { .. } | Self::Json(_) => ErrorKind::Config,
            Self::Provider { .. } => ErrorKind::Provider,
        }
    }
}

/// Result type of this crate.
pub type Result<T> = std::result::Result<T, SignerError>;
