//! Error types for the verification subsystem.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use keyless_chain::{ChainError, Signature};

use crate::verifier::VerificationResult;

/// Fatal errors that abort a verification run instead of producing a
/// verdict.
#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    /// Chain arithmetic or structure made recomputation impossible.
    #[error("hash chain error: {0}")]
    Chain(#[from] ChainError),

    /// The extended calendar chain does not keep the signature's right
    /// links as a prefix.
    #[error(
        "right links of signature calendar hash chain and extended calendar hash chain do not match \
         (aggregation time {aggregation_time}, publication time {publication_time:?})"
    )]
    InconsistentCalendarChain {
        /// Aggregation time of the signature.
        aggregation_time: DateTime<Utc>,
        /// Publication time the chain was extended to.
        publication_time: Option<DateTime<Utc>>,
    },

    /// The run was cancelled by its caller.
    #[error("verification cancelled")]
    Cancelled,

    /// A certificate could not be decoded.
    #[error("invalid certificate: {0}")]
    InvalidCertificate(String),

    /// I/O error while loading verification inputs.
    #[error("verification I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors loading the verifier configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read config `{}`: {source}", path.display())]
    Read {
        /// File that was read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for the config schema.
    #[error("invalid config `{}`: {source}", path.display())]
    Parse {
        /// File that was parsed.
        path: PathBuf,
        /// Underlying TOML error.
        source: toml::de::Error,
    },

    /// A policy name did not match any built-in policy.
    #[error("unknown policy `{0}`")]
    UnknownPolicy(String),
}

/// Errors creating a signature through the verifying factory.
#[derive(Debug, thiserror::Error)]
pub enum FactoryError {
    /// The signature could not be assembled.
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// Verification of the created signature aborted.
    #[error(transparent)]
    Verification(#[from] VerificationError),

    /// Extending was requested but the factory has no extender.
    #[error("signature factory has no extender configured")]
    MissingExtender,

    /// The created signature did not pass the factory's policy.
    #[error("signature content is invalid: {}", result.summary())]
    InvalidSignatureContent {
        /// The rejected signature.
        signature: Box<Signature>,
        /// The verification result that rejected it.
        result: Box<VerificationResult>,
    },
}
