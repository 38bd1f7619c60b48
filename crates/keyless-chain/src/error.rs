//! Error types for hash-chain modelling and composition.

use chrono::{DateTime, Utc};

use crate::hashing::HashAlgorithm;

/// Errors raised while building, recomputing, or composing hash chains.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// An imprint carried an algorithm id that is not registered.
    #[error("unknown hash algorithm id 0x{0:02x}")]
    UnknownAlgorithm(u8),

    /// The algorithm is registered but has no implementation.
    #[error("hash algorithm {0} is not implemented")]
    NotImplemented(HashAlgorithm),

    /// A digest did not have the length its algorithm produces.
    #[error("{algorithm} digest must be {expected} bytes, got {actual}")]
    DigestLength {
        /// Algorithm named by the imprint.
        algorithm: HashAlgorithm,
        /// Length the algorithm produces.
        expected: usize,
        /// Length actually supplied.
        actual: usize,
    },

    /// An imprint could not be decoded.
    #[error("invalid imprint: {0}")]
    InvalidImprint(String),

    /// Chain arithmetic went out of range (level above 255, index overflow,
    /// registration time underflow).
    #[error("hash chain computation failed: {0}")]
    ChainComputation(String),

    /// A value cannot be written in its canonical byte form.
    #[error("canonical encoding failed: {0}")]
    Encoding(String),

    /// A signature could not be assembled from its parts.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// A new bottom chain could not be prepended to a signature.
    #[error("aggregation hash chain cannot be added as lowest level chain: {0}")]
    PrependRejected(String),

    /// The extended calendar chain does not keep the signature's right links
    /// as a prefix.
    #[error(
        "right links of signature calendar hash chain and extended calendar hash chain do not match"
    )]
    InconsistentCalendarChain,

    /// Extension was requested to a publication older than the signature.
    #[error("publication at {publication_time} is before signature aggregated at {aggregation_time}")]
    PublicationBeforeSignature {
        /// Time of the requested publication.
        publication_time: DateTime<Utc>,
        /// Aggregation time of the signature being extended.
        aggregation_time: DateTime<Utc>,
    },

    /// The extension collaborator could not deliver a calendar chain.
    #[error("extension failed: {0}")]
    Extension(#[from] crate::extender::ProtocolError),
}
