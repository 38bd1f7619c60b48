//! Hash-chain model and engine for keyless signatures.
//!
//! A keyless signature binds a document hash to a round of a global
//! aggregation tree (aggregation hash chains) and that round's root to a
//! calendar of hash-tree commitments (the calendar hash chain). This crate
//! holds:
//! 1. **Model**: the decoded chain, record and signature types
//! 2. **Engine**: recomputation of chain outputs, chain indices and
//!    calendar registration times
//! 3. **Composition**: prepending a locally built chain, applying an input
//!    level, and extending a signature through an [`Extender`]

pub mod composition;
pub mod engine;
pub mod error;
pub mod extender;
pub mod hashing;
pub mod model;
pub mod tlv;

// Re-export primary types for convenience.
pub use error::ChainError;
pub use extender::{Extender, ProtocolError};
pub use hashing::{DataHash, DataHasher, HashAlgorithm};
pub use model::{
    AggregationHashChain, CalendarAuthenticationRecord, CalendarHashChain, CalendarLink, ChainLink,
    IdentityMetadata, LinkDirection, LinkSibling, PublicationData, PublicationRecord,
    Rfc3161Record, Signature, SignatureData, SignatureParts,
};
