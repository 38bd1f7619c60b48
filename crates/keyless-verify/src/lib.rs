//! Verification of keyless signatures.
//!
//! A [`Verifier`] runs a [`Policy`] (an ordered list of [`Rule`]s with an
//! optional fallback) against a [`VerificationContext`]. The context holds
//! the signature, the caller's expectations, and the trust anchors:
//! - a [`PublicationsLookup`] with trusted publications and certificates
//! - an [`Extender`](keyless_chain::Extender) serving extended calendar
//!   chains, fetched at most once per publication time
//!
//! Rule verdicts are OK, FAIL or NA with wire-stable [`ErrorCode`]s. Fatal
//! conditions (cancellation, an extended chain that rewrites the
//! signature's calendar history) abort the run with a [`VerificationError`].

pub mod archive;
pub mod certificate;
pub mod code;
pub mod config;
pub mod context;
pub mod error;
pub mod factory;
pub mod policy;
pub mod publications;
pub mod rules;
pub mod verifier;

// Re-export primary types for convenience.
pub use archive::InMemoryExtender;
pub use certificate::{Certificate, EcdsaCertificate};
pub use code::ErrorCode;
pub use config::{PolicyKind, VerifierConfig};
pub use context::{ExtensionFailure, VerificationContext};
pub use error::{ConfigError, FactoryError, VerificationError};
pub use factory::SignatureFactory;
pub use policy::{Policy, PolicyOutcome, PolicyState};
pub use publications::{InMemoryPublications, PublicationsLookup};
pub use rules::{Rule, RuleResult, RuleStatus};
pub use verifier::{VerificationResult, Verifier};
