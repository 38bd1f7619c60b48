//! Verifying signature factory.
//!
//! Every signature the factory hands out has passed its policy (internal
//! consistency by default). Assembly errors surface as
//! [`FactoryError::Chain`]; a signature that assembles but does not verify
//! is returned inside [`FactoryError::InvalidSignatureContent`].

use std::sync::Arc;
use std::time::Duration;

use keyless_chain::composition::{apply_input_level, prepend_chain};
use keyless_chain::extender::extend_signature;
use keyless_chain::{
    AggregationHashChain, DataHash, Extender, PublicationRecord, Signature, SignatureParts,
};

use crate::context::{DEFAULT_EXTENSION_TIMEOUT, VerificationContext};
use crate::error::FactoryError;
use crate::policy::Policy;
use crate::publications::PublicationsLookup;
use crate::verifier::Verifier;

/// Builds signatures and verifies them before returning them.
pub struct SignatureFactory {
    verifier: Verifier,
    extender: Option<Arc<dyn Extender>>,
    publications: Option<Arc<dyn PublicationsLookup>>,
    extending_allowed: bool,
    extension_timeout: Duration,
}

impl Default for SignatureFactory {
    fn default() -> Self {
        Self::new(Policy::internal())
    }
}

impl SignatureFactory {
    /// A factory verifying with `policy`.
    pub fn new(policy: Policy) -> Self {
        Self {
            verifier: Verifier::new(policy),
            extender: None,
            publications: None,
            extending_allowed: false,
            extension_timeout: DEFAULT_EXTENSION_TIMEOUT,
        }
    }

    /// Extender used by [`Self::extend`] and by extending policies.
    #[must_use]
    pub fn with_extender(mut self, extender: Arc<dyn Extender>) -> Self {
        self.extender = Some(extender);
        self
    }

    /// Publications lookup for policies that need one.
    #[must_use]
    pub fn with_publications(mut self, publications: Arc<dyn PublicationsLookup>) -> Self {
        self.publications = Some(publications);
        self
    }

    /// Let verification contact the extender.
    #[must_use]
    pub const fn extending_allowed(mut self, allowed: bool) -> Self {
        self.extending_allowed = allowed;
        self
    }

    /// Time allowed for each extension request made while verifying.
    #[must_use]
    pub const fn extension_timeout(mut self, timeout: Duration) -> Self {
        self.extension_timeout = timeout;
        self
    }

    /// Assemble a signature from parts and verify it.
    pub async fn create(&self, parts: SignatureParts) -> Result<Signature, FactoryError> {
        let signature = Signature::new(parts)?;
        let document = signature.input_hash().clone();
        self.verified(signature, document, 0).await
    }

    /// Assemble a signature whose document sits `input_level` levels above
    /// the leaves of the local tree, and verify it.
    pub async fn create_with_level(
        &self,
        parts: SignatureParts,
        input_level: u64,
    ) -> Result<Signature, FactoryError> {
        let signature = Signature::new(parts)?;
        let document = signature.input_hash().clone();
        self.verified(apply_input_level(&signature, input_level)?, document, input_level)
            .await
    }

    /// Add a locally built chain below `signature` and verify the result.
    pub async fn prepend(
        &self,
        signature: &Signature,
        chain: &AggregationHashChain,
    ) -> Result<Signature, FactoryError> {
        self.verified(prepend_chain(signature, chain)?, chain.input_hash.clone(), 0)
            .await
    }

    /// Extend `signature` to `publication` and verify the result.
    pub async fn extend(
        &self,
        signature: &Signature,
        publication: &PublicationRecord,
    ) -> Result<Signature, FactoryError> {
        let extender = self.extender.as_deref().ok_or(FactoryError::MissingExtender)?;
        let extended = extend_signature(signature, extender, publication).await?;
        let document = signature.input_hash().clone();
        self.verified(extended, document, 0).await
    }

    /// Verify `signature` as covering `document` at `input_level`.
    async fn verified(
        &self,
        signature: Signature,
        document: DataHash,
        input_level: u64,
    ) -> Result<Signature, FactoryError> {
        let result = {
            let mut builder = VerificationContext::builder(&signature)
                .document_hash(document)
                .input_level(input_level)
                .extending_allowed(self.extending_allowed)
                .extension_timeout(self.extension_timeout);
            if let Some(extender) = self.extender.as_deref() {
                builder = builder.extender(extender);
            }
            if let Some(publications) = self.publications.as_deref() {
                builder = builder.publications(publications);
            }
            self.verifier.verify(&builder.build()).await?
        };

        if result.is_ok() {
            Ok(signature)
        } else {
            tracing::warn!(result = %result.summary(), "created signature failed verification");
            Err(FactoryError::InvalidSignatureContent {
                signature: Box::new(signature),
                result: Box::new(result),
            })
        }
    }
}
