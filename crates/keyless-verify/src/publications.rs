//! Publication lookup: trusted publications and certificates.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use keyless_chain::PublicationRecord;
use serde::Deserialize;

use crate::certificate::{Certificate, CertificateEntry, EcdsaCertificate};
use crate::error::VerificationError;

/// Read-only source of trusted publications and certificates.
///
/// Implementations are synchronous and side-effect free.
pub trait PublicationsLookup: Send + Sync {
    /// The publication made exactly at `time`.
    fn find_publication(&self, time: DateTime<Utc>) -> Option<&PublicationRecord>;

    /// The earliest publication made at or after `time`.
    fn find_publication_after(&self, time: DateTime<Utc>) -> Option<&PublicationRecord>;

    /// The certificate with the given id.
    fn find_certificate(&self, id: &[u8]) -> Option<&dyn Certificate>;
}

/// Publications and certificates held in memory.
#[derive(Debug, Default)]
pub struct InMemoryPublications {
    /// Sorted by publication time.
    publications: Vec<PublicationRecord>,
    certificates: Vec<Arc<dyn Certificate>>,
}

#[derive(Deserialize)]
struct PublicationsDocument {
    #[serde(default)]
    publications: Vec<PublicationRecord>,
    #[serde(default)]
    certificates: Vec<CertificateEntry>,
}

impl InMemoryPublications {
    /// Build a lookup from publication records and certificates.
    pub fn new(
        mut publications: Vec<PublicationRecord>,
        certificates: Vec<Arc<dyn Certificate>>,
    ) -> Self {
        publications.sort_by_key(|p| p.publication_data.publication_time);
        Self {
            publications,
            certificates,
        }
    }

    /// Load a JSON publications document.
    ///
    /// The document has a `publications` array of publication records and
    /// a `certificates` array of ECDSA P-256 certificate entries.
    pub fn from_file(path: &Path) -> Result<Self, VerificationError> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    /// Parse a JSON publications document.
    pub fn from_json(json: &str) -> Result<Self, VerificationError> {
        let document: PublicationsDocument = serde_json::from_str(json)?;
        let certificates = document
            .certificates
            .into_iter()
            .map(|entry| {
                EcdsaCertificate::try_from(entry).map(|c| Arc::new(c) as Arc<dyn Certificate>)
            })
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(
            publications = document.publications.len(),
            certificates = certificates.len(),
            "loaded publications document"
        );
        Ok(Self::new(document.publications, certificates))
    }

    /// Number of publications held.
    pub fn len(&self) -> usize {
        self.publications.len()
    }

    /// Whether no publications are held.
    pub fn is_empty(&self) -> bool {
        self.publications.is_empty()
    }
}

impl PublicationsLookup for InMemoryPublications {
    fn find_publication(&self, time: DateTime<Utc>) -> Option<&PublicationRecord> {
        self.publications
            .iter()
            .find(|p| p.publication_data.publication_time == time)
    }

    fn find_publication_after(&self, time: DateTime<Utc>) -> Option<&PublicationRecord> {
        self.publications
            .iter()
            .find(|p| p.publication_data.publication_time >= time)
    }

    fn find_certificate(&self, id: &[u8]) -> Option<&dyn Certificate> {
        self.certificates
            .iter()
            .find(|c| c.id() == id)
            .map(|c| &**c)
    }
}
