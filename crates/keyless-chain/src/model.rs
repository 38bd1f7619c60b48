//! Immutable value types for hash chains, records, and the composite
//! signature.
//!
//! These are the decoded forms of a keyless signature. They serialize to
//! JSON with `serde`: hashes as hex imprints, times as Unix seconds.
//! [`Signature`] validates its structure on construction and on
//! deserialization; the chain types are plain data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ChainError;
use crate::hashing::{DataHash, HashAlgorithm};
use crate::tlv;

/// Which side of the fold the sibling sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkDirection {
    /// The running hash is the left input; the sibling is on the right.
    Left,
    /// The sibling is the left input; the running hash is on the right.
    Right,
}

/// Client identity recorded in an aggregation chain in place of a sibling
/// hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityMetadata {
    /// Client identifier.
    pub client_id: String,
    /// Identifier of the machine the request came from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_id: Option<String>,
    /// Per-client request sequence number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<u64>,
    /// Request time in milliseconds, as recorded by the aggregator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_time: Option<u64>,
    /// Length of the leading padding element, if present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub padding: Option<u8>,
}

impl IdentityMetadata {
    /// Metadata carrying only a client id, without padding.
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            machine_id: None,
            sequence_number: None,
            request_time: None,
            padding: None,
        }
    }

    /// Add the padding element that keeps the encoded content length even,
    /// so the content can never be mistaken for an imprint.
    #[must_use]
    pub fn with_padding(mut self) -> Self {
        self.padding = Some(tlv::padding_len_for(&self));
        self
    }

    /// Bytes the metadata contributes to a chain step.
    pub fn sibling_bytes(&self) -> Result<Vec<u8>, ChainError> {
        tlv::encode_metadata_content(self)
    }
}

/// What a link folds with the running hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkSibling {
    /// An opaque sibling hash.
    Imprint(DataHash),
    /// Identity metadata, hashed through its canonical encoding.
    Metadata(IdentityMetadata),
}

impl LinkSibling {
    /// Bytes the sibling contributes to a chain step.
    pub fn sibling_bytes(&self) -> Result<Vec<u8>, ChainError> {
        match self {
            Self::Imprint(hash) => Ok(hash.imprint()),
            Self::Metadata(metadata) => metadata.sibling_bytes(),
        }
    }
}

/// One step of an aggregation hash chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainLink {
    /// Side of the sibling.
    pub direction: LinkDirection,
    /// The sibling folded at this step.
    pub sibling: LinkSibling,
    /// Extra levels added at this step, for sparse trees.
    #[serde(default)]
    pub level_correction: u64,
}

impl ChainLink {
    /// A left link with an imprint sibling.
    pub const fn left(sibling: DataHash, level_correction: u64) -> Self {
        Self {
            direction: LinkDirection::Left,
            sibling: LinkSibling::Imprint(sibling),
            level_correction,
        }
    }

    /// A right link with an imprint sibling.
    pub const fn right(sibling: DataHash, level_correction: u64) -> Self {
        Self {
            direction: LinkDirection::Right,
            sibling: LinkSibling::Imprint(sibling),
            level_correction,
        }
    }

    /// Whether the sibling is on the right of the running hash.
    pub fn is_left(&self) -> bool {
        self.direction == LinkDirection::Left
    }
}

/// Proof that an input hash was aggregated into a round root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationHashChain {
    /// Hash entering the chain at its lowest link.
    pub input_hash: DataHash,
    /// Aggregation round time.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub aggregation_time: DateTime<Utc>,
    /// Position of the chain in the global aggregation tree, most
    /// significant element first.
    pub chain_index: Vec<u64>,
    /// Links ordered from the leaf toward the root.
    pub links: Vec<ChainLink>,
    /// Algorithm used for every step of this chain.
    pub algorithm: HashAlgorithm,
}

/// One step of a calendar hash chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarLink {
    /// Side of the sibling.
    pub direction: LinkDirection,
    /// Sibling hash; its algorithm is used for the step.
    pub sibling: DataHash,
}

impl CalendarLink {
    /// A left calendar link.
    pub const fn left(sibling: DataHash) -> Self {
        Self {
            direction: LinkDirection::Left,
            sibling,
        }
    }

    /// A right calendar link.
    pub const fn right(sibling: DataHash) -> Self {
        Self {
            direction: LinkDirection::Right,
            sibling,
        }
    }
}

/// Proof that an aggregation root was committed to the calendar as of a
/// publication time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarHashChain {
    /// Aggregation root entering the calendar.
    pub input_hash: DataHash,
    /// Time of the aggregation round whose root is the input.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub aggregation_time: DateTime<Utc>,
    /// Time of the calendar root this chain leads to.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub publication_time: DateTime<Utc>,
    /// Links ordered from the input toward the calendar root.
    pub links: Vec<CalendarLink>,
}

impl CalendarHashChain {
    /// Links whose sibling is to the right of the running hash.
    pub fn left_links(&self) -> impl Iterator<Item = &CalendarLink> {
        self.links
            .iter()
            .filter(|l| l.direction == LinkDirection::Left)
    }

    /// Links whose sibling is to the left of the running hash. These encode
    /// the calendar's time-ordered history.
    pub fn right_links(&self) -> impl Iterator<Item = &CalendarLink> {
        self.links
            .iter()
            .filter(|l| l.direction == LinkDirection::Right)
    }
}

/// A published calendar root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationData {
    /// Calendar time of the published root.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub publication_time: DateTime<Utc>,
    /// The published root hash.
    pub published_hash: DataHash,
}

/// Publication data plus where it was published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationRecord {
    /// The published root.
    pub publication_data: PublicationData,
    /// Bibliographic references to printed publications.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,
    /// URIs of repositories holding the publication.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub repository_uris: Vec<String>,
}

/// PKI signature over publication data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureData {
    /// Signature algorithm identifier (an OID).
    pub signature_type: String,
    /// Signature value.
    #[serde(with = "hex::serde")]
    pub signature_value: Vec<u8>,
    /// Identifier of the signing certificate.
    #[serde(with = "hex::serde")]
    pub certificate_id: Vec<u8>,
    /// Where the certificate can be fetched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_repository_uri: Option<String>,
}

impl SignatureData {
    /// Build signature data, rejecting empty mandatory fields.
    pub fn new(
        signature_type: impl Into<String>,
        signature_value: Vec<u8>,
        certificate_id: Vec<u8>,
    ) -> Result<Self, ChainError> {
        let signature_type = signature_type.into();
        if signature_type.is_empty() {
            return Err(ChainError::InvalidSignature(
                "signature type must not be empty".to_owned(),
            ));
        }
        if signature_value.is_empty() {
            return Err(ChainError::InvalidSignature(
                "signature value must not be empty".to_owned(),
            ));
        }
        if certificate_id.is_empty() {
            return Err(ChainError::InvalidSignature(
                "certificate id must not be empty".to_owned(),
            ));
        }
        Ok(Self {
            signature_type,
            signature_value,
            certificate_id,
            certificate_repository_uri: None,
        })
    }
}

/// Calendar root authenticated by a PKI signature instead of a
/// publication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarAuthenticationRecord {
    /// The signed calendar root.
    pub publication_data: PublicationData,
    /// Signature over the canonical encoding of `publication_data`.
    pub signature_data: SignatureData,
}

/// Legacy RFC 3161 time-stamp record sitting below the first aggregation
/// chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rfc3161Record {
    /// Aggregation time recorded in the time-stamp.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub aggregation_time: DateTime<Utc>,
    /// Chain index recorded in the time-stamp.
    pub chain_index: Vec<u64>,
    /// Hash the time-stamp was issued for.
    pub input_hash: DataHash,
    /// Bytes of the `TSTInfo` structure before the message imprint.
    #[serde(with = "hex::serde")]
    pub tst_info_prefix: Vec<u8>,
    /// Bytes of the `TSTInfo` structure after the message imprint.
    #[serde(with = "hex::serde")]
    pub tst_info_suffix: Vec<u8>,
    /// Algorithm hashing the `TSTInfo` structure.
    pub tst_info_algorithm: HashAlgorithm,
    /// Bytes of the signed attributes before the `TSTInfo` digest.
    #[serde(with = "hex::serde")]
    pub signed_attributes_prefix: Vec<u8>,
    /// Bytes of the signed attributes after the `TSTInfo` digest.
    #[serde(with = "hex::serde")]
    pub signed_attributes_suffix: Vec<u8>,
    /// Algorithm hashing the signed attributes.
    pub signed_attributes_algorithm: HashAlgorithm,
}

impl Rfc3161Record {
    /// Hash the record feeds into the first aggregation chain.
    pub fn output_hash(&self) -> Result<DataHash, ChainError> {
        let mut tst = crate::hashing::DataHasher::new(self.tst_info_algorithm)?;
        tst.update(&self.tst_info_prefix)
            .update(self.input_hash.digest())
            .update(&self.tst_info_suffix);
        let tst_hash = tst.finish();

        let mut signed = crate::hashing::DataHasher::new(self.signed_attributes_algorithm)?;
        signed
            .update(&self.signed_attributes_prefix)
            .update(tst_hash.digest())
            .update(&self.signed_attributes_suffix);
        Ok(signed.finish())
    }
}

/// A keyless signature: aggregation chains, optionally anchored in the
/// calendar and authenticated by a publication or a PKI signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SignatureParts")]
pub struct Signature {
    aggregation_chains: Vec<AggregationHashChain>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    calendar_chain: Option<CalendarHashChain>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    authentication_record: Option<CalendarAuthenticationRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    publication_record: Option<PublicationRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rfc3161_record: Option<Rfc3161Record>,
}

/// Unvalidated parts of a [`Signature`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignatureParts {
    /// Aggregation chains, bottom chain first.
    pub aggregation_chains: Vec<AggregationHashChain>,
    /// Calendar chain anchoring the top aggregation root.
    #[serde(default)]
    pub calendar_chain: Option<CalendarHashChain>,
    /// PKI authentication of the calendar root.
    #[serde(default)]
    pub authentication_record: Option<CalendarAuthenticationRecord>,
    /// Publication of the calendar root.
    #[serde(default)]
    pub publication_record: Option<PublicationRecord>,
    /// Legacy time-stamp below the first chain.
    #[serde(default)]
    pub rfc3161_record: Option<Rfc3161Record>,
}

impl TryFrom<SignatureParts> for Signature {
    type Error = ChainError;

    fn try_from(parts: SignatureParts) -> Result<Self, Self::Error> {
        Self::new(parts)
    }
}

impl Signature {
    /// Assemble a signature, checking its structure.
    ///
    /// Rejects: no aggregation chains, a chain without links, any
    /// algorithm that is registered but not implemented, metadata with no
    /// canonical encoding, a record without a calendar chain, and both
    /// records at once.
    pub fn new(parts: SignatureParts) -> Result<Self, ChainError> {
        if parts.aggregation_chains.is_empty() {
            return Err(ChainError::InvalidSignature(
                "at least one aggregation hash chain is required".to_owned(),
            ));
        }
        for chain in &parts.aggregation_chains {
            if chain.links.is_empty() {
                return Err(ChainError::InvalidSignature(
                    "aggregation hash chain has no links".to_owned(),
                ));
            }
            require_implemented(chain.algorithm)?;
            require_implemented(chain.input_hash.algorithm())?;
            for link in &chain.links {
                match &link.sibling {
                    LinkSibling::Imprint(sibling) => require_implemented(sibling.algorithm())?,
                    LinkSibling::Metadata(metadata) => {
                        metadata.sibling_bytes()?;
                    }
                }
            }
        }
        if let Some(calendar) = &parts.calendar_chain {
            require_implemented(calendar.input_hash.algorithm())?;
            for link in &calendar.links {
                require_implemented(link.sibling.algorithm())?;
            }
        }
        if let Some(rfc3161) = &parts.rfc3161_record {
            require_implemented(rfc3161.tst_info_algorithm)?;
            require_implemented(rfc3161.signed_attributes_algorithm)?;
        }
        let has_record =
            parts.authentication_record.is_some() || parts.publication_record.is_some();
        if has_record && parts.calendar_chain.is_none() {
            return Err(ChainError::InvalidSignature(
                "calendar record present without a calendar hash chain".to_owned(),
            ));
        }
        if parts.authentication_record.is_some() && parts.publication_record.is_some() {
            return Err(ChainError::InvalidSignature(
                "signature cannot carry both an authentication record and a publication record"
                    .to_owned(),
            ));
        }
        Ok(Self {
            aggregation_chains: parts.aggregation_chains,
            calendar_chain: parts.calendar_chain,
            authentication_record: parts.authentication_record,
            publication_record: parts.publication_record,
            rfc3161_record: parts.rfc3161_record,
        })
    }

    /// Decompose into parts for building a derived signature.
    pub fn into_parts(self) -> SignatureParts {
        SignatureParts {
            aggregation_chains: self.aggregation_chains,
            calendar_chain: self.calendar_chain,
            authentication_record: self.authentication_record,
            publication_record: self.publication_record,
            rfc3161_record: self.rfc3161_record,
        }
    }

    /// Aggregation chains, bottom chain first.
    pub fn aggregation_chains(&self) -> &[AggregationHashChain] {
        &self.aggregation_chains
    }

    /// The bottom aggregation chain.
    pub fn first_chain(&self) -> &AggregationHashChain {
        // Non-empty by construction.
        &self.aggregation_chains[0]
    }

    /// The calendar chain, if the signature is anchored in the calendar.
    pub const fn calendar_chain(&self) -> Option<&CalendarHashChain> {
        self.calendar_chain.as_ref()
    }

    /// The calendar authentication record, if any.
    pub const fn authentication_record(&self) -> Option<&CalendarAuthenticationRecord> {
        self.authentication_record.as_ref()
    }

    /// The publication record, if the signature is extended.
    pub const fn publication_record(&self) -> Option<&PublicationRecord> {
        self.publication_record.as_ref()
    }

    /// The legacy RFC 3161 record, if any.
    pub const fn rfc3161_record(&self) -> Option<&Rfc3161Record> {
        self.rfc3161_record.as_ref()
    }

    /// The hash the signature was issued for: the legacy record's input
    /// when present, otherwise the bottom chain's input.
    pub fn input_hash(&self) -> &DataHash {
        self.rfc3161_record
            .as_ref()
            .map_or(&self.first_chain().input_hash, |r| &r.input_hash)
    }

    /// Aggregation time of the bottom chain.
    pub fn aggregation_time(&self) -> DateTime<Utc> {
        self.first_chain().aggregation_time
    }

    /// Publication time of the calendar chain, if present.
    pub fn publication_time(&self) -> Option<DateTime<Utc>> {
        self.calendar_chain.as_ref().map(|c| c.publication_time)
    }

    /// Whether the signature carries a publication record.
    pub const fn is_extended(&self) -> bool {
        self.publication_record.is_some()
    }
}

fn require_implemented(algorithm: HashAlgorithm) -> Result<(), ChainError> {
    if algorithm.is_implemented() {
        Ok(())
    } else {
        Err(ChainError::NotImplemented(algorithm))
    }
}
