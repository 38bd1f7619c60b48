//! Certificates that authenticate calendar roots.
//!
//! A calendar authentication record carries a PKI signature over the
//! canonical encoding of its publication data. [`Certificate`] is the seam
//! to whatever trust store the caller uses; [`EcdsaCertificate`] is an
//! ECDSA P-256 implementation backed by `aws-lc-rs`.

use std::fmt;

use aws_lc_rs::signature::{self, ECDSA_P256_SHA256_ASN1};
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::VerificationError;

/// OID of ECDSA with SHA-256.
pub const ECDSA_WITH_SHA256_OID: &str = "1.2.840.10045.4.3.2";

/// The fixed size of the SPKI ASN.1 header for P-256 keys.
const P256_SPKI_HEADER_LEN: usize = 26;

/// A certificate able to check calendar authentication record signatures.
pub trait Certificate: Send + Sync + fmt::Debug {
    /// Identifier matched against the record's certificate id.
    fn id(&self) -> &[u8];

    /// Start of the validity window.
    fn not_before(&self) -> DateTime<Utc>;

    /// End of the validity window.
    fn not_after(&self) -> DateTime<Utc>;

    /// Whether `signature` is a valid `signature_type` signature over
    /// `data` by this certificate's key.
    fn verify_signature(&self, signature_type: &str, data: &[u8], signature: &[u8]) -> bool;

    /// Whether `at` falls inside the validity window.
    fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        self.not_before() <= at && at <= self.not_after()
    }
}

/// An ECDSA P-256 certificate.
#[derive(Clone)]
pub struct EcdsaCertificate {
    id: Vec<u8>,
    public_point: Vec<u8>,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
}

impl fmt::Debug for EcdsaCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EcdsaCertificate")
            .field("id", &hex::encode(&self.id))
            .field("not_before", &self.not_before)
            .field("not_after", &self.not_after)
            .finish_non_exhaustive()
    }
}

/// Serialized certificate entry, as found in a publications file.
#[derive(Debug, Deserialize)]
pub struct CertificateEntry {
    /// Hex certificate id.
    #[serde(with = "hex::serde")]
    pub id: Vec<u8>,
    /// PEM-encoded SPKI public key.
    pub public_key: String,
    /// Start of the validity window.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub not_before: DateTime<Utc>,
    /// End of the validity window.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub not_after: DateTime<Utc>,
}

impl EcdsaCertificate {
    /// Build a certificate from a PEM-encoded SPKI public key.
    pub fn from_pem(
        id: Vec<u8>,
        public_key_pem: &str,
        not_before: DateTime<Utc>,
        not_after: DateTime<Utc>,
    ) -> Result<Self, VerificationError> {
        let spki_der = pem_to_der(public_key_pem).ok_or_else(|| {
            VerificationError::InvalidCertificate("invalid PEM public key".to_owned())
        })?;

        // Strip the 26-byte SPKI header to get the raw EC point
        if spki_der.len() <= P256_SPKI_HEADER_LEN {
            return Err(VerificationError::InvalidCertificate(
                "public key DER too short for SPKI".to_owned(),
            ));
        }
        if not_after < not_before {
            return Err(VerificationError::InvalidCertificate(
                "validity window ends before it starts".to_owned(),
            ));
        }
        Ok(Self {
            id,
            public_point: spki_der[P256_SPKI_HEADER_LEN..].to_vec(),
            not_before,
            not_after,
        })
    }
}

impl TryFrom<CertificateEntry> for EcdsaCertificate {
    type Error = VerificationError;

    fn try_from(entry: CertificateEntry) -> Result<Self, Self::Error> {
        Self::from_pem(entry.id, &entry.public_key, entry.not_before, entry.not_after)
    }
}

impl Certificate for EcdsaCertificate {
    fn id(&self) -> &[u8] {
        &self.id
    }

    fn not_before(&self) -> DateTime<Utc> {
        self.not_before
    }

    fn not_after(&self) -> DateTime<Utc> {
        self.not_after
    }

    fn verify_signature(&self, signature_type: &str, data: &[u8], sig: &[u8]) -> bool {
        if signature_type != ECDSA_WITH_SHA256_OID {
            tracing::debug!(signature_type, "unsupported authentication signature type");
            return false;
        }
        signature::UnparsedPublicKey::new(&ECDSA_P256_SHA256_ASN1, &self.public_point)
            .verify(data, sig)
            .is_ok()
    }
}

// ── PEM helpers ──────────────────────────────────────────────────────

/// Extract DER bytes from a PEM string.
pub fn pem_to_der(pem: &str) -> Option<Vec<u8>> {
    let mut b64 = String::new();
    let mut in_body = false;

    for line in pem.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("-----BEGIN ") {
            in_body = true;
            continue;
        }
        if trimmed.starts_with("-----END ") {
            break;
        }
        if in_body {
            b64.push_str(trimmed);
        }
    }

    base64::engine::general_purpose::STANDARD.decode(&b64).ok()
}

/// Encode a raw P-256 public key (uncompressed point, 65 bytes) as
/// `SubjectPublicKeyInfo` (SPKI) DER.
pub fn encode_p256_spki(pub_key: &[u8]) -> Vec<u8> {
    // Fixed SPKI header for P-256 uncompressed public key
    #[rustfmt::skip]
    const SPKI_HEADER: [u8; P256_SPKI_HEADER_LEN] = [
        0x30, 0x59,                                     // SEQUENCE (89 bytes total)
        0x30, 0x13,                                     // SEQUENCE (19 bytes)
        0x06, 0x07,                                     // OID (7 bytes)
        0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01,       // 1.2.840.10045.2.1
        0x06, 0x08,                                     // OID (8 bytes)
        0x2a, 0x86, 0x48, 0xce, 0x3d, 0x03, 0x01, 0x07, // 1.2.840.10045.3.1.7
        0x03, 0x42, 0x00,                               // BIT STRING (66 bytes, 0 unused bits)
    ];

    let mut spki = Vec::with_capacity(SPKI_HEADER.len() + pub_key.len());
    spki.extend_from_slice(&SPKI_HEADER);
    spki.extend_from_slice(pub_key);
    spki
}

#[cfg(test)]
pub(crate) mod tests {
    use aws_lc_rs::rand::SystemRandom;
    use aws_lc_rs::signature::{ECDSA_P256_SHA256_ASN1_SIGNING, EcdsaKeyPair, KeyPair};

    use super::*;

    /// Wrap DER bytes in PEM with the given label.
    pub(crate) fn der_to_pem(der: &[u8], label: &str) -> String {
        let b64 = base64::engine::general_purpose::STANDARD.encode(der);
        let mut pem = format!("-----BEGIN {label}-----\n");
        for line in b64.as_bytes().chunks(64).map(String::from_utf8_lossy) {
            pem.push_str(&line);
            pem.push('\n');
        }
        pem.push_str(&format!("-----END {label}-----\n"));
        pem
    }

    pub(crate) fn generate_test_keypair() -> (EcdsaKeyPair, String) {
        let rng = SystemRandom::new();
        let pkcs8 =
            EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, &rng).expect("keygen");
        let key_pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, pkcs8.as_ref())
            .expect("parse key");
        let pub_pem = der_to_pem(
            &encode_p256_spki(key_pair.public_key().as_ref()),
            "PUBLIC KEY",
        );
        (key_pair, pub_pem)
    }

    pub(crate) fn sign(key_pair: &EcdsaKeyPair, data: &[u8]) -> Vec<u8> {
        let rng = SystemRandom::new();
        key_pair.sign(&rng, data).expect("sign").as_ref().to_vec()
    }

    fn time(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).expect("valid time")
    }

    #[test]
    fn sign_then_verify() {
        let (key_pair, pem) = generate_test_keypair();
        let cert = EcdsaCertificate::from_pem(vec![1], &pem, time(0), time(100)).expect("cert");
        let sig = sign(&key_pair, b"publication");
        assert!(cert.verify_signature(ECDSA_WITH_SHA256_OID, b"publication", &sig));
        assert!(!cert.verify_signature(ECDSA_WITH_SHA256_OID, b"tampered", &sig));
    }

    #[test]
    fn wrong_key_fails() {
        let (key_pair, _) = generate_test_keypair();
        let (_, other_pem) = generate_test_keypair();
        let cert = EcdsaCertificate::from_pem(vec![1], &other_pem, time(0), time(100)).expect("cert");
        let sig = sign(&key_pair, b"publication");
        assert!(!cert.verify_signature(ECDSA_WITH_SHA256_OID, b"publication", &sig));
    }

    #[test]
    fn unsupported_signature_type_fails() {
        let (key_pair, pem) = generate_test_keypair();
        let cert = EcdsaCertificate::from_pem(vec![1], &pem, time(0), time(100)).expect("cert");
        let sig = sign(&key_pair, b"publication");
        assert!(!cert.verify_signature("1.2.840.113549.1.1.11", b"publication", &sig));
    }

    #[test]
    fn validity_window_is_inclusive() {
        let (_, pem) = generate_test_keypair();
        let cert = EcdsaCertificate::from_pem(vec![1], &pem, time(10), time(20)).expect("cert");
        assert!(!cert.is_valid_at(time(9)));
        assert!(cert.is_valid_at(time(10)));
        assert!(cert.is_valid_at(time(20)));
        assert!(!cert.is_valid_at(time(21)));
    }

    #[test]
    fn garbage_pem_is_rejected() {
        let err = EcdsaCertificate::from_pem(vec![1], "not a key", time(0), time(1)).unwrap_err();
        assert!(matches!(err, VerificationError::InvalidCertificate(_)));
    }

    #[test]
    fn pem_round_trip() {
        let der = vec![0x30, 0x03, 0x02, 0x01, 0x05];
        let pem = der_to_pem(&der, "TEST");
        assert!(pem.starts_with("-----BEGIN TEST-----\n"));
        assert_eq!(pem_to_der(&pem).expect("decode"), der);
    }
}
