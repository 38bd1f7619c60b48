//! Hash algorithms, imprints, and incremental hashing.
//!
//! Every hash that travels through a chain is an *imprint*: a one-byte
//! algorithm id followed by the digest. [`HashAlgorithm`] is a static
//! registry carrying each algorithm's id, digest length, and lifecycle
//! (deprecated/obsolete dates). [`DataHasher`] dispatches to the `sha1`,
//! `sha2`, and `ripemd` implementations.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::Digest as _;

use crate::error::ChainError;

/// SHA-1 is deprecated from 2016-07-01T00:00:00Z.
const SHA1_DEPRECATED_SINCE: i64 = 1_467_331_200;
/// SHA-1 is obsolete from 2018-07-01T00:00:00Z.
const SHA1_OBSOLETE_SINCE: i64 = 1_530_403_200;

/// A registered hash algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashAlgorithm {
    /// SHA-1, id `0x00`.
    #[serde(rename = "SHA-1")]
    Sha1,
    /// SHA-256, id `0x01`. The default algorithm.
    #[serde(rename = "SHA-256")]
    Sha256,
    /// RIPEMD-160, id `0x02`.
    #[serde(rename = "RIPEMD-160")]
    Ripemd160,
    /// SHA-224, id `0x03`.
    #[serde(rename = "SHA-224")]
    Sha224,
    /// SHA-384, id `0x04`.
    #[serde(rename = "SHA-384")]
    Sha384,
    /// SHA-512, id `0x05`.
    #[serde(rename = "SHA-512")]
    Sha512,
    /// SHA3-224, id `0x07`. Registered but not implemented.
    #[serde(rename = "SHA3-224")]
    Sha3_224,
    /// SHA3-256, id `0x08`. Registered but not implemented.
    #[serde(rename = "SHA3-256")]
    Sha3_256,
    /// SHA3-384, id `0x09`. Registered but not implemented.
    #[serde(rename = "SHA3-384")]
    Sha3_384,
    /// SHA3-512, id `0x0A`. Registered but not implemented.
    #[serde(rename = "SHA3-512")]
    Sha3_512,
    /// SM3, id `0x0B`. Registered but not implemented.
    #[serde(rename = "SM3")]
    Sm3,
}

impl HashAlgorithm {
    /// All registered algorithms, in id order.
    pub const ALL: [Self; 11] = [
        Self::Sha1,
        Self::Sha256,
        Self::Ripemd160,
        Self::Sha224,
        Self::Sha384,
        Self::Sha512,
        Self::Sha3_224,
        Self::Sha3_256,
        Self::Sha3_384,
        Self::Sha3_512,
        Self::Sm3,
    ];

    /// One-byte id used as the first byte of an imprint.
    pub const fn id(self) -> u8 {
        match self {
            Self::Sha1 => 0x00,
            Self::Sha256 => 0x01,
            Self::Ripemd160 => 0x02,
            Self::Sha224 => 0x03,
            Self::Sha384 => 0x04,
            Self::Sha512 => 0x05,
            Self::Sha3_224 => 0x07,
            Self::Sha3_256 => 0x08,
            Self::Sha3_384 => 0x09,
            Self::Sha3_512 => 0x0A,
            Self::Sm3 => 0x0B,
        }
    }

    /// Look an algorithm up by its imprint id.
    pub fn from_id(id: u8) -> Result<Self, ChainError> {
        Self::ALL
            .into_iter()
            .find(|a| a.id() == id)
            .ok_or(ChainError::UnknownAlgorithm(id))
    }

    /// Length of the digest this algorithm produces, in bytes.
    pub const fn digest_len(self) -> usize {
        match self {
            Self::Sha1 | Self::Ripemd160 => 20,
            Self::Sha256 | Self::Sha3_256 | Self::Sm3 => 32,
            Self::Sha224 | Self::Sha3_224 => 28,
            Self::Sha384 | Self::Sha3_384 => 48,
            Self::Sha512 | Self::Sha3_512 => 64,
        }
    }

    /// Human-readable name, as used in serialized documents.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sha1 => "SHA-1",
            Self::Sha256 => "SHA-256",
            Self::Ripemd160 => "RIPEMD-160",
            Self::Sha224 => "SHA-224",
            Self::Sha384 => "SHA-384",
            Self::Sha512 => "SHA-512",
            Self::Sha3_224 => "SHA3-224",
            Self::Sha3_256 => "SHA3-256",
            Self::Sha3_384 => "SHA3-384",
            Self::Sha3_512 => "SHA3-512",
            Self::Sm3 => "SM3",
        }
    }

    /// Whether this crate can compute digests with the algorithm.
    pub const fn is_implemented(self) -> bool {
        matches!(
            self,
            Self::Sha1
                | Self::Sha256
                | Self::Ripemd160
                | Self::Sha224
                | Self::Sha384
                | Self::Sha512
        )
    }

    /// Moment from which the algorithm must not be used for new input hashes.
    pub fn deprecated_since(self) -> Option<DateTime<Utc>> {
        match self {
            Self::Sha1 => DateTime::from_timestamp(SHA1_DEPRECATED_SINCE, 0),
            _ => None,
        }
    }

    /// Moment from which the algorithm is not trusted at all.
    pub fn obsolete_since(self) -> Option<DateTime<Utc>> {
        match self {
            Self::Sha1 => DateTime::from_timestamp(SHA1_OBSOLETE_SINCE, 0),
            _ => None,
        }
    }

    /// Whether the algorithm was deprecated at `at`.
    pub fn is_deprecated(self, at: DateTime<Utc>) -> bool {
        self.deprecated_since().is_some_and(|since| since <= at)
    }

    /// Whether the algorithm was obsolete at `at`.
    pub fn is_obsolete(self, at: DateTime<Utc>) -> bool {
        self.obsolete_since().is_some_and(|since| since <= at)
    }

    /// Hash `data` in one shot.
    pub fn digest(self, data: &[u8]) -> Result<DataHash, ChainError> {
        let mut hasher = DataHasher::new(self)?;
        hasher.update(data);
        Ok(hasher.finish())
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.to_ascii_uppercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|a| a.name() == wanted || a.name().replace('-', "") == wanted)
            .ok_or_else(|| ChainError::InvalidImprint(format!("unknown hash algorithm name `{s}`")))
    }
}

/// A digest tagged with the algorithm that produced it.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct DataHash {
    algorithm: HashAlgorithm,
    digest: Vec<u8>,
}

impl DataHash {
    /// Wrap a digest, checking its length against the algorithm.
    pub fn new(algorithm: HashAlgorithm, digest: Vec<u8>) -> Result<Self, ChainError> {
        if digest.len() != algorithm.digest_len() {
            return Err(ChainError::DigestLength {
                algorithm,
                expected: algorithm.digest_len(),
                actual: digest.len(),
            });
        }
        Ok(Self { algorithm, digest })
    }

    /// Decode an imprint (algorithm id byte followed by the digest).
    pub fn from_imprint(imprint: &[u8]) -> Result<Self, ChainError> {
        let Some((&id, digest)) = imprint.split_first() else {
            return Err(ChainError::InvalidImprint("empty imprint".to_owned()));
        };
        Self::new(HashAlgorithm::from_id(id)?, digest.to_vec())
    }

    /// The algorithm that produced this hash.
    pub const fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// The raw digest bytes, without the algorithm id.
    pub fn digest(&self) -> &[u8] {
        &self.digest
    }

    /// The imprint: algorithm id byte followed by the digest.
    pub fn imprint(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + self.digest.len());
        out.push(self.algorithm.id());
        out.extend_from_slice(&self.digest);
        out
    }

    /// Hex encoding of the imprint.
    pub fn to_hex(&self) -> String {
        hex::encode(self.imprint())
    }
}

impl fmt::Debug for DataHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DataHash({}:{})", self.algorithm, hex::encode(&self.digest))
    }
}

impl fmt::Display for DataHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for DataHash {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s.trim())
            .map_err(|e| ChainError::InvalidImprint(format!("invalid hex imprint: {e}")))?;
        Self::from_imprint(&bytes)
    }
}

impl Serialize for DataHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for DataHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

enum HasherState {
    Sha1(sha1::Sha1),
    Sha224(sha2::Sha224),
    Sha256(sha2::Sha256),
    Sha384(sha2::Sha384),
    Sha512(sha2::Sha512),
    Ripemd160(ripemd::Ripemd160),
}

/// Incremental hasher producing a [`DataHash`].
pub struct DataHasher {
    algorithm: HashAlgorithm,
    state: HasherState,
}

impl DataHasher {
    /// Start hashing with `algorithm`.
    pub fn new(algorithm: HashAlgorithm) -> Result<Self, ChainError> {
        let state = match algorithm {
            HashAlgorithm::Sha1 => HasherState::Sha1(sha1::Sha1::new()),
            HashAlgorithm::Sha224 => HasherState::Sha224(sha2::Sha224::new()),
            HashAlgorithm::Sha256 => HasherState::Sha256(sha2::Sha256::new()),
            HashAlgorithm::Sha384 => HasherState::Sha384(sha2::Sha384::new()),
            HashAlgorithm::Sha512 => HasherState::Sha512(sha2::Sha512::new()),
            HashAlgorithm::Ripemd160 => HasherState::Ripemd160(ripemd::Ripemd160::new()),
            other => return Err(ChainError::NotImplemented(other)),
        };
        Ok(Self { algorithm, state })
    }

    /// Feed raw bytes.
    pub fn update(&mut self, data: &[u8]) -> &mut Self {
        match &mut self.state {
            HasherState::Sha1(h) => h.update(data),
            HasherState::Sha224(h) => h.update(data),
            HasherState::Sha256(h) => h.update(data),
            HasherState::Sha384(h) => h.update(data),
            HasherState::Sha512(h) => h.update(data),
            HasherState::Ripemd160(h) => h.update(data),
        }
        self
    }

    /// Feed the imprint of `hash` (algorithm id followed by digest).
    pub fn add_imprint(&mut self, hash: &DataHash) -> &mut Self {
        self.update(&[hash.algorithm.id()]);
        self.update(&hash.digest)
    }

    /// Finish and return the hash.
    pub fn finish(self) -> DataHash {
        let digest = match self.state {
            HasherState::Sha1(h) => h.finalize().to_vec(),
            HasherState::Sha224(h) => h.finalize().to_vec(),
            HasherState::Sha256(h) => h.finalize().to_vec(),
            HasherState::Sha384(h) => h.finalize().to_vec(),
            HasherState::Sha512(h) => h.finalize().to_vec(),
            HasherState::Ripemd160(h) => h.finalize().to_vec(),
        };
        DataHash {
            algorithm: self.algorithm,
            digest,
        }
    }
}
