//! Wire-stable verification error codes.

use std::fmt;

use serde::{Serialize, Serializer};

/// Error code attached to a non-OK rule result.
///
/// Families: `GEN` (document level), `INT` (internal consistency), `PUB`
/// (publication based), `KEY` (PKI based), `CAL` (calendar database based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Wrong document.
    Gen01,
    /// Verification inconclusive.
    Gen02,
    /// Input hash level too large.
    Gen03,
    /// Wrong input hash algorithm.
    Gen04,
    /// Inconsistent aggregation hash chains.
    Int01,
    /// Inconsistent aggregation hash chain aggregation times.
    Int02,
    /// Calendar hash chain input hash mismatch.
    Int03,
    /// Calendar hash chain aggregation time mismatch.
    Int04,
    /// Calendar hash chain shape inconsistent with aggregation time.
    Int05,
    /// Calendar hash chain time inconsistent with calendar authentication
    /// record time.
    Int06,
    /// Calendar hash chain time inconsistent with publication time.
    Int07,
    /// Calendar hash chain root hash inconsistent with calendar
    /// authentication record input hash.
    Int08,
    /// Calendar hash chain root hash inconsistent with published hash.
    Int09,
    /// Aggregation hash chain index mismatch.
    Int10,
    /// The metadata record in the aggregation hash chain may not be trusted.
    Int11,
    /// Inconsistent chain indexes.
    Int12,
    /// Document hash algorithm deprecated at the time of signing.
    Int13,
    /// RFC 3161 compatibility record composed of hash algorithms that were
    /// deprecated at the time of signing.
    Int14,
    /// Aggregation hash chain uses a hash algorithm that was deprecated at
    /// the time of signing.
    Int15,
    /// Calendar hash chain contains obsolete hash algorithm.
    Int16,
    /// RFC 3161 record output hash algorithm deprecated at the time of
    /// signing.
    Int17,
    /// Extender response calendar root hash mismatch.
    Pub01,
    /// Extender response inconsistent.
    Pub02,
    /// Extender response input hash mismatch.
    Pub03,
    /// Publication record hash and user provided publication hash mismatch.
    Pub04,
    /// Publication record hash and publications file publication hash
    /// mismatch.
    Pub05,
    /// Certificate not found.
    Key01,
    /// PKI signature not verified with certificate.
    Key02,
    /// Signing certificate not valid at aggregation time.
    Key03,
    /// Calendar hash chain root hash does not match calendar database
    /// chain root hash.
    Cal01,
    /// Aggregation hash chain root hash and calendar database hash chain
    /// input hash mismatch.
    Cal02,
    /// Aggregation time mismatch.
    Cal03,
}

impl ErrorCode {
    /// The stable code string, e.g. `INT-01`.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gen01 => "GEN-01",
            Self::Gen02 => "GEN-02",
            Self::Gen03 => "GEN-03",
            Self::Gen04 => "GEN-04",
            Self::Int01 => "INT-01",
            Self::Int02 => "INT-02",
            Self::Int03 => "INT-03",
            Self::Int04 => "INT-04",
            Self::Int05 => "INT-05",
            Self::Int06 => "INT-06",
            Self::Int07 => "INT-07",
            Self::Int08 => "INT-08",
            Self::Int09 => "INT-09",
            Self::Int10 => "INT-10",
            Self::Int11 => "INT-11",
            Self::Int12 => "INT-12",
            Self::Int13 => "INT-13",
            Self::Int14 => "INT-14",
            Self::Int15 => "INT-15",
            Self::Int16 => "INT-16",
            Self::Int17 => "INT-17",
            Self::Pub01 => "PUB-01",
            Self::Pub02 => "PUB-02",
            Self::Pub03 => "PUB-03",
            Self::Pub04 => "PUB-04",
            Self::Pub05 => "PUB-05",
            Self::Key01 => "KEY-01",
            Self::Key02 => "KEY-02",
            Self::Key03 => "KEY-03",
            Self::Cal01 => "CAL-01",
            Self::Cal02 => "CAL-02",
            Self::Cal03 => "CAL-03",
        }
    }

    /// Short human-readable description.
    pub const fn message(self) -> &'static str {
        match self {
            Self::Gen01 => "Wrong document",
            Self::Gen02 => "Verification inconclusive",
            Self::Gen03 => "Input hash level too large",
            Self::Gen04 => "Wrong input hash algorithm",
            Self::Int01 => "Inconsistent aggregation hash chains",
            Self::Int02 => "Inconsistent aggregation hash chain aggregation times",
            Self::Int03 => "Calendar hash chain input hash mismatch",
            Self::Int04 => "Calendar hash chain aggregation time mismatch",
            Self::Int05 => "Calendar hash chain shape inconsistent with aggregation time",
            Self::Int06 => {
                "Calendar hash chain time inconsistent with calendar authentication record time"
            }
            Self::Int07 => "Calendar hash chain time inconsistent with publication time",
            Self::Int08 => {
                "Calendar hash chain root hash is inconsistent with calendar authentication record input hash"
            }
            Self::Int09 => "Calendar hash chain root hash is inconsistent with published hash value",
            Self::Int10 => "Aggregation hash chain index mismatch",
            Self::Int11 => "The metadata record in the aggregation hash chain may not be trusted",
            Self::Int12 => "Inconsistent chain indexes",
            Self::Int13 => "Document hash algorithm deprecated at the time of signing",
            Self::Int14 => {
                "RFC3161 compatibility record composed of hash algorithms that were deprecated at the time of signing"
            }
            Self::Int15 => {
                "Aggregation hash chain uses hash algorithm that was deprecated at the time of signing"
            }
            Self::Int16 => "Calendar hash chain contains obsolete hash algorithm",
            Self::Int17 => {
                "RFC3161 compatibility record output hash algorithm was deprecated at the time of signing"
            }
            Self::Pub01 => "Extender response calendar root hash mismatch",
            Self::Pub02 => "Extender response inconsistent",
            Self::Pub03 => "Extender response input hash mismatch",
            Self::Pub04 => "Publication record hash and user provided publication hash mismatch",
            Self::Pub05 => {
                "Publication record hash and publications file publication hash mismatch"
            }
            Self::Key01 => "Certificate not found",
            Self::Key02 => "PKI signature not verified with certificate",
            Self::Key03 => "Signing certificate not valid at aggregation time",
            Self::Cal01 => {
                "Calendar hash chain root hash does not match with calendar database chain root hash"
            }
            Self::Cal02 => {
                "Aggregation hash chain root hash and calendar database hash chain input hash mismatch"
            }
            Self::Cal03 => "Aggregation time mismatch",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
