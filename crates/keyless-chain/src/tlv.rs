//! Canonical TLV encodings for the few structures whose bytes are hashed
//! or signed.
//!
//! Full TLV container decoding is handled elsewhere; this module only
//! writes the byte forms that enter digests: identity metadata (hashed as
//! a chain sibling) and publication data (signed by the calendar
//! authentication record).
//!
//! Element layout: a TLV8 header is one byte `flags | tag` followed by a
//! one-byte length. Tags above `0x1F` or values longer than 255 bytes use
//! the TLV16 header: two bytes `0x80 | flags | tag_hi`, `tag_lo`, then a
//! two-byte big-endian length. A value longer than 65535 bytes has no
//! encoding.

use crate::error::ChainError;
use crate::model::{IdentityMetadata, PublicationData};

/// Non-critical flag.
pub const FLAG_NON_CRITICAL: u8 = 0x40;
/// Forward-unknown flag.
pub const FLAG_FORWARD: u8 = 0x20;
const FLAG_TLV16: u8 = 0x80;

/// Tag of the identity metadata element.
pub const TAG_METADATA: u16 = 0x04;
/// Tag of the metadata padding child.
pub const TAG_METADATA_PADDING: u16 = 0x1E;
const TAG_CLIENT_ID: u16 = 0x01;
const TAG_MACHINE_ID: u16 = 0x02;
const TAG_SEQUENCE_NUMBER: u16 = 0x03;
const TAG_REQUEST_TIME: u16 = 0x04;

/// Tag of the publication data element.
pub const TAG_PUBLICATION_DATA: u16 = 0x10;
const TAG_PUBLICATION_TIME: u16 = 0x02;
const TAG_PUBLISHED_HASH: u16 = 0x04;

/// Byte value of every metadata padding octet.
pub const PADDING_OCTET: u8 = 0x01;

/// Minimal big-endian encoding of an unsigned integer. Zero encodes as no
/// bytes at all.
pub fn encode_unsigned(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let skip = bytes.iter().take_while(|&&b| b == 0).count();
    bytes[skip..].to_vec()
}

/// Append one element to `out`, choosing the TLV8 or TLV16 header.
///
/// Fails without touching `out` when the value does not fit a TLV16
/// length.
pub fn write_element(
    out: &mut Vec<u8>,
    flags: u8,
    tag: u16,
    value: &[u8],
) -> Result<(), ChainError> {
    match (u8::try_from(tag), u8::try_from(value.len())) {
        (Ok(short_tag), Ok(short_len)) if short_tag <= 0x1F => {
            out.push(flags | short_tag);
            out.push(short_len);
        }
        _ => {
            let len = u16::try_from(value.len()).map_err(|_| {
                ChainError::Encoding(format!(
                    "element 0x{tag:02x} value of {} bytes exceeds {}",
                    value.len(),
                    u16::MAX
                ))
            })?;
            let [tag_hi, tag_lo] = (tag & 0x1FFF).to_be_bytes();
            out.push(FLAG_TLV16 | flags | tag_hi);
            out.push(tag_lo);
            out.extend_from_slice(&len.to_be_bytes());
        }
    }
    out.extend_from_slice(value);
    Ok(())
}

fn utf8_with_nul(s: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(s.len() + 1);
    bytes.extend_from_slice(s.as_bytes());
    bytes.push(0);
    bytes
}

fn metadata_children(metadata: &IdentityMetadata) -> Result<Vec<u8>, ChainError> {
    let mut out = Vec::new();
    write_element(&mut out, 0, TAG_CLIENT_ID, &utf8_with_nul(&metadata.client_id))?;
    if let Some(machine_id) = &metadata.machine_id {
        write_element(&mut out, 0, TAG_MACHINE_ID, &utf8_with_nul(machine_id))?;
    }
    if let Some(sequence) = metadata.sequence_number {
        write_element(&mut out, 0, TAG_SEQUENCE_NUMBER, &encode_unsigned(sequence))?;
    }
    if let Some(request_time) = metadata.request_time {
        write_element(&mut out, 0, TAG_REQUEST_TIME, &encode_unsigned(request_time))?;
    }
    Ok(out)
}

/// Padding length (1 or 2) that makes the metadata content length even.
///
/// Metadata too large to encode gets 1; encoding it fails later anyway.
pub fn padding_len_for(metadata: &IdentityMetadata) -> u8 {
    // The padding element adds a two-byte header plus its value.
    match metadata_children(metadata) {
        Ok(children) if children.len() % 2 == 0 => 2,
        _ => 1,
    }
}

/// Content bytes of the metadata element: optional padding first, then the
/// identity fields. These bytes are what a metadata sibling contributes to
/// a chain step.
pub fn encode_metadata_content(metadata: &IdentityMetadata) -> Result<Vec<u8>, ChainError> {
    let mut out = Vec::new();
    if let Some(len) = metadata.padding {
        write_element(
            &mut out,
            FLAG_NON_CRITICAL | FLAG_FORWARD,
            TAG_METADATA_PADDING,
            &vec![PADDING_OCTET; usize::from(len)],
        )?;
    }
    out.extend_from_slice(&metadata_children(metadata)?);
    Ok(out)
}

/// The full metadata element, header included.
pub fn encode_metadata(metadata: &IdentityMetadata) -> Result<Vec<u8>, ChainError> {
    let mut out = Vec::new();
    write_element(&mut out, 0, TAG_METADATA, &encode_metadata_content(metadata)?)?;
    Ok(out)
}

/// Canonical encoding of publication data: the bytes an authentication
/// record signature covers. Times before the epoch have no encoding.
pub fn encode_publication_data(data: &PublicationData) -> Result<Vec<u8>, ChainError> {
    let secs = u64::try_from(data.publication_time.timestamp()).map_err(|_| {
        ChainError::Encoding(format!(
            "publication time {} precedes the epoch",
            data.publication_time
        ))
    })?;
    let mut content = Vec::new();
    write_element(&mut content, 0, TAG_PUBLICATION_TIME, &encode_unsigned(secs))?;
    write_element(&mut content, 0, TAG_PUBLISHED_HASH, &data.published_hash.imprint())?;

    let mut out = Vec::new();
    write_element(&mut out, 0, TAG_PUBLICATION_DATA, &content)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;

    use super::*;
    use crate::hashing::HashAlgorithm;

    #[test]
    fn unsigned_encoding_is_minimal() {
        assert!(encode_unsigned(0).is_empty());
        assert_eq!(encode_unsigned(1), vec![0x01]);
        assert_eq!(encode_unsigned(255), vec![0xFF]);
        assert_eq!(encode_unsigned(256), vec![0x01, 0x00]);
        assert_eq!(encode_unsigned(u64::MAX), vec![0xFF; 8]);
    }

    #[test]
    fn short_element_uses_tlv8() {
        let mut out = Vec::new();
        write_element(&mut out, FLAG_FORWARD, 0x05, &[0xAA, 0xBB]).expect("encode");
        assert_eq!(out, vec![0x25, 0x02, 0xAA, 0xBB]);
    }

    #[test]
    fn long_element_uses_tlv16() {
        let mut out = Vec::new();
        write_element(&mut out, 0, 0x0801, &[0x00; 3]).expect("encode");
        assert_eq!(&out[..4], &[0x88, 0x01, 0x00, 0x03]);

        let mut out = Vec::new();
        write_element(&mut out, 0, 0x01, &[0x00; 300]).expect("encode");
        assert_eq!(&out[..4], &[0x80, 0x01, 0x01, 0x2C]);
        assert_eq!(out.len(), 304);

        let mut out = Vec::new();
        write_element(&mut out, 0, 0x01, &[0x00; 0xFFFF]).expect("encode");
        assert_eq!(&out[..4], &[0x80, 0x01, 0xFF, 0xFF]);
    }

    #[test]
    fn value_beyond_tlv16_length_is_rejected() {
        let mut out = vec![0xAA];
        let err = write_element(&mut out, 0, 0x01, &[0x00; 0x1_0000]).unwrap_err();
        assert!(matches!(err, ChainError::Encoding(_)));
        assert_eq!(out, vec![0xAA]);
    }

    #[test]
    fn oversized_client_id_has_no_encoding() {
        let metadata = IdentityMetadata::new("a".repeat(70_000));
        assert!(matches!(
            encode_metadata_content(&metadata),
            Err(ChainError::Encoding(_))
        ));
        assert!(matches!(
            encode_metadata(&metadata),
            Err(ChainError::Encoding(_))
        ));
    }

    #[test]
    fn metadata_client_id_is_nul_terminated() {
        let metadata = IdentityMetadata::new("alice");
        assert_eq!(
            encode_metadata_content(&metadata).expect("encode"),
            vec![0x01, 0x06, b'a', b'l', b'i', b'c', b'e', 0x00]
        );
        assert_eq!(encode_metadata(&metadata).expect("encode")[..2], [0x04, 0x08]);
    }

    #[test]
    fn padding_makes_content_even() {
        for client in ["a", "ab", "abc", "abcd"] {
            let metadata = IdentityMetadata::new(client).with_padding();
            let content = encode_metadata_content(&metadata).expect("encode");
            assert_eq!(content.len() % 2, 0, "client `{client}`");
            assert_eq!(content[0], 0x7E);
        }
    }

    #[test]
    fn publication_data_encoding() {
        let hash = HashAlgorithm::Sha256.digest(b"pub").expect("sha256");
        let data = PublicationData {
            publication_time: DateTime::from_timestamp(0x0102, 0).expect("time"),
            published_hash: hash.clone(),
        };
        let encoded = encode_publication_data(&data).expect("encode");
        assert_eq!(encoded[0], 0x10);
        assert_eq!(usize::from(encoded[1]), encoded.len() - 2);
        assert_eq!(&encoded[2..6], &[0x02, 0x02, 0x01, 0x02]);
        assert_eq!(&encoded[6..8], &[0x04, 33]);
        assert_eq!(&encoded[8..], hash.imprint().as_slice());
    }

    #[test]
    fn publication_before_epoch_has_no_encoding() {
        let data = PublicationData {
            publication_time: DateTime::from_timestamp(-1, 0).expect("time"),
            published_hash: HashAlgorithm::Sha256.digest(b"pub").expect("sha256"),
        };
        let err = encode_publication_data(&data).unwrap_err();
        assert!(matches!(err, ChainError::Encoding(_)));
    }
}
