// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The HEF on-disk header.
//!
//! Every version starts with a 12-byte common prefix: the little-endian
//! magic, a little-endian version and a **big-endian** payload length.
//! The remainder is version specific:
//!
//! | version | size | after the prefix |
//! |---|---|---|
//! | 0, 1 | 32 | md5 of the payload at 12, reserved to 32 |
//! | 2 | 40 | reserved at 12, xxh3 at 16, ccws_size at 24, reserved at 32 |
//! | 3 | 56 | as v2, then ccws_size_with_padding at 32, padding_size at 40, reserved at 44, additional_info_size at 48 |
//!
//! The v2/v3 integrity hash covers the proto and CCWS regions together;
//! the v0/v1 digest covers the proto region alone.

use md5::{Digest, Md5};
use xxhash_rust::xxh3::xxh3_64;

use crate::result::{HailoResult, ValidationError};

/// The 4-byte file magic, "FEH\x01" read as a little-endian word.
pub const HEF_MAGIC: u32 = 0x0148_4546;

/// Size of the version-independent prefix.
const COMMON_PREFIX_SIZE: usize = 12;

/// Known header versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HefVersion {
    /// Original layout with an MD5 digest.
    V0,
    /// Same layout as V0.
    V1,
    /// XXH3 integrity hash and a trailing CCWS blob.
    V2,
    /// V2 plus padding and additional-info bookkeeping.
    V3,
}

impl HefVersion {
    fn from_u32(version: u32) -> Option<HefVersion> {
        match version {
            0 => Some(HefVersion::V0),
            1 => Some(HefVersion::V1),
            2 => Some(HefVersion::V2),
            3 => Some(HefVersion::V3),
            _ => None,
        }
    }

    fn as_u32(self) -> u32 {
        match self {
            HefVersion::V0 => 0,
            HefVersion::V1 => 1,
            HefVersion::V2 => 2,
            HefVersion::V3 => 3,
        }
    }

    /// On-disk header size for this version.
    pub fn header_size(self) -> usize {
        match self {
            HefVersion::V0 | HefVersion::V1 => 32,
            HefVersion::V2 => 40,
            HefVersion::V3 => 56,
        }
    }
}

/// The version-specific integrity fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HefDigest {
    /// v0/v1: MD5 over the proto region.
    Md5([u8; 16]),
    /// v2: XXH3-64 over proto + CCWS.
    Xxh3 {
        /// The declared hash.
        hash: u64,
        /// Bytes of CCWS data trailing the proto region.
        ccws_size: u64,
    },
    /// v3: XXH3-64 plus padding bookkeeping.
    Xxh3Extended {
        /// The declared hash.
        hash: u64,
        /// Bytes of CCWS data trailing the proto region.
        ccws_size: u64,
        /// CCWS size including its padding.
        ccws_size_with_padding: u64,
        /// Bytes of padding at the end of the file.
        padding_size: u32,
        /// Bytes of additional info trailing the CCWS blob.
        additional_info_size: u64,
    },
}

/// A parsed HEF header.
#[derive(Debug, Clone, PartialEq)]
pub struct HefHeader {
    /// The declared header version.
    pub version: HefVersion,
    /// Length of the embedded message.
    pub proto_length: u32,
    /// The version-specific integrity fields.
    pub digest: HefDigest,
}

fn read_u32_le(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

fn read_u32_be(bytes: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

fn read_u64_le(bytes: &[u8], offset: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_le_bytes(raw)
}

impl HefHeader {
    /// Size of this header on disk.
    pub fn header_size(&self) -> usize {
        self.version.header_size()
    }

    /// Bytes of CCWS data trailing the proto region.
    pub fn ccws_size(&self) -> u64 {
        match self.digest {
            HefDigest::Md5(_) => 0,
            HefDigest::Xxh3 { ccws_size, .. } => ccws_size,
            HefDigest::Xxh3Extended { ccws_size, .. } => ccws_size,
        }
    }

    /// Parse a header off the front of `bytes`.
    pub fn parse(bytes: &[u8]) -> HailoResult<HefHeader> {
        if bytes.len() < COMMON_PREFIX_SIZE {
            return Err(ValidationError::TruncatedHeader {
                needed: COMMON_PREFIX_SIZE,
                available: bytes.len(),
            }
            .into());
        }

        let magic = read_u32_le(bytes, 0);
        if magic != HEF_MAGIC {
            return Err(ValidationError::InvalidMagic { found: magic }.into());
        }

        let raw_version = read_u32_le(bytes, 4);
        let version = HefVersion::from_u32(raw_version)
            .ok_or(ValidationError::UnsupportedVersion(raw_version))?;

        let needed = version.header_size();
        if bytes.len() < needed {
            return Err(ValidationError::TruncatedHeader {
                needed,
                available: bytes.len(),
            }
            .into());
        }

        let proto_length = read_u32_be(bytes, 8);

        let digest = match version {
            HefVersion::V0 | HefVersion::V1 => {
                let mut md5 = [0u8; 16];
                md5.copy_from_slice(&bytes[12..28]);
                HefDigest::Md5(md5)
            }
            HefVersion::V2 => HefDigest::Xxh3 {
                hash: read_u64_le(bytes, 16),
                ccws_size: read_u64_le(bytes, 24),
            },
            HefVersion::V3 => HefDigest::Xxh3Extended {
                hash: read_u64_le(bytes, 16),
                ccws_size: read_u64_le(bytes, 24),
                ccws_size_with_padding: read_u64_le(bytes, 32),
                padding_size: read_u32_le(bytes, 40),
                additional_info_size: read_u64_le(bytes, 48),
            },
        };

        Ok(HefHeader {
            version,
            proto_length,
            digest,
        })
    }

    /// Re-emit the on-disk header bytes. Reserved regions are zero.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = vec![0u8; self.header_size()];
        out[0..4].copy_from_slice(&HEF_MAGIC.to_le_bytes());
        out[4..8].copy_from_slice(&self.version.as_u32().to_le_bytes());
        out[8..12].copy_from_slice(&self.proto_length.to_be_bytes());
        match &self.digest {
            HefDigest::Md5(md5) => out[12..28].copy_from_slice(md5),
            HefDigest::Xxh3 { hash, ccws_size } => {
                out[16..24].copy_from_slice(&hash.to_le_bytes());
                out[24..32].copy_from_slice(&ccws_size.to_le_bytes());
            }
            HefDigest::Xxh3Extended {
                hash,
                ccws_size,
                ccws_size_with_padding,
                padding_size,
                additional_info_size,
            } => {
                out[16..24].copy_from_slice(&hash.to_le_bytes());
                out[24..32].copy_from_slice(&ccws_size.to_le_bytes());
                out[32..40].copy_from_slice(&ccws_size_with_padding.to_le_bytes());
                out[40..44].copy_from_slice(&padding_size.to_le_bytes());
                out[48..56].copy_from_slice(&additional_info_size.to_le_bytes());
            }
        }
        out
    }

    /// Check the declared lengths against the file and recompute the
    /// integrity hash over the version-defined region.
    pub fn verify_integrity(&self, file: &[u8]) -> HailoResult<()> {
        let header_size = self.header_size();
        let proto_end = header_size + self.proto_length as usize;
        let covered_end = proto_end + self.ccws_size() as usize;
        if file.len() < covered_end {
            return Err(ValidationError::TruncatedPayload {
                needed: covered_end,
                available: file.len(),
            }
            .into());
        }

        match &self.digest {
            HefDigest::Md5(declared) => {
                let digest: [u8; 16] = Md5::digest(&file[header_size..proto_end]).into();
                if digest != *declared {
                    return Err(ValidationError::DigestMismatch.into());
                }
            }
            HefDigest::Xxh3 { hash, .. } | HefDigest::Xxh3Extended { hash, .. } => {
                if xxh3_64(&file[header_size..covered_end]) != *hash {
                    return Err(ValidationError::DigestMismatch.into());
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::result::HailoError;

    fn v2_file(proto: &[u8], ccws: &[u8]) -> Vec<u8> {
        let mut covered = proto.to_vec();
        covered.extend_from_slice(ccws);
        let header = HefHeader {
            version: HefVersion::V2,
            proto_length: proto.len() as u32,
            digest: HefDigest::Xxh3 {
                hash: xxh3_64(&covered),
                ccws_size: ccws.len() as u64,
            },
        };
        let mut file = header.serialize();
        file.extend_from_slice(&covered);
        file
    }

    #[test]
    fn v2_header_with_valid_hash_parses() {
        // Version 2, a zero-filled 100-byte proto, no CCWS.
        let file = v2_file(&[0u8; 100], &[]);
        assert_eq!(file[0..4], [0x46, 0x45, 0x48, 0x01]);
        assert_eq!(file[4..8], [0x02, 0x00, 0x00, 0x00]);

        let header = HefHeader::parse(&file).unwrap();
        assert_eq!(header.version, HefVersion::V2);
        assert_eq!(header.proto_length, 100);
        assert_eq!(header.header_size(), 40);
        header.verify_integrity(&file).unwrap();
    }

    #[test]
    fn headers_round_trip_for_every_version() {
        let headers = [
            HefHeader {
                version: HefVersion::V0,
                proto_length: 7,
                digest: HefDigest::Md5([0xab; 16]),
            },
            HefHeader {
                version: HefVersion::V1,
                proto_length: 0x0102_0304,
                digest: HefDigest::Md5([0x11; 16]),
            },
            HefHeader {
                version: HefVersion::V2,
                proto_length: 100,
                digest: HefDigest::Xxh3 {
                    hash: 0xdead_beef_cafe_f00d,
                    ccws_size: 4096,
                },
            },
            HefHeader {
                version: HefVersion::V3,
                proto_length: 12,
                digest: HefDigest::Xxh3Extended {
                    hash: 1,
                    ccws_size: 2,
                    ccws_size_with_padding: 8,
                    padding_size: 6,
                    additional_info_size: 0,
                },
            },
        ];
        for header in headers {
            let bytes = header.serialize();
            assert_eq!(bytes.len(), header.header_size());
            let reparsed = HefHeader::parse(&bytes).unwrap();
            assert_eq!(reparsed, header);
            assert_eq!(reparsed.serialize(), bytes);
        }
    }

    #[test]
    fn proto_length_is_big_endian_on_disk() {
        let header = HefHeader {
            version: HefVersion::V2,
            proto_length: 100,
            digest: HefDigest::Xxh3 {
                hash: 0,
                ccws_size: 0,
            },
        };
        assert_eq!(header.serialize()[8..12], [0x00, 0x00, 0x00, 0x64]);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut file = v2_file(&[0u8; 16], &[]);
        file[0] = 0x47;
        assert_matches!(
            HefHeader::parse(&file),
            Err(HailoError::Validation(ValidationError::InvalidMagic { .. }))
        );
    }

    #[test]
    fn unknown_versions_are_rejected() {
        let mut file = v2_file(&[0u8; 16], &[]);
        file[4] = 9;
        assert_matches!(
            HefHeader::parse(&file),
            Err(HailoError::Validation(ValidationError::UnsupportedVersion(
                9
            )))
        );
    }

    #[test]
    fn short_input_is_rejected_as_truncated() {
        let file = v2_file(&[0u8; 16], &[]);
        assert_matches!(
            HefHeader::parse(&file[..10]),
            Err(HailoError::Validation(
                ValidationError::TruncatedHeader { .. }
            ))
        );
        assert_matches!(
            HefHeader::parse(&file[..20]),
            Err(HailoError::Validation(ValidationError::TruncatedHeader {
                needed: 40,
                ..
            }))
        );
    }

    #[test]
    fn payload_shorter_than_declared_is_rejected() {
        let file = v2_file(&[0u8; 100], &[]);
        let header = HefHeader::parse(&file).unwrap();
        assert_matches!(
            header.verify_integrity(&file[..file.len() - 1]),
            Err(HailoError::Validation(
                ValidationError::TruncatedPayload { .. }
            ))
        );
    }

    #[test]
    fn corrupted_payload_fails_the_hash_check() {
        let mut file = v2_file(&[0u8; 100], b"ccws");
        let header = HefHeader::parse(&file).unwrap();
        header.verify_integrity(&file).unwrap();
        let last = file.len() - 1;
        file[last] ^= 0xff;
        assert_matches!(
            header.verify_integrity(&file),
            Err(HailoError::Validation(ValidationError::DigestMismatch))
        );
    }

    #[test]
    fn md5_digest_covers_the_proto_region() {
        let proto = b"sixteen byte msg";
        let header = HefHeader {
            version: HefVersion::V0,
            proto_length: proto.len() as u32,
            digest: HefDigest::Md5(Md5::digest(proto).into()),
        };
        let mut file = header.serialize();
        file.extend_from_slice(proto);
        header.verify_integrity(&file).unwrap();

        file[40] ^= 0x01;
        assert_matches!(
            header.verify_integrity(&file),
            Err(HailoError::Validation(ValidationError::DigestMismatch))
        );
    }
}
