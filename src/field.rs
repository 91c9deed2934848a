//! Typed record fields.
//!
//! `FieldType` is the "kind" half (used for the sparse-field sets in
//! `store.rs`); `FieldValue` is the payload half; `Field` pairs them.
//! Unknown ids decode losslessly into `FieldType::Opaque(id)` /
//! `FieldValue::Bytes`, preserving the original id exactly so round-tripping
//! an unrecognized field stays lossless.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Error, Result};
use crate::version::PwsafeVersion;

/// The "kind" of a field: its catalog identity for a given format version,
/// independent of payload. Implements `Eq`/`Hash` so it can live in the
/// sparse-field `HashSet` used by [`crate::store::FieldSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// V1's unstructured id-0 field; no fixed semantics beyond "present".
    Default,
    /// V3's id-0 field, distinct from V1's `Default`.
    V3IdString,
    Uuid,
    Group,
    Title,
    Username,
    Notes,
    Password,
    CreationTime,
    PasswordModTime,
    LastAccessTime,
    PasswordLifetime,
    PasswordPolicy,
    /// V3's retained-but-deprecated policy slot at id 11 (V2's `PasswordPolicy` id).
    PasswordPolicyDeprecated,
    LastModTime,
    Url,
    Autotype,
    PasswordHistory,
    PasswordExpiryInterval,
    EndOfRecord,
    /// An id this version's catalog does not define; the id is preserved verbatim.
    Opaque(u8),
}

impl FieldType {
    /// Maps a raw wire id to its catalog meaning for `version`
    pub fn from_id(version: PwsafeVersion, id: u8) -> FieldType {
        use PwsafeVersion::*;
        match (version, id) {
            (V1, 0) => FieldType::Default,
            (V1, 3) => FieldType::Title,
            (V1, 4) => FieldType::Username,
            (V1, 5) => FieldType::Notes,
            (V1, 6) => FieldType::Password,

            (V2, 0) => FieldType::Default,
            (V2, 1) => FieldType::Uuid,
            (V2, 2) => FieldType::Group,
            (V2, 3) => FieldType::Title,
            (V2, 4) => FieldType::Username,
            (V2, 5) => FieldType::Notes,
            (V2, 6) => FieldType::Password,
            (V2, 7) => FieldType::CreationTime,
            (V2, 8) => FieldType::PasswordModTime,
            (V2, 9) => FieldType::LastAccessTime,
            (V2, 10) => FieldType::PasswordLifetime,
            (V2, 11) => FieldType::PasswordPolicy,
            (V2, 255) => FieldType::EndOfRecord,

            (V3, 0) => FieldType::V3IdString,
            (V3, 1) => FieldType::Uuid,
            (V3, 2) => FieldType::Group,
            (V3, 3) => FieldType::Title,
            (V3, 4) => FieldType::Username,
            (V3, 5) => FieldType::Notes,
            (V3, 6) => FieldType::Password,
            (V3, 7) => FieldType::CreationTime,
            (V3, 8) => FieldType::PasswordModTime,
            (V3, 9) => FieldType::LastAccessTime,
            (V3, 10) => FieldType::PasswordLifetime,
            (V3, 11) => FieldType::PasswordPolicyDeprecated,
            (V3, 12) => FieldType::LastModTime,
            (V3, 13) => FieldType::Url,
            (V3, 14) => FieldType::Autotype,
            (V3, 15) => FieldType::PasswordHistory,
            (V3, 16) => FieldType::PasswordPolicy,
            (V3, 17) => FieldType::PasswordExpiryInterval,
            (V3, 255) => FieldType::EndOfRecord,

            (_, id) => FieldType::Opaque(id),
        }
    }

    /// The inverse of [`FieldType::from_id`]: the wire id this type encodes to
    /// under `version`, or `None` if `version`'s catalog does not carry it.
    pub fn to_id(self, version: PwsafeVersion) -> Option<u8> {
        use PwsafeVersion::*;
        match (version, self) {
            (V1, FieldType::Default) => Some(0),
            (V1, FieldType::Title) => Some(3),
            (V1, FieldType::Username) => Some(4),
            (V1, FieldType::Notes) => Some(5),
            (V1, FieldType::Password) => Some(6),

            (V2, FieldType::Default) => Some(0),
            (V2, FieldType::Uuid) => Some(1),
            (V2, FieldType::Group) => Some(2),
            (V2, FieldType::Title) => Some(3),
            (V2, FieldType::Username) => Some(4),
            (V2, FieldType::Notes) => Some(5),
            (V2, FieldType::Password) => Some(6),
            (V2, FieldType::CreationTime) => Some(7),
            (V2, FieldType::PasswordModTime) => Some(8),
            (V2, FieldType::LastAccessTime) => Some(9),
            (V2, FieldType::PasswordLifetime) => Some(10),
            (V2, FieldType::PasswordPolicy) => Some(11),
            (V2, FieldType::EndOfRecord) => Some(255),

            (V3, FieldType::V3IdString) => Some(0),
            (V3, FieldType::Uuid) => Some(1),
            (V3, FieldType::Group) => Some(2),
            (V3, FieldType::Title) => Some(3),
            (V3, FieldType::Username) => Some(4),
            (V3, FieldType::Notes) => Some(5),
            (V3, FieldType::Password) => Some(6),
            (V3, FieldType::CreationTime) => Some(7),
            (V3, FieldType::PasswordModTime) => Some(8),
            (V3, FieldType::LastAccessTime) => Some(9),
            (V3, FieldType::PasswordLifetime) => Some(10),
            (V3, FieldType::PasswordPolicyDeprecated) => Some(11),
            (V3, FieldType::LastModTime) => Some(12),
            (V3, FieldType::Url) => Some(13),
            (V3, FieldType::Autotype) => Some(14),
            (V3, FieldType::PasswordHistory) => Some(15),
            (V3, FieldType::PasswordPolicy) => Some(16),
            (V3, FieldType::PasswordExpiryInterval) => Some(17),
            (V3, FieldType::EndOfRecord) => Some(255),

            (_, FieldType::Opaque(id)) => Some(id),
            _ => None,
        }
    }

    /// Ascending position in the canonical on-disk ordering:
    /// UUID first, `EndOfRecord` last, everything else by ascending id,
    /// opaque fields after all known ones (stable by original order among
    /// themselves, handled by the caller's stable sort).
    pub(crate) fn canonical_rank(self, version: PwsafeVersion) -> u32 {
        match self {
            FieldType::Uuid => 0,
            FieldType::EndOfRecord => u32::MAX,
            FieldType::Opaque(_) => u32::MAX - 1,
            other => other.to_id(version).map(|id| id as u32 + 1).unwrap_or(u32::MAX - 1),
        }
    }
}

/// The payload half of a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    /// Seconds since the Unix epoch, wire-encoded as 4 bytes little-endian.
    Timestamp(u32),
    Uuid([u8; 16]),
    /// Opaque bytes: used for policy blobs, packed history, and any field
    /// whose id this version's catalog does not define.
    Bytes(Vec<u8>),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<u32> {
        match self {
            FieldValue::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    pub fn as_uuid(&self) -> Option<[u8; 16]> {
        match self {
            FieldValue::Uuid(u) => Some(*u),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            FieldValue::Text(s) => s.as_bytes(),
            FieldValue::Timestamp(_) => unreachable!("timestamps are encoded via to_wire_bytes"),
            FieldValue::Uuid(u) => u,
            FieldValue::Bytes(b) => b,
        }
    }
}

/// One decoded (or to-be-encoded) field: its catalog kind plus payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub ty: FieldType,
    pub value: FieldValue,
}

impl Field {
    pub fn end_of_record() -> Field {
        Field {
            ty: FieldType::EndOfRecord,
            value: FieldValue::Bytes(Vec::new()),
        }
    }

    pub fn is_end_of_record(&self) -> bool {
        matches!(self.ty, FieldType::EndOfRecord)
    }

    /// Decodes a raw wire id and payload into a typed field for `version`.
    ///
    /// Unknown ids always succeed (`FieldType::Opaque`/`FieldValue::Bytes`).
    /// Known ids whose payload doesn't match the expected shape (e.g. a
    /// 3-byte timestamp) are `CorruptFile`.
    ///
    /// Callers reach this through [`PwsafeVersion::decode_field`]; kept
    /// crate-visible rather than private since `record.rs`'s sealable-bytes
    /// codec needs it directly too.
    pub(crate) fn decode(version: PwsafeVersion, id: u8, data: Vec<u8>) -> Result<Field> {
        let ty = FieldType::from_id(version, id);
        let value = match ty {
            FieldType::Default
            | FieldType::V3IdString
            | FieldType::Group
            | FieldType::Title
            | FieldType::Username
            | FieldType::Notes
            | FieldType::Password
            | FieldType::Url
            | FieldType::Autotype => {
                let text = String::from_utf8(data).map_err(|_| Error::CorruptFile)?;
                FieldValue::Text(text)
            }
            FieldType::CreationTime
            | FieldType::PasswordModTime
            | FieldType::LastAccessTime
            | FieldType::PasswordLifetime
            | FieldType::LastModTime
            | FieldType::PasswordExpiryInterval => {
                if data.len() != 4 {
                    return Err(Error::CorruptFile);
                }
                FieldValue::Timestamp(LittleEndian::read_u32(&data))
            }
            FieldType::Uuid => {
                if data.len() != 16 {
                    return Err(Error::CorruptFile);
                }
                let mut uuid = [0u8; 16];
                uuid.copy_from_slice(&data);
                FieldValue::Uuid(uuid)
            }
            FieldType::PasswordPolicy | FieldType::PasswordPolicyDeprecated | FieldType::PasswordHistory => {
                FieldValue::Bytes(data)
            }
            FieldType::EndOfRecord => FieldValue::Bytes(data),
            FieldType::Opaque(_) => FieldValue::Bytes(data),
        };

        Ok(Field { ty, value })
    }

    /// Encodes this field's payload to wire bytes (not including the id/length
    /// framing, which is the version-specific job of `crate::record::encode_record`).
    ///
    /// Callers reach this through [`PwsafeVersion::encode_field`].
    pub(crate) fn encode_payload(&self) -> Vec<u8> {
        match &self.value {
            FieldValue::Text(s) => s.as_bytes().to_vec(),
            FieldValue::Timestamp(t) => {
                let mut buf = [0u8; 4];
                LittleEndian::write_u32(&mut buf, *t);
                buf.to_vec()
            }
            FieldValue::Uuid(u) => u.to_vec(),
            FieldValue::Bytes(b) => b.clone(),
        }
    }
}
