//! A decoded database record: an ordered set of fields.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Error, Result};
use crate::field::{Field, FieldType, FieldValue};
use crate::version::PwsafeVersion;

/// One password entry's fields, as read from (or to be written to) the
/// record stream.
///
/// Immutable between seal cycles: a caller that wants to
/// change a record builds a new one and reseals it at the same index rather
/// than mutating fields in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub version: PwsafeVersion,
    pub fields: Vec<Field>,
}

impl Record {
    pub fn new(version: PwsafeVersion, fields: Vec<Field>) -> Record {
        Record { version, fields }
    }

    pub fn field(&self, ty: FieldType) -> Option<&Field> {
        self.fields.iter().find(|f| f.ty == ty)
    }

    /// True iff the required fields for this record's version are present:
    /// V3 requires UUID and at least one of TITLE/PASSWORD;
    /// V2 requires TITLE; V1 requires TITLE.
    pub fn is_valid(&self) -> bool {
        match self.version {
            PwsafeVersion::V1 | PwsafeVersion::V2 => self.field(FieldType::Title).is_some(),
            PwsafeVersion::V3 => {
                self.field(FieldType::Uuid).is_some()
                    && (self.field(FieldType::Title).is_some() || self.field(FieldType::Password).is_some())
            }
        }
    }

    /// Fields in the canonical on-disk order used when writing: UUID first,
    /// `EndOfRecord` last, others ascending by id, opaque fields last among
    /// themselves in their original relative order.
    pub fn canonical_fields(&self) -> Vec<&Field> {
        let mut indexed: Vec<(usize, &Field)> = self.fields.iter().enumerate().collect();
        indexed.sort_by_key(|(index, field)| (field.ty.canonical_rank(self.version), *index));
        indexed.into_iter().map(|(_, field)| field).collect()
    }

    /// Serializes this record to the private, version-tagged byte
    /// representation the in-memory cage seals — distinct from, and simpler
    /// than, the on-disk wire format (no block padding, no cipher framing;
    /// the cage's CBC/PKCS#5 layer provides that).
    pub fn to_sealable_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.push(version_tag(self.version));
        for field in &self.fields {
            let id = field.ty.to_id(self.version).unwrap_or_else(|| match field.ty {
                FieldType::Opaque(id) => id,
                _ => 0,
            });
            let payload = self.version.encode_field(field);
            out.push(id);
            let mut len_buf = [0u8; 4];
            LittleEndian::write_u32(&mut len_buf, payload.len() as u32);
            out.extend_from_slice(&len_buf);
            out.extend_from_slice(&payload);
        }
        out
    }

    /// The inverse of [`Record::to_sealable_bytes`].
    pub fn from_sealable_bytes(bytes: &[u8]) -> Result<Record> {
        if bytes.is_empty() {
            return Err(Error::MemoryKeyError);
        }
        let version = version_from_tag(bytes[0]).ok_or(Error::MemoryKeyError)?;
        let mut fields = Vec::new();
        let mut pos = 1usize;
        while pos < bytes.len() {
            if pos + 5 > bytes.len() {
                return Err(Error::MemoryKeyError);
            }
            let id = bytes[pos];
            let len = LittleEndian::read_u32(&bytes[pos + 1..pos + 5]) as usize;
            pos += 5;
            if pos + len > bytes.len() {
                return Err(Error::MemoryKeyError);
            }
            let payload = bytes[pos..pos + len].to_vec();
            pos += len;
            fields.push(version.decode_field(id, payload).map_err(|_| Error::MemoryKeyError)?);
        }
        Ok(Record { version, fields })
    }
}

fn version_tag(version: PwsafeVersion) -> u8 {
    match version {
        PwsafeVersion::V1 => 1,
        PwsafeVersion::V2 => 2,
        PwsafeVersion::V3 => 3,
    }
}

fn version_from_tag(tag: u8) -> Option<PwsafeVersion> {
    match tag {
        1 => Some(PwsafeVersion::V1),
        2 => Some(PwsafeVersion::V2),
        3 => Some(PwsafeVersion::V3),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_v3() -> Record {
        Record::new(
            PwsafeVersion::V3,
            vec![
                Field {
                    ty: FieldType::Password,
                    value: FieldValue::Text("s3cr3t".into()),
                },
                Field {
                    ty: FieldType::Uuid,
                    value: FieldValue::Uuid([7u8; 16]),
                },
                Field {
                    ty: FieldType::Title,
                    value: FieldValue::Text("gmail".into()),
                },
                Field::end_of_record(),
            ],
        )
    }

    #[test]
    fn round_trips_through_sealable_bytes() {
        let record = sample_v3();
        let bytes = record.to_sealable_bytes();
        let restored = Record::from_sealable_bytes(&bytes).unwrap();
        assert_eq!(record, restored);
    }

    #[test]
    fn canonical_order_puts_uuid_first_and_eor_last() {
        let record = sample_v3();
        let order: Vec<FieldType> = record.canonical_fields().into_iter().map(|f| f.ty).collect();
        assert_eq!(order.first(), Some(&FieldType::Uuid));
        assert_eq!(order.last(), Some(&FieldType::EndOfRecord));
    }

    #[test]
    fn v3_requires_uuid_and_title_or_password() {
        let mut record = sample_v3();
        assert!(record.is_valid());
        record.fields.retain(|f| f.ty != FieldType::Uuid);
        assert!(!record.is_valid());
    }
}
