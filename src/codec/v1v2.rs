//! The V1/V2 record stream: header, then fields until the version's
//! end-of-record condition, repeated until clean EOF.

use std::collections::HashSet;
use std::io::{Read, Write};

use crate::codec::cipher_stream::{BlockDecryptor, BlockEncryptor};
use crate::codec::header::V1V2Header;
use crate::codec::wire;
use crate::error::{Error, Result};
use crate::field::{Field, FieldType};
use crate::record::Record;
use crate::version::PwsafeVersion;

/// V1's five canonical field types; a record is complete once all of them
/// have appeared since V1 has no `EndOfRecord` marker.
const V1_CANONICAL: [FieldType; 5] = [
    FieldType::Default,
    FieldType::Title,
    FieldType::Username,
    FieldType::Notes,
    FieldType::Password,
];

/// A V1 or V2 file opened for reading: header already authenticated, ready
/// to stream records one at a time.
pub struct Reader<R> {
    inner: R,
    decryptor: BlockDecryptor,
    version: PwsafeVersion,
}

impl<R: Read> Reader<R> {
    pub fn open(mut inner: R, version: PwsafeVersion, passphrase: &[u8]) -> Result<Reader<R>> {
        let header = V1V2Header::read(&mut inner)?;
        let key = header.authenticate(passphrase)?;
        let decryptor = match version {
            PwsafeVersion::V1 => BlockDecryptor::ecb(key.to_vec()),
            PwsafeVersion::V2 => BlockDecryptor::cbc(key.to_vec(), header.iv),
            PwsafeVersion::V3 => unreachable!("V3 has its own codec"),
        };
        Ok(Reader {
            inner,
            decryptor,
            version,
        })
    }

    /// Reads the next record, or `Ok(None)` at clean end of stream.
    pub fn read_record(&mut self) -> Result<Option<Record>> {
        match self.version {
            PwsafeVersion::V1 => self.read_record_v1(),
            _ => self.read_record_with_terminator(),
        }
    }

    fn read_record_v1(&mut self) -> Result<Option<Record>> {
        let mut fields = Vec::new();
        let mut seen: HashSet<FieldType> = HashSet::new();
        loop {
            let (id, data) = match wire::read_field(&mut self.decryptor, &mut self.inner) {
                Ok(Some(field)) => field,
                Ok(None) => {
                    return if fields.is_empty() {
                        Ok(None)
                    } else {
                        Err(Error::CorruptFile)
                    };
                }
                Err(_) => return Err(Error::CorruptFile),
            };
            let field = PwsafeVersion::V1.decode_field(id, data)?;
            if matches!(field.ty, FieldType::Opaque(_)) {
                // V1 has no room for fields outside its five-entry catalog;
                // an opaque id here means the mandatory-set boundary can
                // never be located reliably.
                return Err(Error::CorruptFile);
            }
            seen.insert(field.ty);
            fields.push(field);
            if V1_CANONICAL.iter().all(|ty| seen.contains(ty)) {
                return Ok(Some(Record::new(PwsafeVersion::V1, fields)));
            }
        }
    }

    fn read_record_with_terminator(&mut self) -> Result<Option<Record>> {
        let mut fields = Vec::new();
        loop {
            let (id, data) = match wire::read_field(&mut self.decryptor, &mut self.inner) {
                Ok(Some(field)) => field,
                Ok(None) => {
                    return if fields.is_empty() {
                        Ok(None)
                    } else {
                        Err(Error::CorruptFile)
                    };
                }
                Err(_) => return Err(Error::CorruptFile),
            };
            let field = self.version.decode_field(id, data)?;
            let is_eor = field.is_end_of_record();
            fields.push(field);
            if is_eor {
                return Ok(Some(Record::new(self.version, fields)));
            }
        }
    }
}

/// A V1 or V2 file opened for writing: header already written, ready to
/// stream records out one at a time.
pub struct Writer<W> {
    inner: W,
    encryptor: BlockEncryptor,
}

impl<W: Write> Writer<W> {
    pub fn create(mut inner: W, version: PwsafeVersion, passphrase: &[u8]) -> Result<Writer<W>> {
        let (header, key) = V1V2Header::create(passphrase);
        header.write(&mut inner)?;
        let encryptor = match version {
            PwsafeVersion::V1 => BlockEncryptor::ecb(key.to_vec()),
            PwsafeVersion::V2 => BlockEncryptor::cbc(key.to_vec(), header.iv),
            PwsafeVersion::V3 => unreachable!("V3 has its own codec"),
        };
        Ok(Writer { inner, encryptor })
    }

    pub fn write_record(&mut self, record: &Record) -> Result<()> {
        for field in record.canonical_fields() {
            let id = field
                .ty
                .to_id(record.version)
                .unwrap_or_else(|| match field.ty {
                    FieldType::Opaque(id) => id,
                    _ => 0,
                });
            wire::write_field(&mut self.encryptor, &mut self.inner, id, &record.version.encode_field(field))?;
        }
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldValue;

    fn sample_record(version: PwsafeVersion) -> Record {
        let mut fields = vec![
            Field {
                ty: FieldType::Title,
                value: FieldValue::Text("gmail".into()),
            },
            Field {
                ty: FieldType::Username,
                value: FieldValue::Text("alice".into()),
            },
            Field {
                ty: FieldType::Password,
                value: FieldValue::Text("p@ss".into()),
            },
        ];
        if version.has_end_of_record() {
            fields.push(Field::end_of_record());
        } else {
            fields.push(Field {
                ty: FieldType::Default,
                value: FieldValue::Text(String::new()),
            });
            fields.push(Field {
                ty: FieldType::Notes,
                value: FieldValue::Text(String::new()),
            });
        }
        Record::new(version, fields)
    }

    #[test]
    fn v1_round_trips_a_record() {
        let mut buf = Vec::new();
        let mut writer = Writer::create(&mut buf, PwsafeVersion::V1, b"hunter2").unwrap();
        writer.write_record(&sample_record(PwsafeVersion::V1)).unwrap();

        let mut reader = Reader::open(std::io::Cursor::new(buf), PwsafeVersion::V1, b"hunter2").unwrap();
        let record = reader.read_record().unwrap().unwrap();
        assert_eq!(record.field(FieldType::Title).unwrap().value.as_text(), Some("gmail"));
        assert!(reader.read_record().unwrap().is_none());
    }

    #[test]
    fn v2_round_trips_a_record() {
        let mut buf = Vec::new();
        let mut writer = Writer::create(&mut buf, PwsafeVersion::V2, b"hunter2").unwrap();
        writer.write_record(&sample_record(PwsafeVersion::V2)).unwrap();

        let mut reader = Reader::open(std::io::Cursor::new(buf), PwsafeVersion::V2, b"hunter2").unwrap();
        let record = reader.read_record().unwrap().unwrap();
        assert_eq!(record.field(FieldType::Username).unwrap().value.as_text(), Some("alice"));
        assert!(reader.read_record().unwrap().is_none());
    }

    #[test]
    fn v2_wrong_passphrase_is_rejected() {
        let mut buf = Vec::new();
        let mut writer = Writer::create(&mut buf, PwsafeVersion::V2, b"hunter2").unwrap();
        writer.write_record(&sample_record(PwsafeVersion::V2)).unwrap();

        assert!(matches!(
            Reader::open(std::io::Cursor::new(buf), PwsafeVersion::V2, b"wrong"),
            Err(Error::WrongPassphrase)
        ));
    }
}
