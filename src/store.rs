//! The entry store: a sparse projection over [`Database`]'s sealed-record
//! list, kept in sync through the load-listener hook and through its own
//! `add`/`update`/`remove`.

use std::collections::HashSet;

use uuid::Uuid;

use crate::database::{Database, LoadListener};
use crate::error::{Error, Result};
use crate::field::{Field, FieldType, FieldValue};
use crate::log::{Level, Logger, NullLogger};
use crate::record::Record;
use crate::version::PwsafeVersion;

/// The configured subset of field types a sparse bean projects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSet(HashSet<FieldType>);

impl FieldSet {
    pub fn new(fields: impl IntoIterator<Item = FieldType>) -> FieldSet {
        FieldSet(fields.into_iter().collect())
    }

    pub fn contains(&self, ty: FieldType) -> bool {
        self.0.contains(&ty)
    }

    /// True iff every member of `self` is also a member of `other`.
    pub fn is_subset(&self, other: &FieldSet) -> bool {
        self.0.is_subset(&other.0)
    }

    /// Default projected fields for `version`.
    pub fn default_for(version: PwsafeVersion) -> FieldSet {
        match version {
            PwsafeVersion::V1 => FieldSet::new([FieldType::Title, FieldType::Username]),
            PwsafeVersion::V2 => FieldSet::new([
                FieldType::Title,
                FieldType::Group,
                FieldType::Username,
                FieldType::Notes,
            ]),
            PwsafeVersion::V3 => FieldSet::new([
                FieldType::Title,
                FieldType::Group,
                FieldType::Username,
                FieldType::Notes,
                FieldType::Url,
                FieldType::PasswordLifetime,
                FieldType::LastModTime,
            ]),
        }
    }
}

/// A flattened view of a record, suitable for UI/tooling.
///
/// When `sparse` is `true` only the fields named in the store's configured
/// [`FieldSet`] are populated; the rest are `None` regardless of whether the
/// underlying record actually carries them. `get(index)` always returns a
/// fully populated (`sparse: false`) bean.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PwsEntryBean {
    pub store_index: usize,
    pub sparse: bool,
    pub uuid: Option<[u8; 16]>,
    pub group: Option<String>,
    pub title: Option<String>,
    pub username: Option<String>,
    pub notes: Option<String>,
    pub password: Option<String>,
    pub url: Option<String>,
    pub creation_time: Option<u32>,
    pub password_mod_time: Option<u32>,
    pub last_access_time: Option<u32>,
    pub password_lifetime: Option<u32>,
    pub last_mod_time: Option<u32>,
    pub password_expiry_interval: Option<u32>,
    pub policy: Option<Vec<u8>>,
    pub history: Option<Vec<u8>>,
}

impl PwsEntryBean {
    /// Builds a fully populated bean from `record` (used by `get`/`update`'s
    /// refresh and as the basis a sparse projection filters down from).
    fn from_record(record: &Record, store_index: usize) -> PwsEntryBean {
        let mut bean = PwsEntryBean {
            store_index,
            sparse: false,
            ..Default::default()
        };
        for field in &record.fields {
            match field.ty {
                FieldType::Uuid => bean.uuid = field.value.as_uuid(),
                FieldType::Group => bean.group = field.value.as_text().map(str::to_owned),
                FieldType::Title => bean.title = field.value.as_text().map(str::to_owned),
                FieldType::Username => bean.username = field.value.as_text().map(str::to_owned),
                FieldType::Notes => bean.notes = field.value.as_text().map(str::to_owned),
                FieldType::Password => bean.password = field.value.as_text().map(str::to_owned),
                FieldType::Url => bean.url = field.value.as_text().map(str::to_owned),
                FieldType::CreationTime => bean.creation_time = field.value.as_timestamp(),
                FieldType::PasswordModTime => bean.password_mod_time = field.value.as_timestamp(),
                FieldType::LastAccessTime => bean.last_access_time = field.value.as_timestamp(),
                FieldType::PasswordLifetime => bean.password_lifetime = field.value.as_timestamp(),
                FieldType::LastModTime => bean.last_mod_time = field.value.as_timestamp(),
                FieldType::PasswordExpiryInterval => bean.password_expiry_interval = field.value.as_timestamp(),
                FieldType::PasswordPolicy | FieldType::PasswordPolicyDeprecated => {
                    bean.policy = Some(field.value.as_bytes().to_vec());
                }
                FieldType::PasswordHistory => bean.history = Some(field.value.as_bytes().to_vec()),
                _ => {}
            }
        }
        bean
    }

    /// Projects `self` down to only the fields named in `fields`.
    fn project(mut self, fields: &FieldSet) -> PwsEntryBean {
        if !fields.contains(FieldType::Uuid) {
            self.uuid = None;
        }
        if !fields.contains(FieldType::Group) {
            self.group = None;
        }
        if !fields.contains(FieldType::Title) {
            self.title = None;
        }
        if !fields.contains(FieldType::Username) {
            self.username = None;
        }
        if !fields.contains(FieldType::Notes) {
            self.notes = None;
        }
        if !fields.contains(FieldType::Password) {
            self.password = None;
        }
        if !fields.contains(FieldType::Url) {
            self.url = None;
        }
        if !fields.contains(FieldType::CreationTime) {
            self.creation_time = None;
        }
        if !fields.contains(FieldType::PasswordModTime) {
            self.password_mod_time = None;
        }
        if !fields.contains(FieldType::LastAccessTime) {
            self.last_access_time = None;
        }
        if !fields.contains(FieldType::PasswordLifetime) {
            self.password_lifetime = None;
        }
        if !fields.contains(FieldType::LastModTime) {
            self.last_mod_time = None;
        }
        if !fields.contains(FieldType::PasswordExpiryInterval) {
            self.password_expiry_interval = None;
        }
        if !fields.contains(FieldType::PasswordPolicy) && !fields.contains(FieldType::PasswordPolicyDeprecated) {
            self.policy = None;
        }
        if !fields.contains(FieldType::PasswordHistory) {
            self.history = None;
        }
        self.sparse = true;
        self
    }

    /// Builds the [`Record`] this bean describes, for `add`/`update`.
    ///
    /// V1 has no `EndOfRecord` marker; its record boundary is inferred from
    /// the presence of all five canonical field types, so a
    /// freshly constructed V1 record must carry all five even when the
    /// caller left some blank — otherwise a later `Database::open` of the
    /// saved file could misdetect where this record ends.
    fn to_record(&self, version: PwsafeVersion) -> Record {
        let mut fields = Vec::new();
        let text = |ty: FieldType, value: &Option<String>| {
            value.clone().map(|s| Field { ty, value: FieldValue::Text(s) })
        };
        let timestamp = |ty: FieldType, value: &Option<u32>| {
            value.map(|t| Field { ty, value: FieldValue::Timestamp(t) })
        };

        if let Some(field) = text(FieldType::Title, &self.title) {
            fields.push(field);
        }
        if let Some(field) = text(FieldType::Username, &self.username) {
            fields.push(field);
        }
        if let Some(field) = text(FieldType::Notes, &self.notes) {
            fields.push(field);
        }
        if let Some(field) = text(FieldType::Password, &self.password) {
            fields.push(field);
        }

        if version == PwsafeVersion::V1 {
            for ty in [FieldType::Default, FieldType::Title, FieldType::Username, FieldType::Notes, FieldType::Password] {
                if !fields.iter().any(|f| f.ty == ty) {
                    fields.push(Field { ty, value: FieldValue::Text(String::new()) });
                }
            }
            return Record::new(version, fields);
        }

        let uuid = self.uuid.unwrap_or_else(|| *Uuid::new_v4().as_bytes());
        fields.push(Field { ty: FieldType::Uuid, value: FieldValue::Uuid(uuid) });
        if let Some(field) = text(FieldType::Group, &self.group) {
            fields.push(field);
        }
        if let Some(field) = text(FieldType::Url, &self.url) {
            fields.push(field);
        }
        if let Some(field) = timestamp(FieldType::CreationTime, &self.creation_time) {
            fields.push(field);
        }
        if let Some(field) = timestamp(FieldType::PasswordModTime, &self.password_mod_time) {
            fields.push(field);
        }
        if let Some(field) = timestamp(FieldType::LastAccessTime, &self.last_access_time) {
            fields.push(field);
        }
        if let Some(field) = timestamp(FieldType::PasswordLifetime, &self.password_lifetime) {
            fields.push(field);
        }
        if version == PwsafeVersion::V3 {
            if let Some(field) = timestamp(FieldType::LastModTime, &self.last_mod_time) {
                fields.push(field);
            }
            if let Some(field) = timestamp(FieldType::PasswordExpiryInterval, &self.password_expiry_interval) {
                fields.push(field);
            }
            if let Some(history) = self.history.clone() {
                fields.push(Field { ty: FieldType::PasswordHistory, value: FieldValue::Bytes(history) });
            }
        }
        if let Some(policy) = self.policy.clone() {
            fields.push(Field { ty: FieldType::PasswordPolicy, value: FieldValue::Bytes(policy) });
        }
        fields.push(Field::end_of_record());
        Record::new(version, fields)
    }
}

/// A sparse-projection layer over a [`Database`]'s sealed-record list
///. Keeps a `Vec<PwsEntryBean>` aligned 1:1 with the sealed
/// list, refreshed incrementally by `add`/`update` and wholesale by `remove`
/// and `set_sparse_fields`.
pub struct EntryStore {
    version: PwsafeVersion,
    fields: FieldSet,
    entries: Vec<PwsEntryBean>,
    logger: Box<dyn Logger>,
}

impl EntryStore {
    pub fn new(version: PwsafeVersion) -> EntryStore {
        EntryStore::with_logger(version, Box::new(NullLogger))
    }

    pub fn with_logger(version: PwsafeVersion, logger: Box<dyn Logger>) -> EntryStore {
        EntryStore {
            version,
            fields: FieldSet::default_for(version),
            entries: Vec::new(),
            logger,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[PwsEntryBean] {
        &self.entries
    }

    /// Rebuilds the sparse list from every record currently in `database`.
    /// Used both as the store's own `load()` and, via [`LoadListener`], as
    /// the projection step run inline with `Database::open`'s decrypt pass
    /// when the store is attached before opening.
    pub fn load(&mut self, database: &mut Database) -> Result<()> {
        self.entries.clear();
        for index in 0..database.len() {
            let record = database.get_record(index)?;
            self.entries.push(PwsEntryBean::from_record(&record, index).project(&self.fields));
        }
        Ok(())
    }

    /// Appends `entry` to `database`, then projects and appends the sparse
    /// view for the newly assigned index.
    pub fn add(&mut self, database: &mut Database, entry: &PwsEntryBean) -> Result<usize> {
        if entry.sparse {
            return Err(Error::SparseEntry);
        }
        let record = entry.to_record(self.version);
        let index = database.add_record(record)?;
        let full = database.get_record(index)?;
        self.entries.push(PwsEntryBean::from_record(&full, index).project(&self.fields));
        Ok(index)
    }

    /// Reseals `entry` at its own `store_index` and refreshes that one
    /// sparse entry. A bean that is field-equal to what's already stored is
    /// still resealed.
    pub fn update(&mut self, database: &mut Database, entry: &PwsEntryBean) -> Result<()> {
        if entry.sparse {
            return Err(Error::SparseEntry);
        }
        let index = entry.store_index;
        if index >= self.entries.len() {
            return Err(Error::IndexOutOfRange);
        }

        let current = database.get_record(index)?;
        let current_bean = PwsEntryBean::from_record(&current, index);
        if &current_bean == entry {
            self.logger.log(Level::Warn, "update() called with an unchanged entry");
        }

        let record = entry.to_record(self.version);
        database.update_record(index, record)?;
        let full = database.get_record(index)?;
        self.entries[index] = PwsEntryBean::from_record(&full, index).project(&self.fields);
        Ok(())
    }

    /// Removes the record at `entry.store_index` and re-synchronizes every
    /// sparse entry's index, since removal shifts all later positions down
    /// by one.
    pub fn remove(&mut self, database: &mut Database, entry: &PwsEntryBean) -> Result<()> {
        let index = entry.store_index;
        database.remove_record(index)?;
        self.refresh(database)
    }

    /// A fully populated (non-sparse) bean for the record at `index`.
    pub fn get(&mut self, database: &mut Database, index: usize) -> Result<PwsEntryBean> {
        let record = database.get_record(index)?;
        Ok(PwsEntryBean::from_record(&record, index))
    }

    /// Changes the projected field set. If the new set is not a subset of
    /// the current one, every sparse entry may now need fields it didn't
    /// carry before, so the whole list is rebuilt from `database`; otherwise
    /// the narrower filter is applied to the existing entries in place.
    pub fn set_sparse_fields(&mut self, database: &mut Database, fields: FieldSet) -> Result<()> {
        let rebuild = !fields.is_subset(&self.fields);
        self.fields = fields;
        if rebuild {
            self.load(database)
        } else {
            for entry in &mut self.entries {
                let index = entry.store_index;
                let record = database.get_record(index)?;
                *entry = PwsEntryBean::from_record(&record, index).project(&self.fields);
            }
            Ok(())
        }
    }

    fn refresh(&mut self, database: &mut Database) -> Result<()> {
        self.load(database)
    }
}

impl LoadListener for EntryStore {
    /// Projects `record` to a sparse bean using the position it will occupy
    /// in the sealed list: the number of entries already streamed in, since
    /// `Database::open` calls this once per record in file order before the
    /// next one is appended.
    fn loaded(&mut self, record: &Record) {
        let index = self.entries.len();
        self.entries.push(PwsEntryBean::from_record(record, index).project(&self.fields));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{DatabaseConfig, NullListener};
    use crate::io::storage::CursorStorage;

    fn bean(title: &str, username: &str) -> PwsEntryBean {
        PwsEntryBean {
            title: Some(title.to_string()),
            username: Some(username.to_string()),
            password: Some("s3cr3t".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn add_then_get_round_trips_fields() {
        let config = DatabaseConfig::default();
        let mut db = Database::create(PwsafeVersion::V3, &mut b"hunter2".to_vec(), &config).unwrap();
        let mut store = EntryStore::new(PwsafeVersion::V3);

        let index = store.add(&mut db, &bean("gmail", "alice")).unwrap();
        let full = store.get(&mut db, index).unwrap();
        assert_eq!(full.title.as_deref(), Some("gmail"));
        assert_eq!(full.password.as_deref(), Some("s3cr3t"));
        assert!(!full.sparse);
    }

    #[test]
    fn default_v3_projection_hides_password() {
        let config = DatabaseConfig::default();
        let mut db = Database::create(PwsafeVersion::V3, &mut b"hunter2".to_vec(), &config).unwrap();
        let mut store = EntryStore::new(PwsafeVersion::V3);

        store.add(&mut db, &bean("gmail", "alice")).unwrap();
        let sparse = &store.entries()[0];
        assert!(sparse.sparse);
        assert_eq!(sparse.title.as_deref(), Some("gmail"));
        assert!(sparse.password.is_none());
    }

    #[test]
    fn add_then_remove_restores_length() {
        let config = DatabaseConfig::default();
        let mut db = Database::create(PwsafeVersion::V3, &mut b"hunter2".to_vec(), &config).unwrap();
        let mut store = EntryStore::new(PwsafeVersion::V3);

        let index = store.add(&mut db, &bean("gmail", "alice")).unwrap();
        assert_eq!(store.len(), 1);
        let entry = store.entries()[index].clone();
        store.remove(&mut db, &entry).unwrap();
        assert_eq!(store.len(), 0);
        assert_eq!(db.len(), 0);
    }

    #[test]
    fn update_then_get_reflects_new_fields() {
        let config = DatabaseConfig::default();
        let mut db = Database::create(PwsafeVersion::V3, &mut b"hunter2".to_vec(), &config).unwrap();
        let mut store = EntryStore::new(PwsafeVersion::V3);

        let index = store.add(&mut db, &bean("gmail", "alice")).unwrap();
        let mut full = store.get(&mut db, index).unwrap();
        full.username = Some("bob".to_string());
        store.update(&mut db, &full).unwrap();

        let refreshed = store.get(&mut db, index).unwrap();
        assert_eq!(refreshed.username.as_deref(), Some("bob"));
    }

    #[test]
    fn widening_sparse_fields_rebuilds_and_reveals_password() {
        let config = DatabaseConfig::default();
        let mut db = Database::create(PwsafeVersion::V3, &mut b"hunter2".to_vec(), &config).unwrap();
        let mut store = EntryStore::new(PwsafeVersion::V3);
        store.add(&mut db, &bean("gmail", "alice")).unwrap();
        assert!(store.entries()[0].password.is_none());

        let mut wider = vec![
            FieldType::Title,
            FieldType::Group,
            FieldType::Username,
            FieldType::Notes,
            FieldType::Url,
            FieldType::PasswordLifetime,
            FieldType::LastModTime,
        ];
        wider.push(FieldType::Password);
        store.set_sparse_fields(&mut db, FieldSet::new(wider)).unwrap();
        assert_eq!(store.entries()[0].password.as_deref(), Some("s3cr3t"));
    }

    #[test]
    fn v1_round_trip_fills_blank_canonical_fields() {
        let config = DatabaseConfig::default();
        let mut db = Database::create(PwsafeVersion::V1, &mut b"hunter2".to_vec(), &config).unwrap();
        let storage = CursorStorage::new();
        let mut store = EntryStore::new(PwsafeVersion::V1);

        store.add(&mut db, &bean("gmail", "alice")).unwrap();
        db.save(&storage).unwrap();

        let mut reopened =
            Database::open(&storage, PwsafeVersion::V1, &mut b"hunter2".to_vec(), &config, &mut NullListener).unwrap();
        assert_eq!(reopened.len(), 1);
        let record = reopened.get_record(0).unwrap();
        assert_eq!(record.field(FieldType::Username).unwrap().value.as_text(), Some("alice"));
    }
}
