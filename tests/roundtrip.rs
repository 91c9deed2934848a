//! Full open/mutate/save/reopen integration coverage over `CursorStorage`,
//! exercising the public API the way a host application would rather than
//! reaching into any module's internals.

use pwsafe_core::{
    Database, DatabaseConfig, EntryStore, Field, FieldType, FieldValue, LoadListener, NullListener,
    PwsEntryBean, PwsafeVersion, Record,
};
use pwsafe_core::io::storage::CursorStorage;

fn gmail_record(version: PwsafeVersion) -> Record {
    let mut fields = vec![
        Field { ty: FieldType::Title, value: FieldValue::Text("gmail".into()) },
        Field { ty: FieldType::Username, value: FieldValue::Text("alice".into()) },
        Field { ty: FieldType::Password, value: FieldValue::Text("p@ss".into()) },
    ];
    if version.has_end_of_record() {
        fields.push(Field::end_of_record());
    } else {
        fields.push(Field { ty: FieldType::Default, value: FieldValue::Text(String::new()) });
        fields.push(Field { ty: FieldType::Notes, value: FieldValue::Text(String::new()) });
    }
    Record::new(version, fields)
}

#[test]
fn v3_create_add_save_reopen_round_trips_exact_field_values() {
    let storage = CursorStorage::new();
    let config = DatabaseConfig::default();

    let mut db = Database::create(PwsafeVersion::V3, &mut b"correct horse".to_vec(), &config).unwrap();
    db.add_record(gmail_record(PwsafeVersion::V3)).unwrap();
    db.save(&storage).unwrap();

    let mut reopened = Database::open(
        &storage,
        PwsafeVersion::V3,
        &mut b"correct horse".to_vec(),
        &config,
        &mut NullListener,
    )
    .unwrap();
    assert_eq!(reopened.len(), 1);
    let record = reopened.get_record(0).unwrap();
    assert_eq!(record.field(FieldType::Title).unwrap().value.as_text(), Some("gmail"));
    assert_eq!(record.field(FieldType::Username).unwrap().value.as_text(), Some("alice"));
    assert_eq!(record.field(FieldType::Password).unwrap().value.as_text(), Some("p@ss"));
}

#[test]
fn wrong_passphrase_on_reopen_is_rejected_without_touching_earlier_records() {
    let storage = CursorStorage::new();
    let config = DatabaseConfig::default();

    let mut db = Database::create(PwsafeVersion::V3, &mut b"correct horse".to_vec(), &config).unwrap();
    db.add_record(gmail_record(PwsafeVersion::V3)).unwrap();
    db.save(&storage).unwrap();

    let result = Database::open(
        &storage,
        PwsafeVersion::V3,
        &mut b"wrong horse".to_vec(),
        &config,
        &mut NullListener,
    );
    assert!(matches!(result, Err(pwsafe_core::Error::WrongPassphrase)));
}

#[test]
fn attaching_an_entry_store_before_open_projects_in_the_same_pass() {
    let storage = CursorStorage::new();
    let config = DatabaseConfig::default();

    let mut db = Database::create(PwsafeVersion::V2, &mut b"hunter2".to_vec(), &config).unwrap();
    db.add_record(gmail_record(PwsafeVersion::V2)).unwrap();
    db.save(&storage).unwrap();

    let mut store = EntryStore::new(PwsafeVersion::V2);
    let mut reopened =
        Database::open(&storage, PwsafeVersion::V2, &mut b"hunter2".to_vec(), &config, &mut store).unwrap();

    assert_eq!(store.len(), 1);
    assert_eq!(store.entries()[0].title.as_deref(), Some("gmail"));
    // Projected under V2's default sparse set (title/group/username/notes): password absent.
    assert!(store.entries()[0].password.is_none());

    // The store's view and the database's sealed list stay index-aligned.
    let full = store.get(&mut reopened, 0).unwrap();
    assert_eq!(full.password.as_deref(), Some("p@ss"));
}

#[test]
fn add_update_remove_cycle_through_the_entry_store_keeps_indices_in_sync() {
    let config = DatabaseConfig::default();
    let mut db = Database::create(PwsafeVersion::V3, &mut b"hunter2".to_vec(), &config).unwrap();
    let mut store = EntryStore::new(PwsafeVersion::V3);

    let first = PwsEntryBean {
        title: Some("gmail".into()),
        username: Some("alice".into()),
        password: Some("p@ss".into()),
        ..Default::default()
    };
    let second = PwsEntryBean {
        title: Some("github".into()),
        username: Some("alice".into()),
        password: Some("t0k3n".into()),
        ..Default::default()
    };
    store.add(&mut db, &first).unwrap();
    let second_index = store.add(&mut db, &second).unwrap();
    assert_eq!(store.len(), 2);

    let mut updated = store.get(&mut db, second_index).unwrap();
    updated.username = Some("bob".into());
    store.update(&mut db, &updated).unwrap();
    assert_eq!(store.get(&mut db, second_index).unwrap().username.as_deref(), Some("bob"));

    let gmail_entry = store.entries()[0].clone();
    store.remove(&mut db, &gmail_entry).unwrap();
    assert_eq!(store.len(), 1);
    assert_eq!(db.len(), 1);
    assert_eq!(store.get(&mut db, 0).unwrap().title.as_deref(), Some("github"));
}

#[test]
fn read_only_reopen_rejects_save_but_still_allows_iteration() {
    let storage = CursorStorage::new();
    let config = DatabaseConfig::default();

    let mut db = Database::create(PwsafeVersion::V2, &mut b"hunter2".to_vec(), &config).unwrap();
    db.add_record(gmail_record(PwsafeVersion::V2)).unwrap();
    db.save(&storage).unwrap();

    let mut reopened =
        Database::open(&storage, PwsafeVersion::V2, &mut b"hunter2".to_vec(), &config, &mut NullListener).unwrap();
    reopened.set_read_only(true);

    let titles: Vec<String> = reopened
        .iter()
        .map(|r| r.unwrap().field(FieldType::Title).unwrap().value.as_text().unwrap().to_string())
        .collect();
    assert_eq!(titles, vec!["gmail".to_string()]);

    assert!(matches!(reopened.save(&storage), Err(pwsafe_core::Error::ReadOnly)));
}

struct CountingListener {
    count: usize,
}

impl LoadListener for CountingListener {
    fn loaded(&mut self, _record: &Record) {
        self.count += 1;
    }
}

#[test]
fn load_listener_sees_every_record_including_invalid_ones_in_file_order() {
    let storage = CursorStorage::new();
    let config = DatabaseConfig::default();

    let mut db = Database::create(PwsafeVersion::V2, &mut b"hunter2".to_vec(), &config).unwrap();
    db.add_record(gmail_record(PwsafeVersion::V2)).unwrap();
    db.add_record(gmail_record(PwsafeVersion::V2)).unwrap();
    db.save(&storage).unwrap();

    let mut listener = CountingListener { count: 0 };
    let reopened =
        Database::open(&storage, PwsafeVersion::V2, &mut b"hunter2".to_vec(), &config, &mut listener).unwrap();
    assert_eq!(listener.count, 2);
    assert_eq!(reopened.len(), 2);
}
