use std::collections::HashSet;

use relmap::demo;
use relmap::mapping::Related;
use relmap::{
    Address, Error, HouseAddress, Mapping, NewPhoneNumber, NewUser, PhoneNumber, Session, SqliteStore, User,
};

fn walkthrough() -> (SqliteStore, relmap::Mapper) {
    let mut store = SqliteStore::open_in_memory().unwrap();
    let mapper = Mapping::tutorial().configure().unwrap();
    demo::run(&mut store, &mapper).unwrap();
    (store, mapper)
}

#[test]
fn test_home_and_delivery_resolve_to_distinct_rows() {
    let (mut store, mapper) = walkthrough();
    let session = Session::begin(&mut store, &mapper).unwrap();

    let ed = session.query::<User>().filter_by("name", "ed").one().unwrap();
    let home = session.home_address_of(&ed).unwrap().unwrap();
    let delivery = session.delivery_address_of(&ed).unwrap().unwrap();

    assert_ne!(home.id, delivery.id);
    assert_eq!(home.zip, "8051");
    assert_eq!(delivery.zip, "8052");
    assert_eq!(session.query::<HouseAddress>().count().unwrap(), 2);
}

#[test]
fn test_phone_number_rejects_collection() {
    let (mut store, mapper) = walkthrough();
    let mut session = Session::begin(&mut store, &mapper).unwrap();

    let wendy = session.query::<User>().filter_by("name", "wendy").one().unwrap();
    let phones = session.query::<PhoneNumber>().all().unwrap();

    let err = session
        .set_related(&wendy, "phone_number", Related::many(&phones))
        .unwrap_err();
    assert!(matches!(err, Error::Cardinality { .. }));
    assert_eq!(session.phone_number_of(&wendy).unwrap(), None);
}

#[test]
fn test_users_share_a_phone_number() {
    let (mut store, mapper) = walkthrough();
    let session = Session::begin(&mut store, &mapper).unwrap();

    let phone_42 = session
        .query::<PhoneNumber>()
        .filter_by("phone_number", 42)
        .one()
        .unwrap();
    let names: Vec<String> = session
        .users_with_phone(&phone_42)
        .unwrap()
        .into_iter()
        .filter_map(|u| u.name)
        .collect();
    assert_eq!(names, vec!["mary", "fred"]);

    let ed = session.query::<User>().filter_by("name", "ed").one().unwrap();
    let own = session.phone_number_of(&ed).unwrap().unwrap();
    assert_eq!(own.phone_number, Some(123456789));
}

#[test]
fn test_shared_shipping_address_has_two_association_rows() {
    let (mut store, mapper) = walkthrough();
    let session = Session::begin(&mut store, &mapper).unwrap();

    let rows = session.shipping_preferences().unwrap();
    assert_eq!(rows.len(), 2);

    let address_ids: HashSet<i64> = rows.iter().map(|r| r.shipping_address_id).collect();
    assert_eq!(address_ids.len(), 1);

    let common = session.query::<Address>().first().unwrap().unwrap();
    assert!(address_ids.contains(&common.id));

    let names: Vec<String> = session
        .shipping_users_of(&common)
        .unwrap()
        .into_iter()
        .filter_map(|u| u.name)
        .collect();
    assert_eq!(names, vec!["ed", "mary"]);
}

#[test]
fn test_every_address_resolves_to_its_owner() {
    let (mut store, mapper) = walkthrough();
    let session = Session::begin(&mut store, &mapper).unwrap();

    let ed = session.query::<User>().filter_by("name", "ed").one().unwrap();
    let addresses = session.query::<Address>().all().unwrap();
    assert_eq!(addresses.len(), 3);

    for address in &addresses {
        let owner = session.owner_of(address).unwrap().unwrap();
        assert_eq!(owner.id, ed.id);
    }
    assert_eq!(session.addresses_of(&ed).unwrap(), addresses);
}

#[test]
fn test_mapping_matches_database_foreign_keys() {
    let store = SqliteStore::open_in_memory().unwrap();
    let mapper = Mapping::tutorial().configure().unwrap();

    for fk in mapper.foreign_keys() {
        let stored = store.foreign_keys(fk.table).unwrap();
        assert!(
            stored
                .iter()
                .any(|s| s.column == fk.column && s.target_table == fk.target_table && s.target_column == fk.target_column),
            "{} missing from the database schema",
            fk.qualified()
        );
    }
}

#[test]
fn test_uncommitted_changes_are_discarded() {
    let (mut store, mapper) = walkthrough();
    {
        let mut session = Session::begin(&mut store, &mapper).unwrap();
        session.add(NewUser::new("joe", "Joe Bloggs", "hunter2")).unwrap();
        session.add(NewPhoneNumber::new(7)).unwrap();
    }

    let stats = store.stats().unwrap();
    assert_eq!(stats.users, 4);
    assert_eq!(stats.phone_numbers, 2);
}

#[test]
fn test_file_backed_walkthrough_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("walkthrough.db");
    let mapper = Mapping::tutorial().configure().unwrap();

    {
        let mut store = SqliteStore::open(&path).unwrap();
        let report = demo::run(&mut store, &mapper).unwrap();
        assert_eq!(report.address_owners.len(), 3);
    }

    let store = SqliteStore::open(&path).unwrap();
    assert_eq!(store.stats().unwrap().shipping_preferences, 2);
}
