//! Session - unit of work over a [`SqliteStore`]
//!
//! A session keeps one transaction open on the store. Records are persisted
//! with [`Session::add`], relationships are changed through the [`Mapper`]
//! (which enforces cardinality before any SQL runs), and [`Session::commit`]
//! makes everything durable and opens the next transaction. Dropping a session
//! rolls back whatever was not committed.

use std::marker::PhantomData;

use rusqlite::{Connection, OptionalExtension, ToSql, params};

use crate::mapping::{EntityKind, JoinPath, Mapper, Related, ResolvedRelationship};
use crate::model::{
    Address, Entity, HouseAddress, NewAddress, NewHouseAddress, NewPhoneNumber, NewUser, PhoneNumber,
    ShippingPreference, User,
};
use crate::storage::SqliteStore;
use crate::{Error, Result};

fn log_sql(sql: &str) {
    tracing::debug!(target: "relmap::sql", "{}", sql.trim());
}

/// A pending record of any mapped kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewRecord {
    User(NewUser),
    Address(NewAddress),
    PhoneNumber(NewPhoneNumber),
    HouseAddress(NewHouseAddress),
}

impl From<NewUser> for NewRecord {
    fn from(value: NewUser) -> Self {
        NewRecord::User(value)
    }
}

impl From<NewAddress> for NewRecord {
    fn from(value: NewAddress) -> Self {
        NewRecord::Address(value)
    }
}

impl From<NewPhoneNumber> for NewRecord {
    fn from(value: NewPhoneNumber) -> Self {
        NewRecord::PhoneNumber(value)
    }
}

impl From<NewHouseAddress> for NewRecord {
    fn from(value: NewHouseAddress) -> Self {
        NewRecord::HouseAddress(value)
    }
}

/// A persisted record of any mapped kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    User(User),
    Address(Address),
    PhoneNumber(PhoneNumber),
    HouseAddress(HouseAddress),
}

impl Record {
    pub fn kind(&self) -> EntityKind {
        match self {
            Record::User(_) => EntityKind::User,
            Record::Address(_) => EntityKind::Address,
            Record::PhoneNumber(_) => EntityKind::PhoneNumber,
            Record::HouseAddress(_) => EntityKind::HouseAddress,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            Record::User(r) => r.id,
            Record::Address(r) => r.id,
            Record::PhoneNumber(r) => r.id,
            Record::HouseAddress(r) => r.id,
        }
    }
}

impl std::fmt::Display for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Record::User(r) => std::fmt::Display::fmt(r, f),
            Record::Address(r) => std::fmt::Display::fmt(r, f),
            Record::PhoneNumber(r) => std::fmt::Display::fmt(r, f),
            Record::HouseAddress(r) => std::fmt::Display::fmt(r, f),
        }
    }
}

/// Unit of work bound to one store and one configured mapping
pub struct Session<'s> {
    store: &'s mut SqliteStore,
    mapper: &'s Mapper,
}

impl<'s> Session<'s> {
    /// Open a session; starts a transaction on the store
    pub fn begin(store: &'s mut SqliteStore, mapper: &'s Mapper) -> Result<Self> {
        store.begin_transaction()?;
        tracing::debug!("session opened");
        Ok(Self { store, mapper })
    }

    pub fn mapper(&self) -> &Mapper {
        self.mapper
    }

    pub fn store(&self) -> &SqliteStore {
        &*self.store
    }

    fn conn(&self) -> &Connection {
        self.store.conn()
    }

    fn execute<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<usize> {
        log_sql(sql);
        Ok(self.conn().execute(sql, params)?)
    }

    // ========== Persisting ==========

    /// Persist a pending record and return it with its assigned id
    pub fn add(&mut self, record: impl Into<NewRecord>) -> Result<Record> {
        let record = match record.into() {
            NewRecord::User(user) => Record::User(self.add_user(user)?),
            NewRecord::Address(address) => Record::Address(self.add_address(address)?),
            NewRecord::PhoneNumber(phone) => Record::PhoneNumber(self.add_phone_number(phone)?),
            NewRecord::HouseAddress(house) => Record::HouseAddress(self.add_house_address(house)?),
        };
        tracing::debug!("added {}", record);
        Ok(record)
    }

    /// Persist several records in order; stops at the first failure
    pub fn add_all(&mut self, records: impl IntoIterator<Item = NewRecord>) -> Result<Vec<Record>> {
        records.into_iter().map(|record| self.add(record)).collect()
    }

    pub fn add_user(&mut self, user: NewUser) -> Result<User> {
        self.execute(
            "INSERT INTO users (name, fullname, password) VALUES (?1, ?2, ?3)",
            params![user.name, user.fullname, user.password],
        )?;
        self.get(self.conn().last_insert_rowid())
    }

    pub fn add_address(&mut self, address: NewAddress) -> Result<Address> {
        let email_address = address.validated()?;
        self.execute(
            "INSERT INTO addresses (email_address) VALUES (?1)",
            params![email_address],
        )?;
        self.get(self.conn().last_insert_rowid())
    }

    pub fn add_phone_number(&mut self, phone: NewPhoneNumber) -> Result<PhoneNumber> {
        self.execute(
            "INSERT INTO phone_numbers (phone_number) VALUES (?1)",
            params![phone.phone_number],
        )?;
        self.get(self.conn().last_insert_rowid())
    }

    pub fn add_house_address(&mut self, house: NewHouseAddress) -> Result<HouseAddress> {
        let (state, zip) = house.validated()?;
        self.execute(
            "INSERT INTO house_addresses (state, zip) VALUES (?1, ?2)",
            params![state, zip],
        )?;
        self.get(self.conn().last_insert_rowid())
    }

    // ========== Loading ==========

    /// Load a record by primary key
    pub fn get<E: Entity>(&self, id: i64) -> Result<E> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = ?1",
            E::KIND.columns().join(", "),
            E::KIND.table()
        );
        log_sql(&sql);
        self.conn()
            .query_row(&sql, [id], |row| E::from_row(row))
            .optional()?
            .ok_or_else(|| Error::NotFound {
                entity: E::KIND.to_string(),
                id,
            })
    }

    /// Reload a record from the store
    pub fn refresh<E: Entity>(&self, entity: &E) -> Result<E> {
        self.get(entity.id())
    }

    /// Start a query over one entity kind
    pub fn query<E: Entity>(&self) -> Query<'_, E> {
        Query::new(self.conn())
    }

    fn ensure_exists(&self, kind: EntityKind, id: i64) -> Result<()> {
        let sql = format!("SELECT 1 FROM {} WHERE id = ?1", kind.table());
        let found: Option<i64> = self.conn().query_row(&sql, [id], |row| row.get(0)).optional()?;
        match found {
            Some(_) => Ok(()),
            None => Err(Error::NotFound {
                entity: kind.to_string(),
                id,
            }),
        }
    }

    // ========== Relationships ==========

    /// Replace the value of a relationship attribute.
    ///
    /// Scalar relationships take [`Related::One`] or [`Related::None`];
    /// collections take [`Related::Many`] (or `None` to empty them). A value
    /// of the wrong shape is rejected before the store is touched.
    pub fn set_related<S: Entity>(&mut self, source: &S, name: &str, value: Related) -> Result<()> {
        let rel = self.mapper.relationship(S::KIND, name)?;
        rel.check_assignment(&value)?;
        self.ensure_exists(rel.source, source.id())?;

        let ids = value.ids();
        for id in &ids {
            self.ensure_exists(rel.target, *id)?;
        }

        let source_id = source.id();
        match rel.join {
            JoinPath::Local { column } => {
                let sql = format!("UPDATE {} SET {} = ?1 WHERE id = ?2", rel.source.table(), column);
                self.execute(&sql, params![ids.first(), source_id])?;
            }
            JoinPath::Remote { column } => {
                let table = rel.target.table();
                let detach = format!("UPDATE {} SET {} = NULL WHERE {} = ?1", table, column, column);
                self.execute(&detach, [source_id])?;
                let attach = format!("UPDATE {} SET {} = ?1 WHERE id = ?2", table, column);
                for id in ids {
                    self.execute(&attach, [source_id, id])?;
                }
            }
            JoinPath::Secondary {
                table,
                local_column,
                remote_column,
            } => {
                let clear = format!("DELETE FROM {} WHERE {} = ?1", table, local_column);
                self.execute(&clear, [source_id])?;
                let insert = format!(
                    "INSERT OR IGNORE INTO {} ({}, {}) VALUES (?1, ?2)",
                    table, local_column, remote_column
                );
                for id in ids {
                    self.execute(&insert, [source_id, id])?;
                }
            }
        }

        tracing::debug!("set {} on {} #{}", rel.qualified_name(), S::KIND, source_id);
        Ok(())
    }

    /// Add one target to a collection relationship
    pub fn append_related<S: Entity, T: Entity>(&mut self, source: &S, name: &str, target: &T) -> Result<()> {
        let rel = self.collection(S::KIND, name, T::KIND, "append to")?;
        self.ensure_exists(rel.source, source.id())?;
        self.ensure_exists(rel.target, target.id())?;

        match rel.join {
            JoinPath::Remote { column } => {
                let sql = format!("UPDATE {} SET {} = ?1 WHERE id = ?2", rel.target.table(), column);
                self.execute(&sql, [source.id(), target.id()])?;
            }
            JoinPath::Secondary {
                table,
                local_column,
                remote_column,
            } => {
                let sql = format!(
                    "INSERT OR IGNORE INTO {} ({}, {}) VALUES (?1, ?2)",
                    table, local_column, remote_column
                );
                self.execute(&sql, [source.id(), target.id()])?;
            }
            JoinPath::Local { .. } => return Err(scalar_collection(rel, "append to")),
        }
        Ok(())
    }

    /// Remove one target from a collection relationship
    pub fn remove_related<S: Entity, T: Entity>(&mut self, source: &S, name: &str, target: &T) -> Result<()> {
        let rel = self.collection(S::KIND, name, T::KIND, "remove from")?;

        match rel.join {
            JoinPath::Remote { column } => {
                let sql = format!(
                    "UPDATE {} SET {} = NULL WHERE id = ?1 AND {} = ?2",
                    rel.target.table(),
                    column,
                    column
                );
                self.execute(&sql, [target.id(), source.id()])?;
            }
            JoinPath::Secondary {
                table,
                local_column,
                remote_column,
            } => {
                let sql = format!(
                    "DELETE FROM {} WHERE {} = ?1 AND {} = ?2",
                    table, local_column, remote_column
                );
                self.execute(&sql, [source.id(), target.id()])?;
            }
            JoinPath::Local { .. } => return Err(scalar_collection(rel, "remove from")),
        }
        Ok(())
    }

    fn collection(
        &self,
        source: EntityKind,
        name: &str,
        target: EntityKind,
        action: &str,
    ) -> Result<&'s ResolvedRelationship> {
        let mapper: &'s Mapper = self.mapper;
        let rel = mapper.relationship(source, name)?;
        check_target(rel, target)?;
        // a local foreign key column holds one value whatever uselist says
        if !rel.uselist || matches!(rel.join, JoinPath::Local { .. }) {
            return Err(scalar_collection(rel, action));
        }
        Ok(rel)
    }

    /// Navigate a relationship from `source`, ordered by the relationship's
    /// `order_by` column (primary key otherwise)
    pub fn load_related<S: Entity, T: Entity>(&self, source: &S, name: &str) -> Result<Vec<T>> {
        let rel = self.mapper.relationship(S::KIND, name)?;
        check_target(rel, T::KIND)?;

        let columns = T::KIND
            .columns()
            .iter()
            .map(|c| format!("t.{}", c))
            .collect::<Vec<_>>()
            .join(", ");
        let target = T::KIND.table();

        let mut sql = match rel.join {
            JoinPath::Local { column } => format!(
                "SELECT {} FROM {} t WHERE t.id = (SELECT {} FROM {} WHERE id = ?1)",
                columns,
                target,
                column,
                S::KIND.table()
            ),
            JoinPath::Remote { column } => {
                format!("SELECT {} FROM {} t WHERE t.{} = ?1", columns, target, column)
            }
            JoinPath::Secondary {
                table,
                local_column,
                remote_column,
            } => format!(
                "SELECT {} FROM {} t JOIN {} s ON s.{} = t.id WHERE s.{} = ?1",
                columns, target, table, remote_column, local_column
            ),
        };
        sql.push_str(&format!(" ORDER BY t.{}", rel.order_by.unwrap_or("id")));
        log_sql(&sql);

        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt
            .query_map([source.id()], |row| T::from_row(row))?
            .collect::<rusqlite::Result<Vec<T>>>()?;
        Ok(rows)
    }

    fn load_one<S: Entity, T: Entity>(&self, source: &S, name: &str) -> Result<Option<T>> {
        Ok(self.load_related(source, name)?.into_iter().next())
    }

    pub fn addresses_of(&self, user: &User) -> Result<Vec<Address>> {
        self.load_related(user, "addresses")
    }

    pub fn owner_of(&self, address: &Address) -> Result<Option<User>> {
        self.load_one(address, "user")
    }

    pub fn phone_number_of(&self, user: &User) -> Result<Option<PhoneNumber>> {
        self.load_one(user, "phone_number")
    }

    pub fn users_with_phone(&self, phone: &PhoneNumber) -> Result<Vec<User>> {
        self.load_related(phone, "users")
    }

    pub fn home_address_of(&self, user: &User) -> Result<Option<HouseAddress>> {
        self.load_one(user, "home_address")
    }

    pub fn delivery_address_of(&self, user: &User) -> Result<Option<HouseAddress>> {
        self.load_one(user, "delivery_address")
    }

    pub fn shipping_addresses_of(&self, user: &User) -> Result<Vec<Address>> {
        self.load_related(user, "shipping_address")
    }

    pub fn shipping_users_of(&self, address: &Address) -> Result<Vec<User>> {
        self.load_related(address, "users")
    }

    /// Rows of the shipping_preferences association table
    pub fn shipping_preferences(&self) -> Result<Vec<ShippingPreference>> {
        let sql = "SELECT user_id, shipping_address_id FROM shipping_preferences ORDER BY user_id, shipping_address_id";
        log_sql(sql);
        let mut stmt = self.conn().prepare(sql)?;
        let rows = stmt
            .query_map([], ShippingPreference::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    // ========== Transactions ==========

    /// Commit the current transaction and open the next one
    pub fn commit(&mut self) -> Result<()> {
        self.store.commit()?;
        tracing::info!("session committed");
        self.store.begin_transaction()?;
        Ok(())
    }

    /// Discard uncommitted changes and open the next transaction
    pub fn rollback(&mut self) -> Result<()> {
        self.store.rollback()?;
        tracing::info!("session rolled back");
        self.store.begin_transaction()?;
        Ok(())
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        if !self.store.is_autocommit() {
            if let Err(e) = self.store.rollback() {
                tracing::warn!("rollback on session close failed: {}", e);
            }
        }
    }
}

fn scalar_collection(rel: &ResolvedRelationship, action: &str) -> Error {
    Error::Cardinality {
        relationship: rel.qualified_name(),
        reason: format!("holds a single {}; cannot {} it", rel.target, action),
    }
}

fn check_target(rel: &ResolvedRelationship, found: EntityKind) -> Result<()> {
    if rel.target == found {
        Ok(())
    } else {
        Err(Error::TargetMismatch {
            relationship: rel.qualified_name(),
            expected: rel.target.to_string(),
            found: found.to_string(),
        })
    }
}

/// `filter_by`-style query over one entity kind
pub struct Query<'s, E> {
    conn: &'s Connection,
    filters: Vec<(String, Box<dyn ToSql + 's>)>,
    order_by: Option<String>,
    _marker: PhantomData<E>,
}

impl<'s, E: Entity> Query<'s, E> {
    fn new(conn: &'s Connection) -> Self {
        Self {
            conn,
            filters: Vec::new(),
            order_by: None,
            _marker: PhantomData,
        }
    }

    /// Keep rows where `column = value`
    pub fn filter_by<V: ToSql + 's>(mut self, column: &str, value: V) -> Self {
        self.filters.push((column.to_string(), Box::new(value)));
        self
    }

    /// Order by a column (primary key by default)
    pub fn order_by(mut self, column: &str) -> Self {
        self.order_by = Some(column.to_string());
        self
    }

    fn check_column(column: &str) -> Result<()> {
        if E::KIND.has_column(column) {
            Ok(())
        } else {
            Err(Error::UnknownColumn {
                table: E::KIND.table().to_string(),
                column: column.to_string(),
            })
        }
    }

    fn where_clause(&self) -> Result<String> {
        let mut conditions = Vec::with_capacity(self.filters.len());
        for (i, (column, _)) in self.filters.iter().enumerate() {
            Self::check_column(column)?;
            conditions.push(format!("{} = ?{}", column, i + 1));
        }
        if conditions.is_empty() {
            Ok(String::new())
        } else {
            Ok(format!(" WHERE {}", conditions.join(" AND ")))
        }
    }

    fn describe(&self) -> String {
        let columns: Vec<&str> = self.filters.iter().map(|(c, _)| c.as_str()).collect();
        if columns.is_empty() {
            E::KIND.to_string()
        } else {
            format!("{} filtered by {}", E::KIND, columns.join(", "))
        }
    }

    fn fetch(&self, limit: Option<usize>) -> Result<Vec<E>> {
        let order = self.order_by.as_deref().unwrap_or("id");
        Self::check_column(order)?;

        let mut sql = format!(
            "SELECT {} FROM {}{} ORDER BY {}",
            E::KIND.columns().join(", "),
            E::KIND.table(),
            self.where_clause()?,
            order
        );
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        log_sql(&sql);

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(
                rusqlite::params_from_iter(self.filters.iter().map(|(_, v)| v)),
                |row| E::from_row(row),
            )?
            .collect::<rusqlite::Result<Vec<E>>>()?;
        Ok(rows)
    }

    /// All matching rows
    pub fn all(&self) -> Result<Vec<E>> {
        self.fetch(None)
    }

    /// First matching row, if any
    pub fn first(&self) -> Result<Option<E>> {
        Ok(self.fetch(Some(1))?.into_iter().next())
    }

    /// Exactly one matching row
    pub fn one(&self) -> Result<E> {
        let mut rows = self.fetch(Some(2))?;
        match rows.len() {
            0 => Err(Error::NoResultFound(self.describe())),
            1 => Ok(rows.remove(0)),
            _ => Err(Error::MultipleResultsFound(self.describe())),
        }
    }

    pub fn count(&self) -> Result<usize> {
        let sql = format!("SELECT COUNT(*) FROM {}{}", E::KIND.table(), self.where_clause()?);
        log_sql(&sql);
        let count: i64 = self.conn.query_row(
            &sql,
            rusqlite::params_from_iter(self.filters.iter().map(|(_, v)| v)),
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{ForeignKey, Mapping, Relationship};

    fn setup() -> (SqliteStore, Mapper) {
        let store = SqliteStore::open_in_memory().unwrap();
        let mapper = Mapping::tutorial().configure().unwrap();
        (store, mapper)
    }

    #[test]
    fn test_user_ids_are_assigned() {
        let (mut store, mapper) = setup();
        let mut session = Session::begin(&mut store, &mapper).unwrap();

        let ed = session.add_user(NewUser::new("ed", "Ed Jones", "edspassword")).unwrap();
        let wendy = session.add_user(NewUser::new("wendy", "Wendy Williams", "foobar")).unwrap();

        assert_ne!(ed.id, wendy.id);
        assert_eq!(session.get::<User>(ed.id).unwrap(), ed);
    }

    #[test]
    fn test_query_one() {
        let (mut store, mapper) = setup();
        let mut session = Session::begin(&mut store, &mapper).unwrap();
        session.add(NewUser::new("mary", "Mary Contrary", "xxg527")).unwrap();
        session.add(NewUser::new("fred", "Fred Flinstone", "blah")).unwrap();
        session.add(NewUser::new("fred", "Fred Astaire", "dance")).unwrap();

        let mary = session.query::<User>().filter_by("name", "mary").one().unwrap();
        assert_eq!(mary.fullname.as_deref(), Some("Mary Contrary"));

        let err = session.query::<User>().filter_by("name", "fred").one().unwrap_err();
        assert!(matches!(err, Error::MultipleResultsFound(_)));

        let err = session.query::<User>().filter_by("name", "wendy").one().unwrap_err();
        assert!(matches!(err, Error::NoResultFound(_)));

        assert_eq!(session.query::<User>().filter_by("name", "fred").count().unwrap(), 2);
    }

    #[test]
    fn test_query_unknown_column() {
        let (mut store, mapper) = setup();
        let session = Session::begin(&mut store, &mapper).unwrap();

        let err = session.query::<User>().filter_by("email", "x").all().unwrap_err();
        assert!(matches!(err, Error::UnknownColumn { .. }));
    }

    #[test]
    fn test_missing_required_field() {
        let (mut store, mapper) = setup();
        let mut session = Session::begin(&mut store, &mapper).unwrap();

        let err = session.add(NewAddress::default()).unwrap_err();
        assert!(matches!(err, Error::MissingField { .. }));
        assert_eq!(session.query::<Address>().count().unwrap(), 0);
    }

    #[test]
    fn test_phone_number_rejects_collection() {
        let (mut store, mapper) = setup();
        let mut session = Session::begin(&mut store, &mapper).unwrap();

        let ed = session.add_user(NewUser::new("ed", "Ed Jones", "edspassword")).unwrap();
        let a = session.add_phone_number(NewPhoneNumber::new(123456789)).unwrap();
        let b = session.add_phone_number(NewPhoneNumber::new(987654321)).unwrap();

        let err = session
            .set_related(&ed, "phone_number", Related::many([&a, &b]))
            .unwrap_err();
        assert!(matches!(err, Error::Cardinality { .. }));
        assert_eq!(session.phone_number_of(&ed).unwrap(), None);

        let err = session.append_related(&ed, "phone_number", &a).unwrap_err();
        assert!(matches!(err, Error::Cardinality { .. }));

        session.set_related(&ed, "phone_number", Related::one(&a)).unwrap();
        assert_eq!(session.phone_number_of(&ed).unwrap(), Some(a));
    }

    #[test]
    fn test_shared_phone_number() {
        let (mut store, mapper) = setup();
        let mut session = Session::begin(&mut store, &mapper).unwrap();

        let mary = session.add_user(NewUser::new("mary", "Mary Contrary", "xxg527")).unwrap();
        let fred = session.add_user(NewUser::new("fred", "Fred Flinstone", "blah")).unwrap();
        let phone = session.add_phone_number(NewPhoneNumber::new(42)).unwrap();

        session.set_related(&mary, "phone_number", Related::one(&phone)).unwrap();
        session.set_related(&fred, "phone_number", Related::one(&phone)).unwrap();

        let users = session.users_with_phone(&phone).unwrap();
        let names: Vec<_> = users.iter().filter_map(|u| u.name.as_deref()).collect();
        assert_eq!(names, vec!["mary", "fred"]);
    }

    #[test]
    fn test_addresses_back_reference() {
        let (mut store, mapper) = setup();
        let mut session = Session::begin(&mut store, &mapper).unwrap();

        let ed = session.add_user(NewUser::new("ed", "Ed Jones", "edspassword")).unwrap();
        let home = session.add_address(NewAddress::new("ed@home.de")).unwrap();
        let work = session.add_address(NewAddress::new("ed@work.de")).unwrap();

        session
            .set_related(&ed, "addresses", Related::many([&work, &home]))
            .unwrap();

        let emails: Vec<_> = session
            .addresses_of(&ed)
            .unwrap()
            .into_iter()
            .map(|a| a.email_address)
            .collect();
        assert_eq!(emails, vec!["ed@home.de", "ed@work.de"]);
        assert_eq!(session.owner_of(&home).unwrap().map(|u| u.id), Some(ed.id));

        // replacing the collection detaches the old members
        session.set_related(&ed, "addresses", Related::many([&work])).unwrap();
        assert_eq!(session.owner_of(&home).unwrap(), None);

        session.remove_related(&ed, "addresses", &work).unwrap();
        assert!(session.addresses_of(&ed).unwrap().is_empty());
    }

    #[test]
    fn test_shipping_many_to_many() {
        let (mut store, mapper) = setup();
        let mut session = Session::begin(&mut store, &mapper).unwrap();

        let ed = session.add_user(NewUser::new("ed", "Ed Jones", "edspassword")).unwrap();
        let mary = session.add_user(NewUser::new("mary", "Mary Contrary", "xxg527")).unwrap();
        let common = session.add_address(NewAddress::new("ed@home.de")).unwrap();

        session.append_related(&ed, "shipping_address", &common).unwrap();
        session.append_related(&mary, "shipping_address", &common).unwrap();
        // appending twice keeps a single row
        session.append_related(&mary, "shipping_address", &common).unwrap();

        let rows = session.shipping_preferences().unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.shipping_address_id == common.id));

        let users: Vec<i64> = session.shipping_users_of(&common).unwrap().iter().map(|u| u.id).collect();
        assert_eq!(users, vec![ed.id, mary.id]);
        assert_eq!(session.shipping_addresses_of(&ed).unwrap(), vec![common.clone()]);

        session.remove_related(&common, "users", &ed).unwrap();
        assert_eq!(session.shipping_preferences().unwrap().len(), 1);
    }

    #[test]
    fn test_home_and_delivery_are_distinct() {
        let (mut store, mapper) = setup();
        let mut session = Session::begin(&mut store, &mapper).unwrap();

        let ed = session.add_user(NewUser::new("ed", "Ed Jones", "edspassword")).unwrap();
        let h0 = session.add_house_address(NewHouseAddress::new("Bavaria", "8051")).unwrap();
        let h1 = session.add_house_address(NewHouseAddress::new("Bavaria", "8052")).unwrap();

        session.set_related(&ed, "home_address", Related::one(&h0)).unwrap();
        session.set_related(&ed, "delivery_address", Related::one(&h1)).unwrap();
        session.commit().unwrap();

        assert_eq!(session.home_address_of(&ed).unwrap(), Some(h0.clone()));
        assert_eq!(session.delivery_address_of(&ed).unwrap(), Some(h1.clone()));

        let ed = session.refresh(&ed).unwrap();
        assert_eq!(ed.home_address_id, Some(h0.id));
        assert_eq!(ed.delivery_address_id, Some(h1.id));
    }

    #[test]
    fn test_missing_target_rejected() {
        let (mut store, mapper) = setup();
        let mut session = Session::begin(&mut store, &mapper).unwrap();

        let ed = session.add_user(NewUser::new("ed", "Ed Jones", "edspassword")).unwrap();
        let err = session
            .set_related(&ed, "home_address", Related::One(99))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { id: 99, .. }));
    }

    #[test]
    fn test_missing_source_rejected() {
        let (mut store, mapper) = setup();
        let mut session = Session::begin(&mut store, &mapper).unwrap();

        let h0 = session.add_house_address(NewHouseAddress::new("Bavaria", "8051")).unwrap();
        let address = session.add_address(NewAddress::new("ed@home.de")).unwrap();
        let ghost = User {
            id: 99,
            name: Some("ghost".to_string()),
            fullname: None,
            password: None,
            phone_number_id: None,
            delivery_address_id: None,
            home_address_id: None,
        };

        let err = session
            .set_related(&ghost, "home_address", Related::one(&h0))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { id: 99, .. }));

        let err = session.append_related(&ghost, "addresses", &address).unwrap_err();
        assert!(matches!(err, Error::NotFound { id: 99, .. }));

        // nothing was attached to the missing user
        let err = session.set_related(&ghost, "addresses", Related::None).unwrap_err();
        assert!(matches!(err, Error::NotFound { id: 99, .. }));
        assert_eq!(session.owner_of(&address).unwrap(), None);
    }

    #[test]
    fn test_scalar_foreign_key_is_not_a_collection() {
        let (mut store, mapper) = setup();
        let mut session = Session::begin(&mut store, &mapper).unwrap();

        let ed = session.add_user(NewUser::new("ed", "Ed Jones", "edspassword")).unwrap();
        let address = session.add_address(NewAddress::new("ed@home.de")).unwrap();
        session.set_related(&address, "user", Related::one(&ed)).unwrap();

        let err = session.append_related(&address, "user", &ed).unwrap_err();
        assert!(matches!(err, Error::Cardinality { .. }));
        let err = session.remove_related(&address, "user", &ed).unwrap_err();
        assert!(matches!(err, Error::Cardinality { .. }));

        assert_eq!(session.owner_of(&address).unwrap().map(|u| u.id), Some(ed.id));
    }

    #[test]
    fn test_scalar_one_to_many_replaces_previous_target() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let mapper = Mapping::new()
            .foreign_key(ForeignKey::to_id("addresses", "user_id", "users"))
            .relationship(
                Relationship::new(EntityKind::User, "primary_address", EntityKind::Address).uselist(false),
            )
            .configure()
            .unwrap();
        let mut session = Session::begin(&mut store, &mapper).unwrap();

        let ed = session.add_user(NewUser::new("ed", "Ed Jones", "edspassword")).unwrap();
        let a1 = session.add_address(NewAddress::new("ed@home.de")).unwrap();
        let a2 = session.add_address(NewAddress::new("ed@work.de")).unwrap();

        session.set_related(&ed, "primary_address", Related::one(&a1)).unwrap();
        session.set_related(&ed, "primary_address", Related::one(&a2)).unwrap();

        assert_eq!(session.refresh(&a1).unwrap().user_id, None);
        let held: Vec<Address> = session.load_related(&ed, "primary_address").unwrap();
        assert_eq!(held, vec![session.refresh(&a2).unwrap()]);

        let err = session
            .set_related(&ed, "primary_address", Related::many([&a1, &a2]))
            .unwrap_err();
        assert!(matches!(err, Error::Cardinality { .. }));
        assert_eq!(session.refresh(&a1).unwrap().user_id, None);
    }

    #[test]
    fn test_wrong_target_kind() {
        let (mut store, mapper) = setup();
        let mut session = Session::begin(&mut store, &mapper).unwrap();

        let ed = session.add_user(NewUser::new("ed", "Ed Jones", "edspassword")).unwrap();
        let err = session.load_related::<User, PhoneNumber>(&ed, "addresses").unwrap_err();
        assert!(matches!(err, Error::TargetMismatch { .. }));
    }

    #[test]
    fn test_drop_rolls_back() {
        let (mut store, mapper) = setup();
        {
            let mut session = Session::begin(&mut store, &mapper).unwrap();
            session.add(NewUser::new("ed", "Ed Jones", "edspassword")).unwrap();
            session.commit().unwrap();
            session.add(NewUser::new("wendy", "Wendy Williams", "foobar")).unwrap();
        }

        assert!(store.is_autocommit());
        assert_eq!(store.stats().unwrap().users, 1);
    }

    #[test]
    fn test_add_all_returns_records_in_order() {
        let (mut store, mapper) = setup();
        let mut session = Session::begin(&mut store, &mapper).unwrap();

        let records = session
            .add_all(vec![
                NewPhoneNumber::new(42).into(),
                NewUser::new("wendy", "Wendy Williams", "foobar").into(),
                NewHouseAddress::new("Bavaria", "8051").into(),
            ])
            .unwrap();

        let kinds: Vec<_> = records.iter().map(Record::kind).collect();
        assert_eq!(
            kinds,
            vec![EntityKind::PhoneNumber, EntityKind::User, EntityKind::HouseAddress]
        );
        assert_eq!(records[1].to_string(), "<User(name='wendy', fullname='Wendy Williams', password='foobar')>");
    }
}
