//! Entity records
//!
//! Persisted records carry their assigned `id`. The `New*` types are pending
//! records handed to [`Session::add`](crate::Session::add); their fields are
//! optional so that a record missing a required field can be built and is
//! rejected when it is persisted.

use crate::mapping::EntityKind;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// A mapped record type with an integer primary key.
pub trait Entity: Sized {
    const KIND: EntityKind;

    fn id(&self) -> i64;

    /// Build from a row selected with `KIND.columns()` in order
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self>;
}

fn show(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("None")
}

fn require(entity: EntityKind, field: &str, value: Option<String>) -> Result<String> {
    value.ok_or_else(|| Error::MissingField {
        entity: entity.to_string(),
        field: field.to_string(),
    })
}

// ========== User ==========

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: Option<String>,
    pub fullname: Option<String>,
    pub password: Option<String>,
    pub phone_number_id: Option<i64>,
    pub delivery_address_id: Option<i64>,
    pub home_address_id: Option<i64>,
}

impl Entity for User {
    const KIND: EntityKind = EntityKind::User;

    fn id(&self) -> i64 {
        self.id
    }

    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(User {
            id: row.get(0)?,
            name: row.get(1)?,
            fullname: row.get(2)?,
            password: row.get(3)?,
            phone_number_id: row.get(4)?,
            delivery_address_id: row.get(5)?,
            home_address_id: row.get(6)?,
        })
    }
}

impl std::fmt::Display for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "<User(name='{}', fullname='{}', password='{}')>",
            show(&self.name),
            show(&self.fullname),
            show(&self.password)
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub name: Option<String>,
    pub fullname: Option<String>,
    pub password: Option<String>,
}

impl NewUser {
    pub fn new(name: &str, fullname: &str, password: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            fullname: Some(fullname.to_string()),
            password: Some(password.to_string()),
        }
    }
}

// ========== Address ==========

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub id: i64,
    pub email_address: String,
    pub user_id: Option<i64>,
}

impl Entity for Address {
    const KIND: EntityKind = EntityKind::Address;

    fn id(&self) -> i64 {
        self.id
    }

    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Address {
            id: row.get(0)?,
            email_address: row.get(1)?,
            user_id: row.get(2)?,
        })
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<Address(email_address='{}')>", self.email_address)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAddress {
    pub email_address: Option<String>,
}

impl NewAddress {
    pub fn new(email_address: &str) -> Self {
        Self {
            email_address: Some(email_address.to_string()),
        }
    }

    /// The required email address, or `MissingField`
    pub fn validated(self) -> Result<String> {
        require(EntityKind::Address, "email_address", self.email_address)
    }
}

// ========== PhoneNumber ==========

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneNumber {
    pub id: i64,
    pub phone_number: Option<i64>,
}

impl Entity for PhoneNumber {
    const KIND: EntityKind = EntityKind::PhoneNumber;

    fn id(&self) -> i64 {
        self.id
    }

    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(PhoneNumber {
            id: row.get(0)?,
            phone_number: row.get(1)?,
        })
    }
}

impl std::fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.phone_number {
            Some(number) => write!(f, "<PhoneNumber(phone_number={})>", number),
            None => write!(f, "<PhoneNumber(phone_number=None)>"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPhoneNumber {
    pub phone_number: Option<i64>,
}

impl NewPhoneNumber {
    pub fn new(phone_number: i64) -> Self {
        Self {
            phone_number: Some(phone_number),
        }
    }
}

// ========== HouseAddress ==========

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HouseAddress {
    pub id: i64,
    pub state: String,
    pub zip: String,
}

impl Entity for HouseAddress {
    const KIND: EntityKind = EntityKind::HouseAddress;

    fn id(&self) -> i64 {
        self.id
    }

    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(HouseAddress {
            id: row.get(0)?,
            state: row.get(1)?,
            zip: row.get(2)?,
        })
    }
}

impl std::fmt::Display for HouseAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<HouseAddress(state='{}', zip='{}')>", self.state, self.zip)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewHouseAddress {
    pub state: Option<String>,
    pub zip: Option<String>,
}

impl NewHouseAddress {
    pub fn new(state: &str, zip: &str) -> Self {
        Self {
            state: Some(state.to_string()),
            zip: Some(zip.to_string()),
        }
    }

    /// The required `(state, zip)`, or `MissingField`
    pub fn validated(self) -> Result<(String, String)> {
        let state = require(EntityKind::HouseAddress, "state", self.state)?;
        let zip = require(EntityKind::HouseAddress, "zip", self.zip)?;
        Ok((state, zip))
    }
}

// ========== ShippingPreference ==========

/// A row of the `shipping_preferences` association table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShippingPreference {
    pub user_id: i64,
    pub shipping_address_id: i64,
}

impl ShippingPreference {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(ShippingPreference {
            user_id: row.get(0)?,
            shipping_address_id: row.get(1)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_repr() {
        let user = User {
            id: 1,
            name: Some("ed".into()),
            fullname: Some("Ed Jones".into()),
            password: None,
            phone_number_id: None,
            delivery_address_id: None,
            home_address_id: None,
        };
        assert_eq!(
            user.to_string(),
            "<User(name='ed', fullname='Ed Jones', password='None')>"
        );
    }

    #[test]
    fn test_address_repr() {
        let address = Address {
            id: 3,
            email_address: "ed@home.de".into(),
            user_id: Some(1),
        };
        assert_eq!(address.to_string(), "<Address(email_address='ed@home.de')>");
    }

    #[test]
    fn test_required_fields() {
        let err = NewAddress::default().validated().unwrap_err();
        assert!(matches!(err, Error::MissingField { ref field, .. } if field == "email_address"));

        let err = NewHouseAddress {
            state: Some("Bavaria".into()),
            zip: None,
        }
        .validated()
        .unwrap_err();
        assert!(matches!(err, Error::MissingField { ref field, .. } if field == "zip"));

        let (state, zip) = NewHouseAddress::new("Bavaria", "8051").validated().unwrap();
        assert_eq!((state.as_str(), zip.as_str()), ("Bavaria", "8051"));
    }
}
