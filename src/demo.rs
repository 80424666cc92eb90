//! Walkthrough driver
//!
//! Populates the store, links records through every relationship shape,
//! commits, then reads everything back into a [`DemoReport`].

use serde::Serialize;

use crate::mapping::{Mapper, Related};
use crate::model::{
    Address, HouseAddress, NewAddress, NewHouseAddress, NewPhoneNumber, NewUser, PhoneNumber,
    ShippingPreference, User,
};
use crate::session::Session;
use crate::storage::{DbStats, SqliteStore};
use crate::{Error, Result};

const ED_EMAILS: &[&str] = &["ed@home.de", "ed@work.de", "ed@vacation.de"];

#[derive(Debug, Clone, Serialize)]
pub struct AddressOwner {
    pub address: Address,
    pub owner: Option<User>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PhoneUsers {
    pub phone: PhoneNumber,
    pub users: Vec<User>,
}

/// What the walkthrough reads back after its final commit
#[derive(Debug, Clone, Serialize)]
pub struct DemoReport {
    pub address_owners: Vec<AddressOwner>,
    pub phone_users: Vec<PhoneUsers>,
    pub home_address: Option<HouseAddress>,
    pub delivery_address: Option<HouseAddress>,
    pub shipping_preferences: Vec<ShippingPreference>,
    /// Error raised when a collection was assigned to `User.phone_number`
    pub rejected_assignment: Option<String>,
    pub stats: DbStats,
}

/// Assign a list to the scalar `User.phone_number`. The cardinality error
/// is the expected outcome and is returned as text; anything else propagates.
fn assign_phone_collection(session: &mut Session<'_>, user: &User, phones: &[PhoneNumber]) -> Result<Option<String>> {
    match session.set_related(user, "phone_number", Related::many(phones)) {
        Ok(()) => Ok(None),
        Err(e @ Error::Cardinality { .. }) => {
            tracing::info!("collection assignment rejected: {}", e);
            Ok(Some(e.to_string()))
        }
        Err(e) => Err(e),
    }
}

/// Run the walkthrough against `store`
pub fn run(store: &mut SqliteStore, mapper: &Mapper) -> Result<DemoReport> {
    let mut session = Session::begin(store, mapper)?;

    let ed = session.add_user(NewUser::new("ed", "Ed Jones", "edspassword"))?;
    session.add_all(vec![
        NewPhoneNumber::new(42).into(),
        NewUser::new("wendy", "Wendy Williams", "foobar").into(),
        NewUser::new("mary", "Mary Contrary", "xxg527").into(),
        NewUser::new("fred", "Fred Flinstone", "blah").into(),
        NewHouseAddress::new("Bavaria", "8051").into(),
        NewHouseAddress::new("Bavaria", "8052").into(),
    ])?;
    session.commit()?;

    let mary = session.query::<User>().filter_by("name", "mary").one()?;
    let fred = session.query::<User>().filter_by("name", "fred").one()?;

    // one-to-many
    let addresses = ED_EMAILS
        .iter()
        .map(|email| session.add_address(NewAddress::new(email)))
        .collect::<Result<Vec<_>>>()?;
    session.set_related(&ed, "addresses", Related::many(&addresses))?;

    // two foreign keys into house_addresses
    let houses = session.query::<HouseAddress>().all()?;
    let [h0, h1, ..] = houses.as_slice() else {
        return Err(Error::NoResultFound("two HouseAddress rows".to_string()));
    };
    session.set_related(&ed, "home_address", Related::one(h0))?;
    session.set_related(&ed, "delivery_address", Related::one(h1))?;

    // scalar association
    let own_phone = session.add_phone_number(NewPhoneNumber::new(123456789))?;
    session.set_related(&ed, "phone_number", Related::one(&own_phone))?;

    let phone_42 = session
        .query::<PhoneNumber>()
        .filter_by("phone_number", 42)
        .one()?;
    let rejected_assignment = assign_phone_collection(&mut session, &ed, &[own_phone, phone_42.clone()])?;

    session.set_related(&mary, "phone_number", Related::one(&phone_42))?;
    session.set_related(&fred, "phone_number", Related::one(&phone_42))?;

    // many-to-many through shipping_preferences
    let common_address = session
        .query::<Address>()
        .first()?
        .ok_or_else(|| Error::NoResultFound("Address".to_string()))?;
    session.append_related(&ed, "shipping_address", &common_address)?;
    session.append_related(&mary, "shipping_address", &common_address)?;

    session.commit()?;

    let mut address_owners = Vec::new();
    for address in session.query::<Address>().all()? {
        let owner = session.owner_of(&address)?;
        address_owners.push(AddressOwner { address, owner });
    }

    let mut phone_users = Vec::new();
    for phone in session.query::<PhoneNumber>().all()? {
        let users = session.users_with_phone(&phone)?;
        phone_users.push(PhoneUsers { phone, users });
    }

    Ok(DemoReport {
        address_owners,
        phone_users,
        home_address: session.home_address_of(&ed)?,
        delivery_address: session.delivery_address_of(&ed)?,
        shipping_preferences: session.shipping_preferences()?,
        rejected_assignment,
        stats: session.store().stats()?,
    })
}

impl std::fmt::Display for DemoReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Addresses:")?;
        for row in &self.address_owners {
            match &row.owner {
                Some(owner) => writeln!(f, "  {} -> {}", row.address, owner)?,
                None => writeln!(f, "  {} -> None", row.address)?,
            }
        }

        writeln!(f)?;
        writeln!(f, "Numbers:")?;
        for row in &self.phone_users {
            writeln!(f, "  {}", row.phone)?;
            for user in &row.users {
                writeln!(f, "    {}", user)?;
            }
        }

        writeln!(f)?;
        writeln!(f, "Shipping preferences:")?;
        for row in &self.shipping_preferences {
            writeln!(f, "  user {} -> address {}", row.user_id, row.shipping_address_id)?;
        }

        writeln!(f)?;
        writeln!(f, "ZIP:")?;
        let zip = |house: &Option<HouseAddress>| house.as_ref().map_or("None".to_string(), |h| h.zip.clone());
        writeln!(f, "  home: {}", zip(&self.home_address))?;
        writeln!(f, "  delivery: {}", zip(&self.delivery_address))?;

        if let Some(reason) = &self.rejected_assignment {
            writeln!(f)?;
            writeln!(f, "Rejected: {}", reason)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::Mapping;

    #[test]
    fn test_report_counts() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let mapper = Mapping::tutorial().configure().unwrap();

        let report = run(&mut store, &mapper).unwrap();

        assert_eq!(
            report.stats,
            DbStats {
                users: 4,
                addresses: 3,
                phone_numbers: 2,
                house_addresses: 2,
                shipping_preferences: 2,
            }
        );
        let reason = report.rejected_assignment.unwrap();
        assert!(reason.starts_with("Relationship User.phone_number holds a single PhoneNumber"));
    }

    #[test]
    fn test_only_cardinality_errors_are_reported_as_rejections() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let mapper = Mapping::new().configure().unwrap();
        let mut session = Session::begin(&mut store, &mapper).unwrap();

        let ed = session.add_user(NewUser::new("ed", "Ed Jones", "edspassword")).unwrap();
        let phone = session.add_phone_number(NewPhoneNumber::new(42)).unwrap();

        // no phone_number relationship is mapped
        let err = assign_phone_collection(&mut session, &ed, &[phone]).unwrap_err();
        assert!(matches!(err, Error::UnknownRelationship { .. }));
    }

    #[test]
    fn test_report_display() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let mapper = Mapping::tutorial().configure().unwrap();

        let text = run(&mut store, &mapper).unwrap().to_string();

        assert!(text.contains(
            "<Address(email_address='ed@home.de')> -> <User(name='ed', fullname='Ed Jones', password='edspassword')>"
        ));
        assert!(text.contains("home: 8051"));
        assert!(text.contains("delivery: 8052"));
    }

    #[test]
    fn test_committed_data_survives_session() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let mapper = Mapping::tutorial().configure().unwrap();

        run(&mut store, &mapper).unwrap();

        assert!(store.is_autocommit());
        assert_eq!(store.stats().unwrap().shipping_preferences, 2);
    }
}
