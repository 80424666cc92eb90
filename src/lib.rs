//! # relmap - Relationship mapping over SQLite
//!
//! A worked example of the four classic association shapes:
//! - one-to-one (scalar) association: `User.phone_number`
//! - one-to-many with a back-reference pair: `User.addresses` / `Address.user`
//! - many-to-many through a join table: `User.shipping_address` / `Address.users`
//! - two foreign keys into the same table: `User.home_address` / `User.delivery_address`
//!
//! The mapping is declared in [`mapping`], validated into a [`Mapper`], and
//! driven through a [`Session`] over a [`SqliteStore`].

pub mod config;
pub mod demo;
pub mod mapping;
pub mod model;
pub mod output;
pub mod session;
pub mod storage;
pub mod ui;

// Re-exports for convenient access
pub use mapping::{EntityKind, Mapper, Mapping, Related, Relationship, RelationshipKind};
pub use model::{
    Address, Entity, HouseAddress, NewAddress, NewHouseAddress, NewPhoneNumber, NewUser, PhoneNumber,
    ShippingPreference, User,
};
pub use session::{NewRecord, Query, Record, Session};
pub use storage::SqliteStore;

/// Result type alias for relmap operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for relmap operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown entity kind: {0}")]
    UnknownEntity(String),

    #[error("Unknown relationship: {entity}.{name}")]
    UnknownRelationship { entity: String, name: String },

    #[error("Unknown column '{column}' on table '{table}'")]
    UnknownColumn { table: String, column: String },

    #[error("No foreign key links '{from}' and '{to}' for relationship {relationship}")]
    NoForeignKeys {
        relationship: String,
        from: String,
        to: String,
    },

    #[error(
        "Relationship {relationship} is ambiguous: candidate foreign keys {candidates:?}; name the column to use"
    )]
    AmbiguousForeignKeys {
        relationship: String,
        candidates: Vec<String>,
    },

    #[error("Relationship {relationship} back-populates '{expected}', but {reason}")]
    BackPopulatesMismatch {
        relationship: String,
        expected: String,
        reason: String,
    },

    #[error("Relationship {0} is declared more than once")]
    DuplicateRelationship(String),

    #[error("Relationship {relationship} {reason}")]
    Cardinality { relationship: String, reason: String },

    #[error("Relationship {relationship} targets {expected}, not {found}")]
    TargetMismatch {
        relationship: String,
        expected: String,
        found: String,
    },

    #[error("Required field '{field}' missing on {entity}")]
    MissingField { entity: String, field: String },

    #[error("No row was found for {0}")]
    NoResultFound(String),

    #[error("Multiple rows were found for {0}")]
    MultipleResultsFound(String),

    #[error("{entity} with id {id} not found")]
    NotFound { entity: String, id: i64 },
}
