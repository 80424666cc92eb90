//! Storage Layer - SQLite-backed persistence
//!
//! Tables:
//! - users(id, name, fullname, password, phone_number_id, delivery_address_id, home_address_id)
//! - addresses(id, email_address, user_id)
//! - phone_numbers(id, phone_number)
//! - house_addresses(id, state, zip)
//! - shipping_preferences(user_id, shipping_address_id)

pub mod schema;
pub mod sqlite;

pub use sqlite::{DatabaseTarget, DbStats, SqliteStore, StoredForeignKey, MEMORY_URL};
