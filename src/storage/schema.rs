//! Database schema definitions

/// SQL to create the phone_numbers table
pub const CREATE_PHONE_NUMBERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS phone_numbers (
    id INTEGER PRIMARY KEY,
    phone_number INTEGER
)
"#;

/// SQL to create the house_addresses table
pub const CREATE_HOUSE_ADDRESSES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS house_addresses (
    id INTEGER PRIMARY KEY,
    state TEXT NOT NULL,
    zip TEXT NOT NULL
)
"#;

/// SQL to create the users table
///
/// `home_address_id` and `delivery_address_id` both reference `house_addresses`;
/// relationships over them must name the column they use.
pub const CREATE_USERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT,
    fullname TEXT,
    password TEXT,
    phone_number_id INTEGER REFERENCES phone_numbers(id),
    delivery_address_id INTEGER REFERENCES house_addresses(id),
    home_address_id INTEGER REFERENCES house_addresses(id)
)
"#;

/// SQL to create the addresses table
pub const CREATE_ADDRESSES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS addresses (
    id INTEGER PRIMARY KEY,
    email_address TEXT NOT NULL,
    user_id INTEGER REFERENCES users(id)
)
"#;

/// SQL to create the shipping_preferences association table
/// Identity is the (user_id, shipping_address_id) pair
pub const CREATE_SHIPPING_PREFERENCES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS shipping_preferences (
    user_id INTEGER NOT NULL REFERENCES users(id),
    shipping_address_id INTEGER NOT NULL REFERENCES addresses(id),
    PRIMARY KEY (user_id, shipping_address_id)
)
"#;

/// SQL to create indexes
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_users_name ON users(name)",
    "CREATE INDEX IF NOT EXISTS idx_addresses_user ON addresses(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_shipping_address ON shipping_preferences(shipping_address_id)",
];

/// Tables in creation order
pub const TABLES: &[&str] = &[
    "phone_numbers",
    "house_addresses",
    "users",
    "addresses",
    "shipping_preferences",
];

/// All schema creation statements
pub fn all_schema_statements() -> Vec<&'static str> {
    let mut stmts = vec![
        CREATE_PHONE_NUMBERS_TABLE,
        CREATE_HOUSE_ADDRESSES_TABLE,
        CREATE_USERS_TABLE,
        CREATE_ADDRESSES_TABLE,
        CREATE_SHIPPING_PREFERENCES_TABLE,
    ];
    stmts.extend(CREATE_INDEXES.iter().copied());
    stmts
}
