//! Relationship mapping - declarative association metadata
//!
//! A [`Mapping`] declares the foreign keys between tables and the relationships
//! each entity kind exposes. [`Mapping::configure`] validates the declarations and
//! resolves every relationship to a concrete [`JoinPath`]:
//! - `ManyToOne`: the foreign key lives on the source table (scalar)
//! - `OneToMany`: the foreign key lives on the target table (collection, or scalar with `uselist(false)`)
//! - `ManyToMany`: two foreign keys on a secondary (association) table

use crate::{Error, Result};
use crate::model::Entity;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The mapped record kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    User,
    Address,
    PhoneNumber,
    HouseAddress,
}

impl EntityKind {
    /// Class-style name used in diagnostics (`User.addresses`)
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::User => "User",
            EntityKind::Address => "Address",
            EntityKind::PhoneNumber => "PhoneNumber",
            EntityKind::HouseAddress => "HouseAddress",
        }
    }

    /// Backing table
    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::User => "users",
            EntityKind::Address => "addresses",
            EntityKind::PhoneNumber => "phone_numbers",
            EntityKind::HouseAddress => "house_addresses",
        }
    }

    /// Columns of the backing table, primary key first
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            EntityKind::User => &[
                "id",
                "name",
                "fullname",
                "password",
                "phone_number_id",
                "delivery_address_id",
                "home_address_id",
            ],
            EntityKind::Address => &["id", "email_address", "user_id"],
            EntityKind::PhoneNumber => &["id", "phone_number"],
            EntityKind::HouseAddress => &["id", "state", "zip"],
        }
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns().contains(&column)
    }

    /// Get all entity kinds
    pub fn all() -> &'static [EntityKind] {
        &[
            EntityKind::User,
            EntityKind::Address,
            EntityKind::PhoneNumber,
            EntityKind::HouseAddress,
        ]
    }
}

impl FromStr for EntityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "user" | "users" => Ok(EntityKind::User),
            "address" | "addresses" => Ok(EntityKind::Address),
            "phonenumber" | "phone_number" | "phone_numbers" | "phone" => Ok(EntityKind::PhoneNumber),
            "houseaddress" | "house_address" | "house_addresses" => Ok(EntityKind::HouseAddress),
            _ => Err(Error::UnknownEntity(s.to_string())),
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A foreign key column `table.column -> target_table.target_column`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ForeignKey {
    pub table: &'static str,
    pub column: &'static str,
    pub target_table: &'static str,
    pub target_column: &'static str,
}

impl ForeignKey {
    /// Foreign key referencing the target table's `id`
    pub const fn to_id(table: &'static str, column: &'static str, target_table: &'static str) -> Self {
        Self {
            table,
            column,
            target_table,
            target_column: "id",
        }
    }

    pub fn qualified(&self) -> String {
        format!("{}.{}", self.table, self.column)
    }
}

/// Direction of a resolved relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    ManyToOne,
    OneToMany,
    ManyToMany,
}

impl RelationshipKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipKind::ManyToOne => "many-to-one",
            RelationshipKind::OneToMany => "one-to-many",
            RelationshipKind::ManyToMany => "many-to-many",
        }
    }
}

impl std::fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A relationship declaration, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub source: EntityKind,
    pub name: &'static str,
    pub target: EntityKind,
    /// Column backing the relationship, on either side. Required when more
    /// than one foreign key links the two tables.
    pub foreign_key: Option<&'static str>,
    /// Association table for many-to-many
    pub secondary: Option<&'static str>,
    /// Name of the reverse relationship declared on the target
    pub back_populates: Option<&'static str>,
    /// Name of a reverse relationship to generate on the target
    pub backref: Option<&'static str>,
    pub uselist: Option<bool>,
    /// Target column collections are ordered by
    pub order_by: Option<&'static str>,
}

impl Relationship {
    pub fn new(source: EntityKind, name: &'static str, target: EntityKind) -> Self {
        Self {
            source,
            name,
            target,
            foreign_key: None,
            secondary: None,
            back_populates: None,
            backref: None,
            uselist: None,
            order_by: None,
        }
    }

    pub fn foreign_key(mut self, column: &'static str) -> Self {
        self.foreign_key = Some(column);
        self
    }

    pub fn secondary(mut self, table: &'static str) -> Self {
        self.secondary = Some(table);
        self
    }

    pub fn back_populates(mut self, name: &'static str) -> Self {
        self.back_populates = Some(name);
        self
    }

    pub fn backref(mut self, name: &'static str) -> Self {
        self.backref = Some(name);
        self
    }

    pub fn uselist(mut self, uselist: bool) -> Self {
        self.uselist = Some(uselist);
        self
    }

    pub fn order_by(mut self, column: &'static str) -> Self {
        self.order_by = Some(column);
        self
    }

    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.source, self.name)
    }
}

/// How a relationship reaches its target rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "via", rename_all = "snake_case")]
pub enum JoinPath {
    /// `source.column` references `target.id`
    Local { column: &'static str },
    /// `target.column` references `source.id`
    Remote { column: &'static str },
    /// `table.local_column` references `source.id`, `table.remote_column` references `target.id`
    Secondary {
        table: &'static str,
        local_column: &'static str,
        remote_column: &'static str,
    },
}

impl JoinPath {
    pub fn kind(&self) -> RelationshipKind {
        match self {
            JoinPath::Local { .. } => RelationshipKind::ManyToOne,
            JoinPath::Remote { .. } => RelationshipKind::OneToMany,
            JoinPath::Secondary { .. } => RelationshipKind::ManyToMany,
        }
    }

    /// The same path seen from the other end
    pub fn reversed(&self) -> JoinPath {
        match *self {
            JoinPath::Local { column } => JoinPath::Remote { column },
            JoinPath::Remote { column } => JoinPath::Local { column },
            JoinPath::Secondary {
                table,
                local_column,
                remote_column,
            } => JoinPath::Secondary {
                table,
                local_column: remote_column,
                remote_column: local_column,
            },
        }
    }

    pub fn describe(&self, source: EntityKind, target: EntityKind) -> String {
        match self {
            JoinPath::Local { column } => format!("{}.{}", source.table(), column),
            JoinPath::Remote { column } => format!("{}.{}", target.table(), column),
            JoinPath::Secondary {
                table,
                local_column,
                remote_column,
            } => format!("{}({}, {})", table, local_column, remote_column),
        }
    }
}

/// A value assigned to a relationship attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Related {
    None,
    One(i64),
    Many(Vec<i64>),
}

impl Related {
    pub fn one<E: Entity>(entity: &E) -> Self {
        Related::One(entity.id())
    }

    pub fn many<'a, E: Entity + 'a>(entities: impl IntoIterator<Item = &'a E>) -> Self {
        Related::Many(entities.into_iter().map(Entity::id).collect())
    }

    /// Target ids, in assignment order
    pub fn ids(&self) -> Vec<i64> {
        match self {
            Related::None => Vec::new(),
            Related::One(id) => vec![*id],
            Related::Many(ids) => ids.clone(),
        }
    }
}

/// A validated relationship with its join path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedRelationship {
    pub source: EntityKind,
    pub name: &'static str,
    pub target: EntityKind,
    pub kind: RelationshipKind,
    pub join: JoinPath,
    pub uselist: bool,
    pub back_populates: Option<&'static str>,
    pub order_by: Option<&'static str>,
}

impl ResolvedRelationship {
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.source, self.name)
    }

    /// Reject values whose shape does not match the relationship's cardinality
    pub fn check_assignment(&self, value: &Related) -> Result<()> {
        match (self.uselist, value) {
            (false, Related::Many(ids)) => Err(Error::Cardinality {
                relationship: self.qualified_name(),
                reason: format!(
                    "holds a single {}; cannot assign a collection of {}",
                    self.target,
                    ids.len()
                ),
            }),
            (true, Related::One(_)) => Err(Error::Cardinality {
                relationship: self.qualified_name(),
                reason: format!("is a collection of {}; assign a list", self.target),
            }),
            _ => Ok(()),
        }
    }
}

/// Declared foreign keys and relationships
#[derive(Debug, Clone, Default)]
pub struct Mapping {
    foreign_keys: Vec<ForeignKey>,
    relationships: Vec<Relationship>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn foreign_key(mut self, fk: ForeignKey) -> Self {
        self.foreign_keys.push(fk);
        self
    }

    pub fn relationship(mut self, rel: Relationship) -> Self {
        self.relationships.push(rel);
        self
    }

    /// The walkthrough mapping: users, addresses, phone numbers, house
    /// addresses and the shipping_preferences association table.
    pub fn tutorial() -> Self {
        use EntityKind::*;

        Self::new()
            .foreign_key(ForeignKey::to_id("users", "phone_number_id", "phone_numbers"))
            .foreign_key(ForeignKey::to_id("users", "delivery_address_id", "house_addresses"))
            .foreign_key(ForeignKey::to_id("users", "home_address_id", "house_addresses"))
            .foreign_key(ForeignKey::to_id("addresses", "user_id", "users"))
            .foreign_key(ForeignKey::to_id("shipping_preferences", "user_id", "users"))
            .foreign_key(ForeignKey::to_id("shipping_preferences", "shipping_address_id", "addresses"))
            // one-to-many with an explicit back-reference pair
            .relationship(Relationship::new(Address, "user", User).back_populates("addresses"))
            .relationship(
                Relationship::new(User, "addresses", Address)
                    .order_by("id")
                    .back_populates("user"),
            )
            // scalar association; many users may share one number
            .relationship(
                Relationship::new(User, "phone_number", PhoneNumber)
                    .uselist(false)
                    .back_populates("users"),
            )
            .relationship(
                Relationship::new(PhoneNumber, "users", User)
                    .order_by("id")
                    .back_populates("phone_number"),
            )
            // many-to-many through the association table
            .relationship(
                Relationship::new(User, "shipping_address", Address)
                    .secondary("shipping_preferences")
                    .backref("users"),
            )
            // two keys into house_addresses; each names its column
            .relationship(Relationship::new(User, "delivery_address", HouseAddress).foreign_key("delivery_address_id"))
            .relationship(Relationship::new(User, "home_address", HouseAddress).foreign_key("home_address_id"))
    }

    /// Validate the declarations and resolve every relationship's join path
    pub fn configure(&self) -> Result<Mapper> {
        let declared = self.expand_backrefs()?;

        for (i, rel) in declared.iter().enumerate() {
            if declared[..i]
                .iter()
                .any(|other| other.source == rel.source && other.name == rel.name)
            {
                return Err(Error::DuplicateRelationship(rel.qualified_name()));
            }
        }

        let mut resolved = Vec::with_capacity(declared.len());
        for rel in &declared {
            resolved.push(self.resolve(rel)?);
        }

        for rel in &resolved {
            check_back_populates(rel, &resolved)?;
        }

        tracing::info!(
            "configured {} relationships over {} foreign keys",
            resolved.len(),
            self.foreign_keys.len()
        );

        Ok(Mapper {
            foreign_keys: self.foreign_keys.clone(),
            relationships: resolved,
        })
    }

    /// Turn every `backref` into an explicit reverse declaration
    fn expand_backrefs(&self) -> Result<Vec<Relationship>> {
        let mut declared = self.relationships.clone();

        for rel in &self.relationships {
            let Some(backref) = rel.backref else {
                continue;
            };
            if declared
                .iter()
                .any(|other| other.source == rel.target && other.name == backref)
            {
                return Err(Error::DuplicateRelationship(format!("{}.{}", rel.target, backref)));
            }

            let mut reverse = Relationship::new(rel.target, backref, rel.source).back_populates(rel.name);
            reverse.secondary = rel.secondary;
            reverse.foreign_key = rel.foreign_key;
            declared.push(reverse);

            if let Some(original) = declared
                .iter_mut()
                .find(|other| other.source == rel.source && other.name == rel.name)
            {
                original.back_populates = Some(backref);
            }
        }

        Ok(declared)
    }

    fn resolve(&self, rel: &Relationship) -> Result<ResolvedRelationship> {
        let join = match rel.secondary {
            Some(table) => self.resolve_secondary(rel, table)?,
            None => self.resolve_direct(rel)?,
        };
        let kind = join.kind();

        let uselist = match (kind, rel.uselist) {
            (RelationshipKind::ManyToOne, Some(true)) => {
                return Err(Error::Cardinality {
                    relationship: rel.qualified_name(),
                    reason: "is many-to-one and cannot hold a collection".to_string(),
                });
            }
            (RelationshipKind::ManyToOne, _) => false,
            (_, explicit) => explicit.unwrap_or(true),
        };

        if let Some(column) = rel.order_by {
            if !rel.target.has_column(column) {
                return Err(Error::UnknownColumn {
                    table: rel.target.table().to_string(),
                    column: column.to_string(),
                });
            }
        }

        tracing::debug!(
            "{} resolved as {} via {}",
            rel.qualified_name(),
            kind,
            join.describe(rel.source, rel.target)
        );

        Ok(ResolvedRelationship {
            source: rel.source,
            name: rel.name,
            target: rel.target,
            kind,
            join,
            uselist,
            back_populates: rel.back_populates,
            order_by: rel.order_by,
        })
    }

    fn resolve_direct(&self, rel: &Relationship) -> Result<JoinPath> {
        let (source, target) = (rel.source.table(), rel.target.table());

        let candidates: Vec<(&ForeignKey, JoinPath)> = self
            .foreign_keys
            .iter()
            .filter_map(|fk| {
                if fk.table == source && fk.target_table == target {
                    Some((fk, JoinPath::Local { column: fk.column }))
                } else if fk.table == target && fk.target_table == source {
                    Some((fk, JoinPath::Remote { column: fk.column }))
                } else {
                    None
                }
            })
            .filter(|(fk, _)| rel.foreign_key.is_none_or(|column| fk.column == column))
            .collect();

        match candidates.as_slice() {
            [] => Err(Error::NoForeignKeys {
                relationship: rel.qualified_name(),
                from: match rel.foreign_key {
                    Some(column) => format!("{}.{}", source, column),
                    None => source.to_string(),
                },
                to: target.to_string(),
            }),
            [(_, join)] => Ok(*join),
            many => Err(Error::AmbiguousForeignKeys {
                relationship: rel.qualified_name(),
                candidates: many.iter().map(|(fk, _)| fk.qualified()).collect(),
            }),
        }
    }

    fn resolve_secondary(&self, rel: &Relationship, table: &'static str) -> Result<JoinPath> {
        let local_column = self.secondary_column(rel, table, rel.source.table())?;
        let remote_column = self.secondary_column(rel, table, rel.target.table())?;
        Ok(JoinPath::Secondary {
            table,
            local_column,
            remote_column,
        })
    }

    fn secondary_column(&self, rel: &Relationship, table: &'static str, references: &str) -> Result<&'static str> {
        let columns: Vec<&ForeignKey> = self
            .foreign_keys
            .iter()
            .filter(|fk| fk.table == table && fk.target_table == references)
            .collect();

        match columns.as_slice() {
            [] => Err(Error::NoForeignKeys {
                relationship: rel.qualified_name(),
                from: table.to_string(),
                to: references.to_string(),
            }),
            [fk] => Ok(fk.column),
            many => Err(Error::AmbiguousForeignKeys {
                relationship: rel.qualified_name(),
                candidates: many.iter().map(|fk| fk.qualified()).collect(),
            }),
        }
    }
}

/// A back-reference pair must name each other and share one join path
fn check_back_populates(rel: &ResolvedRelationship, all: &[ResolvedRelationship]) -> Result<()> {
    let Some(expected) = rel.back_populates else {
        return Ok(());
    };
    let mismatch = |reason: String| Error::BackPopulatesMismatch {
        relationship: rel.qualified_name(),
        expected: expected.to_string(),
        reason,
    };

    let other = all
        .iter()
        .find(|other| other.source == rel.target && other.name == expected)
        .ok_or_else(|| mismatch(format!("{} has no such relationship", rel.target)))?;

    if other.target != rel.source {
        return Err(mismatch(format!(
            "{} points at {} instead of {}",
            other.qualified_name(),
            other.target,
            rel.source
        )));
    }
    if other.back_populates != Some(rel.name) {
        return Err(mismatch(format!(
            "{} does not back-populate '{}'",
            other.qualified_name(),
            rel.name
        )));
    }
    if other.join.reversed() != rel.join {
        return Err(mismatch(format!(
            "{} joins via {} instead of {}",
            other.qualified_name(),
            other.join.describe(other.source, other.target),
            rel.join.describe(rel.source, rel.target)
        )));
    }
    Ok(())
}

/// A configured mapping: every relationship resolved and cross-checked
#[derive(Debug, Clone)]
pub struct Mapper {
    foreign_keys: Vec<ForeignKey>,
    relationships: Vec<ResolvedRelationship>,
}

impl Mapper {
    /// Look up a relationship by entity kind and attribute name
    pub fn relationship(&self, source: EntityKind, name: &str) -> Result<&ResolvedRelationship> {
        self.relationships
            .iter()
            .find(|rel| rel.source == source && rel.name == name)
            .ok_or_else(|| Error::UnknownRelationship {
                entity: source.to_string(),
                name: name.to_string(),
            })
    }

    pub fn relationships(&self) -> &[ResolvedRelationship] {
        &self.relationships
    }

    pub fn relationships_of(&self, source: EntityKind) -> impl Iterator<Item = &ResolvedRelationship> {
        self.relationships.iter().filter(move |rel| rel.source == source)
    }

    pub fn foreign_keys(&self) -> &[ForeignKey] {
        &self.foreign_keys
    }
}
