use tabled::{settings::Style, Table, Tabled};

use crate::mapping::ResolvedRelationship;

#[derive(Tabled)]
pub struct TableRow {
    #[tabled(rename = "Table")]
    pub metric: String,
    #[tabled(rename = "Rows")]
    pub value: String,
}

#[derive(Default)]
pub struct TableBuilder {
    rows: Vec<TableRow>,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    pub fn add_row(&mut self, label: &str, value: &str) {
        self.rows.push(TableRow {
            metric: label.to_string(),
            value: value.to_string(),
        });
    }

    pub fn build(&self) -> String {
        if self.rows.is_empty() {
            return String::new();
        }

        Table::new(&self.rows).with(Style::rounded()).to_string()
    }
}

pub fn stats_table(stats: &[(&str, usize)]) -> String {
    let mut builder = TableBuilder::new();
    for (label, value) in stats {
        builder.add_row(label, &value.to_string());
    }
    builder.build()
}

#[derive(Tabled)]
struct RelationshipRow {
    #[tabled(rename = "Relationship")]
    name: String,
    #[tabled(rename = "Target")]
    target: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Join")]
    join: String,
    #[tabled(rename = "List")]
    uselist: bool,
    #[tabled(rename = "Back-populates")]
    back_populates: String,
}

pub fn relationships_table(relationships: &[ResolvedRelationship]) -> String {
    let rows: Vec<RelationshipRow> = relationships
        .iter()
        .map(|rel| RelationshipRow {
            name: rel.qualified_name(),
            target: rel.target.to_string(),
            kind: rel.kind.to_string(),
            join: rel.join.describe(rel.source, rel.target),
            uselist: rel.uselist,
            back_populates: rel.back_populates.unwrap_or("-").to_string(),
        })
        .collect();

    Table::new(&rows).with(Style::rounded()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::Mapping;

    #[test]
    fn test_empty_builder() {
        assert!(TableBuilder::new().build().is_empty());
    }

    #[test]
    fn test_relationships_table_lists_every_relationship() {
        let mapper = Mapping::tutorial().configure().unwrap();
        let table = relationships_table(mapper.relationships());

        assert!(table.contains("User.home_address"));
        assert!(table.contains("users.delivery_address_id"));
        assert!(table.contains("shipping_preferences(user_id, shipping_address_id)"));
        assert!(table.contains("Address.users"));
    }
}
