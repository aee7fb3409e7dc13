pub mod manager;
pub mod tables;

pub use manager::SchemaManager;

use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use std::sync::Arc;

/// Column types used by the warehouse tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Int,
    BigInt,
    Varchar,
    Decimal { precision: u8, scale: u8 },
}

/// What a bare `decimal` means to the warehouse.
pub const DEFAULT_DECIMAL: SqlType = SqlType::Decimal {
    precision: 18,
    scale: 0,
};

impl SqlType {
    pub fn ddl(&self) -> String {
        match self {
            SqlType::Int => "int".to_string(),
            SqlType::BigInt => "bigint".to_string(),
            SqlType::Varchar => "varchar".to_string(),
            SqlType::Decimal { .. } if *self == DEFAULT_DECIMAL => "decimal".to_string(),
            SqlType::Decimal { precision, scale } => format!("decimal({},{})", precision, scale),
        }
    }

    pub fn arrow_type(&self) -> DataType {
        match self {
            SqlType::Int => DataType::Int32,
            SqlType::BigInt => DataType::Int64,
            SqlType::Varchar => DataType::Utf8,
            SqlType::Decimal { precision, scale } => DataType::Decimal128(*precision, *scale as i8),
        }
    }

    /// Maps an `information_schema.columns.data_type` entry back to a column type.
    pub fn from_catalog(
        data_type: &str,
        precision: Option<i32>,
        scale: Option<i32>,
    ) -> Option<Self> {
        match data_type.to_ascii_lowercase().as_str() {
            "integer" | "int" | "int4" => Some(SqlType::Int),
            "bigint" | "int8" => Some(SqlType::BigInt),
            "character varying" | "varchar" | "text" => Some(SqlType::Varchar),
            "numeric" | "decimal" => Some(SqlType::Decimal {
                precision: precision.unwrap_or(18) as u8,
                scale: scale.unwrap_or(0) as u8,
            }),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, SqlType::Varchar)
    }
}

/// Physical distribution of a table across slices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistStyle {
    /// Left to the engine, or driven by a `distkey` column.
    Auto,
    /// A full copy on every node; used for small dimension tables.
    All,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub sql_type: SqlType,
    pub not_null: bool,
    pub identity: Option<(i64, i64)>,
    pub dist_key: bool,
    pub sort_key: bool,
    pub references: Option<&'static str>,
}

impl ColumnDef {
    pub const fn new(name: &'static str, sql_type: SqlType) -> Self {
        Self {
            name,
            sql_type,
            not_null: false,
            identity: None,
            dist_key: false,
            sort_key: false,
            references: None,
        }
    }

    pub const fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub const fn identity(mut self, seed: i64, step: i64) -> Self {
        self.identity = Some((seed, step));
        self
    }

    pub const fn dist_key(mut self) -> Self {
        self.dist_key = true;
        self
    }

    pub const fn sort_key(mut self) -> Self {
        self.sort_key = true;
        self
    }

    pub const fn references(mut self, table: &'static str) -> Self {
        self.references = Some(table);
        self
    }

    fn ddl(&self) -> String {
        let mut sql = format!("{} {}", self.name, self.sql_type.ddl());
        if let Some((seed, step)) = self.identity {
            sql.push_str(&format!(" IDENTITY({},{})", seed, step));
        }
        if self.dist_key {
            sql.push_str(" distkey");
        }
        if self.sort_key {
            sql.push_str(" sortkey");
        }
        if self.not_null {
            sql.push_str(" NOT NULL");
        }
        if let Some(table) = self.references {
            sql.push_str(&format!(" REFERENCES {}", table));
        }
        sql
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDef {
    pub name: &'static str,
    pub columns: Vec<ColumnDef>,
    pub primary_key: Vec<&'static str>,
    pub dist_style: DistStyle,
}

impl TableDef {
    pub fn new(name: &'static str, columns: Vec<ColumnDef>) -> Self {
        Self {
            name,
            columns,
            primary_key: Vec::new(),
            dist_style: DistStyle::Auto,
        }
    }

    pub fn primary_key(mut self, columns: &[&'static str]) -> Self {
        self.primary_key = columns.to_vec();
        self
    }

    pub fn dist_style(mut self, style: DistStyle) -> Self {
        self.dist_style = style;
        self
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|column| column.name == name)
    }

    /// Primary key columns are implicitly NOT NULL.
    pub fn is_nullable(&self, column: &ColumnDef) -> bool {
        !column.not_null && !self.primary_key.contains(&column.name)
    }

    pub fn referenced_tables(&self) -> Vec<&'static str> {
        self.columns.iter().filter_map(|column| column.references).collect()
    }

    pub fn create_sql(&self) -> String {
        let mut lines: Vec<String> = self.columns.iter().map(ColumnDef::ddl).collect();
        if !self.primary_key.is_empty() {
            lines.push(format!("PRIMARY KEY ({})", self.primary_key.join(", ")));
        }

        let mut sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
            self.name,
            lines.join(",\n    ")
        );
        if self.dist_style == DistStyle::All {
            sql.push_str("\ndiststyle all");
        }
        sql
    }

    pub fn drop_sql(&self) -> String {
        format!("DROP TABLE IF EXISTS {}", self.name)
    }

    pub fn arrow_schema(&self) -> SchemaRef {
        let fields: Vec<Field> = self
            .columns
            .iter()
            .map(|column| {
                Field::new(column.name, column.sql_type.arrow_type(), self.is_nullable(column))
            })
            .collect();
        Arc::new(Schema::new(fields))
    }

    /// The structure the engine should report once this table exists.
    pub fn description(&self) -> TableDescription {
        TableDescription {
            columns: self
                .columns
                .iter()
                .map(|column| ColumnDescription {
                    name: column.name.to_string(),
                    sql_type: column.sql_type,
                    nullable: self.is_nullable(column),
                })
                .collect(),
            primary_key: self.primary_key.iter().map(|c| c.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescription {
    pub name: String,
    pub sql_type: SqlType,
    pub nullable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescription {
    pub columns: Vec<ColumnDescription>,
    pub primary_key: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_ddl() {
        assert_eq!(SqlType::Int.ddl(), "int");
        assert_eq!(DEFAULT_DECIMAL.ddl(), "decimal");
        assert_eq!(
            SqlType::Decimal {
                precision: 10,
                scale: 2
            }
            .ddl(),
            "decimal(10,2)"
        );
    }

    #[test]
    fn test_catalog_types_round_trip_declared_types() {
        assert_eq!(SqlType::from_catalog("integer", None, None), Some(SqlType::Int));
        assert_eq!(
            SqlType::from_catalog("character varying", None, None),
            Some(SqlType::Varchar)
        );
        assert_eq!(
            SqlType::from_catalog("numeric", Some(18), Some(0)),
            Some(DEFAULT_DECIMAL)
        );
        assert_eq!(SqlType::from_catalog("boolean", None, None), None);
    }

    #[test]
    fn test_primary_key_column_is_not_nullable() {
        let table = TableDef::new(
            "things",
            vec![
                ColumnDef::new("id", SqlType::Int),
                ColumnDef::new("label", SqlType::Varchar),
            ],
        )
        .primary_key(&["id"]);

        let schema = table.arrow_schema();
        assert!(!schema.field(0).is_nullable());
        assert!(schema.field(1).is_nullable());
        assert_eq!(table.description().primary_key, vec!["id".to_string()]);
    }
}
