use super::source::{SourceObject, read_objects};
use super::{Row, Value, Warehouse};
use crate::load::InsertStatement;
use crate::schema::{SqlType, TableDef, TableDescription};
use crate::staging::CopyDirective;
use arrow::array::{
    Array, ArrayRef, AsArray, Decimal128Builder, Int32Builder, Int64Builder, StringBuilder,
};
use arrow::datatypes::{
    DataType, Float32Type, Float64Type, Int8Type, Int16Type, Int32Type, Int64Type, UInt8Type,
    UInt16Type, UInt32Type,
};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use common::{Error, Result};
use datafusion::common::TableReference;
use datafusion::datasource::MemTable;
use datafusion::prelude::{SessionConfig, SessionContext};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

struct LocalTable {
    def: TableDef,
    rows: Vec<Row>,
    next_identity: Option<i64>,
}

/// In-process warehouse backed by DataFusion memory tables.
///
/// It applies the same table definitions and transformation SQL as the
/// cluster, performs bulk copies itself, and enforces NOT NULL, primary keys
/// and identity columns.
pub struct LocalWarehouse {
    ctx: SessionContext,
    tables: HashMap<String, LocalTable>,
    region: String,
}

impl Default for LocalWarehouse {
    fn default() -> Self {
        Self::new("us-west-2")
    }
}

impl LocalWarehouse {
    /// `region` is used when a copy source is an `s3://` location.
    pub fn new(region: &str) -> Self {
        // One partition keeps the pipeline single-threaded end to end.
        let config = SessionConfig::new().with_target_partitions(1);
        Self {
            ctx: SessionContext::new_with_config(config),
            tables: HashMap::new(),
            region: region.to_string(),
        }
    }

    pub fn row_count(&self, table: &str) -> Option<usize> {
        self.tables.get(table).map(|t| t.rows.len())
    }
}

fn lookup<'a>(
    tables: &'a mut HashMap<String, LocalTable>,
    name: &str,
) -> Result<&'a mut LocalTable> {
    tables
        .get_mut(name)
        .ok_or_else(|| Error::Engine(format!("relation \"{}\" does not exist", name)))
}

#[async_trait]
impl Warehouse for LocalWarehouse {
    fn engine(&self) -> &'static str {
        "local"
    }

    async fn drop_table(&mut self, table: &TableDef) -> Result<()> {
        if !self.tables.contains_key(table.name) {
            return Ok(());
        }

        let dependents: Vec<&str> = self
            .tables
            .values()
            .filter(|other| other.def.referenced_tables().contains(&table.name))
            .map(|other| other.def.name)
            .collect();
        if !dependents.is_empty() {
            return Err(Error::Engine(format!(
                "cannot drop table {} because other objects depend on it: {}",
                table.name,
                dependents.join(", ")
            )));
        }

        self.tables.remove(table.name);
        self.ctx.deregister_table(TableReference::bare(table.name))?;
        Ok(())
    }

    async fn create_table(&mut self, table: &TableDef) -> Result<()> {
        if self.tables.contains_key(table.name) {
            return Ok(());
        }

        for referenced in table.referenced_tables() {
            if !self.tables.contains_key(referenced) {
                return Err(Error::Engine(format!(
                    "relation \"{}\" does not exist",
                    referenced
                )));
            }
        }

        let next_identity = table
            .columns
            .iter()
            .find_map(|column| column.identity)
            .map(|(seed, _)| seed);
        let local = LocalTable {
            def: table.clone(),
            rows: Vec::new(),
            next_identity,
        };
        register(&self.ctx, &local)?;
        self.tables.insert(table.name.to_string(), local);
        Ok(())
    }

    async fn describe_table(&mut self, table: &str) -> Result<Option<TableDescription>> {
        Ok(self.tables.get(table).map(|t| t.def.description()))
    }

    async fn copy_into(&mut self, directive: &CopyDirective) -> Result<u64> {
        // Fail before touching storage when the target is missing.
        let def = lookup(&mut self.tables, directive.table)?.def.clone();

        let objects = read_objects(&directive.source, &self.region).await?;
        if objects.is_empty() {
            return Err(Error::Engine(format!(
                "The specified source prefix contains no objects: {}",
                directive.source
            )));
        }

        let mut staged = Vec::new();
        for object in &objects {
            staged.extend(parse_object(&def, object)?);
        }
        for row in &staged {
            check_not_null(&def, row)?;
        }

        let loaded = staged.len() as u64;
        let table = lookup(&mut self.tables, directive.table)?;
        table.rows.extend(staged);
        register(&self.ctx, table)?;
        debug!(table = directive.table, objects = objects.len(), rows = loaded, "Local copy");
        Ok(loaded)
    }

    async fn query(&mut self, sql: &str) -> Result<Vec<Row>> {
        let batches = self.ctx.sql(sql).await?.collect().await?;
        let mut rows = Vec::new();
        for batch in &batches {
            rows.extend(batch_rows(batch)?);
        }
        Ok(rows)
    }

    async fn insert_rows(&mut self, statement: &InsertStatement, rows: &[Row]) -> Result<u64> {
        let table = lookup(&mut self.tables, statement.table())?;
        let def = &table.def;

        let positions = statement
            .columns()
            .iter()
            .map(|(name, _)| {
                def.columns
                    .iter()
                    .position(|column| column.name == *name)
                    .ok_or_else(|| {
                        Error::Engine(format!(
                            "column \"{}\" of relation \"{}\" does not exist",
                            name, def.name
                        ))
                    })
            })
            .collect::<Result<Vec<usize>>>()?;

        let mut next_identity = table.next_identity;
        let mut staged = Vec::with_capacity(rows.len());
        for row in rows {
            let values = statement.coerce_row(row).map_err(Error::Engine)?;
            let mut full = vec![Value::Null; def.columns.len()];
            for (position, value) in positions.iter().zip(values) {
                full[*position] = value;
            }

            for (idx, column) in def.columns.iter().enumerate() {
                if let (Some((_, step)), Some(next)) = (column.identity, next_identity) {
                    if full[idx].is_null() {
                        full[idx] = Value::BigInt(next)
                            .coerce(column.sql_type)
                            .map_err(Error::Engine)?;
                        next_identity = Some(next + step);
                    }
                }
            }

            check_not_null(def, &full)?;
            staged.push(full);
        }
        check_primary_key(def, &table.rows, &staged)?;

        let inserted = staged.len() as u64;
        table.rows.extend(staged);
        table.next_identity = next_identity;
        register(&self.ctx, table)?;
        Ok(inserted)
    }
}

/// Swaps the table's memory provider for one holding its current rows.
fn register(ctx: &SessionContext, table: &LocalTable) -> Result<()> {
    let schema = table.def.arrow_schema();
    let columns = table
        .def
        .columns
        .iter()
        .enumerate()
        .map(|(idx, column)| column_array(column.sql_type, &table.rows, idx))
        .collect::<Result<Vec<ArrayRef>>>()?;
    let batch = RecordBatch::try_new(schema.clone(), columns)?;
    let provider = MemTable::try_new(schema, vec![vec![batch]])?;

    ctx.deregister_table(TableReference::bare(table.def.name))?;
    ctx.register_table(TableReference::bare(table.def.name), Arc::new(provider))?;
    Ok(())
}

fn column_array(sql_type: SqlType, rows: &[Row], idx: usize) -> Result<ArrayRef> {
    let mismatch = |value: &Value| {
        Error::Engine(format!(
            "value {} does not match column type {}",
            value,
            sql_type.ddl()
        ))
    };

    let array: ArrayRef = match sql_type {
        SqlType::Int => {
            let mut builder = Int32Builder::with_capacity(rows.len());
            for row in rows {
                match &row[idx] {
                    Value::Int(v) => builder.append_value(*v),
                    Value::Null => builder.append_null(),
                    other => return Err(mismatch(other)),
                }
            }
            Arc::new(builder.finish())
        }
        SqlType::BigInt => {
            let mut builder = Int64Builder::with_capacity(rows.len());
            for row in rows {
                match &row[idx] {
                    Value::BigInt(v) => builder.append_value(*v),
                    Value::Null => builder.append_null(),
                    other => return Err(mismatch(other)),
                }
            }
            Arc::new(builder.finish())
        }
        SqlType::Varchar => {
            let mut builder = StringBuilder::new();
            for row in rows {
                match &row[idx] {
                    Value::Text(v) => builder.append_value(v),
                    Value::Null => builder.append_null(),
                    other => return Err(mismatch(other)),
                }
            }
            Arc::new(builder.finish())
        }
        SqlType::Decimal { precision, scale } => {
            let mut builder = Decimal128Builder::with_capacity(rows.len())
                .with_precision_and_scale(precision, scale as i8)?;
            for row in rows {
                match &row[idx] {
                    Value::Decimal(v) => {
                        let mut v = *v;
                        v.rescale(scale as u32);
                        builder.append_value(v.mantissa());
                    }
                    Value::Null => builder.append_null(),
                    other => return Err(mismatch(other)),
                }
            }
            Arc::new(builder.finish())
        }
    };
    Ok(array)
}

fn batch_rows(batch: &RecordBatch) -> Result<Vec<Row>> {
    let mut rows = vec![Vec::with_capacity(batch.num_columns()); batch.num_rows()];
    for column in batch.columns() {
        for (idx, row) in rows.iter_mut().enumerate() {
            row.push(cell(column.as_ref(), idx)?);
        }
    }
    Ok(rows)
}

fn cell(array: &dyn Array, idx: usize) -> Result<Value> {
    if array.is_null(idx) {
        return Ok(Value::Null);
    }

    let value = match array.data_type() {
        DataType::Null => Value::Null,
        DataType::Boolean => Value::Text(array.as_boolean().value(idx).to_string()),
        DataType::Int8 => Value::Int(array.as_primitive::<Int8Type>().value(idx) as i32),
        DataType::Int16 => Value::Int(array.as_primitive::<Int16Type>().value(idx) as i32),
        DataType::Int32 => Value::Int(array.as_primitive::<Int32Type>().value(idx)),
        DataType::Int64 => Value::BigInt(array.as_primitive::<Int64Type>().value(idx)),
        DataType::UInt8 => Value::Int(array.as_primitive::<UInt8Type>().value(idx) as i32),
        DataType::UInt16 => Value::Int(array.as_primitive::<UInt16Type>().value(idx) as i32),
        DataType::UInt32 => Value::BigInt(array.as_primitive::<UInt32Type>().value(idx) as i64),
        DataType::Float32 => Value::Double(array.as_primitive::<Float32Type>().value(idx) as f64),
        DataType::Float64 => Value::Double(array.as_primitive::<Float64Type>().value(idx)),
        DataType::Utf8 => Value::Text(array.as_string::<i32>().value(idx).to_string()),
        DataType::LargeUtf8 => Value::Text(array.as_string::<i64>().value(idx).to_string()),
        DataType::Utf8View => Value::Text(array.as_string_view().value(idx).to_string()),
        DataType::Decimal128(_, scale) if *scale >= 0 => {
            let mantissa = array
                .as_primitive::<arrow::datatypes::Decimal128Type>()
                .value(idx);
            Decimal::try_from_i128_with_scale(mantissa, *scale as u32)
                .map(Value::Decimal)
                .map_err(|e| Error::Engine(format!("decimal out of range: {}", e)))?
        }
        other => {
            return Err(Error::Engine(format!(
                "unsupported result column type {}",
                other
            )));
        }
    };
    Ok(value)
}

fn parse_object(def: &TableDef, object: &SourceObject) -> Result<Vec<Row>> {
    let mut rows = Vec::new();
    let stream =
        serde_json::Deserializer::from_slice(&object.data).into_iter::<serde_json::Value>();
    for (idx, record) in stream.enumerate() {
        let record = record.map_err(|e| {
            Error::Engine(format!("Invalid JSON in {}: {}", object.location, e))
        })?;
        let fields = record.as_object().ok_or_else(|| {
            Error::Engine(format!(
                "Record {} in {} is not a JSON object",
                idx + 1,
                object.location
            ))
        })?;

        // Keys match columns case-insensitively.
        let fields: HashMap<String, &serde_json::Value> = fields
            .iter()
            .map(|(key, value)| (key.to_ascii_lowercase(), value))
            .collect();

        let row = def
            .columns
            .iter()
            .map(|column| {
                let value = fields
                    .get(column.name)
                    .map(|json| Value::from_json(json))
                    .unwrap_or(Value::Null);
                value.coerce(column.sql_type).map_err(|e| {
                    Error::Engine(format!(
                        "Invalid value for column {} in {}: {}",
                        column.name, object.location, e
                    ))
                })
            })
            .collect::<Result<Row>>()?;
        rows.push(row);
    }
    Ok(rows)
}

fn check_not_null(def: &TableDef, row: &Row) -> Result<()> {
    for (column, value) in def.columns.iter().zip(row) {
        if value.is_null() && !def.is_nullable(column) {
            return Err(Error::Engine(format!(
                "null value in column \"{}\" of relation \"{}\" violates not-null constraint",
                column.name, def.name
            )));
        }
    }
    Ok(())
}

fn check_primary_key(def: &TableDef, existing: &[Row], staged: &[Row]) -> Result<()> {
    if def.primary_key.is_empty() {
        return Ok(());
    }

    let positions: Vec<usize> = def
        .primary_key
        .iter()
        .filter_map(|name| def.columns.iter().position(|c| c.name == *name))
        .collect();
    let key = |row: &Row| -> String {
        positions
            .iter()
            .map(|&p| row[p].to_string())
            .collect::<Vec<_>>()
            .join("\u{1f}")
    };

    let mut seen: HashSet<String> = existing.iter().map(key).collect();
    for row in staged {
        let value = key(row);
        if !seen.insert(value.clone()) {
            return Err(Error::Engine(format!(
                "duplicate key value violates primary key of \"{}\": ({})=({})",
                def.name,
                def.primary_key.join(", "),
                value.replace('\u{1f}', ", ")
            )));
        }
    }
    Ok(())
}
