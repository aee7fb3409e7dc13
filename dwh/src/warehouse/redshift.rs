use super::{Row, Value, Warehouse};
use crate::load::InsertStatement;
use crate::schema::{ColumnDescription, SqlType, TableDef, TableDescription};
use crate::staging::CopyDirective;
use async_trait::async_trait;
use common::config::ClusterConfig;
use common::{Error, Result};
use rust_decimal::Decimal;
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::{Client, NoTls, SimpleQueryMessage};
use tracing::{debug, error, info};

const DESCRIBE_COLUMNS: &str = "SELECT column_name::varchar, data_type::varchar, \
     is_nullable::varchar, numeric_precision::int, numeric_scale::int \
     FROM information_schema.columns \
     WHERE table_schema = current_schema() AND table_name = $1 \
     ORDER BY ordinal_position";

const DESCRIBE_PRIMARY_KEY: &str = "SELECT kcu.column_name::varchar \
     FROM information_schema.table_constraints tc \
     JOIN information_schema.key_column_usage kcu \
       ON tc.constraint_name = kcu.constraint_name \
      AND tc.table_schema = kcu.table_schema \
      AND tc.table_name = kcu.table_name \
     WHERE tc.constraint_type = 'PRIMARY KEY' \
       AND tc.table_schema = current_schema() \
       AND tc.table_name = $1 \
     ORDER BY kcu.ordinal_position";

/// The cluster, reached over the Postgres wire protocol.
pub struct RedshiftWarehouse {
    client: Client,
}

impl RedshiftWarehouse {
    pub async fn connect(cluster: &ClusterConfig) -> Result<Self> {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&cluster.host)
            .port(cluster.db_port)
            .dbname(&cluster.db_name)
            .user(&cluster.db_user)
            .password(&cluster.db_password);
        if let Some(timeout) = cluster.connect_timeout() {
            config.connect_timeout(timeout);
        }

        let (client, connection) = config.connect(NoTls).await.map_err(|e| {
            Error::Connectivity(format!(
                "Cannot connect to {}:{}/{}: {}",
                cluster.host, cluster.db_port, cluster.db_name, e
            ))
        })?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("Redshift connection error: {}", e);
            }
        });

        if let Some(timeout) = cluster.statement_timeout() {
            client
                .batch_execute(&format!("SET statement_timeout TO {}", timeout.as_millis()))
                .await?;
        }

        info!(host = %cluster.host, db = %cluster.db_name, "Connected to Redshift");
        Ok(Self { client })
    }
}

#[async_trait]
impl Warehouse for RedshiftWarehouse {
    fn engine(&self) -> &'static str {
        "redshift"
    }

    async fn drop_table(&mut self, table: &TableDef) -> Result<()> {
        self.client.batch_execute(&table.drop_sql()).await?;
        Ok(())
    }

    async fn create_table(&mut self, table: &TableDef) -> Result<()> {
        self.client.batch_execute(&table.create_sql()).await?;
        Ok(())
    }

    async fn describe_table(&mut self, table: &str) -> Result<Option<TableDescription>> {
        let rows = self.client.query(DESCRIBE_COLUMNS, &[&table]).await?;
        if rows.is_empty() {
            return Ok(None);
        }

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row.try_get(0)?;
            let data_type: String = row.try_get(1)?;
            let nullable: String = row.try_get(2)?;
            let sql_type = SqlType::from_catalog(&data_type, row.try_get(3)?, row.try_get(4)?)
                .ok_or_else(|| {
                    Error::Engine(format!(
                        "column {} of {} has unsupported type {}",
                        name, table, data_type
                    ))
                })?;
            columns.push(ColumnDescription {
                name,
                sql_type,
                nullable: nullable.eq_ignore_ascii_case("YES"),
            });
        }

        let primary_key = self
            .client
            .query(DESCRIBE_PRIMARY_KEY, &[&table])
            .await?
            .iter()
            .map(|row| row.try_get::<_, String>(0))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Some(TableDescription {
            columns,
            primary_key,
        }))
    }

    async fn copy_into(&mut self, directive: &CopyDirective) -> Result<u64> {
        let sql = directive.to_sql()?;
        debug!(table = directive.table, "Issuing COPY");

        let messages = self.client.simple_query(&sql).await?;
        let loaded = messages
            .iter()
            .filter_map(|message| match message {
                SimpleQueryMessage::CommandComplete(rows) => Some(*rows),
                _ => None,
            })
            .sum();
        Ok(loaded)
    }

    async fn query(&mut self, sql: &str) -> Result<Vec<Row>> {
        let rows = self.client.query(sql, &[]).await?;
        rows.iter().map(decode_row).collect()
    }

    async fn insert_rows(&mut self, statement: &InsertStatement, rows: &[Row]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut params: Vec<Box<dyn ToSql + Sync + Send>> =
            Vec::with_capacity(rows.len() * statement.columns().len());
        for row in rows {
            let values = statement.coerce_row(row).map_err(Error::Engine)?;
            for (value, (_, sql_type)) in values.into_iter().zip(statement.columns()) {
                params.push(sql_param(value, *sql_type));
            }
        }
        let refs: Vec<&(dyn ToSql + Sync)> = params
            .iter()
            .map(|param| param.as_ref() as &(dyn ToSql + Sync))
            .collect();

        let sql = statement.sql(rows.len());
        let transaction = self.client.transaction().await?;
        let inserted = transaction.execute(sql.as_str(), &refs).await?;
        transaction.commit().await?;
        Ok(inserted)
    }
}

// Nulls still need the column's type for the server to accept the parameter.
fn sql_param(value: Value, sql_type: SqlType) -> Box<dyn ToSql + Sync + Send> {
    match value {
        Value::Int(v) => Box::new(v),
        Value::BigInt(v) => Box::new(v),
        Value::Decimal(v) => Box::new(v),
        Value::Double(v) => Box::new(v),
        Value::Text(v) => Box::new(v),
        Value::Null => match sql_type {
            SqlType::Int => Box::new(None::<i32>),
            SqlType::BigInt => Box::new(None::<i64>),
            SqlType::Varchar => Box::new(None::<String>),
            SqlType::Decimal { .. } => Box::new(None::<Decimal>),
        },
    }
}

fn decode_row(row: &tokio_postgres::Row) -> Result<Row> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(idx, column)| decode_cell(row, idx, column.type_(), column.name()))
        .collect()
}

fn decode_cell(row: &tokio_postgres::Row, idx: usize, ty: &Type, name: &str) -> Result<Value> {
    let value = if *ty == Type::INT2 {
        row.try_get::<_, Option<i16>>(idx)?.map(|v| Value::Int(v as i32))
    } else if *ty == Type::INT4 {
        row.try_get::<_, Option<i32>>(idx)?.map(Value::Int)
    } else if *ty == Type::INT8 {
        row.try_get::<_, Option<i64>>(idx)?.map(Value::BigInt)
    } else if *ty == Type::NUMERIC {
        row.try_get::<_, Option<Decimal>>(idx)?.map(Value::Decimal)
    } else if *ty == Type::FLOAT4 {
        row.try_get::<_, Option<f32>>(idx)?.map(|v| Value::Double(v as f64))
    } else if *ty == Type::FLOAT8 {
        row.try_get::<_, Option<f64>>(idx)?.map(Value::Double)
    } else if *ty == Type::BOOL {
        row.try_get::<_, Option<bool>>(idx)?.map(|v| Value::Text(v.to_string()))
    } else if *ty == Type::VARCHAR
        || *ty == Type::TEXT
        || *ty == Type::BPCHAR
        || *ty == Type::NAME
    {
        row.try_get::<_, Option<String>>(idx)?.map(Value::Text)
    } else {
        return Err(Error::Engine(format!(
            "column {} has unsupported type {}",
            name, ty
        )));
    };
    Ok(value.unwrap_or(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_postgres::types::IsNull;

    fn encodes(param: &(dyn ToSql + Sync), ty: &Type) -> bool {
        let mut buf = bytes::BytesMut::new();
        param.to_sql_checked(ty, &mut buf).is_ok()
    }

    #[test]
    fn test_null_params_carry_column_type() {
        let null_int = sql_param(Value::Null, SqlType::Int);
        assert!(encodes(null_int.as_ref(), &Type::INT4));
        assert!(!encodes(null_int.as_ref(), &Type::VARCHAR));

        let null_text = sql_param(Value::Null, SqlType::Varchar);
        assert!(encodes(null_text.as_ref(), &Type::VARCHAR));

        let mut buf = bytes::BytesMut::new();
        let null_decimal = sql_param(
            Value::Null,
            SqlType::Decimal {
                precision: 18,
                scale: 0,
            },
        );
        assert!(matches!(
            null_decimal.to_sql_checked(&Type::NUMERIC, &mut buf),
            Ok(IsNull::Yes)
        ));
    }

    #[test]
    fn test_values_encode_for_their_column() {
        let int = sql_param(Value::Int(5), SqlType::Int);
        assert!(encodes(int.as_ref(), &Type::INT4));

        let decimal = sql_param(
            Value::Decimal(Decimal::from(1541106106_i64)),
            SqlType::Decimal {
                precision: 18,
                scale: 0,
            },
        );
        assert!(encodes(decimal.as_ref(), &Type::NUMERIC));

        let text = sql_param(Value::from("paid"), SqlType::Varchar);
        assert!(encodes(text.as_ref(), &Type::VARCHAR));
    }
}
