//! MySQL catalog backend

use async_trait::async_trait;
use sqlx::{FromRow, MySql, Pool, Row as _};
use std::collections::HashMap;

use crate::catalog::types::{Column, ConstraintKind, KeyColumn, KeyValue, Row, SequenceDescriptor};
use crate::catalog::CatalogBackend;
use crate::error::Result;
use crate::utils::naming::{quote_ident, select_list, QuoteStyle};

// information_schema columns are upper-case in MySQL 8, every query aliases them

#[derive(FromRow)]
struct NameRow {
    name: String,
}

#[derive(FromRow)]
struct PrimaryKeyRow {
    table_name: String,
    column_name: String,
    sql_type: String,
}

#[derive(FromRow)]
struct ColumnRow {
    column_name: String,
    data_type: String,
    is_nullable: String,
    column_default: Option<String>,
}

#[derive(FromRow)]
struct ConstraintRow {
    column_name: String,
    constraint_type: String,
}

/// MySQL backend scoped to one database; defaults to the connection's database
pub struct MySqlBackend {
    pool: Pool<MySql>,
    schema: Option<String>,
}

impl MySqlBackend {
    pub fn new(pool: Pool<MySql>, schema: Option<&str>) -> Self {
        Self {
            pool,
            schema: schema.map(str::to_string),
        }
    }

    fn qualified(&self, table: &str) -> String {
        match &self.schema {
            Some(schema) => format!(
                "{}.{}",
                quote_ident(schema, QuoteStyle::Backtick),
                quote_ident(table, QuoteStyle::Backtick)
            ),
            None => quote_ident(table, QuoteStyle::Backtick),
        }
    }
}

#[async_trait]
impl CatalogBackend for MySqlBackend {
    fn driver(&self) -> &str {
        "mysql"
    }

    async fn fetch_table_names(&self) -> Result<Vec<String>> {
        let sql = r#"
            SELECT table_name AS name
            FROM information_schema.tables
            WHERE table_schema = COALESCE(?, DATABASE())
              AND table_type = 'BASE TABLE'
            ORDER BY table_name
        "#;

        let rows = sqlx::query_as::<_, NameRow>(sql)
            .bind(self.schema.as_deref())
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|r| r.name).collect())
    }

    async fn fetch_sequence_names(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn fetch_primary_keys(&self) -> Result<Vec<(String, KeyColumn)>> {
        let sql = r#"
            SELECT k.table_name AS table_name, k.column_name AS column_name, c.column_type AS sql_type
            FROM information_schema.table_constraints t
            JOIN information_schema.key_column_usage k
                ON t.constraint_name = k.constraint_name
                AND t.table_schema = k.table_schema
                AND t.table_name = k.table_name
            JOIN information_schema.columns c
                ON c.table_schema = k.table_schema
                AND c.table_name = k.table_name
                AND c.column_name = k.column_name
            WHERE t.table_schema = COALESCE(?, DATABASE())
              AND t.constraint_type = 'PRIMARY KEY'
            ORDER BY k.table_name, k.ordinal_position
        "#;

        let rows = sqlx::query_as::<_, PrimaryKeyRow>(sql)
            .bind(self.schema.as_deref())
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|r| {
                (
                    r.table_name,
                    KeyColumn {
                        name: r.column_name,
                        sql_type: r.sql_type,
                    },
                )
            })
            .collect())
    }

    async fn fetch_row_count(&self, table: &str) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", self.qualified(table));
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }

    async fn fetch_columns(&self, table: &str) -> Result<Vec<Column>> {
        let sql = r#"
            SELECT
                column_name AS column_name,
                data_type AS data_type,
                is_nullable AS is_nullable,
                column_default AS column_default
            FROM information_schema.columns
            WHERE table_schema = COALESCE(?, DATABASE()) AND table_name = ?
            ORDER BY ordinal_position
        "#;

        let column_rows = sqlx::query_as::<_, ColumnRow>(sql)
            .bind(self.schema.as_deref())
            .bind(table)
            .fetch_all(&self.pool)
            .await?;

        let sql = r#"
            SELECT k.column_name AS column_name, t.constraint_type AS constraint_type
            FROM information_schema.table_constraints t
            JOIN information_schema.key_column_usage k
                ON t.constraint_name = k.constraint_name
                AND t.table_schema = k.table_schema
                AND t.table_name = k.table_name
            WHERE t.table_schema = COALESCE(?, DATABASE()) AND t.table_name = ?
              AND t.constraint_type IN ('PRIMARY KEY', 'UNIQUE', 'FOREIGN KEY')
        "#;

        let constraint_rows = sqlx::query_as::<_, ConstraintRow>(sql)
            .bind(self.schema.as_deref())
            .bind(table)
            .fetch_all(&self.pool)
            .await?;

        let mut kinds: HashMap<String, ConstraintKind> = HashMap::new();
        for row in constraint_rows {
            let kind = ConstraintKind::from_catalog(&row.constraint_type);
            let entry = kinds.entry(row.column_name).or_default();
            *entry = entry.strongest(kind);
        }

        Ok(column_rows
            .into_iter()
            .map(|col| {
                let constraint = kinds.get(&col.column_name).copied().unwrap_or_default();
                Column {
                    name: col.column_name,
                    data_type: col.data_type,
                    nullable: col.is_nullable == "YES",
                    default: col.column_default,
                    constraint,
                }
            })
            .collect())
    }

    async fn fetch_key_values(&self, table: &str, key: &KeyColumn) -> Result<Vec<KeyValue>> {
        let column = quote_ident(&key.name, QuoteStyle::Backtick);
        let sql = format!(
            "SELECT CAST({column} AS CHAR) FROM {} ORDER BY {column}",
            self.qualified(table),
        );

        let values: Vec<Option<String>> = sqlx::query_scalar(&sql).fetch_all(&self.pool).await?;
        Ok(values.into_iter().flatten().map(KeyValue).collect())
    }

    async fn fetch_row(
        &self,
        table: &str,
        key: &KeyColumn,
        columns: &[String],
        value: &KeyValue,
    ) -> Result<Option<Row>> {
        // MySQL coerces the bound text to the key column's type
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?",
            select_list(columns, QuoteStyle::Backtick, |c| format!("CAST({} AS CHAR)", c)),
            self.qualified(table),
            quote_ident(&key.name, QuoteStyle::Backtick),
        );

        let row = sqlx::query(&sql)
            .bind(value.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let mut values = Vec::with_capacity(columns.len());
                for i in 0..columns.len() {
                    values.push(row.try_get::<Option<String>, _>(i)?);
                }
                Ok(Some(values))
            }
            None => Ok(None),
        }
    }

    async fn fetch_sequence(&self, _sequence: &str) -> Result<Option<SequenceDescriptor>> {
        Ok(None)
    }
}
