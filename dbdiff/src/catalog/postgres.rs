//! PostgreSQL catalog backend
//!
//! Introspects a single schema through `information_schema` and `pg_catalog`.
//! All values are read back as text so both sides render them identically.

use async_trait::async_trait;
use sqlx::{FromRow, Pool, Postgres, Row as _};
use std::collections::HashMap;

use crate::catalog::types::{Column, ConstraintKind, KeyColumn, KeyValue, Row, SequenceDescriptor};
use crate::catalog::CatalogBackend;
use crate::error::Result;
use crate::utils::naming::{quote_ident, select_list, QuoteStyle};

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

#[derive(FromRow)]
struct SequenceRow {
    last_value: i64,
    start_value: i64,
    increment_by: i64,
    max_value: i64,
    min_value: i64,
    data_type: String,
    numeric_precision: i64,
}

/// PostgreSQL backend scoped to one schema
pub struct PostgresBackend {
    pool: Pool<Postgres>,
    schema: String,
}

impl PostgresBackend {
    pub fn new(pool: Pool<Postgres>, schema: Option<&str>) -> Self {
        Self {
            pool,
            schema: schema.unwrap_or("public").to_string(),
        }
    }

    fn qualified(&self, table: &str) -> String {
        format!(
            "{}.{}",
            quote_ident(&self.schema, QuoteStyle::Ansi),
            quote_ident(table, QuoteStyle::Ansi)
        )
    }
}

#[async_trait]
impl CatalogBackend for PostgresBackend {
    fn driver(&self) -> &str {
        "postgres"
    }

    async fn fetch_table_names(&self) -> Result<Vec<String>> {
        let sql = r#"
            SELECT table_name::text AS name
            FROM information_schema.tables
            WHERE table_schema = $1 AND table_type = 'BASE TABLE'
            ORDER BY table_name
        "#;

        let rows = sqlx::query_as::<_, NameRow>(sql)
            .bind(&self.schema)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|r| r.name).collect())
    }

    async fn fetch_sequence_names(&self) -> Result<Vec<String>> {
        let sql = r#"
            SELECT sequence_name::text AS name
            FROM information_schema.sequences
            WHERE sequence_schema = $1
            ORDER BY sequence_name
        "#;

        let rows = sqlx::query_as::<_, NameRow>(sql)
            .bind(&self.schema)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|r| r.name).collect())
    }

    async fn fetch_primary_keys(&self) -> Result<Vec<(String, KeyColumn)>> {
        let sql = r#"
            SELECT
                tc.table_name::text AS table_name,
                kcu.column_name::text AS column_name,
                format_type(a.atttypid, a.atttypmod) AS sql_type
            FROM
                information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
                ON tc.constraint_name = kcu.constraint_name
                AND tc.table_schema = kcu.table_schema
                AND tc.table_name = kcu.table_name
            JOIN pg_attribute a
                ON a.attrelid = format('%I.%I', tc.table_schema, tc.table_name)::regclass
                AND a.attname = kcu.column_name
            WHERE
                tc.constraint_type = 'PRIMARY KEY'
                AND tc.table_schema = $1
            ORDER BY tc.table_name, kcu.ordinal_position
        "#;

        let rows = sqlx::query_as::<_, PrimaryKeyRow>(sql)
            .bind(&self.schema)
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
        let sql = format!("SELECT count(*) FROM {}", self.qualified(table));
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }

    async fn fetch_columns(&self, table: &str) -> Result<Vec<Column>> {
        let sql = r#"
            SELECT
                column_name::text AS column_name,
                data_type::text AS data_type,
                is_nullable::text AS is_nullable,
                column_default::text AS column_default
            FROM information_schema.columns
            WHERE table_schema = $1 AND table_name = $2
            ORDER BY ordinal_position
        "#;

        let column_rows = sqlx::query_as::<_, ColumnRow>(sql)
            .bind(&self.schema)
            .bind(table)
            .fetch_all(&self.pool)
            .await?;

        // Key-style constraints name their own columns in key_column_usage,
        // CHECK constraints only appear in constraint_column_usage
        let sql = r#"
            SELECT kcu.column_name::text AS column_name, tc.constraint_type::text AS constraint_type
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
                ON tc.constraint_name = kcu.constraint_name
                AND tc.table_schema = kcu.table_schema
                AND tc.table_name = kcu.table_name
            WHERE tc.table_schema = $1 AND tc.table_name = $2
                AND tc.constraint_type IN ('PRIMARY KEY', 'UNIQUE', 'FOREIGN KEY')
            UNION ALL
            SELECT ccu.column_name::text, tc.constraint_type::text
            FROM information_schema.table_constraints tc
            JOIN information_schema.constraint_column_usage ccu
                ON tc.constraint_name = ccu.constraint_name
                AND tc.table_schema = ccu.constraint_schema
            WHERE tc.table_schema = $1 AND tc.table_name = $2
                AND tc.constraint_type = 'CHECK'
        "#;

        let constraint_rows = sqlx::query_as::<_, ConstraintRow>(sql)
            .bind(&self.schema)
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
        let column = quote_ident(&key.name, QuoteStyle::Ansi);
        let sql = format!(
            "SELECT {column}::text FROM {} ORDER BY {column}",
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
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = CAST($1 AS {})",
            select_list(columns, QuoteStyle::Ansi, |c| format!("{}::text", c)),
            self.qualified(table),
            quote_ident(&key.name, QuoteStyle::Ansi),
            key.sql_type,
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

    async fn fetch_sequence(&self, sequence: &str) -> Result<Option<SequenceDescriptor>> {
        // pg_sequences leaves last_value NULL until the first nextval()
        let sql = r#"
            SELECT
                COALESCE(s.last_value, s.start_value) AS last_value,
                s.start_value,
                s.increment_by,
                s.max_value,
                s.min_value,
                s.data_type::text AS data_type,
                COALESCE(i.numeric_precision::bigint, 0) AS numeric_precision
            FROM pg_sequences s
            JOIN information_schema.sequences i
                ON i.sequence_schema = s.schemaname
                AND i.sequence_name = s.sequencename
            WHERE s.schemaname = $1 AND s.sequencename = $2
        "#;

        let row = sqlx::query_as::<_, SequenceRow>(sql)
            .bind(&self.schema)
            .bind(sequence)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| SequenceDescriptor {
            last_value: r.last_value,
            start_value: r.start_value,
            increment_by: r.increment_by,
            max_value: r.max_value,
            min_value: r.min_value,
            precision: r.numeric_precision,
            data_type: r.data_type,
        }))
    }
}
