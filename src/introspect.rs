//! Schema introspection with a process-lifetime cache
//!
//! Reads `information_schema.columns` for every table in the public schema
//! and builds a table -> columns mapping in store-reported order. The cache
//! is owned by the introspector and replaced wholesale on refresh; it is
//! never partially mutated, and a failed introspection leaves it untouched.

use crate::error::{MosaicError, Result};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;
use tracing::info;

/// One table and its columns, in ordinal position order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableColumns {
    pub name: String,
    pub columns: Vec<String>,
}

/// Ordered table -> columns mapping. Table order is the store's report
/// order; table names are unique.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SchemaMap {
    pub tables: Vec<TableColumns>,
}

impl SchemaMap {
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Render the schema as a prompt block: one `table: col1, col2, ...`
    /// line per table, in mapping order.
    pub fn render(&self) -> String {
        self.tables
            .iter()
            .map(|t| format!("{}: {}", t.name, t.columns.join(", ")))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub struct SchemaIntrospector {
    pool: PgPool,
    cache: RwLock<Option<SchemaMap>>,
    runs: AtomicUsize,
}

impl SchemaIntrospector {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            cache: RwLock::new(None),
            runs: AtomicUsize::new(0),
        }
    }

    /// Number of completed store introspections. A cached `get_schema`
    /// leaves this unchanged; `refresh = true` always bumps it.
    pub fn introspection_runs(&self) -> usize {
        self.runs.load(Ordering::Relaxed)
    }

    /// Return the cached schema, introspecting the store on first access or
    /// when `refresh` is true. Concurrent cold-cache callers may introspect
    /// more than once; introspection is idempotent so last-write-wins is
    /// fine and no rebuild lock is held across the query.
    pub async fn get_schema(&self, refresh: bool) -> Result<SchemaMap> {
        if !refresh {
            let cached = self
                .cache
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .clone();
            if let Some(schema) = cached {
                return Ok(schema);
            }
        }

        let schema = self.introspect().await?;

        let mut guard = self
            .cache
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Some(schema.clone());

        Ok(schema)
    }

    async fn introspect(&self) -> Result<SchemaMap> {
        info!("Introspecting database schema");

        let rows = sqlx::query(
            r#"
            SELECT table_name, column_name
            FROM information_schema.columns
            WHERE table_schema = 'public'
            ORDER BY table_name, ordinal_position
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MosaicError::Introspection(format!("Failed to inspect schema: {}", e)))?;

        let mut tables: Vec<TableColumns> = Vec::new();
        for row in rows {
            let table: String = row
                .try_get("table_name")
                .map_err(|e| MosaicError::Introspection(e.to_string()))?;
            let column: String = row
                .try_get("column_name")
                .map_err(|e| MosaicError::Introspection(e.to_string()))?;

            match tables.last_mut() {
                Some(last) if last.name == table => last.columns.push(column),
                _ => tables.push(TableColumns {
                    name: table,
                    columns: vec![column],
                }),
            }
        }

        self.runs.fetch_add(1, Ordering::Relaxed);
        info!("Schema introspection found {} tables", tables.len());
        Ok(SchemaMap { tables })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_schema() -> SchemaMap {
        SchemaMap {
            tables: vec![
                TableColumns {
                    name: "users".to_string(),
                    columns: vec!["id".to_string(), "name".to_string(), "age".to_string()],
                },
                TableColumns {
                    name: "orders".to_string(),
                    columns: vec!["id".to_string(), "user_id".to_string(), "total".to_string()],
                },
            ],
        }
    }

    #[test]
    fn render_keeps_table_and_column_order() {
        let rendered = sample_schema().render();
        assert_eq!(rendered, "users: id, name, age\norders: id, user_id, total");
    }

    #[test]
    fn render_empty_schema_is_empty_string() {
        assert_eq!(SchemaMap::default().render(), "");
    }
}
