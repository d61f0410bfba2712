//! Pipeline orchestration
//!
//! Sequences introspection -> generation -> validation -> execution ->
//! segmentation, short-circuiting on the first failure. Failures come back
//! as a structured outcome, never a panic, with whatever SQL text was
//! produced kept for diagnostics. No step is retried; the caller resubmits
//! with a different natural-language query instead.

use crate::error::Result;
use crate::executor::{ResultRow, SqlExecutor};
use crate::generator::SqlGenerator;
use crate::introspect::SchemaIntrospector;
use crate::segmentation::{self, Segmentation};
use crate::validator;
use serde::Serialize;
use sqlx::PgPool;
use tracing::{error, info};

/// Outcome of one pipeline run. Exactly one of `results`/`error` is
/// populated; `segmentation` only alongside a non-empty `results`.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<ResultRow>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segmentation: Option<Segmentation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PipelineOutcome {
    fn failure(query: &str, sql: Option<String>, error: String) -> Self {
        Self {
            query: query.to_string(),
            sql,
            results: None,
            segmentation: None,
            error: Some(error),
        }
    }
}

/// Validated-SQL-plus-row-count preview for the stricter entry point, where
/// validation must succeed before anything downstream persists the query.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentPreview {
    pub natural_query: String,
    pub generated_sql: String,
    pub count: i64,
}

pub struct QueryPipeline {
    introspector: SchemaIntrospector,
    generator: SqlGenerator,
    executor: SqlExecutor,
}

impl QueryPipeline {
    pub fn new(pool: PgPool, generator: SqlGenerator) -> Self {
        Self {
            introspector: SchemaIntrospector::new(pool.clone()),
            generator,
            executor: SqlExecutor::new(pool),
        }
    }

    pub fn introspector(&self) -> &SchemaIntrospector {
        &self.introspector
    }

    /// Run the full pipeline for one natural-language query.
    pub async fn run(&self, query: &str) -> PipelineOutcome {
        info!("Pipeline run for query: {}", query);

        let schema = match self.introspector.get_schema(false).await {
            Ok(schema) => schema,
            Err(e) => {
                error!("Schema introspection failed: {}", e);
                return PipelineOutcome::failure(query, None, e.to_string());
            }
        };

        let candidate = match self.generator.generate(query, &schema).await {
            Ok(sql) => sql,
            Err(e) => {
                error!("SQL generation failed: {}", e);
                return PipelineOutcome::failure(query, None, e.to_string());
            }
        };

        let validated = match validator::validate(&candidate) {
            Ok(validated) => validated,
            Err(e) => {
                error!("SQL validation failed: {}", e);
                // Keep the offending candidate text for diagnostics.
                return PipelineOutcome::failure(query, Some(candidate), e.to_string());
            }
        };

        let results = match self.executor.execute(&validated).await {
            Ok(rows) => rows,
            Err(e) => {
                error!("SQL execution failed: {}", e);
                return PipelineOutcome::failure(query, Some(validated.to_string()), e.to_string());
            }
        };

        let segmentation = segmentation::segment(&results);

        PipelineOutcome {
            query: query.to_string(),
            sql: Some(validated.to_string()),
            results: Some(results),
            segmentation,
            error: None,
        }
    }

    /// Strict preview: generate, validate (mandatory), and count rows
    /// without materializing the result set.
    pub async fn preview(&self, query: &str) -> Result<SegmentPreview> {
        let schema = self.introspector.get_schema(false).await?;
        let candidate = self.generator.generate(query, &schema).await?;
        let validated = validator::validate(&candidate)?;
        let count = self.executor.count(&validated).await?;

        Ok(SegmentPreview {
            natural_query: query.to_string(),
            generated_sql: validated.to_string(),
            count,
        })
    }
}
