//! Natural language -> candidate SQL
//!
//! Builds a schema-aware prompt and asks the completion backend for a single
//! SQL query. The raw completion is untrusted text: markdown fences and
//! trailing semicolons are stripped here, but statement safety is the
//! validator's job, not this module's.

use crate::error::{MosaicError, Result};
use crate::introspect::SchemaMap;
use crate::llm::CompletionBackend;
use regex::Regex;
use std::sync::Arc;
use tracing::info;

pub struct SqlGenerator {
    backend: Arc<dyn CompletionBackend>,
}

impl SqlGenerator {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self { backend }
    }

    /// Convert a natural language query into candidate SQL, grounded in the
    /// introspected schema so the model cannot invent tables.
    pub async fn generate(&self, query: &str, schema: &SchemaMap) -> Result<String> {
        let schema_block = schema.render();

        let prompt = format!(
            r#"You are a helpful AI that converts natural language into SQL queries.

The database schema is as follows:
{}

User request:
{}

Rules:
- Return ONLY a valid SQL query.
- Do NOT include explanations or comments.
- Do NOT wrap the query in markdown fences (no ```sql)."#,
            schema_block, query
        );

        let completion = self.backend.complete(&prompt).await?;
        let sql = clean_sql(&completion);

        if sql.is_empty() {
            return Err(MosaicError::Generation(
                "Model returned empty SQL".to_string(),
            ));
        }

        info!("Generated candidate SQL: {}", sql);
        Ok(sql)
    }
}

/// Strip markdown code fences (with or without a language tag), surrounding
/// whitespace, and trailing semicolons from a raw completion. Models ignore
/// the no-fences instruction often enough that this has to be handled.
pub fn clean_sql(raw: &str) -> String {
    static FENCE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    let fence =
        FENCE.get_or_init(|| Regex::new(r"(?s)```[a-zA-Z]*\s*\n?(.*?)```").unwrap());

    let trimmed = raw.trim();

    // Prefer the fenced block content when one is present.
    let body = match fence.captures(trimmed) {
        Some(caps) => caps[1].to_string(),
        None => trimmed.replace("```", ""),
    };

    body.trim().trim_end_matches(';').trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::introspect::{SchemaMap, TableColumns};
    use async_trait::async_trait;

    struct StubBackend {
        reply: String,
    }

    #[async_trait]
    impl CompletionBackend for StubBackend {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            Ok(self.reply.clone())
        }
    }

    /// Stub that records the prompt it was given.
    struct CapturingBackend {
        seen: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CompletionBackend for CapturingBackend {
        async fn complete(&self, prompt: &str) -> Result<String> {
            self.seen.lock().unwrap().push(prompt.to_string());
            Ok("SELECT 1".to_string())
        }
    }

    fn users_schema() -> SchemaMap {
        SchemaMap {
            tables: vec![TableColumns {
                name: "users".to_string(),
                columns: vec!["id".to_string(), "name".to_string(), "age".to_string()],
            }],
        }
    }

    #[test]
    fn clean_sql_strips_tagged_fences() {
        let raw = "```sql\nSELECT * FROM users\n```";
        assert_eq!(clean_sql(raw), "SELECT * FROM users");
    }

    #[test]
    fn clean_sql_strips_untagged_fences() {
        let raw = "```\nSELECT id FROM users;\n```";
        assert_eq!(clean_sql(raw), "SELECT id FROM users");
    }

    #[test]
    fn clean_sql_passes_through_bare_sql() {
        assert_eq!(clean_sql("  SELECT 1;  "), "SELECT 1");
    }

    #[tokio::test]
    async fn generate_strips_fences_from_completion() {
        let generator = SqlGenerator::new(Arc::new(StubBackend {
            reply: "```sql\nSELECT * FROM users\n```".to_string(),
        }));
        let sql = generator
            .generate("show all users", &users_schema())
            .await
            .unwrap();
        assert_eq!(sql, "SELECT * FROM users");
    }

    #[tokio::test]
    async fn generate_rejects_empty_completion() {
        let generator = SqlGenerator::new(Arc::new(StubBackend {
            reply: "``````".to_string(),
        }));
        let err = generator
            .generate("show all users", &users_schema())
            .await
            .unwrap_err();
        assert!(matches!(err, MosaicError::Generation(_)));
    }

    #[tokio::test]
    async fn prompt_embeds_rendered_schema_and_query() {
        let backend = Arc::new(CapturingBackend {
            seen: std::sync::Mutex::new(Vec::new()),
        });
        let generator = SqlGenerator::new(backend.clone());
        generator
            .generate("show all users", &users_schema())
            .await
            .unwrap();

        let prompts = backend.seen.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("users: id, name, age"));
        assert!(prompts[0].contains("show all users"));
    }
}
