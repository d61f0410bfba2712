//! SQL statement-safety validation
//!
//! This is the security boundary between model-generated text and the
//! database. Candidate SQL is parsed with a real SQL grammar (sqlparser),
//! never regex: exactly one statement is allowed and it must be a SELECT.
//! The accepted statement is re-serialized from its AST, which normalizes
//! keyword case and spacing deterministically.

use crate::error::{MosaicError, Result};
use sqlparser::ast::{SetExpr, Statement};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

/// SQL text that has passed the single-SELECT check. Only this type may
/// reach the executor; the sole constructor is [`validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSql(String);

impl ValidatedSql {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ValidatedSql {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validate candidate SQL and return its canonical form.
///
/// Rejects empty input, unparseable text, chained/batched statements
/// (`SELECT ...; DROP ...`), and anything that is not a SELECT.
pub fn validate(candidate: &str) -> Result<ValidatedSql> {
    let trimmed = candidate.trim();
    if trimmed.is_empty() {
        return Err(MosaicError::Validation("Generated SQL is empty".to_string()));
    }

    let statements = Parser::parse_sql(&PostgreSqlDialect {}, trimmed)
        .map_err(|e| MosaicError::Validation(format!("Invalid SQL: {}", e)))?;

    if statements.is_empty() {
        return Err(MosaicError::Validation(
            "Invalid SQL: could not be parsed".to_string(),
        ));
    }
    if statements.len() > 1 {
        return Err(MosaicError::Validation(
            "Multiple SQL statements are not allowed".to_string(),
        ));
    }

    match &statements[0] {
        Statement::Query(query) => {
            // SELECT INTO parses as a query but writes a new table, so it
            // must not pass the read-only boundary.
            if let SetExpr::Select(select) = query.body.as_ref() {
                if select.into.is_some() {
                    return Err(MosaicError::Validation(
                        "SELECT INTO is not allowed".to_string(),
                    ));
                }
            }
            Ok(ValidatedSql(query.to_string()))
        }
        _ => Err(MosaicError::Validation(
            "Only SELECT statements are allowed".to_string(),
        )),
    }
}
