use crate::error::{AppError, AppResult};
use crate::query::plan::QueryPlan;
use regex::Regex;
use sqlparser::ast::Statement;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use std::sync::LazyLock;

/// Patterns no generated report query may contain
static DENY_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        // DML/DDL keywords
        Regex::new(r"(?i)\b(INSERT|UPDATE|DELETE|DROP|ALTER|CREATE|TRUNCATE|GRANT|REVOKE|COPY)\b").unwrap(),
        // Statement separators
        Regex::new(r";").unwrap(),
        // SQL comments
        Regex::new(r"--").unwrap(),
        Regex::new(r"/\*").unwrap(),
        // Union-based injection
        Regex::new(r"(?i)\bUNION\b.*\bSELECT\b").unwrap(),
        // System catalogs and admin functions
        Regex::new(r"(?i)\bpg_\w+").unwrap(),
    ]
});

/// Check a plan before it is executed: one read-only SELECT whose `$n`
/// placeholders line up with the bound parameters.
pub fn validate_plan(plan: &QueryPlan) -> AppResult<()> {
    let sql = plan.sql().trim();

    if sql.is_empty() {
        return Err(AppError::SecurityError("Empty query".into()));
    }

    if !sql.to_uppercase().starts_with("SELECT") {
        return Err(AppError::SecurityError(
            "Only SELECT queries may be executed".into(),
        ));
    }

    for (idx, pattern) in DENY_PATTERNS.iter().enumerate() {
        if pattern.is_match(sql) {
            return Err(AppError::SecurityError(format!(
                "Forbidden SQL pattern detected (rule {}): {}",
                idx + 1,
                pattern.as_str()
            )));
        }
    }

    let statements = Parser::parse_sql(&PostgreSqlDialect {}, sql)
        .map_err(|e| AppError::SecurityError(format!("Query does not parse: {}", e)))?;
    match statements.as_slice() {
        [Statement::Query(_)] => {}
        [_] => {
            return Err(AppError::SecurityError(
                "Only SELECT queries may be executed".into(),
            ))
        }
        _ => {
            return Err(AppError::SecurityError(format!(
                "Expected exactly one statement, found {}",
                statements.len()
            )))
        }
    }

    let expected: Vec<usize> = (1..=plan.params().len()).collect();
    let found = plan.placeholders();
    if found != expected {
        return Err(AppError::SecurityError(format!(
            "Placeholders {:?} do not match {} bound parameters",
            found,
            plan.params().len()
        )));
    }

    Ok(())
}
