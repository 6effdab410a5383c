use crate::error::{AppError, AppResult};
use crate::query::plan::{BindValue, QueryPlan};
use crate::record::{MetricRecord, MetricValue};
use crate::sanitizer::validate_plan;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use sqlx::pool::PoolConnection;
use sqlx::postgres::PgRow;
use sqlx::{Column, PgConnection, Postgres, Row, TypeInfo, ValueRef};
use std::time::Instant;
use tracing::debug;

/// Runs a [`QueryPlan`] and returns its rows.
#[async_trait]
pub trait QueryExecutor: Send {
    async fn fetch_all(&mut self, plan: &QueryPlan) -> AppResult<Vec<MetricRecord>>;
}

#[async_trait]
impl QueryExecutor for PgConnection {
    async fn fetch_all(&mut self, plan: &QueryPlan) -> AppResult<Vec<MetricRecord>> {
        let mut query = sqlx::query(plan.sql());
        for param in plan.params() {
            query = match param {
                BindValue::Text(value) => query.bind(value.clone()),
                BindValue::Int(value) => query.bind(*value),
                BindValue::Decimal(value) => query.bind(*value),
                BindValue::Date(value) => query.bind(*value),
                BindValue::Bool(value) => query.bind(*value),
            };
        }

        let rows = query.fetch_all(&mut *self).await?;
        rows.iter().map(pg_row_to_record).collect()
    }
}

#[async_trait]
impl QueryExecutor for PoolConnection<Postgres> {
    async fn fetch_all(&mut self, plan: &QueryPlan) -> AppResult<Vec<MetricRecord>> {
        QueryExecutor::fetch_all(&mut **self, plan).await
    }
}

/// Validate a plan, run it, and log what ran. Parameter values are never logged.
pub async fn fetch(executor: &mut dyn QueryExecutor, plan: &QueryPlan) -> AppResult<Vec<MetricRecord>> {
    validate_plan(plan)?;
    debug!(sql = %plan.sql(), params = plan.params().len(), "executing query plan");

    let start = Instant::now();
    let rows = executor.fetch_all(plan).await?;
    debug!(
        rows = rows.len(),
        execution_time_ms = start.elapsed().as_millis() as u64,
        "query plan finished"
    );
    Ok(rows)
}

/// Run a plan expected to return exactly one row, such as an ungrouped aggregate.
pub async fn fetch_one(executor: &mut dyn QueryExecutor, plan: &QueryPlan) -> AppResult<MetricRecord> {
    fetch(executor, plan)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::QueryError("aggregate query returned no row".into()))
}

fn pg_row_to_record(row: &PgRow) -> AppResult<MetricRecord> {
    let mut record = MetricRecord::new();

    for (idx, column) in row.columns().iter().enumerate() {
        let name = column.name().to_string();
        let col_type = column.type_info().name();

        let raw_value = row.try_get_raw(idx)?;
        if raw_value.is_null() {
            record.insert(name, MetricValue::Null);
            continue;
        }

        let value = match col_type {
            "BOOL" => row.try_get::<bool, _>(idx).map(MetricValue::Bool)?,

            "INT2" => row.try_get::<i16, _>(idx).map(|v| MetricValue::Int(v.into()))?,
            "INT4" => row.try_get::<i32, _>(idx).map(|v| MetricValue::Int(v.into()))?,
            "INT8" => row.try_get::<i64, _>(idx).map(MetricValue::Int)?,

            "FLOAT4" => row
                .try_get::<f32, _>(idx)
                .map(|v| Decimal::from_f32(v).map(MetricValue::Decimal).unwrap_or(MetricValue::Null))?,
            "FLOAT8" => row
                .try_get::<f64, _>(idx)
                .map(|v| Decimal::from_f64(v).map(MetricValue::Decimal).unwrap_or(MetricValue::Null))?,

            "NUMERIC" => row.try_get::<Decimal, _>(idx).map(MetricValue::Decimal)?,

            "DATE" => row.try_get::<NaiveDate, _>(idx).map(MetricValue::Date)?,
            "TIMESTAMP" => row
                .try_get::<NaiveDateTime, _>(idx)
                .map(|v| MetricValue::Text(v.to_string()))?,

            // TEXT, VARCHAR, BPCHAR, NAME and anything else readable as a string
            _ => match row.try_get::<String, _>(idx) {
                Ok(value) => MetricValue::Text(value),
                Err(_) => MetricValue::Text(format!("<unsupported: {}>", col_type)),
            },
        };

        record.insert(name, value);
    }

    Ok(record)
}
