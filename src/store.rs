//! Request-scoped access to the relational store.
//!
//! Every operation checks one connection out of the startup pool, runs
//! exactly one statement with its parameters bound positionally, and hands
//! the connection back when the guard drops. Release happens on every exit
//! path, including statement failure and panics in result handling.
//! Acquisition failures and statement failures stay distinct
//! (`AppError::Connection` vs `AppError::Query`) and are never retried here.

use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::query::{Query, QueryAs};
use sqlx::{FromRow, PgPool, Postgres};
use std::time::Duration;

use crate::config::Config;
use crate::errors::AppError;
use crate::query::SqlValue;

const MAX_CONNECTIONS: u32 = 10;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// Handle to the applications table's backing store.
#[derive(Clone)]
pub struct ApplicationStore {
    pool: PgPool,
}

impl ApplicationStore {
    /// Creates the pool and probes it once so a bad target fails at startup
    /// rather than on the first request.
    pub async fn connect(config: &Config) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(&config.database_url)
            .await?;

        sqlx::query("SELECT 1").execute(&pool).await?;

        Ok(Self { pool })
    }

    /// Runs a row-returning statement and maps the full row set.
    pub async fn fetch_all<T>(&self, sql: &str, params: Vec<SqlValue>) -> Result<Vec<T>, AppError>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let mut conn = self.pool.acquire().await.map_err(AppError::Connection)?;
        bind_query_as::<T>(sql, params)
            .fetch_all(&mut *conn)
            .await
            .map_err(AppError::Query)
    }

    /// Runs a row-returning statement expecting zero or one row.
    pub async fn fetch_optional<T>(
        &self,
        sql: &str,
        params: Vec<SqlValue>,
    ) -> Result<Option<T>, AppError>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let mut conn = self.pool.acquire().await.map_err(AppError::Connection)?;
        bind_query_as::<T>(sql, params)
            .fetch_optional(&mut *conn)
            .await
            .map_err(AppError::Query)
    }

    /// Runs a statement expecting exactly one row (aggregates, counts).
    pub async fn fetch_one<T>(&self, sql: &str, params: Vec<SqlValue>) -> Result<T, AppError>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let mut conn = self.pool.acquire().await.map_err(AppError::Connection)?;
        bind_query_as::<T>(sql, params)
            .fetch_one(&mut *conn)
            .await
            .map_err(AppError::Query)
    }

    /// Runs a mutation and reports rows affected.
    pub async fn execute(&self, sql: &str, params: Vec<SqlValue>) -> Result<u64, AppError> {
        let mut conn = self.pool.acquire().await.map_err(AppError::Connection)?;
        bind_query(sql, params)
            .execute(&mut *conn)
            .await
            .map(|r| r.rows_affected())
            .map_err(AppError::Query)
    }

    /// Connectivity probe for the test endpoint.
    pub async fn ping(&self) -> Result<(), AppError> {
        let mut conn = self.pool.acquire().await.map_err(AppError::Connection)?;
        sqlx::query("SELECT 1")
            .execute(&mut *conn)
            .await
            .map_err(AppError::Query)?;
        Ok(())
    }
}

fn bind_query(sql: &str, params: Vec<SqlValue>) -> Query<'_, Postgres, PgArguments> {
    let mut q = sqlx::query(sql);
    for p in params {
        q = match p {
            SqlValue::Text(v) => q.bind(v),
            SqlValue::Int(v) => q.bind(v),
            SqlValue::Numeric(v) => q.bind(v),
            SqlValue::Bool(v) => q.bind(v),
            SqlValue::Date(v) => q.bind(v),
            SqlValue::Timestamp(v) => q.bind(v),
        };
    }
    q
}

fn bind_query_as<T>(sql: &str, params: Vec<SqlValue>) -> QueryAs<'_, Postgres, T, PgArguments>
where
    T: for<'r> FromRow<'r, PgRow>,
{
    let mut q = sqlx::query_as::<_, T>(sql);
    for p in params {
        q = match p {
            SqlValue::Text(v) => q.bind(v),
            SqlValue::Int(v) => q.bind(v),
            SqlValue::Numeric(v) => q.bind(v),
            SqlValue::Bool(v) => q.bind(v),
            SqlValue::Date(v) => q.bind(v),
            SqlValue::Timestamp(v) => q.bind(v),
        };
    }
    q
}
