//! `sqlx` Postgres implementation of [`AccountStore`].

use super::{
    AccountStore, MemberOutcome, MemberRole, Merchant, NewApiKey, NewMerchant, SessionLog,
    StoreFuture, UserProfile,
};
use anyhow::{Context, Result, anyhow};
use sqlx::{
    Connection, PgPool, Row,
    postgres::{PgPoolOptions, PgRow},
};
use std::time::Duration;
use tracing::{Instrument, info_span};
use uuid::Uuid;

pub const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

const MERCHANT_COLUMNS: &str = "id, owner_user_id, name, country, currency, channel, status, onboarding_stage, created_at";

#[derive(Clone, Debug)]
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a small pool against `dsn`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be reached.
    pub async fn connect(dsn: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(5)
            .max_lifetime(Duration::from_secs(60 * 2))
            .test_before_acquire(true)
            .connect(dsn)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply `sql/schema.sql` statement by statement. Every statement is idempotent.
    ///
    /// # Errors
    /// Returns an error naming the first statement that fails.
    pub async fn apply_schema(&self) -> Result<usize> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .context("Failed to acquire connection for schema setup")?;
        let statements = split_sql_statements(SCHEMA_SQL);
        for (index, statement) in statements.iter().enumerate() {
            let span = info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "DDL",
                db.statement = statement.as_str()
            );
            sqlx::query(statement)
                .execute(&mut *conn)
                .instrument(span)
                .await
                .with_context(|| format!("failed to execute schema statement {}", index + 1))?;
        }
        Ok(statements.len())
    }
}

fn merchant_from_row(row: &PgRow) -> Merchant {
    Merchant {
        id: row.get("id"),
        owner_user_id: row.get("owner_user_id"),
        name: row.get("name"),
        country: row.get("country"),
        currency: row.get("currency"),
        channel: row.get("channel"),
        status: row.get("status"),
        onboarding_stage: row.get("onboarding_stage"),
        created_at: row.get("created_at"),
    }
}

fn span(operation: &'static str, statement: &str) -> tracing::Span {
    info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

impl AccountStore for PgAccountStore {
    fn ping(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let acquire_span = info_span!(
                "db.acquire",
                db.system = "postgresql",
                db.operation = "ACQUIRE"
            );
            let mut conn = self
                .pool
                .acquire()
                .instrument(acquire_span)
                .await
                .context("Failed to acquire database connection")?;
            let ping_span = info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
            conn.ping()
                .instrument(ping_span)
                .await
                .context("Failed to ping database")
        })
    }

    fn find_profile(&self, user_id: Uuid) -> StoreFuture<'_, Option<UserProfile>> {
        Box::pin(async move {
            let query = r"
                SELECT user_id, full_name, phone, profile_type, default_merchant_id
                FROM users_profile
                WHERE user_id = $1
            ";
            let row = sqlx::query(query)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .instrument(span("SELECT", query))
                .await
                .context("failed to lookup user profile")?;

            row.map(|row| {
                let profile_type: String = row.get("profile_type");
                Ok(UserProfile {
                    user_id: row.get("user_id"),
                    full_name: row.get("full_name"),
                    phone: row.get("phone"),
                    profile_type: profile_type.parse().map_err(|err: String| anyhow!(err))?,
                    default_merchant_id: row.get("default_merchant_id"),
                })
            })
            .transpose()
        })
    }

    fn find_merchant(&self, merchant_id: Uuid) -> StoreFuture<'_, Option<Merchant>> {
        Box::pin(async move {
            let query = format!("SELECT {MERCHANT_COLUMNS} FROM merchants WHERE id = $1");
            let row = sqlx::query(&query)
                .bind(merchant_id)
                .fetch_optional(&self.pool)
                .instrument(span("SELECT", &query))
                .await
                .context("failed to lookup merchant")?;
            Ok(row.as_ref().map(merchant_from_row))
        })
    }

    fn find_merchant_by_owner(&self, owner_user_id: Uuid) -> StoreFuture<'_, Option<Merchant>> {
        Box::pin(async move {
            let query = format!(
                "SELECT {MERCHANT_COLUMNS} FROM merchants WHERE owner_user_id = $1 ORDER BY created_at LIMIT 1"
            );
            let row = sqlx::query(&query)
                .bind(owner_user_id)
                .fetch_optional(&self.pool)
                .instrument(span("SELECT", &query))
                .await
                .context("failed to lookup merchant by owner")?;
            Ok(row.as_ref().map(merchant_from_row))
        })
    }

    fn insert_merchant<'a>(&'a self, merchant: &'a NewMerchant) -> StoreFuture<'a, Merchant> {
        Box::pin(async move {
            let query = format!(
                r"
                INSERT INTO merchants
                    (owner_user_id, name, country, currency, channel, status, onboarding_stage)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING {MERCHANT_COLUMNS}
                "
            );
            let row = sqlx::query(&query)
                .bind(merchant.owner_user_id)
                .bind(&merchant.name)
                .bind(&merchant.country)
                .bind(&merchant.currency)
                .bind(&merchant.channel)
                .bind(&merchant.status)
                .bind(&merchant.onboarding_stage)
                .fetch_one(&self.pool)
                .instrument(span("INSERT", &query))
                .await
                .context("failed to insert merchant")?;
            Ok(merchant_from_row(&row))
        })
    }

    fn delete_merchant(&self, merchant_id: Uuid) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let query = "DELETE FROM merchants WHERE id = $1";
            sqlx::query(query)
                .bind(merchant_id)
                .execute(&self.pool)
                .instrument(span("DELETE", query))
                .await
                .context("failed to delete merchant")?;
            Ok(())
        })
    }

    fn upsert_profile<'a>(&'a self, profile: &'a UserProfile) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let query = r"
                INSERT INTO users_profile
                    (user_id, full_name, phone, profile_type, default_merchant_id)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (user_id) DO UPDATE SET
                    full_name = EXCLUDED.full_name,
                    phone = EXCLUDED.phone,
                    profile_type = EXCLUDED.profile_type,
                    default_merchant_id = EXCLUDED.default_merchant_id,
                    updated_at = NOW()
            ";
            sqlx::query(query)
                .bind(profile.user_id)
                .bind(&profile.full_name)
                .bind(&profile.phone)
                .bind(profile.profile_type.as_str())
                .bind(profile.default_merchant_id)
                .execute(&self.pool)
                .instrument(span("INSERT", query))
                .await
                .context("failed to upsert user profile")?;
            Ok(())
        })
    }

    fn member_exists(&self, merchant_id: Uuid, user_id: Uuid) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            let query = r"
                SELECT EXISTS (
                    SELECT 1 FROM merchant_members WHERE merchant_id = $1 AND user_id = $2
                ) AS present
            ";
            let row = sqlx::query(query)
                .bind(merchant_id)
                .bind(user_id)
                .fetch_one(&self.pool)
                .instrument(span("SELECT", query))
                .await
                .context("failed to lookup merchant membership")?;
            Ok(row.get("present"))
        })
    }

    fn insert_member(
        &self,
        merchant_id: Uuid,
        user_id: Uuid,
        role: MemberRole,
    ) -> StoreFuture<'_, MemberOutcome> {
        Box::pin(async move {
            let query = "INSERT INTO merchant_members (merchant_id, user_id, role) VALUES ($1, $2, $3)";
            let result = sqlx::query(query)
                .bind(merchant_id)
                .bind(user_id)
                .bind(role.as_str())
                .execute(&self.pool)
                .instrument(span("INSERT", query))
                .await;
            match result {
                Ok(_) => Ok(MemberOutcome::Created),
                Err(err) if is_unique_violation(&err) => Ok(MemberOutcome::AlreadyMember),
                Err(err) => Err(err).context("failed to insert merchant membership"),
            }
        })
    }

    fn insert_api_key<'a>(&'a self, key: &'a NewApiKey) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let query = r"
                INSERT INTO api_keys
                    (merchant_id, name, key_type, public_key, secret_key_hash, secret_key_prefix, is_active, created_by)
                VALUES ($1, $2, $3, $4, $5, $6, TRUE, $7)
            ";
            sqlx::query(query)
                .bind(key.merchant_id)
                .bind(&key.name)
                .bind(&key.key_type)
                .bind(&key.public_key)
                .bind(&key.secret_key_hash)
                .bind(&key.secret_key_prefix)
                .bind(key.created_by)
                .execute(&self.pool)
                .instrument(span("INSERT", query))
                .await
                .context("failed to insert api key")?;
            Ok(())
        })
    }

    fn list_merchants(&self) -> StoreFuture<'_, Vec<Merchant>> {
        Box::pin(async move {
            let query = format!("SELECT {MERCHANT_COLUMNS} FROM merchants ORDER BY created_at");
            let rows = sqlx::query(&query)
                .fetch_all(&self.pool)
                .instrument(span("SELECT", &query))
                .await
                .context("failed to list merchants")?;
            Ok(rows.iter().map(merchant_from_row).collect())
        })
    }

    fn count_active_api_keys(&self, merchant_id: Uuid) -> StoreFuture<'_, i64> {
        Box::pin(async move {
            let query =
                "SELECT COUNT(*) AS total FROM api_keys WHERE merchant_id = $1 AND is_active = TRUE";
            let row = sqlx::query(query)
                .bind(merchant_id)
                .fetch_one(&self.pool)
                .instrument(span("SELECT", query))
                .await
                .context("failed to count api keys")?;
            Ok(row.get("total"))
        })
    }

    fn insert_session_log<'a>(&'a self, log: &'a SessionLog) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let query = r"
                INSERT INTO session_logs
                    (user_id, ip_address, user_agent, device_type, browser, os, is_active)
                VALUES ($1, $2, $3, $4, $5, $6, TRUE)
            ";
            sqlx::query(query)
                .bind(log.user_id)
                .bind(&log.ip_address)
                .bind(&log.user_agent)
                .bind(&log.device_type)
                .bind(&log.browser)
                .bind(&log.os)
                .execute(&self.pool)
                .instrument(span("INSERT", query))
                .await
                .context("failed to insert session log")?;
            Ok(())
        })
    }
}

#[must_use]
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

/// Split a schema file into statements on lines ending with `;`.
/// `\ir` include lines (psql only) are skipped.
#[must_use]
pub fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("\\ir ") || trimmed.starts_with("--") {
            continue;
        }
        current.push_str(line);
        current.push('\n');

        if trimmed.ends_with(';') {
            let statement = current.trim();
            if !statement.is_empty() {
                statements.push(statement.to_string());
            }
            current.clear();
        }
    }

    let leftover = current.trim();
    if !leftover.is_empty() {
        statements.push(leftover.to_string());
    }

    statements
}
