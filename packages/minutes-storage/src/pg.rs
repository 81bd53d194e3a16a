use std::time::Duration;

use serde_json::Value;
use sqlx::{PgPool, postgres::PgPoolOptions};
use time::OffsetDateTime;

use crate::{BoxFuture, KvStore, Result, schema};

const SCHEMA_LOCK_ID: i64 = 7_120_301;

pub struct PgKvStore {
	pub pool: PgPool,
}
impl PgKvStore {
	pub async fn connect(cfg: &minutes_config::Postgres) -> Result<Self> {
		let pool =
			PgPoolOptions::new().max_connections(cfg.pool_max_conns).connect(&cfg.dsn).await?;

		Ok(Self { pool })
	}

	pub async fn ensure_schema(&self) -> Result<()> {
		let sql = schema::render_schema();
		// The advisory lock is transaction scoped so concurrent starts apply DDL one at a time.
		let mut tx = self.pool.begin().await?;

		sqlx::query("SELECT pg_advisory_xact_lock($1)").bind(SCHEMA_LOCK_ID).execute(&mut *tx).await?;

		for statement in sql.split(';') {
			let trimmed = statement.trim();

			if trimmed.is_empty() {
				continue;
			}

			sqlx::query(trimmed).execute(&mut *tx).await?;
		}

		tx.commit().await?;

		Ok(())
	}

	pub async fn purge_expired(&self) -> Result<u64> {
		let result =
			sqlx::query("DELETE FROM kv_entries WHERE expires_at IS NOT NULL AND expires_at <= now()")
				.execute(&self.pool)
				.await?;

		Ok(result.rows_affected())
	}
}
impl KvStore for PgKvStore {
	fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Value>>> {
		Box::pin(async move {
			let value = sqlx::query_scalar::<_, Value>(
				"\
SELECT value
FROM kv_entries
WHERE key = $1 AND (expires_at IS NULL OR expires_at > now())",
			)
			.bind(key)
			.fetch_optional(&self.pool)
			.await?;

			Ok(value)
		})
	}

	fn set<'a>(
		&'a self,
		key: &'a str,
		value: Value,
		ttl: Option<Duration>,
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			sqlx::query(
				"\
INSERT INTO kv_entries (key, value, expires_at, updated_at)
VALUES ($1, $2, $3, now())
ON CONFLICT (key) DO UPDATE
SET value = EXCLUDED.value, expires_at = EXCLUDED.expires_at, updated_at = now()",
			)
			.bind(key)
			.bind(value)
			.bind(expires_at(ttl))
			.execute(&self.pool)
			.await?;

			Ok(())
		})
	}

	fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move {
			let deleted = sqlx::query_scalar::<_, bool>(
				"\
DELETE FROM kv_entries
WHERE key = $1
RETURNING (expires_at IS NULL OR expires_at > now())",
			)
			.bind(key)
			.fetch_optional(&self.pool)
			.await?;

			Ok(deleted.unwrap_or(false))
		})
	}

	fn list_prefix<'a>(
		&'a self,
		prefix: &'a str,
		limit: usize,
	) -> BoxFuture<'a, Result<Vec<(String, Value)>>> {
		Box::pin(async move {
			let pattern = format!("{}%", escape_like(prefix));
			let rows = sqlx::query_as::<_, (String, Value)>(
				"\
SELECT key, value
FROM kv_entries
WHERE key LIKE $1 ESCAPE '\\' AND (expires_at IS NULL OR expires_at > now())
ORDER BY key
LIMIT $2",
			)
			.bind(pattern)
			.bind(i64::try_from(limit).unwrap_or(i64::MAX))
			.fetch_all(&self.pool)
			.await?;

			Ok(rows)
		})
	}

	fn increment<'a>(
		&'a self,
		key: &'a str,
		by: i64,
		ttl: Option<Duration>,
	) -> BoxFuture<'a, Result<i64>> {
		Box::pin(async move {
			let value = sqlx::query_scalar::<_, i64>(
				"\
INSERT INTO kv_entries (key, value, expires_at, updated_at)
VALUES ($1, to_jsonb($2::bigint), $3, now())
ON CONFLICT (key) DO UPDATE
SET value = CASE
		WHEN kv_entries.expires_at IS NOT NULL AND kv_entries.expires_at <= now()
			THEN to_jsonb($2::bigint)
		ELSE to_jsonb((kv_entries.value #>> '{}')::bigint + $2::bigint)
	END,
	expires_at = CASE
		WHEN kv_entries.expires_at IS NOT NULL AND kv_entries.expires_at <= now()
			THEN EXCLUDED.expires_at
		ELSE kv_entries.expires_at
	END,
	updated_at = now()
RETURNING (value #>> '{}')::bigint",
			)
			.bind(key)
			.bind(by)
			.bind(expires_at(ttl))
			.fetch_one(&self.pool)
			.await?;

			Ok(value)
		})
	}
}

fn expires_at(ttl: Option<Duration>) -> Option<OffsetDateTime> {
	ttl.map(|ttl| OffsetDateTime::now_utc() + ttl)
}

fn escape_like(raw: &str) -> String {
	let mut out = String::with_capacity(raw.len());

	for ch in raw.chars() {
		if matches!(ch, '%' | '_' | '\\') {
			out.push('\\');
		}

		out.push(ch);
	}

	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn like_metacharacters_are_escaped() {
		assert_eq!(escape_like("user:a_b:100%"), "user:a\\_b:100\\%");
	}
}
