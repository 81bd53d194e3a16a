use std::{collections::HashMap, time::Duration};

use serde_json::Value;
use tokio::{sync::RwLock, time::Instant};

use crate::{BoxFuture, Error, KvStore, Result};

struct Entry {
	value: Value,
	expires_at: Option<Instant>,
}
impl Entry {
	fn new(value: Value, ttl: Option<Duration>) -> Self {
		Self { value, expires_at: ttl.map(|ttl| Instant::now() + ttl) }
	}

	fn is_live(&self, now: Instant) -> bool {
		self.expires_at.is_none_or(|at| at > now)
	}
}

/// Process-local store for tests and single-node deployments without Postgres.
#[derive(Default)]
pub struct MemoryKvStore {
	entries: RwLock<HashMap<String, Entry>>,
}
impl MemoryKvStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Drops expired entries and returns how many were removed.
	pub async fn purge_expired(&self) -> usize {
		let now = Instant::now();
		let mut entries = self.entries.write().await;
		let before = entries.len();

		entries.retain(|_, entry| entry.is_live(now));

		before - entries.len()
	}
}
impl KvStore for MemoryKvStore {
	fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Value>>> {
		Box::pin(async move {
			let entries = self.entries.read().await;

			Ok(entries
				.get(key)
				.filter(|entry| entry.is_live(Instant::now()))
				.map(|entry| entry.value.clone()))
		})
	}

	fn set<'a>(
		&'a self,
		key: &'a str,
		value: Value,
		ttl: Option<Duration>,
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			self.entries.write().await.insert(key.to_string(), Entry::new(value, ttl));

			Ok(())
		})
	}

	fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move {
			let removed = self.entries.write().await.remove(key);

			Ok(removed.is_some_and(|entry| entry.is_live(Instant::now())))
		})
	}

	fn list_prefix<'a>(
		&'a self,
		prefix: &'a str,
		limit: usize,
	) -> BoxFuture<'a, Result<Vec<(String, Value)>>> {
		Box::pin(async move {
			let now = Instant::now();
			let entries = self.entries.read().await;
			let mut matched = entries
				.iter()
				.filter(|(key, entry)| key.starts_with(prefix) && entry.is_live(now))
				.map(|(key, entry)| (key.clone(), entry.value.clone()))
				.collect::<Vec<_>>();

			matched.sort_by(|a, b| a.0.cmp(&b.0));
			matched.truncate(limit);

			Ok(matched)
		})
	}

	fn increment<'a>(
		&'a self,
		key: &'a str,
		by: i64,
		ttl: Option<Duration>,
	) -> BoxFuture<'a, Result<i64>> {
		Box::pin(async move {
			let now = Instant::now();
			let mut entries = self.entries.write().await;

			match entries.get_mut(key) {
				Some(entry) if entry.is_live(now) => {
					let current = entry.value.as_i64().ok_or_else(|| {
						Error::InvalidArgument(format!("Value at {key} is not a counter."))
					})?;
					let next = current.saturating_add(by);

					entry.value = Value::from(next);

					Ok(next)
				},
				_ => {
					entries.insert(key.to_string(), Entry::new(Value::from(by), ttl));

					Ok(by)
				},
			}
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn expired_entries_read_as_absent() {
		let store = MemoryKvStore::new();

		store.set("short", Value::from("x"), Some(Duration::from_millis(5))).await.unwrap();
		store.set("long", Value::from("y"), None).await.unwrap();

		assert_eq!(store.get("short").await.unwrap(), Some(Value::from("x")));

		tokio::time::sleep(Duration::from_millis(20)).await;

		assert_eq!(store.get("short").await.unwrap(), None);
		assert!(!store.delete("short").await.unwrap());
		assert_eq!(store.purge_expired().await, 0);
		assert_eq!(store.get("long").await.unwrap(), Some(Value::from("y")));
	}

	#[tokio::test]
	async fn increment_starts_counters_and_keeps_expiry() {
		let store = MemoryKvStore::new();
		let ttl = Some(Duration::from_secs(3_600));

		assert_eq!(store.increment("ratelimit:u:2026101409", 1, ttl).await.unwrap(), 1);
		assert_eq!(store.increment("ratelimit:u:2026101409", 1, ttl).await.unwrap(), 2);
		assert_eq!(store.increment("ratelimit:u:2026101409", 3, None).await.unwrap(), 5);

		store.set("name", Value::from("text"), None).await.unwrap();

		assert!(matches!(
			store.increment("name", 1, None).await,
			Err(Error::InvalidArgument(_))
		));
	}

	#[tokio::test]
	async fn list_prefix_is_ordered_and_limited() {
		let store = MemoryKvStore::new();

		for key in ["audit:2026-10-03", "audit:2026-10-01", "user:a:config", "audit:2026-10-02"] {
			store.set(key, Value::Bool(true), None).await.unwrap();
		}

		let keys = store
			.list_prefix("audit:", 2)
			.await
			.unwrap()
			.into_iter()
			.map(|(key, _)| key)
			.collect::<Vec<_>>();

		assert_eq!(keys, vec!["audit:2026-10-01".to_string(), "audit:2026-10-02".to_string()]);
	}
}
