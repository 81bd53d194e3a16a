use std::{future::Future, pin::Pin, time::Duration};

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::Result;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// String-keyed JSON store. Entries whose TTL has elapsed read as absent.
pub trait KvStore
where
	Self: Send + Sync,
{
	fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Value>>>;

	fn set<'a>(
		&'a self,
		key: &'a str,
		value: Value,
		ttl: Option<Duration>,
	) -> BoxFuture<'a, Result<()>>;

	/// Returns whether a live entry was removed.
	fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool>>;

	/// Live entries whose key starts with `prefix`, ordered by key.
	fn list_prefix<'a>(
		&'a self,
		prefix: &'a str,
		limit: usize,
	) -> BoxFuture<'a, Result<Vec<(String, Value)>>>;

	/// Adds `by` to an integer counter and returns the new value. A missing or expired counter
	/// starts from zero and takes `ttl`; an existing counter keeps its original expiry.
	fn increment<'a>(
		&'a self,
		key: &'a str,
		by: i64,
		ttl: Option<Duration>,
	) -> BoxFuture<'a, Result<i64>>;
}

pub async fn get_json<T>(store: &dyn KvStore, key: &str) -> Result<Option<T>>
where
	T: DeserializeOwned,
{
	match store.get(key).await? {
		Some(value) => Ok(Some(serde_json::from_value(value)?)),
		None => Ok(None),
	}
}

pub async fn set_json<T>(
	store: &dyn KvStore,
	key: &str,
	value: &T,
	ttl: Option<Duration>,
) -> Result<()>
where
	T: Serialize + ?Sized,
{
	store.set(key, serde_json::to_value(value)?, ttl).await
}
