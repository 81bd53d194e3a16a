use std::{fmt::Display, future::Future, time::Duration};

use tokio::time;

const MAX_DELAY: Duration = Duration::from_secs(30);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
	pub max_attempts: u32,
	pub base_delay: Duration,
}
impl RetryPolicy {
	pub fn from_config(cfg: &minutes_config::Retry) -> Self {
		Self {
			max_attempts: cfg.max_attempts.max(1),
			base_delay: Duration::from_millis(cfg.base_delay_ms),
		}
	}

	pub fn none() -> Self {
		Self { max_attempts: 1, base_delay: Duration::ZERO }
	}

	/// Delay after the `attempt`-th failure (1-based): `base_delay * 2^(attempt - 1)`.
	pub fn delay_for(&self, attempt: u32) -> Duration {
		let exponent = attempt.saturating_sub(1).min(16);

		self.base_delay.saturating_mul(1_u32 << exponent).min(MAX_DELAY)
	}
}

/// Runs `op` until it succeeds, fails with an error `is_retryable` rejects, or the attempt
/// budget is spent. The closure receives the 1-based attempt number.
pub async fn with_backoff<T, E, F, Fut, R>(
	policy: RetryPolicy,
	is_retryable: R,
	mut op: F,
) -> Result<T, E>
where
	F: FnMut(u32) -> Fut,
	Fut: Future<Output = Result<T, E>>,
	R: Fn(&E) -> bool,
	E: Display,
{
	let max_attempts = policy.max_attempts.max(1);
	let mut attempt = 1;

	loop {
		match op(attempt).await {
			Ok(value) => return Ok(value),
			Err(err) if attempt < max_attempts && is_retryable(&err) => {
				let delay = policy.delay_for(attempt);

				tracing::warn!(
					attempt,
					max_attempts,
					delay_ms = delay.as_millis() as u64,
					error = %err,
					"Retrying external call."
				);

				time::sleep(delay).await;

				attempt += 1;
			},
			Err(err) => return Err(err),
		}
	}
}

#[cfg(test)]
mod tests {
	use std::sync::{
		Arc,
		atomic::{AtomicU32, Ordering},
	};

	use super::*;

	fn fast_policy(max_attempts: u32) -> RetryPolicy {
		RetryPolicy { max_attempts, base_delay: Duration::from_millis(1) }
	}

	#[test]
	fn delay_doubles_per_attempt() {
		let policy = RetryPolicy { max_attempts: 5, base_delay: Duration::from_millis(100) };

		assert_eq!(policy.delay_for(1), Duration::from_millis(100));
		assert_eq!(policy.delay_for(2), Duration::from_millis(200));
		assert_eq!(policy.delay_for(3), Duration::from_millis(400));
		assert_eq!(policy.delay_for(40), MAX_DELAY);
	}

	#[tokio::test]
	async fn retries_until_success() {
		let calls = Arc::new(AtomicU32::new(0));
		let counter = calls.clone();
		let result: Result<u32, String> = with_backoff(fast_policy(3), |_| true, |attempt| {
			counter.fetch_add(1, Ordering::SeqCst);

			async move {
				if attempt < 3 { Err(format!("attempt {attempt} failed")) } else { Ok(attempt) }
			}
		})
		.await;

		assert_eq!(result, Ok(3));
		assert_eq!(calls.load(Ordering::SeqCst), 3);
	}

	#[tokio::test]
	async fn stops_on_non_retryable_error() {
		let calls = Arc::new(AtomicU32::new(0));
		let counter = calls.clone();
		let result: Result<(), String> =
			with_backoff(fast_policy(5), |err: &String| err != "fatal", |_| {
				counter.fetch_add(1, Ordering::SeqCst);

				async { Err("fatal".to_string()) }
			})
			.await;

		assert_eq!(result, Err("fatal".to_string()));
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn returns_last_error_when_budget_is_spent() {
		let result: Result<(), String> =
			with_backoff(fast_policy(2), |_| true, |attempt| async move {
				Err(format!("failure {attempt}"))
			})
			.await;

		assert_eq!(result, Err("failure 2".to_string()));
	}
}
