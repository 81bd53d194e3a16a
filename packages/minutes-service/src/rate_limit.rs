use time::OffsetDateTime;

use crate::{Error, HOUR, MinutesService, Result};
use minutes_storage::keys;

impl MinutesService {
	/// Counts one analysis against the caller's hourly budget. A limit of 0 disables the check.
	pub(crate) async fn consume_user_quota(
		&self,
		user_id: &str,
		now: OffsetDateTime,
	) -> Result<()> {
		let limit = self.cfg.rate_limit.analyses_per_hour;

		if limit == 0 {
			return Ok(());
		}

		let used = self.store.increment(&keys::rate_limit(user_id, now), 1, Some(HOUR)).await?;

		if used > i64::from(limit) {
			tracing::warn!(user_id, used, limit, "Analysis rate limit exceeded.");

			return Err(Error::RateLimited {
				message: format!("Rate limit exceeded: at most {limit} analyses per hour."),
			});
		}

		Ok(())
	}
}
