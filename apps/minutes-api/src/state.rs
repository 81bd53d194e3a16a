use std::{sync::Arc, time::Duration};

use color_eyre::eyre;

use minutes_config::Config;
use minutes_service::MinutesService;
use minutes_storage::{KvStore, MemoryKvStore, PgKvStore};

const PURGE_INTERVAL: Duration = Duration::from_secs(600);

#[derive(Clone)]
enum Backend {
	Memory(Arc<MemoryKvStore>),
	Postgres(Arc<PgKvStore>),
}
impl Backend {
	fn store(&self) -> Arc<dyn KvStore> {
		match self {
			Self::Memory(store) => store.clone(),
			Self::Postgres(store) => store.clone(),
		}
	}

	async fn purge_expired(&self) -> minutes_storage::Result<u64> {
		match self {
			Self::Memory(store) => Ok(store.purge_expired().await as u64),
			Self::Postgres(store) => store.purge_expired().await,
		}
	}
}

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<MinutesService>,
	backend: Backend,
}
impl AppState {
	pub async fn new(config: Config) -> color_eyre::Result<Self> {
		let backend = match config.storage.backend.as_str() {
			"postgres" => {
				let pg = config.storage.postgres.as_ref().ok_or_else(|| {
					eyre::eyre!("storage.postgres is required when storage.backend is postgres.")
				})?;
				let store = PgKvStore::connect(pg).await?;

				store.ensure_schema().await?;

				Backend::Postgres(Arc::new(store))
			},
			_ => Backend::Memory(Arc::new(MemoryKvStore::new())),
		};

		tracing::info!(backend = %config.storage.backend, "Storage ready.");

		Ok(Self::with_backend(config, backend, minutes_service::Providers::default()))
	}

	/// In-memory state with caller-supplied providers.
	pub fn in_memory(config: Config, providers: minutes_service::Providers) -> Self {
		Self::with_backend(config, Backend::Memory(Arc::new(MemoryKvStore::new())), providers)
	}

	fn with_backend(
		config: Config,
		backend: Backend,
		providers: minutes_service::Providers,
	) -> Self {
		let service = MinutesService::with_providers(config, backend.store(), providers);

		Self { service: Arc::new(service), backend }
	}

	/// Periodically drops expired entries from the store.
	pub fn spawn_purge_loop(&self) {
		let backend = self.backend.clone();

		tokio::spawn(async move {
			loop {
				tokio::time::sleep(PURGE_INTERVAL).await;

				match backend.purge_expired().await {
					Ok(0) => {},
					Ok(purged) => tracing::info!(purged, "Expired entries purged."),
					Err(err) => tracing::error!(error = %err, "Expired entry purge failed."),
				}
			}
		});
	}
}
