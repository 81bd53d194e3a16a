pub mod keys;
pub mod kv;
pub mod memory;
pub mod models;
pub mod pg;
pub mod schema;
pub mod time_serde;

mod error;

pub use error::{Error, Result};
pub use kv::{BoxFuture, KvStore, get_json, set_json};
pub use memory::MemoryKvStore;
pub use pg::PgKvStore;
