pub mod adapters;
pub mod ai;
pub mod api;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::LocalStorage;
pub use api::{build_router, AppState};
pub use config::AppConfig;
pub use core::Store;
pub use utils::error::{AppError, Result};

use std::sync::Arc;

/// 依 `storage.persist` 開啟資料庫：寫入 `data_dir` 的快照，或純記憶體
///
/// 持久化時會鎖住 `data_dir`，同一時間只有一個行程 (伺服器或 CLI) 能寫入快照。
pub async fn open_store(config: &AppConfig) -> Result<Arc<Store>> {
    let store = if config.storage.persist {
        tracing::info!("💾 Persisting data to {}", config.storage.data_dir);
        let storage = LocalStorage::new(&config.storage.data_dir);
        let lock = storage.lock()?;
        Store::open(Arc::new(storage)).await?.holding(lock)
    } else {
        tracing::warn!("⚠️  storage.persist is off, data lives in memory only");
        Store::in_memory()
    };
    Ok(Arc::new(store))
}
