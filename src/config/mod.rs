#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli::CliConfig;
pub use toml_config::{
    AiConfig, AppConfig, AuthConfig, BlogConfig, BootstrapAdmin, ChatConfig, ContractsConfig,
    ImageConfig, ProviderConfig, RateLimitRule, StorageConfig, TextConfig, TrendsConfig,
};

use crate::utils::error::Result;
use std::path::Path;

/// 載入設定檔；檔案不存在時使用預設值 (第二個值表示是否讀到檔案)
///
/// 在日誌初始化之前呼叫，因此這裡不輸出日誌。
pub fn load_or_default(path: &Path) -> Result<(AppConfig, bool)> {
    if path.exists() {
        Ok((AppConfig::from_file(path)?, true))
    } else {
        Ok((AppConfig::default(), false))
    }
}
