use crate::utils::error::{AppError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    /// 各限流規則，未設定者使用內建預設值
    pub rate_limits: BTreeMap<String, RateLimitRule>,
    pub contracts: ContractsConfig,
    pub ai: AiConfig,
    pub logging: LoggingConfig,
    /// 載入時未設定、也沒有預設值的環境變數，待日誌初始化後再回報
    #[serde(skip)]
    pub unset_env_vars: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// 空陣列代表允許任何來源
    pub cors_origins: Vec<String>,
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            cors_origins: Vec::new(),
            body_limit_bytes: 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: String,
    pub persist: bool,
    pub uploads_dir: String,
    pub uploads_url_prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
            persist: true,
            uploads_dir: "./data/uploads".to_string(),
            uploads_url_prefix: "/uploads".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// 0 代表 token 永不過期
    pub token_ttl_hours: u64,
    pub bootstrap: Option<BootstrapAdmin>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_ttl_hours: 24,
            bootstrap: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapAdmin {
    #[serde(default = "default_admin_name")]
    pub name: String,
    pub email: String,
    pub password: String,
}

fn default_admin_name() -> String {
    "Administrator".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitRule {
    pub max_requests: usize,
    pub window_secs: u64,
}

impl RateLimitRule {
    pub const fn new(max_requests: usize, window_secs: u64) -> Self {
        Self {
            max_requests,
            window_secs,
        }
    }
}

/// 內建限流規則
pub const DEFAULT_RATE_LIMITS: &[(&str, RateLimitRule)] = &[
    ("contact", RateLimitRule::new(5, 60)),
    ("newsletter", RateLimitRule::new(5, 60)),
    ("inquiry", RateLimitRule::new(5, 60)),
    ("chat", RateLimitRule::new(20, 60)),
    ("login", RateLimitRule::new(10, 60)),
    ("ai", RateLimitRule::new(10, 60)),
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractsConfig {
    pub validate_requests: bool,
    pub validate_responses: bool,
}

impl Default for ContractsConfig {
    fn default() -> Self {
        Self {
            validate_requests: true,
            validate_responses: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub text: TextConfig,
    pub image: ImageConfig,
    pub trends: TrendsConfig,
    pub chat: ChatConfig,
    pub blog: BlogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TextConfig {
    pub primary: ProviderConfig,
    pub fallback: Option<ProviderConfig>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_seconds: u64,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            primary: ProviderConfig::default(),
            fallback: None,
            temperature: 0.7,
            max_tokens: 2000,
            timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub name: String,
    pub base_url: String,
    /// 空字串代表未設定
    pub api_key: String,
    pub model: String,
    pub headers: HashMap<String, String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: "openrouter".to_string(),
            base_url: "https://openrouter.ai/api/v1".to_string(),
            api_key: String::new(),
            model: "openai/gpt-4o-mini".to_string(),
            headers: HashMap::new(),
        }
    }
}

impl ProviderConfig {
    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub api_key: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub timeout_seconds: u64,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: String::new(),
            api_key: String::new(),
            width: Some(1024),
            height: Some(576),
            timeout_seconds: 90,
        }
    }
}

impl ImageConfig {
    pub fn is_configured(&self) -> bool {
        self.enabled && !self.endpoint.trim().is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendsConfig {
    pub endpoint: String,
    pub api_key: String,
    pub geo: Option<String>,
    pub limit: usize,
}

impl Default for TrendsConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://serpapi.com/search.json".to_string(),
            api_key: String::new(),
            geo: None,
            limit: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub system_prompt: String,
    pub include_services: bool,
    pub max_messages: usize,
    pub max_message_chars: usize,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            system_prompt: "You are the friendly assistant on our agency website. Answer questions \
                about our services concisely, and suggest the contact form for project enquiries. \
                Never invent prices or commitments."
                .to_string(),
            include_services: true,
            max_messages: 20,
            max_message_chars: 4000,
            temperature: 0.5,
            max_tokens: 600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlogConfig {
    pub default_tone: String,
    pub default_audience: String,
    pub default_sections: usize,
    pub seed_keyword: Option<String>,
    pub generate_images: bool,
    pub max_tokens: u32,
}

impl Default for BlogConfig {
    fn default() -> Self {
        Self {
            default_tone: "professional".to_string(),
            default_audience: "business decision makers".to_string(),
            default_sections: 4,
            seed_keyword: None,
            generate_images: true,
            max_tokens: 3500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `compact` 或 `json`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: "compact".to_string(),
        }
    }
}

impl AppConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(AppError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        // 處理環境變數替換
        let (processed_content, unset) = Self::substitute_env_vars(content)?;

        let mut config: Self =
            toml::from_str(&processed_content).map_err(|e| AppError::ConfigValidationError {
                field: "toml_parsing".to_string(),
                message: format!("TOML parsing error: {}", e),
            })?;
        config.unset_env_vars = unset;
        Ok(config)
    }

    /// 回報載入時未設定的環境變數 (需在日誌初始化之後呼叫)
    pub fn warn_unset_env_vars(&self) {
        for name in &self.unset_env_vars {
            tracing::warn!("⚠️  Environment variable {} is not set", name);
        }
    }

    /// 替換環境變數 (例如 ${API_KEY} 或 ${API_KEY:-default})
    ///
    /// 未設定且沒有預設值的變數會替換為空字串，讓對應功能視為未設定。
    fn substitute_env_vars(content: &str) -> Result<(String, Vec<String>)> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}").map_err(|e| {
            AppError::ConfigError {
                message: format!("env substitution pattern: {}", e),
            }
        })?;

        let mut unset = Vec::new();
        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            match std::env::var(var_name) {
                Ok(value) => value,
                Err(_) => match caps.get(2) {
                    Some(default) => default.as_str().to_string(),
                    None => {
                        if !unset.iter().any(|name| name == var_name) {
                            unset.push(var_name.to_string());
                        }
                        String::new()
                    }
                },
            }
        });

        Ok((result.to_string(), unset))
    }

    /// 取得限流規則 (設定檔優先，其次內建預設)
    pub fn rate_limit(&self, name: &str) -> Option<RateLimitRule> {
        self.rate_limits.get(name).copied().or_else(|| {
            DEFAULT_RATE_LIMITS
                .iter()
                .find(|(rule_name, _)| *rule_name == name)
                .map(|(_, rule)| *rule)
        })
    }

    /// 合併後的全部限流規則
    pub fn all_rate_limits(&self) -> BTreeMap<String, RateLimitRule> {
        let mut rules: BTreeMap<String, RateLimitRule> = DEFAULT_RATE_LIMITS
            .iter()
            .map(|(name, rule)| (name.to_string(), *rule))
            .collect();
        rules.extend(self.rate_limits.iter().map(|(k, v)| (k.clone(), *v)));
        rules
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.server
            .bind
            .parse()
            .map_err(|e| AppError::InvalidConfigValueError {
                field: "server.bind".to_string(),
                value: self.server.bind.clone(),
                reason: format!("Invalid socket address: {}", e),
            })
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        self.bind_addr()?;
        validation::validate_positive_number(
            "server.body_limit_bytes",
            self.server.body_limit_bytes,
            1024,
        )?;

        validation::validate_path("storage.data_dir", &self.storage.data_dir)?;
        validation::validate_path("storage.uploads_dir", &self.storage.uploads_dir)?;
        let prefix = &self.storage.uploads_url_prefix;
        let reason = if !prefix.starts_with('/') {
            Some("Prefix must start with '/'")
        } else if prefix.trim_end_matches('/').is_empty() {
            Some("Prefix must not be the site root")
        } else if prefix.trim_end_matches('/') == "/api" || prefix.starts_with("/api/") {
            Some("Prefix must not shadow the API routes")
        } else {
            None
        };
        if let Some(reason) = reason {
            return Err(AppError::InvalidConfigValueError {
                field: "storage.uploads_url_prefix".to_string(),
                value: prefix.clone(),
                reason: reason.to_string(),
            });
        }
        // 上傳目錄會公開提供，不可涵蓋資料目錄
        if normalized(&self.storage.data_dir).starts_with(normalized(&self.storage.uploads_dir)) {
            return Err(AppError::InvalidConfigValueError {
                field: "storage.uploads_dir".to_string(),
                value: self.storage.uploads_dir.clone(),
                reason: format!("Must not contain storage.data_dir ({})", self.storage.data_dir),
            });
        }

        validation::validate_range(
            "auth.token_ttl_hours",
            self.auth.token_ttl_hours,
            0,
            MAX_TOKEN_TTL_HOURS,
        )?;

        if let Some(bootstrap) = &self.auth.bootstrap {
            validation::validate_email("auth.bootstrap.email", &bootstrap.email).map_err(|_| {
                AppError::InvalidConfigValueError {
                    field: "auth.bootstrap.email".to_string(),
                    value: bootstrap.email.clone(),
                    reason: "Not a valid email address".to_string(),
                }
            })?;
            if bootstrap.password.chars().count() < 8 {
                return Err(AppError::InvalidConfigValueError {
                    field: "auth.bootstrap.password".to_string(),
                    value: "********".to_string(),
                    reason: "Password must be at least 8 characters".to_string(),
                });
            }
        }

        for (name, rule) in &self.rate_limits {
            validation::validate_positive_number(
                &format!("rate_limits.{}.max_requests", name),
                rule.max_requests,
                1,
            )?;
            validation::validate_positive_number(
                &format!("rate_limits.{}.window_secs", name),
                rule.window_secs as usize,
                1,
            )?;
        }

        // 驗證 AI 供應商端點
        validation::validate_url("ai.text.primary.base_url", &self.ai.text.primary.base_url)?;
        if let Some(fallback) = &self.ai.text.fallback {
            validation::validate_url("ai.text.fallback.base_url", &fallback.base_url)?;
        }
        validation::validate_range("ai.text.temperature", self.ai.text.temperature, 0.0, 2.0)?;
        validation::validate_range("ai.chat.temperature", self.ai.chat.temperature, 0.0, 2.0)?;
        if !self.ai.image.endpoint.is_empty() {
            validation::validate_url("ai.image.endpoint", &self.ai.image.endpoint)?;
        }
        validation::validate_url("ai.trends.endpoint", &self.ai.trends.endpoint)?;
        validation::validate_range("ai.trends.limit", self.ai.trends.limit, 1, 20)?;
        validation::validate_range(
            "ai.blog.default_sections",
            self.ai.blog.default_sections,
            1,
            10,
        )?;
        validation::validate_range("ai.chat.max_messages", self.ai.chat.max_messages, 1, 100)?;
        validation::validate_non_empty_string(
            "ai.chat.system_prompt",
            &self.ai.chat.system_prompt,
        )?;

        match self.logging.format.as_str() {
            "compact" | "json" => {}
            other => {
                return Err(AppError::InvalidConfigValueError {
                    field: "logging.format".to_string(),
                    value: other.to_string(),
                    reason: "Valid formats: compact, json".to_string(),
                })
            }
        }

        Ok(())
    }
}

/// 十年
const MAX_TOKEN_TTL_HOURS: u64 = 24 * 365 * 10;

fn normalized(path: &str) -> PathBuf {
    Path::new(path)
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();

        assert_eq!(config.server.bind, "127.0.0.1:8080");
        assert!(config.storage.persist);
        assert!(config.contracts.validate_requests);
        assert_eq!(config.ai.text.primary.name, "openrouter");
        assert!(!config.ai.text.primary.is_configured());
        assert_eq!(config.rate_limit("contact"), Some(RateLimitRule::new(5, 60)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let toml_content = r#"
[server]
bind = "0.0.0.0:9000"
cors_origins = ["https://example.com"]

[storage]
persist = false

[auth]
token_ttl_hours = 0

[auth.bootstrap]
email = "admin@example.com"
password = "change-me-now"

[rate_limits.chat]
max_requests = 3
window_secs = 10

[ai.text]
temperature = 0.2

[ai.text.primary]
api_key = "sk-or-test"

[ai.text.fallback]
name = "openai"
base_url = "https://api.openai.com/v1"
api_key = "sk-test"
model = "gpt-4o-mini"

[ai.image]
endpoint = "https://images.example.workers.dev/generate"
"#;

        let config = AppConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.bind_addr().unwrap().port(), 9000);
        assert_eq!(config.auth.token_ttl_hours, 0);
        assert_eq!(config.rate_limit("chat"), Some(RateLimitRule::new(3, 10)));
        assert_eq!(config.rate_limit("login"), Some(RateLimitRule::new(10, 60)));
        assert!(config.rate_limit("unknown").is_none());
        assert!(config.ai.text.primary.is_configured());
        assert_eq!(config.ai.text.fallback.as_ref().unwrap().name, "openai");
        assert!(config.ai.image.is_configured());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("SITE_CMS_TEST_OPENROUTER_KEY", "sk-or-from-env");
        std::env::remove_var("SITE_CMS_TEST_MISSING_KEY");

        let toml_content = r#"
[ai.text.primary]
api_key = "${SITE_CMS_TEST_OPENROUTER_KEY}"

[ai.trends]
api_key = "${SITE_CMS_TEST_MISSING_KEY}"

[server]
bind = "${SITE_CMS_TEST_MISSING_BIND:-127.0.0.1:3000}"
"#;

        let config = AppConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.ai.text.primary.api_key, "sk-or-from-env");
        assert_eq!(config.ai.trends.api_key, "");
        assert_eq!(config.server.bind, "127.0.0.1:3000");
        // 有預設值的變數不列入
        assert_eq!(config.unset_env_vars, vec!["SITE_CMS_TEST_MISSING_KEY".to_string()]);

        std::env::remove_var("SITE_CMS_TEST_OPENROUTER_KEY");
    }

    #[test]
    fn test_config_validation() {
        let config = AppConfig::from_toml_str(
            r#"
[ai.text.primary]
base_url = "invalid-url"
"#,
        )
        .unwrap();
        assert!(config.validate().is_err());

        let config = AppConfig::from_toml_str(
            r#"
[rate_limits.contact]
max_requests = 0
window_secs = 60
"#,
        )
        .unwrap();
        assert!(config.validate().is_err());

        let config = AppConfig::from_toml_str(
            r#"
[auth.bootstrap]
email = "admin@example.com"
password = "short"
"#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_storage_and_ttl_bounds() {
        let rejected = [
            "[storage]\nuploads_url_prefix = \"/\"\n",
            "[storage]\nuploads_url_prefix = \"//\"\n",
            "[storage]\nuploads_url_prefix = \"/api/files\"\n",
            "[storage]\ndata_dir = \"./data\"\nuploads_dir = \"data/\"\n",
            "[storage]\ndata_dir = \"./site/data\"\nuploads_dir = \"./site\"\n",
            "[auth]\ntoken_ttl_hours = 1000000\n",
        ];
        for toml_content in rejected {
            let config = AppConfig::from_toml_str(toml_content).unwrap();
            assert!(config.validate().is_err(), "accepted: {}", toml_content);
        }

        let accepted = [
            "[storage]\nuploads_url_prefix = \"/media/\"\n",
            "[storage]\ndata_dir = \"./data\"\nuploads_dir = \"./data-uploads\"\n",
            "[auth]\ntoken_ttl_hours = 87600\n",
        ];
        for toml_content in accepted {
            let config = AppConfig::from_toml_str(toml_content).unwrap();
            assert!(config.validate().is_ok(), "rejected: {}", toml_content);
        }
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();

        let toml_content = r#"
[logging]
format = "json"
"#;

        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = AppConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.logging.format, "json");
    }
}
