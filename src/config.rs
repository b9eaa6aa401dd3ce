//! 程序配置
//!
//! 启动时一次性构建：默认值 → TOML 文件（可选）→ 环境变量覆盖 → 必需项校验。
//! 构建完成后以不可变值显式传入编排层。

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{AppError, AppResult, ConfigError};
use crate::models::Credentials;

/// 单次上传请求的最大记录数（远端接口限制）
pub const MAX_CHUNK_SIZE: usize = 10;

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "finder.toml";

const DEFAULT_START_URL: &str = "https://finder.startupnationcentral.org/startups/search?&days=30&sort=raised-desc&coretechnology=agxzfmlsbGlzdHNpdGVyJAsSF0Jhc2VDbGFzc2lmaWNhdGlvbk1vZGVsGICA4Lu1rJEIDA&status=Active&alltags=artificial-intelligence";

const DEFAULT_EXTRACT_SCHEMA: &str = r#"
{
    startup_list[] {
        Name(name of the company from the main table)
        Website(website links that contains '/company_page/')
    }
}
"#;

/// 程序配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 列表起始地址（含筛选参数）
    pub start_url: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    pub login: LoginConfig,
    pub upload: UploadConfig,
    pub browser: BrowserConfig,
    pub pagination: PaginationConfig,
    pub extract: ExtractConfig,
    /// 查询路径 → CSS 选择器（可带 `@属性` 后缀）
    pub selectors: BTreeMap<String, String>,
}

/// 登录方式
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginMode {
    /// 直接使用站点账号
    Direct,
    /// 通过第三方身份提供方登录
    #[default]
    Federated,
}

#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginConfig {
    pub mode: LoginMode,
    pub identity: String,
    pub secret: String,
    pub federated_identity: String,
    pub federated_secret: String,
}

// 凭据不进入日志
impl std::fmt::Debug for LoginConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginConfig")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl LoginConfig {
    /// 当前登录方式对应的凭据
    pub fn credentials(&self) -> Credentials {
        match self.mode {
            LoginMode::Direct => Credentials::new(&self.identity, &self.secret),
            LoginMode::Federated => {
                Credentials::new(&self.federated_identity, &self.federated_secret)
            }
        }
    }

    /// 取出当前登录方式的凭据，并清空配置中保存的所有账号密码
    pub fn take_credentials(&mut self) -> Credentials {
        let credentials = self.credentials();
        std::mem::take(&mut self.identity);
        std::mem::take(&mut self.secret);
        std::mem::take(&mut self.federated_identity);
        std::mem::take(&mut self.federated_secret);
        credentials
    }
}

/// 上传失败后的处理策略
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// 记录日志后继续下一页
    #[default]
    BestEffort,
    /// 立即中止整个运行
    FailFast,
}

impl std::str::FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "best_effort" => Ok(Self::BestEffort),
            "fail_fast" => Ok(Self::FailFast),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub api_base: String,
    pub token: String,
    pub base_id: String,
    pub table: String,
    pub chunk_size: usize,
    pub chunk_delay_ms: u64,
    pub request_timeout_secs: u64,
    /// 网络层失败的最大尝试次数（含首次）
    pub max_attempts: usize,
    pub backoff_base_ms: u64,
    pub failure_policy: FailurePolicy,
}

impl std::fmt::Debug for UploadConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadConfig")
            .field("api_base", &self.api_base)
            .field("base_id", &self.base_id)
            .field("table", &self.table)
            .field("chunk_size", &self.chunk_size)
            .field("chunk_delay_ms", &self.chunk_delay_ms)
            .field("max_attempts", &self.max_attempts)
            .field("failure_policy", &self.failure_policy)
            .finish_non_exhaustive()
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.airtable.com/v0".to_string(),
            token: String::new(),
            base_id: String::new(),
            table: String::new(),
            chunk_size: MAX_CHUNK_SIZE,
            chunk_delay_ms: 200,
            request_timeout_secs: 30,
            max_attempts: 3,
            backoff_base_ms: 500,
            failure_policy: FailurePolicy::BestEffort,
        }
    }
}

impl UploadConfig {
    /// 实际使用的分块大小，限制在 1..=10
    pub fn effective_chunk_size(&self) -> usize {
        self.chunk_size.clamp(1, MAX_CHUNK_SIZE)
    }

    pub fn chunk_delay(&self) -> Duration {
        Duration::from_millis(self.chunk_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// 设置后连接已运行的浏览器，否则启动新实例
    pub debug_port: Option<u16>,
    pub headless: bool,
    pub executable: Option<PathBuf>,
    pub ready_timeout_secs: u64,
    /// 点击后等待页面发生跳转的时长，超时视为点击未引起跳转
    pub navigation_timeout_secs: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            debug_port: None,
            headless: false,
            executable: None,
            ready_timeout_secs: 30,
            navigation_timeout_secs: 10,
        }
    }
}

impl BrowserConfig {
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    /// 最多访问的页数
    pub max_pages: Option<usize>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// 数据查询语句
    pub schema: String,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            schema: DEFAULT_EXTRACT_SCHEMA.to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            start_url: DEFAULT_START_URL.to_string(),
            verbose_logging: false,
            login: LoginConfig::default(),
            upload: UploadConfig::default(),
            browser: BrowserConfig::default(),
            pagination: PaginationConfig::default(),
            extract: ExtractConfig::default(),
            selectors: default_selectors(),
        }
    }
}

fn default_selectors() -> BTreeMap<String, String> {
    [
        ("login_btn", "a[href*='login']"),
        ("username_field", "input[type='email']"),
        ("password_field", "input[type='password']"),
        ("sign_in_btn", "button[type='submit']"),
        ("pagination", ".pagination"),
        ("pagination.next_page_btn", "a[rel='next']"),
        ("startup_list", "table tbody tr"),
        ("startup_list.Name", "td:first-child"),
        ("startup_list.Website", "a[href*='/company_page/']@href"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

impl Config {
    /// 加载配置：文件路径取自 `FINDER_CONFIG`，缺省为 `finder.toml`
    pub fn load() -> AppResult<Self> {
        let path = std::env::var("FINDER_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        let mut config = Self::from_file_or_default(Path::new(&path))?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// 读取 TOML 文件；文件不存在时使用默认值
    pub fn from_file_or_default(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            debug!("配置文件 {} 不存在，使用默认配置", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&content).map_err(|source| ConfigError::TomlParseFailed {
            path: path.display().to_string(),
            source,
        })?;
        info!("✓ 已加载配置文件: {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        let mut config: Self = toml::from_str(content)?;
        // 文件只覆盖其中出现的选择器
        let mut selectors = default_selectors();
        selectors.append(&mut config.selectors);
        config.selectors = selectors;
        Ok(config)
    }

    /// 用环境变量覆盖对应字段
    pub fn apply_env<F>(&mut self, lookup: F) -> AppResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |target: &mut String, key: &str| {
            if let Some(value) = lookup(key) {
                *target = value;
            }
        };
        set(&mut self.login.identity, "EMAIL");
        set(&mut self.login.secret, "PASSWORD");
        set(&mut self.login.federated_identity, "GOOGLE_MAIL");
        set(&mut self.login.federated_secret, "GOOGLE_PASS");
        set(&mut self.upload.token, "AIRTABLE_API_KEY");
        set(&mut self.upload.base_id, "AIRTABLE_BASE_ID");
        set(&mut self.upload.table, "AIRTABLE_TABLE_NAME");
        set(&mut self.start_url, "START_URL");

        if let Some(port) = parse_env(&lookup, "BROWSER_DEBUG_PORT", "u16")? {
            self.browser.debug_port = Some(port);
        }
        if let Some(headless) = parse_env(&lookup, "HEADLESS", "bool")? {
            self.browser.headless = headless;
        }
        if let Some(verbose) = parse_env(&lookup, "VERBOSE_LOGGING", "bool")? {
            self.verbose_logging = verbose;
        }
        if let Some(policy) = parse_env(&lookup, "UPLOAD_FAILURE_POLICY", "FailurePolicy")? {
            self.upload.failure_policy = policy;
        }
        Ok(())
    }

    /// 只校验必需项是否存在，不解析其内容
    pub fn validate(&self) -> AppResult<()> {
        let (identity_key, secret_key) = match self.login.mode {
            LoginMode::Direct => ("EMAIL", "PASSWORD"),
            LoginMode::Federated => ("GOOGLE_MAIL", "GOOGLE_PASS"),
        };
        let credentials = self.login.credentials();
        let required = [
            ("START_URL", self.start_url.as_str()),
            (identity_key, credentials.identity()),
            (secret_key, credentials.secret()),
            ("AIRTABLE_API_KEY", self.upload.token.as_str()),
            ("AIRTABLE_BASE_ID", self.upload.base_id.as_str()),
            ("AIRTABLE_TABLE_NAME", self.upload.table.as_str()),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(AppError::config_missing(key));
            }
        }
        if self.pagination.max_pages == Some(0) {
            return Err(AppError::config_invalid(
                "pagination.max_pages",
                "至少为 1，不限页数请省略该项",
            ));
        }
        Ok(())
    }
}

fn parse_env<T, F>(lookup: &F, key: &str, expected_type: &str) -> AppResult<Option<T>>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(value) => value.trim().parse().map(Some).map_err(|_| {
            ConfigError::EnvVarParseFailed {
                var_name: key.to_string(),
                value,
                expected_type: expected_type.to_string(),
            }
            .into()
        }),
    }
}
