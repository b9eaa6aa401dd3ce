//! 错误类型
//!
//! 分层错误：浏览器 / 页面查询 / 上传 / 配置。
//! 页面元素缺失与等待超时属于致命错误，整个运行必须中止。

use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 浏览器相关错误
    #[error("浏览器错误: {0}")]
    Browser(#[from] BrowserError),
    /// 页面查询错误
    #[error("页面查询错误: {0}")]
    Query(#[from] QueryError),
    /// 上传错误
    #[error("上传错误: {0}")]
    Upload(#[from] UploadError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
}

/// 浏览器相关错误
#[derive(Debug, Error)]
pub enum BrowserError {
    /// 启动浏览器失败
    #[error("启动浏览器失败: {source}")]
    LaunchFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 连接浏览器失败
    #[error("无法连接到浏览器 (端口: {port}): {source}")]
    ConnectionFailed {
        port: u16,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 导航失败
    #[error("导航到 {url} 失败: {source}")]
    NavigationFailed {
        url: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 页面在限定时间内未就绪
    #[error("页面在 {timeout_secs} 秒内未进入可交互状态")]
    ReadyTimeout { timeout_secs: u64 },
    /// CDP 协议调用失败
    #[error("CDP 调用失败: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),
}

/// 页面查询错误
#[derive(Debug, Error)]
pub enum QueryError {
    /// 必需的页面元素不存在（页面布局已变化）
    #[error("页面缺少必需元素: {path}")]
    ElementMissing { path: String },
    /// 查询语句语法错误
    #[error("查询语句解析失败 (位置 {offset}): {message}")]
    SchemaSyntax { offset: usize, message: String },
    /// 查询结果结构不符合预期
    #[error("查询结果结构异常: {0}")]
    UnexpectedShape(String),
    /// 查询结果 JSON 处理失败
    #[error("JSON 处理失败: {0}")]
    Json(#[from] serde_json::Error),
}

/// 上传错误
#[derive(Debug, Error)]
pub enum UploadError {
    /// 远端明确拒绝（非 200 状态码）
    #[error("远端拒绝 (状态码 {status}): {body}")]
    Rejected { status: u16, body: String },
    /// 网络层失败，重试耗尽
    #[error("网络请求失败 (已尝试 {attempts} 次): {message}")]
    Transport { attempts: usize, message: String },
    /// 上传地址无效
    #[error("上传地址无效: {0}")]
    InvalidEndpoint(String),
    /// HTTP 客户端初始化失败
    #[error("HTTP 客户端初始化失败: {0}")]
    Client(reqwest::Error),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 缺少必需配置项
    #[error("缺少必需配置项: {key}")]
    Missing { key: String },
    /// 配置值不合法
    #[error("配置项 {key} 不合法: {message}")]
    Invalid { key: String, message: String },
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 读取配置文件失败
    #[error("读取配置文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        source: toml::de::Error,
    },
}

impl From<chromiumoxide::error::CdpError> for AppError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        AppError::Browser(BrowserError::Cdp(err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Query(QueryError::Json(err))
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建元素缺失错误
    pub fn element_missing(path: impl Into<String>) -> Self {
        AppError::Query(QueryError::ElementMissing { path: path.into() })
    }

    /// 创建缺少配置项错误
    pub fn config_missing(key: impl Into<String>) -> Self {
        AppError::Config(ConfigError::Missing { key: key.into() })
    }

    /// 创建配置值不合法错误
    pub fn config_invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Config(ConfigError::Invalid {
            key: key.into(),
            message: message.into(),
        })
    }

    /// 创建导航失败错误
    pub fn navigation_failed(
        url: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Browser(BrowserError::NavigationFailed {
            url: url.into(),
            source: Box::new(source),
        })
    }

    /// 是否为布局变化导致的致命错误
    pub fn is_element_missing(&self) -> bool {
        matches!(self, AppError::Query(QueryError::ElementMissing { .. }))
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
