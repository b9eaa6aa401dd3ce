use chromiumoxide::{Browser, BrowserConfig as CdpBrowserConfig, Handler};
use tracing::{debug, error, info};

use crate::config::BrowserConfig;
use crate::error::{AppResult, BrowserError};

/// 启动本地浏览器
pub async fn launch_browser(config: &BrowserConfig) -> AppResult<(Browser, Handler)> {
    info!(
        "🚀 启动浏览器 ({})...",
        if config.headless { "无头模式" } else { "有界面模式" }
    );

    let mut builder = CdpBrowserConfig::builder();
    builder = if config.headless {
        builder.new_headless_mode()
    } else {
        builder.with_head()
    };
    if let Some(path) = &config.executable {
        debug!("浏览器路径: {}", path.display());
        builder = builder.chrome_executable(path);
    }
    let cdp_config = builder
        .args(vec![
            "--no-sandbox",            // 禁用沙盒，防止权限问题导致的崩溃
            "--disable-dev-shm-usage", // 防止共享内存不足
        ])
        .build()
        .map_err(|e| {
            error!("配置浏览器失败: {}", e);
            BrowserError::LaunchFailed { source: e.into() }
        })?;

    let (browser, handler) = Browser::launch(cdp_config).await.map_err(|e| {
        error!("启动浏览器失败: {}", e);
        BrowserError::LaunchFailed {
            source: Box::new(e),
        }
    })?;
    debug!("浏览器启动成功");

    Ok((browser, handler))
}
