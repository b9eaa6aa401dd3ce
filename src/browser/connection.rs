use chromiumoxide::{Browser, Handler};
use tracing::{debug, error, info};

use crate::error::{AppResult, BrowserError};

/// 通过调试端口连接到已运行的浏览器
pub async fn connect_to_browser(port: u16) -> AppResult<(Browser, Handler)> {
    let browser_url = format!("http://localhost:{}", port);
    info!("正在连接到浏览器: {}", browser_url);

    let (browser, handler) = Browser::connect(&browser_url).await.map_err(|e| {
        error!("连接浏览器失败: {}", e);
        BrowserError::ConnectionFailed {
            port,
            source: Box::new(e),
        }
    })?;
    debug!("浏览器连接成功");

    Ok((browser, handler))
}
