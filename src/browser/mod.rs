//! 浏览会话
//!
//! 整个运行期间只有一个会话，由 [`BrowserSession`] 独占持有。
//! 无论成功还是失败都必须调用 [`BrowserSession::close`]；
//! 即使遗漏，`Drop` 也会终止后台事件任务。

mod connection;
mod launch;

use chromiumoxide::{Browser, Handler, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::BrowserConfig;
use crate::error::AppResult;

pub use connection::connect_to_browser;
pub use launch::launch_browser;

/// 浏览器会话：浏览器实例 + 唯一页面 + 后台事件任务
pub struct BrowserSession {
    browser: Browser,
    page: Option<Page>,
    handler_task: JoinHandle<()>,
    /// 由本进程启动（需要关闭浏览器进程）
    owned: bool,
}

impl BrowserSession {
    /// 按配置连接已有浏览器或启动新浏览器，并创建空白页面
    pub async fn open(config: &BrowserConfig) -> AppResult<Self> {
        let (browser, handler, owned) = match config.debug_port {
            Some(port) => {
                let (browser, handler) = connect_to_browser(port).await?;
                (browser, handler, false)
            }
            None => {
                let (browser, handler) = launch_browser(config).await?;
                (browser, handler, true)
            }
        };
        let handler_task = spawn_handler(handler);

        let page = browser.new_page("about:blank").await?;
        debug!("已创建空白页面");

        Ok(Self {
            browser,
            page: Some(page),
            handler_task,
            owned,
        })
    }

    /// 当前页面
    pub fn page(&self) -> Option<&Page> {
        self.page.as_ref()
    }

    /// 释放会话：关闭页面；若浏览器由本进程启动则一并关闭
    pub async fn close(mut self) {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                warn!("关闭页面失败: {}", e);
            }
        }
        if self.owned {
            if let Err(e) = self.browser.close().await {
                warn!("关闭浏览器失败: {}", e);
            }
            if let Err(e) = self.browser.wait().await {
                warn!("等待浏览器进程退出失败: {}", e);
            }
        }
        info!("✓ 浏览器会话已释放");
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.handler_task.abort();
    }
}

/// 在后台处理浏览器事件
fn spawn_handler(mut handler: Handler) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    })
}
