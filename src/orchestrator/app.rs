//! 应用生命周期 - 编排层
//!
//! 唯一持有浏览会话的模块：打开会话 → 执行主循环 → 释放会话 → 输出统计。

use anyhow::{bail, Result};
use tracing::info;

use crate::browser::BrowserSession;
use crate::config::Config;
use crate::models::Credentials;
use crate::orchestrator::pipeline::{Orchestrator, RunSummary};
use crate::orchestrator::state::RunState;
use crate::query::{ChromiumPage, SelectorMap};
use crate::utils::logging::{log_startup, print_final_stats};

/// 应用主结构
pub struct App {
    config: Config,
    session: BrowserSession,
}

impl App {
    /// 初始化应用：打开浏览会话
    pub async fn initialize(config: Config) -> Result<Self> {
        log_startup(&config);
        let session = BrowserSession::open(&config.browser).await?;
        Ok(Self { config, session })
    }

    /// 运行主流程，会话在所有退出路径上都会被释放
    pub async fn run(self) -> Result<RunSummary> {
        let Self { mut config, session } = self;
        // 凭据只在登录握手期间存在
        let credentials = config.login.take_credentials();

        let summary = match Self::drive(&config, &session, credentials).await {
            Ok(summary) => summary,
            Err(e) => {
                session.close().await;
                return Err(e);
            }
        };
        session.close().await;

        print_final_stats(&summary);
        if let RunState::Aborted(reason) = &summary.final_state {
            bail!("运行中止: {}", reason);
        }
        info!("✅ 全部页面处理完成");
        Ok(summary)
    }

    async fn drive(
        config: &Config,
        session: &BrowserSession,
        credentials: Credentials,
    ) -> Result<RunSummary> {
        let page = session
            .page()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("浏览会话没有可用页面"))?;
        let query = ChromiumPage::new(page, SelectorMap::new(&config.selectors), &config.browser);
        let orchestrator = Orchestrator::new(config)?;
        Ok(orchestrator.run(&query, credentials).await)
    }
}
