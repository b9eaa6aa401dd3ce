//! 抓取主循环 - 编排层
//!
//! 打开起始页 → 登录 → 循环 {抽取, 上传, 翻页} → 结束。
//! 每一步完整结束后才开始下一步；每页的记录在本轮上传后即被丢弃。

use tracing::{error, info, warn};

use crate::config::{Config, FailurePolicy};
use crate::error::AppResult;
use crate::models::Credentials;
use crate::orchestrator::state::{transition, RunEvent, RunState};
use crate::query::PageQuery;
use crate::services::{
    AuthOutcome, Authenticator, BatchUploader, Extractor, PaginationOutcome, Paginator,
    TerminationReason,
};

/// 运行统计
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub final_state: RunState,
    pub pages_visited: usize,
    pub records_extracted: usize,
    pub records_uploaded: usize,
    pub chunks_uploaded: usize,
    pub chunks_failed: usize,
    pub termination: Option<TerminationReason>,
}

impl RunSummary {
    fn new() -> Self {
        Self {
            final_state: RunState::Init,
            pages_visited: 0,
            records_extracted: 0,
            records_uploaded: 0,
            chunks_uploaded: 0,
            chunks_failed: 0,
            termination: None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.final_state == RunState::Done
    }
}

pub struct Orchestrator {
    start_url: String,
    authenticator: Authenticator,
    extractor: Extractor,
    paginator: Paginator,
    uploader: BatchUploader,
    failure_policy: FailurePolicy,
    state: RunState,
}

impl Orchestrator {
    pub fn new(config: &Config) -> AppResult<Self> {
        Ok(Self::from_parts(
            config.start_url.clone(),
            Authenticator::new()?,
            Extractor::new(&config.extract.schema)?,
            Paginator::new(config.pagination.max_pages)?,
            BatchUploader::new(&config.upload)?,
            config.upload.failure_policy,
        ))
    }

    pub fn from_parts(
        start_url: String,
        authenticator: Authenticator,
        extractor: Extractor,
        paginator: Paginator,
        uploader: BatchUploader,
        failure_policy: FailurePolicy,
    ) -> Self {
        Self {
            start_url,
            authenticator,
            extractor,
            paginator,
            uploader,
            failure_policy,
            state: RunState::Init,
        }
    }

    fn apply(&mut self, event: RunEvent) {
        let next = transition(&self.state, event);
        if next != self.state {
            info!("状态: {} → {}", self.state, next);
        }
        self.state = next;
    }

    /// 执行完整流程，返回时状态必为 Done 或 Aborted
    pub async fn run(mut self, page: &dyn PageQuery, credentials: Credentials) -> RunSummary {
        let mut summary = RunSummary::new();

        info!("🌐 正在打开 {}", self.start_url);
        let opened = match page.goto(&self.start_url).await {
            Ok(()) => page.wait_for_ready().await,
            Err(e) => Err(e),
        };
        match opened {
            Ok(()) => self.apply(RunEvent::Started),
            Err(e) => self.apply(RunEvent::StartFailed(e.to_string())),
        }

        if self.state == RunState::Authenticating {
            match self.authenticator.authenticate(page, credentials).await {
                AuthOutcome::Authenticated => self.apply(RunEvent::AuthSucceeded),
                AuthOutcome::Failed(reason) => self.apply(RunEvent::AuthFailed(reason)),
            }
        }

        while self.state == RunState::Paging {
            self.process_page(page, &mut summary).await;
            if self.state != RunState::Paging {
                break;
            }

            match self.paginator.advance(page).await {
                Ok(PaginationOutcome::Advanced(cursor)) => {
                    info!("✓ 已翻到: {}", cursor);
                    self.apply(RunEvent::PageAdvanced);
                }
                Ok(PaginationOutcome::Terminated(reason)) => {
                    summary.termination = Some(reason);
                    self.apply(RunEvent::PagingTerminated);
                }
                Err(e) => {
                    error!("❌ 翻页失败: {}", e);
                    self.apply(RunEvent::PaginationFailed(e.to_string()));
                }
            }
        }

        summary.final_state = self.state.clone();
        summary
    }

    /// 抽取并上传当前页
    async fn process_page(&mut self, page: &dyn PageQuery, summary: &mut RunSummary) {
        summary.pages_visited += 1;
        match page.current_location().await {
            Ok(location) => info!("📄 第 {} 页: {}", summary.pages_visited, location),
            Err(e) => warn!("读取当前页面位置失败: {}", e),
        }

        let records = match self.extractor.extract(page).await {
            Ok(records) => records,
            Err(e) => {
                error!("❌ 数据抽取失败: {}", e);
                self.apply(RunEvent::ExtractionFailed(e.to_string()));
                return;
            }
        };
        info!("✓ 本页抽取到 {} 条记录", records.len());
        summary.records_extracted += records.len();

        let report = self.uploader.upload(&records).await;
        summary.chunks_uploaded += report.succeeded_chunks();
        summary.records_uploaded += report.uploaded_records();

        if let Some(failed) = report.failure() {
            summary.chunks_failed += 1;
            let reason = format!(
                "第 {} 页第 {}/{} 批: {}",
                summary.pages_visited,
                failed.index,
                report.total_chunks,
                failed.error().map(ToString::to_string).unwrap_or_default()
            );
            let abort = self.failure_policy == FailurePolicy::FailFast;
            if abort {
                error!("❌ 上传失败，按策略中止运行: {}", reason);
            } else {
                warn!("⚠️ 上传失败，继续下一页: {}", reason);
            }
            self.apply(RunEvent::UploadFailed { reason, abort });
        }
    }
}
