//! 分批上传
//!
//! 把一页记录按最多 10 条切分，依次 POST 到远端表格。
//! - 状态码 200 为成功，其他状态码为失败，响应体作为原因
//! - 某一批失败后，本次调用不再发送后续批次；已发送的批次不回滚
//! - 两批之间固定等待，避免触发远端限流
//! - 连接失败、超时等网络层错误按指数退避重试，次数有上限
//!
//! 不记录已发送状态：重复上传同一页会在远端产生重复记录，去重由远端负责。

use std::time::Duration;

use reqwest::{StatusCode, Url};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::UploadConfig;
use crate::error::{AppResult, UploadError};
use crate::models::{Record, UploadEnvelope};

/// 退避延迟上限
const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// 网络层失败的重试策略
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// 最大尝试次数（含首次）
    pub max_attempts: usize,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// 第 `attempt` 次失败后的等待时间（从 1 开始计数）
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let exp = attempt.saturating_sub(1).min(16) as u32;
        self.base_delay
            .saturating_mul(2u32.saturating_pow(exp))
            .min(MAX_BACKOFF)
    }
}

/// 单批结果
#[derive(Debug)]
pub enum ChunkOutcome {
    Success,
    Failed(UploadError),
}

#[derive(Debug)]
pub struct ChunkReport {
    /// 批次序号（从 1 开始）
    pub index: usize,
    pub size: usize,
    pub outcome: ChunkOutcome,
}

impl ChunkReport {
    pub fn error(&self) -> Option<&UploadError> {
        match &self.outcome {
            ChunkOutcome::Success => None,
            ChunkOutcome::Failed(e) => Some(e),
        }
    }
}

/// 一次上传调用的汇总
#[derive(Debug, Default)]
pub struct UploadReport {
    pub total_records: usize,
    pub total_chunks: usize,
    /// 实际发送过的批次，按顺序
    pub chunks: Vec<ChunkReport>,
}

impl UploadReport {
    pub fn is_success(&self) -> bool {
        self.failure().is_none() && self.chunks.len() == self.total_chunks
    }

    /// 失败的那一批（最多一个）
    pub fn failure(&self) -> Option<&ChunkReport> {
        self.chunks
            .iter()
            .find(|c| matches!(c.outcome, ChunkOutcome::Failed(_)))
    }

    pub fn succeeded_chunks(&self) -> usize {
        self.chunks
            .iter()
            .filter(|c| matches!(c.outcome, ChunkOutcome::Success))
            .count()
    }

    pub fn uploaded_records(&self) -> usize {
        self.chunks
            .iter()
            .filter(|c| matches!(c.outcome, ChunkOutcome::Success))
            .map(|c| c.size)
            .sum()
    }
}

/// 按顺序切分为不超过 `chunk_size` 的批次
pub fn chunk_records(records: &[Record], chunk_size: usize) -> std::slice::Chunks<'_, Record> {
    records.chunks(chunk_size.max(1))
}

pub struct BatchUploader {
    client: reqwest::Client,
    endpoint: Url,
    token: String,
    chunk_size: usize,
    chunk_delay: Duration,
    retry: RetryPolicy,
}

impl BatchUploader {
    pub fn new(config: &UploadConfig) -> AppResult<Self> {
        let endpoint = build_endpoint(&config.api_base, &config.base_id, &config.table)?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(UploadError::Client)?;
        debug!("上传地址: {}", endpoint);

        Ok(Self {
            client,
            endpoint,
            token: config.token.clone(),
            chunk_size: config.effective_chunk_size(),
            chunk_delay: config.chunk_delay(),
            retry: RetryPolicy {
                max_attempts: config.max_attempts.max(1),
                base_delay: config.backoff_base(),
            },
        })
    }

    /// 上传一页记录，遇到失败的批次立即停止
    pub async fn upload(&self, records: &[Record]) -> UploadReport {
        let total_chunks = records.len().div_ceil(self.chunk_size);
        let mut report = UploadReport {
            total_records: records.len(),
            total_chunks,
            chunks: Vec::with_capacity(total_chunks),
        };
        if records.is_empty() {
            info!("本页没有记录，跳过上传");
            return report;
        }

        info!("📤 正在上传 {} 条记录 (共 {} 批)...", records.len(), total_chunks);
        for (i, chunk) in chunk_records(records, self.chunk_size).enumerate() {
            let index = i + 1;
            match self.send_chunk(chunk).await {
                Ok(()) => {
                    info!("✓ 第 {}/{} 批上传成功", index, total_chunks);
                    report.chunks.push(ChunkReport {
                        index,
                        size: chunk.len(),
                        outcome: ChunkOutcome::Success,
                    });
                }
                Err(e) => {
                    error!("❌ 第 {}/{} 批上传失败: {}", index, total_chunks, e);
                    report.chunks.push(ChunkReport {
                        index,
                        size: chunk.len(),
                        outcome: ChunkOutcome::Failed(e),
                    });
                    return report;
                }
            }

            if index < total_chunks {
                sleep(self.chunk_delay).await;
            }
        }

        info!("✓ 本页数据全部上传成功");
        report
    }

    async fn send_chunk(&self, chunk: &[Record]) -> Result<(), UploadError> {
        let body = UploadEnvelope::wrap(chunk);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let sent = self
                .client
                .post(self.endpoint.clone())
                .bearer_auth(&self.token)
                .json(&body)
                .send()
                .await;

            match sent {
                Ok(response) => {
                    let status = response.status();
                    if status == StatusCode::OK {
                        return Ok(());
                    }
                    let body = rejection_body(status, response.text().await);
                    return Err(UploadError::Rejected {
                        status: status.as_u16(),
                        body,
                    });
                }
                Err(e) if is_transient(&e) && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        "网络请求失败 (尝试 {}/{}), {:?} 后重试: {}",
                        attempt, self.retry.max_attempts, delay, e
                    );
                    sleep(delay).await;
                }
                Err(e) => {
                    return Err(UploadError::Transport {
                        attempts: attempt,
                        message: e.to_string(),
                    })
                }
            }
        }
    }
}

/// 拒绝响应的内容，读取失败时以失败原因代替
fn rejection_body(status: StatusCode, read: Result<String, reqwest::Error>) -> String {
    match read {
        Ok(body) => body,
        Err(e) => {
            warn!("读取响应内容失败 (状态码 {}): {}", status, e);
            format!("<响应内容读取失败: {}>", e)
        }
    }
}

fn is_transient(e: &reqwest::Error) -> bool {
    e.is_connect() || e.is_timeout() || e.is_request()
}

/// `{api_base}/{base_id}/{table}`，路径段自动编码
fn build_endpoint(api_base: &str, base_id: &str, table: &str) -> Result<Url, UploadError> {
    let mut url = Url::parse(api_base)
        .map_err(|e| UploadError::InvalidEndpoint(format!("{}: {}", api_base, e)))?;
    url.path_segments_mut()
        .map_err(|_| UploadError::InvalidEndpoint(api_base.to_string()))?
        .pop_if_empty()
        .push(base_id)
        .push(table);
    Ok(url)
}
