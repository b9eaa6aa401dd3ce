/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::orchestrator::pipeline::RunSummary;
use crate::services::TerminationReason;

/// 初始化日志
///
/// `RUST_LOG` 优先；否则为 `info`，`verbose` 时为 `debug`。
/// 重复调用不会报错（测试中可能多次初始化）。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 列表抓取与同步");
    info!("🌐 起始地址: {}", truncate_text(&config.start_url, 80));
    info!(
        "📦 每批 {} 条，批间隔 {} 毫秒，上传失败策略: {:?}",
        config.upload.effective_chunk_size(),
        config.upload.chunk_delay_ms,
        config.upload.failure_policy
    );
    if let Some(max_pages) = config.pagination.max_pages {
        info!("📄 最多处理 {} 页", max_pages);
    }
    info!("{}", "=".repeat(60));
}

/// 打印最终统计信息
pub fn print_final_stats(summary: &RunSummary) {
    info!("\n{}", "=".repeat(60));
    info!("📊 运行统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("最终状态: {}", summary.final_state);
    if let Some(reason) = &summary.termination {
        info!("结束原因: {}", describe_termination(reason));
    }
    info!("📄 页数: {}", summary.pages_visited);
    info!("🔍 抽取记录: {}", summary.records_extracted);
    info!(
        "✅ 上传成功: {} 条 / {} 批",
        summary.records_uploaded, summary.chunks_uploaded
    );
    info!("❌ 上传失败: {} 批", summary.chunks_failed);
    info!("{}", "=".repeat(60));
}

fn describe_termination(reason: &TerminationReason) -> String {
    match reason {
        TerminationReason::Stalled => "已到最后一页".to_string(),
        TerminationReason::Cycle(cursor) => format!("回到已访问页面 {}", cursor),
        TerminationReason::Limit(n) => format!("达到页数上限 {}", n),
    }
}

/// 截断长文本用于日志显示
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
