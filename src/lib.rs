//! # Startup Finder Sync
//!
//! 登录受保护的分页列表网站，逐页抽取结构化记录，并分批同步到远端表格。
//!
//! ## 架构设计
//!
//! ### ① 基础设施层
//! - `browser/` - 浏览会话的获取与释放（唯一的稀缺资源）
//! - `query/` - 页面查询能力 `PageQuery`，以及 chromiumoxide 实现
//!
//! ### ② 业务能力层（Services）
//! - `Authenticator` - 两步登录握手
//! - `Extractor` - 单页数据抽取
//! - `Paginator` - 翻页与结束判断
//! - `BatchUploader` - 分批、限速上传
//!
//! ### ③ 编排层（Orchestration）
//! - `orchestrator/state` - 运行状态机
//! - `orchestrator/pipeline` - 抓取主循环
//! - `orchestrator/app` - 进程生命周期与统计
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod query;
pub mod services;
pub mod utils;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::{Credentials, PageResult, Record, SessionCursor};
pub use orchestrator::{App, Orchestrator, RunState, RunSummary};
pub use query::{ElementHandle, ElementSet, PageQuery, QuerySchema};
