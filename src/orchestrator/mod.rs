//! 编排层（Orchestration Layer）
//!
//! ## 模块划分
//!
//! ### `app` - 进程级生命周期
//! - 持有浏览会话（唯一的稀缺资源）
//! - 无论成功失败都释放会话
//! - 输出全局统计信息
//!
//! ### `pipeline` - 抓取主循环
//! - 打开起始页、登录
//! - 逐页 抽取 → 上传 → 翻页
//!
//! ### `state` - 状态机
//! - `Init → Authenticating → Paging → Done / Aborted`
//!
//! ## 层次关系
//!
//! ```text
//! app (BrowserSession + Config)
//!     ↓
//! pipeline::Orchestrator
//!     ↓
//! services (Authenticator / Extractor / Paginator / BatchUploader)
//!     ↓
//! query::PageQuery (ChromiumPage)
//! ```

pub mod app;
pub mod pipeline;
pub mod state;

pub use app::App;
pub use pipeline::{Orchestrator, RunSummary};
pub use state::{transition, AbortReason, RunEvent, RunState};
