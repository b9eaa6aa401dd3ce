//! 翻页
//!
//! 点击“下一页”后比较点击前后的页面位置：位置未变即为自然结束。
//! “下一页”控件缺失是致命错误（站点在最后一页也会保留该控件，点击无效果）。
//! 另外记录已访问位置：回到访问过的页面、或超过页数上限，同样结束迭代。

use std::collections::HashSet;

use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::models::SessionCursor;
use crate::query::{PageQuery, QuerySchema};

const NEXT_PAGE_QUERY: &str = r#"
{
    pagination {
        next_page_btn(button with link to next page)
    }
}
"#;

const NEXT_PAGE_PATH: &str = "pagination.next_page_btn";

/// 结束原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationReason {
    /// 点击后位置未变化
    Stalled,
    /// 回到了已访问过的位置
    Cycle(SessionCursor),
    /// 达到页数上限
    Limit(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaginationOutcome {
    Advanced(SessionCursor),
    Terminated(TerminationReason),
}

pub struct Paginator {
    schema: QuerySchema,
    visited: HashSet<SessionCursor>,
    max_pages: Option<usize>,
}

impl Paginator {
    pub fn new(max_pages: Option<usize>) -> AppResult<Self> {
        if max_pages == Some(0) {
            return Err(AppError::config_invalid("pagination.max_pages", "至少为 1"));
        }
        Ok(Self {
            schema: QuerySchema::parse(NEXT_PAGE_QUERY)?,
            visited: HashSet::new(),
            max_pages,
        })
    }

    /// 翻到下一页。控件缺失、等待超时等错误由调用方中止运行
    pub async fn advance(&mut self, page: &dyn PageQuery) -> AppResult<PaginationOutcome> {
        let before = SessionCursor::new(page.current_location().await?);
        self.visited.insert(before.clone());

        if let Some(limit) = self.max_pages {
            if self.visited.len() >= limit {
                info!("已达到页数上限 {}，停止翻页", limit);
                return Ok(PaginationOutcome::Terminated(TerminationReason::Limit(limit)));
            }
        }

        info!("➡️ 正在翻到下一页...");
        let elements = page.query_elements(&self.schema).await?;
        page.click(elements.require(NEXT_PAGE_PATH)?).await?;
        page.wait_for_ready().await?;

        let after = SessionCursor::new(page.current_location().await?);
        if after == before {
            info!("✓ 页面位置未变化，已到最后一页");
            return Ok(PaginationOutcome::Terminated(TerminationReason::Stalled));
        }
        if self.visited.contains(&after) {
            warn!("⚠️ 翻页回到了已访问的页面 {}，停止翻页", after);
            return Ok(PaginationOutcome::Terminated(TerminationReason::Cycle(after)));
        }
        Ok(PaginationOutcome::Advanced(after))
    }
}
