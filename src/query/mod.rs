//! 页面查询能力
//!
//! 对外只暴露一组能力：按查询语句定位元素、按查询语句读取结构化数据、
//! 点击 / 填写元素、等待页面就绪、读取当前位置。
//! 认证、抽取、翻页都只依赖 [`PageQuery`]，测试时可以替换为脚本化实现。

pub mod chromium;
pub mod schema;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::error::{AppError, AppResult};

pub use chromium::{ChromiumPage, SelectorMap};
pub use schema::{QuerySchema, SchemaNode};

/// 已定位的页面元素
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementHandle {
    /// 查询语句中的点分路径
    pub path: String,
    /// 后端使用的定位符
    pub locator: String,
}

impl ElementHandle {
    pub fn new(path: impl Into<String>, locator: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            locator: locator.into(),
        }
    }
}

/// 一次元素查询的结果，未找到的元素不在其中
#[derive(Debug, Clone, Default)]
pub struct ElementSet {
    elements: BTreeMap<String, ElementHandle>,
}

impl ElementSet {
    pub fn insert(&mut self, handle: ElementHandle) {
        self.elements.insert(handle.path.clone(), handle);
    }

    pub fn get(&self, path: &str) -> Option<&ElementHandle> {
        self.elements.get(path)
    }

    /// 取必需元素，不存在即为致命错误
    pub fn require(&self, path: &str) -> AppResult<&ElementHandle> {
        self.get(path).ok_or_else(|| AppError::element_missing(path))
    }
}

impl FromIterator<ElementHandle> for ElementSet {
    fn from_iter<I: IntoIterator<Item = ElementHandle>>(iter: I) -> Self {
        let mut set = Self::default();
        for handle in iter {
            set.insert(handle);
        }
        set
    }
}

/// 页面查询能力
///
/// 同一时刻只有一个调用方持有会话，所有操作严格串行。
#[async_trait]
pub trait PageQuery: Send + Sync {
    /// 导航到指定地址
    async fn goto(&self, url: &str) -> AppResult<()>;

    /// 按查询语句定位元素
    async fn query_elements(&self, schema: &QuerySchema) -> AppResult<ElementSet>;

    /// 按查询语句读取结构化数据
    async fn query_data(&self, schema: &QuerySchema) -> AppResult<JsonValue>;

    async fn click(&self, element: &ElementHandle) -> AppResult<()>;

    async fn fill(&self, element: &ElementHandle, text: &str) -> AppResult<()>;

    /// 等待页面进入可交互状态，实现方必须设置超时
    async fn wait_for_ready(&self) -> AppResult<()>;

    /// 当前页面位置（地址）
    async fn current_location(&self) -> AppResult<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_reports_missing_path() {
        let set: ElementSet = [ElementHandle::new("login_btn", "a.login")]
            .into_iter()
            .collect();
        assert!(set.require("login_btn").is_ok());
        let err = set.require("sign_in_btn").unwrap_err();
        assert!(err.is_element_missing());
        assert!(err.to_string().contains("sign_in_btn"));
    }
}
