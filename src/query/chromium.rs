//! 基于 chromiumoxide 的页面查询实现
//!
//! 持有唯一的 Page 资源。查询语句中的每个路径通过选择器表映射为 CSS 选择器，
//! 值可带 `@属性` 后缀表示读取属性而非文本。

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use super::schema::{join_path, SchemaNode};
use super::{ElementHandle, ElementSet, PageQuery, QuerySchema};
use crate::config::BrowserConfig;
use crate::error::{AppError, AppResult, BrowserError};

/// 就绪状态轮询间隔
const READY_POLL_INTERVAL: Duration = Duration::from_millis(200);
/// 写入当前文档的标记变量，文档被替换后随之消失
const DOCUMENT_MARKER: &str = "__finderDocumentMarker";

/// 点击前的页面快照
#[derive(Debug, Clone, PartialEq, Eq)]
struct ClickSnapshot {
    marker: u64,
    location: String,
}

impl ClickSnapshot {
    /// 文档标记不同（新文档）或地址变化（前端路由）都算页面已变化
    fn has_changed(&self, marker: Option<u64>, location: &str) -> bool {
        marker != Some(self.marker) || location != self.location
    }
}

/// 解析后的定位符
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    pub css: String,
    pub attr: Option<String>,
}

impl Locator {
    fn parse(raw: &str) -> Self {
        if let Some((css, attr)) = raw.rsplit_once('@') {
            let is_attr = !attr.is_empty()
                && attr
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
            if is_attr && !css.trim().is_empty() {
                return Self {
                    css: css.trim().to_string(),
                    attr: Some(attr.to_string()),
                };
            }
        }
        Self {
            css: raw.trim().to_string(),
            attr: None,
        }
    }
}

/// 查询路径 → 定位符
#[derive(Debug, Clone, Default)]
pub struct SelectorMap {
    entries: BTreeMap<String, Locator>,
}

impl SelectorMap {
    pub fn new(raw: &BTreeMap<String, String>) -> Self {
        Self {
            entries: raw
                .iter()
                .map(|(path, value)| (path.clone(), Locator::parse(value)))
                .collect(),
        }
    }

    pub fn get(&self, path: &str) -> Option<&Locator> {
        self.entries.get(path)
    }

    /// 非列表嵌套节点的完整 CSS：祖先选择器与自身用后代组合符连接
    fn element_css(&self, ancestors: &[&str], path: &str) -> Option<String> {
        let own = self.get(path)?;
        let mut parts: Vec<&str> = ancestors
            .iter()
            .filter_map(|p| self.get(p).map(|l| l.css.as_str()))
            .collect();
        parts.push(&own.css);
        Some(parts.join(" "))
    }

    /// 生成供页面脚本使用的解析树
    fn resolve_tree(&self, nodes: &[SchemaNode], prefix: &str) -> AppResult<Vec<ResolvedNode>> {
        nodes
            .iter()
            .map(|node| {
                let path = join_path(prefix, &node.name);
                let locator = self.get(&path);
                if node.is_list && locator.is_none() {
                    return Err(AppError::config_missing(format!("selectors.{}", path)));
                }
                Ok(ResolvedNode {
                    name: node.name.clone(),
                    list: node.is_list,
                    selector: locator.map(|l| l.css.clone()),
                    attr: locator.and_then(|l| l.attr.clone()),
                    children: self.resolve_tree(&node.children, &path)?,
                })
            })
            .collect()
    }
}

#[derive(Debug, Serialize)]
struct ResolvedNode {
    name: String,
    list: bool,
    selector: Option<String>,
    attr: Option<String>,
    children: Vec<ResolvedNode>,
}

const DATA_SCRIPT: &str = r#"
(() => {
    const tree = __TREE__;
    const read = (el, attr) => el ? (attr ? el.getAttribute(attr) : (el.textContent || '').trim()) : null;
    const resolve = (scope, nodes) => {
        const out = {};
        for (const n of nodes) {
            if (n.list) {
                const rows = Array.from(scope.querySelectorAll(n.selector));
                out[n.name] = rows.map(r => n.children.length ? resolve(r, n.children) : read(r, n.attr));
            } else if (n.children.length) {
                const inner = n.selector ? scope.querySelector(n.selector) : scope;
                out[n.name] = inner ? resolve(inner, n.children) : null;
            } else {
                out[n.name] = n.selector ? read(scope.querySelector(n.selector), n.attr) : null;
            }
        }
        return out;
    };
    return resolve(document, tree);
})()
"#;

/// chromiumoxide 页面查询
pub struct ChromiumPage {
    page: Page,
    selectors: SelectorMap,
    ready_timeout: Duration,
    navigation_timeout: Duration,
    next_marker: AtomicU64,
    last_click: Mutex<Option<ClickSnapshot>>,
}

impl ChromiumPage {
    pub fn new(page: Page, selectors: SelectorMap, config: &BrowserConfig) -> Self {
        Self {
            page,
            selectors,
            ready_timeout: config.ready_timeout(),
            navigation_timeout: config.navigation_timeout(),
            next_marker: AtomicU64::new(0),
            last_click: Mutex::new(None),
        }
    }

    /// 执行 JS 代码并返回 JSON 结果
    pub async fn eval(&self, js_code: impl Into<String>) -> AppResult<JsonValue> {
        let result = self.page.evaluate(js_code.into()).await?;
        Ok(result.into_value()?)
    }

    /// 执行 JS 代码并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(&self, js_code: impl Into<String>) -> AppResult<T> {
        let json_value = self.eval(js_code).await?;
        Ok(serde_json::from_value(json_value)?)
    }

    /// 给当前文档打上标记并记录地址
    async fn mark_document(&self) -> AppResult<ClickSnapshot> {
        let marker = self.next_marker.fetch_add(1, Ordering::Relaxed) + 1;
        self.eval(format!("window.{} = {}; true", DOCUMENT_MARKER, marker))
            .await?;
        Ok(ClickSnapshot {
            marker,
            location: self.current_location().await?,
        })
    }

    async fn read_marker(&self) -> AppResult<Option<u64>> {
        self.eval_as(format!("window.{} ?? null", DOCUMENT_MARKER))
            .await
    }

    /// 等待点击引起的页面变化。超时不是错误：最后一页的“下一页”点击后页面本就不变
    async fn wait_for_change(&self, snapshot: &ClickSnapshot) {
        let watch = async {
            loop {
                match (self.read_marker().await, self.current_location().await) {
                    (Ok(marker), Ok(location)) => {
                        if snapshot.has_changed(marker, &location) {
                            break;
                        }
                    }
                    // 跳转过程中执行上下文会被销毁
                    (Err(e), _) | (_, Err(e)) => debug!("页面正在跳转: {}", e),
                }
                sleep(READY_POLL_INTERVAL).await;
            }
        };

        if timeout(self.navigation_timeout, watch).await.is_err() {
            debug!("点击后 {:?} 内页面未变化", self.navigation_timeout);
            return;
        }
        debug!("点击后页面已变化，等待导航完成");
        if let Ok(Err(e)) = timeout(self.ready_timeout, self.page.wait_for_navigation()).await {
            debug!("等待导航事件失败: {}", e);
        }
    }

    async fn wait_for_complete(&self) -> AppResult<()> {
        let poll = async {
            loop {
                match self.eval_as::<String>("document.readyState").await {
                    Ok(state) if state == "complete" => break,
                    Ok(state) => debug!("页面状态: {}", state),
                    Err(e) => debug!("读取页面状态失败: {}", e),
                }
                sleep(READY_POLL_INTERVAL).await;
            }
        };
        timeout(self.ready_timeout, poll).await.map_err(|_| {
            AppError::Browser(BrowserError::ReadyTimeout {
                timeout_secs: self.ready_timeout.as_secs(),
            })
        })
    }

    fn collect_elements(
        &self,
        nodes: &[SchemaNode],
        prefix: &str,
        ancestors: &mut Vec<String>,
        out: &mut Vec<(String, String)>,
    ) {
        for node in nodes {
            let path = join_path(prefix, &node.name);
            if node.is_leaf() {
                let refs: Vec<&str> = ancestors.iter().map(String::as_str).collect();
                match self.selectors.element_css(&refs, &path) {
                    Some(css) => out.push((path, css)),
                    None => warn!("未配置选择器: {}", path),
                }
            } else {
                ancestors.push(path.clone());
                self.collect_elements(&node.children, &path, ancestors, out);
                ancestors.pop();
            }
        }
    }
}

#[async_trait]
impl PageQuery for ChromiumPage {
    async fn goto(&self, url: &str) -> AppResult<()> {
        self.last_click.lock().await.take();
        self.page
            .goto(url)
            .await
            .map_err(|e| AppError::navigation_failed(url, e))?;
        Ok(())
    }

    async fn query_elements(&self, schema: &QuerySchema) -> AppResult<ElementSet> {
        let mut wanted = Vec::new();
        self.collect_elements(&schema.nodes, "", &mut Vec::new(), &mut wanted);

        let mut set = ElementSet::default();
        for (path, css) in wanted {
            match self.page.find_element(css.as_str()).await {
                Ok(_) => {
                    debug!("找到元素 {} ({})", path, css);
                    set.insert(ElementHandle::new(path, css));
                }
                Err(e) => debug!("未找到元素 {} ({}): {}", path, css, e),
            }
        }
        Ok(set)
    }

    async fn query_data(&self, schema: &QuerySchema) -> AppResult<JsonValue> {
        let tree = self.selectors.resolve_tree(&schema.nodes, "")?;
        let script = DATA_SCRIPT.replace("__TREE__", &serde_json::to_string(&tree)?);
        self.eval(script).await
    }

    async fn click(&self, element: &ElementHandle) -> AppResult<()> {
        debug!("点击 {}", element.path);
        let target = self.page.find_element(element.locator.as_str()).await?;
        let snapshot = self.mark_document().await?;
        *self.last_click.lock().await = Some(snapshot);
        target.click().await?;
        Ok(())
    }

    async fn fill(&self, element: &ElementHandle, text: &str) -> AppResult<()> {
        debug!("填写 {}", element.path);
        let target = self.page.find_element(element.locator.as_str()).await?;
        target.click().await?.type_str(text).await?;
        Ok(())
    }

    /// 点击之后先等页面变化，再等文档加载完成；旧文档的 `complete` 状态不算数
    async fn wait_for_ready(&self) -> AppResult<()> {
        let last_click = self.last_click.lock().await.take();
        if let Some(snapshot) = last_click {
            self.wait_for_change(&snapshot).await;
        }
        self.wait_for_complete().await
    }

    async fn current_location(&self) -> AppResult<String> {
        Ok(self.page.url().await?.unwrap_or_default())
    }
}
