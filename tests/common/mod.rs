#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use startup_finder_sync::config::{Config, FailurePolicy, LoginMode};
use startup_finder_sync::error::{AppError, BrowserError, QueryError};
use startup_finder_sync::{AppResult, ElementHandle, ElementSet, PageQuery, QuerySchema};

pub const NEXT_PAGE: &str = "pagination.next_page_btn";

/// 页面上发生过的操作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Goto(String),
    Click(String),
    Fill(String, String),
    WaitReady,
    QueryData,
}

#[derive(Default)]
struct State {
    locations: Vec<String>,
    position: usize,
    missing: HashSet<String>,
    missing_on_page: HashMap<usize, HashSet<String>>,
    data: Vec<Value>,
    actions: Vec<Action>,
    goto_fails: bool,
    ready_times_out_after: HashSet<String>,
    query_fails_on_page: HashSet<usize>,
}

/// 脚本化的页面：每次点击“下一页”前进到下一个位置，位置列表末尾后保持不动
#[derive(Default)]
pub struct ScriptedPage {
    state: Mutex<State>,
}

impl ScriptedPage {
    pub fn new(locations: &[&str]) -> Self {
        Self {
            state: Mutex::new(State {
                locations: locations.iter().map(|s| s.to_string()).collect(),
                ..State::default()
            }),
        }
    }

    /// 所有页面都缺少该元素
    pub fn without_element(self, path: &str) -> Self {
        self.state.lock().unwrap().missing.insert(path.to_string());
        self
    }

    /// 第 `page` 个位置（从 0 开始）缺少该元素
    pub fn without_element_on_page(self, page: usize, path: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .missing_on_page
            .entry(page)
            .or_default()
            .insert(path.to_string());
        self
    }

    /// 每个位置的查询结果
    pub fn with_data(self, data: Vec<Value>) -> Self {
        self.state.lock().unwrap().data = data;
        self
    }

    /// 打开起始页失败
    pub fn with_failing_goto(self) -> Self {
        self.state.lock().unwrap().goto_fails = true;
        self
    }

    /// 点击 `path` 之后页面迟迟不就绪
    pub fn with_ready_timeout_after(self, path: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .ready_times_out_after
            .insert(path.to_string());
        self
    }

    /// 第 `page` 个位置的数据查询失败
    pub fn with_failing_query_on_page(self, page: usize) -> Self {
        self.state.lock().unwrap().query_fails_on_page.insert(page);
        self
    }

    pub fn actions(&self) -> Vec<Action> {
        self.state.lock().unwrap().actions.clone()
    }

    pub fn clicks(&self, path: &str) -> usize {
        self.actions()
            .iter()
            .filter(|a| matches!(a, Action::Click(p) if p == path))
            .count()
    }

    pub fn data_queries(&self) -> usize {
        self.actions()
            .iter()
            .filter(|a| matches!(a, Action::QueryData))
            .count()
    }

    pub fn fills(&self) -> Vec<(String, String)> {
        self.actions()
            .into_iter()
            .filter_map(|a| match a {
                Action::Fill(path, text) => Some((path, text)),
                _ => None,
            })
            .collect()
    }

    pub fn position(&self) -> usize {
        self.state.lock().unwrap().position
    }
}

#[async_trait]
impl PageQuery for ScriptedPage {
    async fn goto(&self, url: &str) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        state.actions.push(Action::Goto(url.to_string()));
        if state.goto_fails {
            let refused = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
            return Err(AppError::navigation_failed(url, refused));
        }
        Ok(())
    }

    async fn query_elements(&self, schema: &QuerySchema) -> AppResult<ElementSet> {
        let state = self.state.lock().unwrap();
        let page_missing = state.missing_on_page.get(&state.position);
        Ok(schema
            .leaf_paths()
            .into_iter()
            .filter(|path| !state.missing.contains(path))
            .filter(|path| page_missing.map_or(true, |m| !m.contains(path)))
            .map(|path| ElementHandle::new(path.clone(), path))
            .collect())
    }

    async fn query_data(&self, _schema: &QuerySchema) -> AppResult<Value> {
        let mut state = self.state.lock().unwrap();
        state.actions.push(Action::QueryData);
        if state.query_fails_on_page.contains(&state.position) {
            return Err(AppError::Query(QueryError::UnexpectedShape(
                "查询服务返回了无法解析的结果".to_string(),
            )));
        }
        Ok(state
            .data
            .get(state.position)
            .cloned()
            .unwrap_or_else(|| json!({ "startup_list": [] })))
    }

    async fn click(&self, element: &ElementHandle) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        state.actions.push(Action::Click(element.path.clone()));
        if element.path == NEXT_PAGE && state.position + 1 < state.locations.len() {
            state.position += 1;
        }
        Ok(())
    }

    async fn fill(&self, element: &ElementHandle, text: &str) -> AppResult<()> {
        self.state
            .lock()
            .unwrap()
            .actions
            .push(Action::Fill(element.path.clone(), text.to_string()));
        Ok(())
    }

    async fn wait_for_ready(&self) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        let last_click = state.actions.iter().rev().find_map(|a| match a {
            Action::Click(path) => Some(path.clone()),
            _ => None,
        });
        state.actions.push(Action::WaitReady);
        if last_click.is_some_and(|path| state.ready_times_out_after.contains(&path)) {
            return Err(AppError::Browser(BrowserError::ReadyTimeout { timeout_secs: 30 }));
        }
        Ok(())
    }

    async fn current_location(&self) -> AppResult<String> {
        let state = self.state.lock().unwrap();
        Ok(state
            .locations
            .get(state.position)
            .cloned()
            .unwrap_or_default())
    }
}

/// 第 `page` 页的 `n` 条记录
pub fn startups(page: usize, n: usize) -> Value {
    let list: Vec<Value> = (0..n)
        .map(|i| {
            json!({
                "Name": format!("startup-{page}-{i}"),
                "Website": format!("https://finder.test/company_page/{page}-{i}"),
            })
        })
        .collect();
    json!({ "startup_list": list })
}

/// 指向 mock 服务器的测试配置
pub fn test_config(api_base: &str) -> Config {
    let mut config = Config::default();
    config.start_url = "https://finder.test/startups/search?days=30".to_string();
    config.login.mode = LoginMode::Federated;
    config.login.federated_identity = "someone@example.com".to_string();
    config.login.federated_secret = "correct horse".to_string();
    config.upload.api_base = api_base.to_string();
    config.upload.token = "test-token".to_string();
    config.upload.base_id = "appTEST".to_string();
    config.upload.table = "Startups".to_string();
    config.upload.chunk_delay_ms = 0;
    config.upload.backoff_base_ms = 1;
    config.upload.failure_policy = FailurePolicy::BestEffort;
    config
}

pub const UPLOAD_PATH: &str = "/appTEST/Startups";
