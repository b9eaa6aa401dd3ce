//! 登录握手
//!
//! 固定两步：点击登录入口 → 填写账号密码并提交。
//! 任一必需元素缺失即失败，不重试；只有账号、密码、提交按钮同时存在才会开始填写。

use tracing::{error, info};

use crate::error::AppResult;
use crate::models::Credentials;
use crate::query::{PageQuery, QuerySchema};

const LOGIN_ENTRY_QUERY: &str = r#"
{
    login_btn
}
"#;

const LOGIN_FORM_QUERY: &str = r#"
{
    username_field
    password_field
    sign_in_btn
}
"#;

/// 登录结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Authenticated,
    Failed(String),
}

impl AuthOutcome {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthOutcome::Authenticated)
    }
}

pub struct Authenticator {
    entry_query: QuerySchema,
    form_query: QuerySchema,
}

impl Authenticator {
    pub fn new() -> AppResult<Self> {
        Ok(Self {
            entry_query: QuerySchema::parse(LOGIN_ENTRY_QUERY)?,
            form_query: QuerySchema::parse(LOGIN_FORM_QUERY)?,
        })
    }

    /// 执行登录握手，凭据在此被消费
    pub async fn authenticate(&self, page: &dyn PageQuery, credentials: Credentials) -> AuthOutcome {
        info!("🔐 正在登录...");
        match self.handshake(page, &credentials).await {
            Ok(()) => {
                info!("✓ 登录完成");
                AuthOutcome::Authenticated
            }
            Err(e) => {
                error!("❌ 登录失败: {}", e);
                AuthOutcome::Failed(e.to_string())
            }
        }
    }

    async fn handshake(&self, page: &dyn PageQuery, credentials: &Credentials) -> AppResult<()> {
        let entry = page.query_elements(&self.entry_query).await?;
        page.click(entry.require("login_btn")?).await?;
        page.wait_for_ready().await?;

        let form = page.query_elements(&self.form_query).await?;
        let username = form.require("username_field")?;
        let password = form.require("password_field")?;
        let submit = form.require("sign_in_btn")?;

        page.fill(username, credentials.identity()).await?;
        page.fill(password, credentials.secret()).await?;
        page.click(submit).await?;
        page.wait_for_ready().await
    }
}
