//! 账号轮换 - 服务层
//!
//! 额度耗尽时在账号菜单里切到下一个未耗尽的账号。已耗尽账号的
//! 标识由会话记着，本服务只负责枚举与点击；没有可用账号时
//! 关掉菜单并返回 None，由上层转交操作员。

use std::collections::HashSet;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::selectors;
use crate::error::AppResult;
use crate::infrastructure::UiExecutor;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}").unwrap());

/// 菜单展开 / 切换生效的等待时间
const MENU_SETTLE: Duration = Duration::from_millis(1500);
const SWITCH_SETTLE: Duration = Duration::from_secs(8);

pub struct IdentitySwitcher;

impl IdentitySwitcher {
    pub fn new() -> Self {
        Self
    }

    /// 页面是否处于已登录状态
    ///
    /// 有账号入口（头像按钮）即视为已登录；出现 Sign in 链接
    /// 视为未登录。两者都探测不到时按未登录处理。
    pub async fn is_logged_in(&self, ui: &UiExecutor) -> AppResult<bool> {
        let js_code = format!(
            r#"
            ((sels) => {{
                if (document.querySelector(
                    'a[href*="accounts.google.com/ServiceLogin"], a[aria-label*="Sign in"]')) {{
                    return false;
                }}
                for (const sel of sels) {{
                    if (document.querySelector(sel)) return true;
                }}
                return false;
            }})({})
            "#,
            serde_json::to_string(selectors::ACCOUNT_BUTTON)?,
        );
        ui.eval_as(js_code).await
    }

    /// 当前登录账号的标识（邮箱），读不到返回 None
    pub async fn current_identity(&self, ui: &UiExecutor) -> AppResult<Option<String>> {
        let label = ui
            .attribute_first(selectors::ACCOUNT_BUTTON, "aria-label", "账号按钮")
            .await
            .unwrap_or(None);

        Ok(label
            .as_deref()
            .and_then(|l| EMAIL_RE.find(l))
            .map(|m| m.as_str().to_string()))
    }

    /// 轮换到下一个未耗尽的账号
    ///
    /// 成功返回新账号标识；没有候选时返回 None（菜单会被关掉）。
    pub async fn rotate(
        &self,
        ui: &UiExecutor,
        exhausted: &HashSet<String>,
    ) -> AppResult<Option<String>> {
        info!("🔄 打开账号菜单，已耗尽账号: {:?}", exhausted);
        ui.click_first(selectors::ACCOUNT_BUTTON, "账号按钮").await?;
        sleep(MENU_SETTLE).await;

        let candidates = self.list_accounts(ui).await?;
        info!("菜单内账号候选: {:?}", candidates);

        let next = candidates
            .iter()
            .find(|label| !exhausted.contains(*label))
            .cloned();

        let Some(label) = next else {
            warn!("⚠️ 所有账号均已耗尽，关闭菜单");
            ui.press_escape().await?;
            return Ok(None);
        };

        if !self.click_account(ui, &label).await? {
            warn!("⚠️ 未能点中账号 {}，关闭菜单", label);
            ui.press_escape().await?;
            return Ok(None);
        }

        // 等账号切换后的页面重载
        sleep(SWITCH_SETTLE).await;
        info!("✅ 已切换到账号: {}", label);
        Ok(Some(label))
    }

    /// 枚举账号菜单里的邮箱标识（按菜单顺序去重）
    async fn list_accounts(&self, ui: &UiExecutor) -> AppResult<Vec<String>> {
        let raw: Vec<String> = ui
            .eval_as(
                r#"
                (() => {
                    const texts = [];
                    for (const el of document.querySelectorAll('[data-email]')) {
                        texts.push(el.getAttribute('data-email') || '');
                    }
                    for (const el of document.querySelectorAll('a[aria-label], [role="menuitem"]')) {
                        texts.push(el.getAttribute('aria-label') || el.innerText || '');
                    }
                    return texts;
                })()
                "#,
            )
            .await?;

        let mut seen = HashSet::new();
        let mut accounts = Vec::new();
        for text in &raw {
            if let Some(m) = EMAIL_RE.find(text) {
                let email = m.as_str().to_string();
                if seen.insert(email.clone()) {
                    accounts.push(email);
                }
            }
        }
        Ok(accounts)
    }

    /// 点击菜单里标识匹配的账号条目
    async fn click_account(&self, ui: &UiExecutor, label: &str) -> AppResult<bool> {
        let js_code = format!(
            r#"
            ((email) => {{
                const nodes = document.querySelectorAll(
                    '[data-email], a[aria-label], [role="menuitem"]');
                for (const el of nodes) {{
                    const text = (el.getAttribute('data-email') || '')
                        + ' ' + (el.getAttribute('aria-label') || '')
                        + ' ' + (el.innerText || '');
                    if (text.includes(email)) {{
                        el.click();
                        return true;
                    }}
                }}
                return false;
            }})({})
            "#,
            serde_json::to_string(label)?,
        );
        ui.eval_as(js_code).await
    }
}

impl Default for IdentitySwitcher {
    fn default() -> Self {
        Self::new()
    }
}
