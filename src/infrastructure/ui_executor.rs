//! UI 执行器 - 基础设施层
//!
//! 持有唯一的 page 资源，只暴露页面能力（定位、点击、填入、读取、
//! 快照、剪贴板），不认识 Session / 步骤 / 提示词，不处理业务流程。
//!
//! 定位一律走"候选选择器列表按顺序探测"，命中即用，全部落空才算
//! 元素未找到。重型 DOM 探测用 JS 片段返回 JSON 完成。

use chromiumoxide::cdp::browser_protocol::dom::SetFileInputFilesParams;
use chromiumoxide::{Element, Page};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::models::RenderedContent;

/// Run/Stop 按钮状态探测结果
///
/// busy 与否由分类器判定，这里只负责采集。
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunButtonProbe {
    pub found: bool,
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub class_name: String,
    #[serde(default)]
    pub aria_disabled: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseProbe {
    found: bool,
    #[serde(default)]
    text: String,
    #[serde(default)]
    html: String,
}

/// UI 执行器
pub struct UiExecutor {
    page: Page,
}

impl UiExecutor {
    /// 创建新的 UI 执行器
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// 获取 page 的引用（用于其他操作）
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// 执行 JS 代码并返回 JSON 结果
    pub async fn eval(&self, js_code: impl Into<String>) -> AppResult<JsonValue> {
        let result = self.page.evaluate(js_code.into()).await?;
        let json_value = result.into_value()?;
        Ok(json_value)
    }

    /// 执行 JS 代码并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(&self, js_code: impl Into<String>) -> AppResult<T> {
        let result = self.page.evaluate(js_code.into()).await?;
        let typed_value = result.into_value()?;
        Ok(typed_value)
    }

    /// 导航到指定地址
    pub async fn goto(&self, url: &str) -> AppResult<()> {
        self.page.goto(url).await.map_err(|e| {
            AppError::Browser(crate::error::BrowserError::NavigationFailed {
                url: url.to_string(),
                source: Box::new(e),
            })
        })?;
        Ok(())
    }

    /// 当前页面地址
    pub async fn current_url(&self) -> AppResult<Option<String>> {
        Ok(self.page.url().await?)
    }

    /// 按候选选择器逐个探测，返回第一个命中的元素
    pub async fn find_first(&self, candidates: &[&str], what: &str) -> AppResult<Element> {
        for selector in candidates {
            if let Ok(element) = self.page.find_element(*selector).await {
                debug!("选择器命中: {} ({})", selector, what);
                return Ok(element);
            }
        }
        Err(AppError::element_not_found(what))
    }

    /// 点击第一个命中的元素
    pub async fn click_first(&self, candidates: &[&str], what: &str) -> AppResult<()> {
        let element = self.find_first(candidates, what).await?;
        element.click().await?;
        Ok(())
    }

    /// 清空并填入文本
    ///
    /// 通过原生 value setter + input 事件写入，绕过框架对 value
    /// 属性的劫持（直接赋值不会触发 Angular 的变更检测）。
    pub async fn fill_first(&self, candidates: &[&str], text: &str, what: &str) -> AppResult<()> {
        let js_code = format!(
            r#"
            ((sels, text) => {{
                for (const sel of sels) {{
                    const el = document.querySelector(sel);
                    if (!el) continue;
                    el.focus();
                    if (el.tagName === 'TEXTAREA' || el.tagName === 'INPUT') {{
                        const proto = el.tagName === 'TEXTAREA'
                            ? window.HTMLTextAreaElement.prototype
                            : window.HTMLInputElement.prototype;
                        const setter = Object.getOwnPropertyDescriptor(proto, 'value').set;
                        setter.call(el, text);
                    }} else {{
                        el.innerText = text;
                    }}
                    el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                    return true;
                }}
                return false;
            }})({}, {})
            "#,
            serde_json::to_string(candidates)?,
            serde_json::to_string(text)?,
        );

        let filled: bool = self.eval_as(js_code).await?;
        if filled {
            Ok(())
        } else {
            Err(AppError::element_not_found(what))
        }
    }

    /// 读取第一个命中元素的属性
    pub async fn attribute_first(
        &self,
        candidates: &[&str],
        attr: &str,
        what: &str,
    ) -> AppResult<Option<String>> {
        let element = self.find_first(candidates, what).await?;
        Ok(element.attribute(attr).await?)
    }

    /// 采集 Run/Stop 按钮状态快照
    pub async fn run_button_probe(&self, candidates: &[&str]) -> AppResult<RunButtonProbe> {
        let js_code = format!(
            r#"
            ((sels) => {{
                for (const sel of sels) {{
                    const b = document.querySelector(sel);
                    if (b) {{
                        return {{
                            found: true,
                            html: b.innerHTML || '',
                            className: b.className || '',
                            ariaDisabled: b.getAttribute('aria-disabled'),
                        }};
                    }}
                }}
                return {{ found: false, html: '', className: '', ariaDisabled: null }};
            }})({})
            "#,
            serde_json::to_string(candidates)?,
        );
        self.eval_as(js_code).await
    }

    /// 页面可见文本（用于提示语匹配）
    pub async fn page_text(&self) -> AppResult<String> {
        self.eval_as("document.body ? document.body.innerText : ''")
            .await
    }

    /// 最后一条模型响应的渲染内容
    pub async fn last_model_response(
        &self,
        candidates: &[&str],
    ) -> AppResult<Option<RenderedContent>> {
        let js_code = format!(
            r#"
            ((sels) => {{
                for (const sel of sels) {{
                    const nodes = document.querySelectorAll(sel);
                    if (nodes.length > 0) {{
                        const last = nodes[nodes.length - 1];
                        return {{
                            found: true,
                            text: last.innerText || '',
                            html: last.innerHTML || '',
                        }};
                    }}
                }}
                return {{ found: false, text: '', html: '' }};
            }})({})
            "#,
            serde_json::to_string(candidates)?,
        );

        let probe: ResponseProbe = self.eval_as(js_code).await?;
        if probe.found {
            Ok(Some(RenderedContent {
                text: probe.text,
                html: probe.html,
            }))
        } else {
            Ok(None)
        }
    }

    /// 最后一条模型响应内的复制按钮数量
    ///
    /// 只数最后一轮，避免把之前轮次代码块的复制按钮也算进来。
    pub async fn copy_button_count(&self, turn_candidates: &[&str]) -> AppResult<usize> {
        let js_code = format!(
            r#"
            ((sels) => {{
                for (const sel of sels) {{
                    const nodes = document.querySelectorAll(sel);
                    if (nodes.length > 0) {{
                        const last = nodes[nodes.length - 1];
                        return last.querySelectorAll('button[aria-label*="opy"]').length;
                    }}
                }}
                return 0;
            }})({})
            "#,
            serde_json::to_string(turn_candidates)?,
        );
        self.eval_as(js_code).await
    }

    /// 点击最后一条模型响应内的第 n 个复制按钮
    pub async fn click_copy_button(&self, turn_candidates: &[&str], nth: usize) -> AppResult<bool> {
        let js_code = format!(
            r#"
            ((sels, nth) => {{
                for (const sel of sels) {{
                    const nodes = document.querySelectorAll(sel);
                    if (nodes.length > 0) {{
                        const last = nodes[nodes.length - 1];
                        const buttons = last.querySelectorAll('button[aria-label*="opy"]');
                        if (nth < buttons.length) {{
                            buttons[nth].click();
                            return true;
                        }}
                        return false;
                    }}
                }}
                return false;
            }})({}, {})
            "#,
            serde_json::to_string(turn_candidates)?,
            nth,
        );
        self.eval_as(js_code).await
    }

    /// 读取剪贴板文本
    ///
    /// 页面需要持有剪贴板权限，拿不到权限时报
    /// `ClipboardUnavailable`，由上层走兜底链。
    pub async fn read_clipboard(&self) -> AppResult<String> {
        let clip: Option<String> = self
            .eval_as(
                r#"
                (async () => {
                    try {
                        return await navigator.clipboard.readText();
                    } catch (e) {
                        return null;
                    }
                })()
                "#,
            )
            .await?;
        clip.ok_or(AppError::Ui(crate::error::UiError::ClipboardUnavailable))
    }

    /// 设置文件输入框的文件（上传入口）
    pub async fn set_file_input(
        &self,
        candidates: &[&str],
        file_path: &str,
        what: &str,
    ) -> AppResult<()> {
        let element = self.find_first(candidates, what).await?;
        let params = SetFileInputFilesParams::builder()
            .file(file_path.to_string())
            .backend_node_id(element.backend_node_id)
            .build()
            .map_err(|e| AppError::Other(format!("构造文件上传参数失败: {}", e)))?;
        self.page.execute(params).await?;
        Ok(())
    }

    /// 向页面派发 Escape（关闭浮窗菜单）
    pub async fn press_escape(&self) -> AppResult<()> {
        self.eval(
            r#"
            (() => {
                const e = new KeyboardEvent('keydown', {
                    key: 'Escape', code: 'Escape', keyCode: 27, bubbles: true,
                });
                document.body.dispatchEvent(e);
                return true;
            })()
            "#,
        )
        .await?;
        Ok(())
    }

    /// 向输入框派发 Ctrl+Enter（快捷键提交兜底）
    pub async fn dispatch_ctrl_enter(&self, candidates: &[&str]) -> AppResult<bool> {
        let js_code = format!(
            r#"
            ((sels) => {{
                for (const sel of sels) {{
                    const el = document.querySelector(sel);
                    if (!el) continue;
                    el.focus();
                    const e = new KeyboardEvent('keydown', {{
                        key: 'Enter', code: 'Enter', keyCode: 13,
                        ctrlKey: true, bubbles: true,
                    }});
                    el.dispatchEvent(e);
                    return true;
                }}
                return false;
            }})({})
            "#,
            serde_json::to_string(candidates)?,
        );
        self.eval_as(js_code).await
    }

    /// 等待页面地址包含指定片段
    pub async fn wait_for_url_contains(&self, pattern: &str, timeout: Duration) -> AppResult<bool> {
        let start = Instant::now();
        while start.elapsed() < timeout {
            if let Some(url) = self.current_url().await? {
                if url.contains(pattern) {
                    return Ok(true);
                }
            }
            sleep(Duration::from_millis(500)).await;
        }
        Ok(false)
    }
}
