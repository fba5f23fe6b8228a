//! 轮次驱动 - 工作流层
//!
//! 驱动一轮提示词/响应往返：填入提示词、等按钮可用、提交、
//! 轮询到完成。完成与否只看 Run/Stop 按钮状态，轮询过程中
//! 同时监听配额与内容拦截横幅，三类故障在这里被识别并分类。

use std::time::{Duration, Instant};

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::{selectors, Config};
use crate::error::{AppError, AppResult};
use crate::infrastructure::UiExecutor;
use crate::models::{Session, StepRole, TurnOutcome};
use crate::services::classifier;

pub struct TurnDriver<'a> {
    ui: &'a UiExecutor,
    config: &'a Config,
}

impl<'a> TurnDriver<'a> {
    pub fn new(ui: &'a UiExecutor, config: &'a Config) -> Self {
        Self { ui, config }
    }

    /// 执行一轮：填入提示词、提交、等到结果
    pub async fn run_turn(&self, session: &mut Session, prompt: &str) -> AppResult<TurnOutcome> {
        info!(
            "📝 [{}] 步骤 {}/{} 提交提示词 ({} 字符)",
            session.video.filename,
            session.step_index,
            session.total_steps(),
            prompt.chars().count()
        );

        self.ui
            .fill_first(selectors::INPUT_BOX, prompt, "提示词输入框")
            .await?;

        let enabled = self.wait_button_enabled().await?;
        if !enabled {
            warn!(
                "⚠️ Run 按钮 {} 秒内未变为可用（步骤 {}）",
                self.config.wait_button_enabled, session.step_index
            );
            // 步骤 1 按钮不可用通常是视频还在服务端处理，按超时分类
            if session.step_index == 1 {
                return Ok(TurnOutcome::TimedOutStillRunning);
            }
            if !self.ui.dispatch_ctrl_enter(selectors::INPUT_BOX).await? {
                return Err(AppError::element_not_found("可用的 Run 按钮"));
            }
        } else {
            self.click_run().await?;
        }

        sleep(Duration::from_secs(self.config.wait_after_send)).await;
        self.await_completion(session).await
    }

    /// 点击 Run 按钮，失败时退回 Ctrl+Enter 快捷键
    async fn click_run(&self) -> AppResult<()> {
        match self
            .ui
            .click_first(selectors::RUN_BUTTON, "Run 按钮")
            .await
        {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!("⚠️ 点击 Run 按钮失败 ({})，尝试快捷键提交", e);
                if self.ui.dispatch_ctrl_enter(selectors::INPUT_BOX).await? {
                    Ok(())
                } else {
                    Err(e)
                }
            }
        }
    }

    async fn wait_button_enabled(&self) -> AppResult<bool> {
        let deadline = Duration::from_secs(self.config.wait_button_enabled);
        let start = Instant::now();
        while start.elapsed() < deadline {
            let probe = self.ui.run_button_probe(selectors::RUN_BUTTON).await?;
            if classifier::is_enabled(&probe) {
                return Ok(true);
            }
            sleep(Duration::from_millis(500)).await;
        }
        Ok(false)
    }

    /// 轮询到本轮响应完成（或分类出一种故障）
    ///
    /// 超时上限内未完成且仍在运行时返回 `TimedOutStillRunning`，
    /// 恢复控制器可以再次调用本函数继续等待。
    pub async fn await_completion(&self, session: &mut Session) -> AppResult<TurnOutcome> {
        let timeout = Duration::from_secs(self.config.response_timeout);
        let cooldown = Duration::from_secs(self.config.content_blocked_cooldown);
        let start = Instant::now();
        let mut last_progress = Instant::now();

        loop {
            let probe = self.ui.run_button_probe(selectors::RUN_BUTTON).await?;
            let page_text = self.ui.page_text().await.unwrap_or_default();

            if let Some(phrase) = classifier::matched_phrase(&page_text, &self.config.quota_phrases)
            {
                warn!("🚫 命中配额提示语: {:?}", phrase);
                return Ok(TurnOutcome::QuotaExhausted);
            }

            if let Some(phrase) =
                classifier::matched_phrase(&page_text, &self.config.rejection_phrases)
            {
                // 冷却窗口内的同一横幅不重复触发
                if !session.rejection_in_cooldown(cooldown) {
                    warn!("🚫 命中内容拦截提示语: {:?}", phrase);
                    session.note_rejection();
                    return Ok(TurnOutcome::ContentRejected);
                }
                debug!("内容拦截横幅仍在冷却窗口内，忽略");
            }

            if !classifier::is_busy(&probe) {
                return self.capture_completed(session).await;
            }

            if start.elapsed() >= timeout {
                warn!(
                    "⏰ 步骤 {} 等待 {} 秒后仍在运行",
                    session.step_index, self.config.response_timeout
                );
                return Ok(TurnOutcome::TimedOutStillRunning);
            }

            if last_progress.elapsed() >= Duration::from_secs(30) {
                info!(
                    "⏳ 步骤 {} 生成中... 已等待 {} 秒",
                    session.step_index,
                    start.elapsed().as_secs()
                );
                last_progress = Instant::now();
            }

            sleep(Duration::from_secs(self.config.poll_interval)).await;
        }
    }

    /// 按钮空闲后等内容稳定，抓取最后一条响应
    async fn capture_completed(&self, session: &Session) -> AppResult<TurnOutcome> {
        let settle = match self.config.step_role(session.step_index) {
            // 表格渲染明显慢于普通文本
            StepRole::Table => self.config.settle_delay_table,
            _ => self.config.settle_delay,
        };
        sleep(Duration::from_secs(settle)).await;

        if let Some(content) = self.ui.last_model_response(selectors::MODEL_RESPONSE).await? {
            info!(
                "✅ 步骤 {} 完成，响应 {} 字符: {}",
                session.step_index,
                content.text.chars().count(),
                crate::utils::truncate_text(&content.text, 60)
            );
            return Ok(TurnOutcome::Completed(content));
        }

        // 偶发：按钮已空闲但响应节点还没挂上，再给一次机会
        sleep(Duration::from_secs(2)).await;
        match self.ui.last_model_response(selectors::MODEL_RESPONSE).await? {
            Some(content) => Ok(TurnOutcome::Completed(content)),
            None => Err(AppError::element_not_found("模型响应节点")),
        }
    }
}
