//! 单视频会话流程 - 工作流层
//!
//! 一个视频 = 开新对话、上传视频、顺序跑完全部步骤。每轮结果交给
//! 恢复控制器裁决下一步动作；任何升级都在这里挂起等操作员裁决，
//! 拿到裁决后从对应位置继续，整个会话状态不丢。

use std::path::Path;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::config::{selectors, Config};
use crate::error::{AppError, AppResult};
use crate::infrastructure::UiExecutor;
use crate::models::{Session, SessionEnd, StepRole, TurnOutcome, VideoEntry};
use crate::services::{ArtifactWriter, IdentitySwitcher, ResponseExtractor};
use crate::workflow::recovery::{
    on_turn_outcome, Decision, OperatorConsole, RecoveryAction, RecoveryPolicy, RecoveryPrompt,
    RecoveryReason,
};
use crate::workflow::turn_driver::TurnDriver;

pub struct VideoFlow<'a> {
    ui: &'a UiExecutor,
    config: &'a Config,
    extractor: &'a ResponseExtractor,
    writer: &'a ArtifactWriter,
    switcher: &'a IdentitySwitcher,
    console: &'a mut dyn OperatorConsole,
}

impl<'a> VideoFlow<'a> {
    pub fn new(
        ui: &'a UiExecutor,
        config: &'a Config,
        extractor: &'a ResponseExtractor,
        writer: &'a ArtifactWriter,
        switcher: &'a IdentitySwitcher,
        console: &'a mut dyn OperatorConsole,
    ) -> Self {
        Self {
            ui,
            config,
            extractor,
            writer,
            switcher,
            console,
        }
    }

    /// 跑完一个视频的全部步骤
    pub async fn run(&mut self, video: VideoEntry, prompts: Vec<String>) -> AppResult<SessionEnd> {
        info!(
            "🎬 开始处理视频: {} (时长 {}, 共 {} 步)",
            video.filename,
            video.duration,
            prompts.len()
        );

        let mut session = Session::new(video, prompts);
        let driver = TurnDriver::new(self.ui, self.config);
        let policy = RecoveryPolicy {
            max_rejection_retries: self.config.max_rejection_retries,
            max_timeout_extensions: self.config.max_timeout_extensions,
        };

        // 续写重试时覆盖本轮提示词
        let mut pending_prompt: Option<String> = None;
        // 超时延长时只等待、不重新提交
        let mut wait_only = false;

        loop {
            if session.is_finished() {
                info!("🎉 视频 {} 全部步骤完成", session.video.filename);
                return Ok(SessionEnd::Success);
            }

            if session.needs_upload {
                if let Err(e) = self.prepare_conversation(&mut session).await {
                    error!("❌ 准备对话失败: {}", e);
                    let reason = RecoveryReason::StepFailed(e.to_string());
                    if let Some(end) = self.escalate(&mut session, reason, &mut wait_only) {
                        return Ok(end);
                    }
                    continue;
                }
            }

            let outcome = if wait_only {
                wait_only = false;
                driver.await_completion(&mut session).await
            } else {
                let prompt = match pending_prompt.take() {
                    Some(p) => p,
                    None => match session.current_prompt() {
                        Some(p) => p.to_string(),
                        None => {
                            return Err(AppError::Config(
                                crate::error::ConfigError::StepOutOfRange {
                                    step: session.step_index,
                                    total: session.total_steps(),
                                },
                            ))
                        }
                    },
                };
                driver.run_turn(&mut session, &prompt).await
            };

            let outcome = match outcome {
                Ok(o) => o,
                Err(e) => {
                    error!("❌ 步骤 {} 执行出错: {}", session.step_index, e);
                    let reason = RecoveryReason::StepFailed(e.to_string());
                    if let Some(end) = self.escalate(&mut session, reason, &mut wait_only) {
                        return Ok(end);
                    }
                    continue;
                }
            };

            match on_turn_outcome(&mut session, &outcome, &policy) {
                RecoveryAction::Advance => {
                    if let TurnOutcome::Completed(content) = &outcome {
                        self.harvest(&mut session, content).await?;
                    }
                    session.advance();
                }
                RecoveryAction::SubmitContinuation => {
                    pending_prompt = Some(self.config.continuation_prompt.clone());
                }
                RecoveryAction::RotateIdentity => {
                    match self
                        .switcher
                        .rotate(self.ui, &session.exhausted_identities)
                        .await
                    {
                        Ok(Some(label)) => {
                            info!("🔄 已轮换账号，视频 {} 从步骤 1 重来", session.video.filename);
                            session.reset_for_rotation(label);
                        }
                        Ok(None) => {
                            if let Some(end) = self.escalate(
                                &mut session,
                                RecoveryReason::NoUsableIdentity,
                                &mut wait_only,
                            ) {
                                return Ok(end);
                            }
                        }
                        Err(e) => {
                            error!("❌ 账号轮换失败: {}", e);
                            let reason = RecoveryReason::StepFailed(e.to_string());
                            if let Some(end) = self.escalate(&mut session, reason, &mut wait_only)
                            {
                                return Ok(end);
                            }
                        }
                    }
                }
                RecoveryAction::KeepWaiting => {
                    wait_only = true;
                }
                RecoveryAction::AskOperator(reason) => {
                    if let Some(end) = self.escalate(&mut session, reason, &mut wait_only) {
                        return Ok(end);
                    }
                }
            }
        }
    }

    /// 开新对话并上传视频
    async fn prepare_conversation(&self, session: &mut Session) -> AppResult<()> {
        let video_path = Path::new(&self.config.videos_folder).join(&session.video.filename);
        if !video_path.exists() {
            return Err(AppError::File(crate::error::FileError::NotFound {
                path: video_path.display().to_string(),
            }));
        }

        info!("🌐 打开新对话: {}", self.config.ai_studio_url);
        self.ui.goto(&self.config.ai_studio_url).await?;
        sleep(Duration::from_secs(3)).await;

        // 惰性发现当前账号（读不到就保持未知）
        if session.identity.is_none() {
            if let Ok(Some(identity)) = self.switcher.current_identity(self.ui).await {
                info!("👤 当前账号: {}", identity);
                session.identity = Some(identity);
            }
        }

        info!("📤 上传视频: {}", video_path.display());
        self.ui
            .click_first(selectors::ADD_BUTTON, "添加附件按钮")
            .await?;
        sleep(Duration::from_secs(1)).await;
        self.ui
            .click_first(selectors::UPLOAD_FILE_BUTTON, "Upload File 菜单项")
            .await?;
        sleep(Duration::from_secs(1)).await;
        self.ui
            .set_file_input(
                selectors::FILE_INPUT,
                &video_path.display().to_string(),
                "文件输入框",
            )
            .await?;
        // 关掉可能残留的菜单
        self.ui.press_escape().await?;

        info!("⏳ 等待视频上传处理 ({} 秒)", self.config.wait_after_upload);
        sleep(Duration::from_secs(self.config.wait_after_upload)).await;

        session.needs_upload = false;
        Ok(())
    }

    /// 指定步骤的响应提取并落盘
    async fn harvest(
        &self,
        session: &mut Session,
        content: &crate::models::RenderedContent,
    ) -> AppResult<()> {
        let role = self.config.step_role(session.step_index);
        if role == StepRole::PassThrough {
            return Ok(());
        }

        let payload = self.extractor.extract(self.ui, role, content).await;
        info!("📦 步骤 {} 提取结果: {}", session.step_index, payload);

        self.writer
            .persist(&session.video.stem(), session.step_index, &payload)?;
        session.payloads.insert(session.step_index, payload);
        Ok(())
    }

    /// 升级给操作员并应用裁决
    ///
    /// 返回 Some 表示会话就此终止。
    fn escalate(
        &mut self,
        session: &mut Session,
        reason: RecoveryReason,
        wait_only: &mut bool,
    ) -> Option<SessionEnd> {
        let prompt = RecoveryPrompt {
            video: session.video.filename.clone(),
            step_index: session.step_index,
            reason,
        };
        let decision = self.console.decide(&prompt);
        info!("🧑‍⚖️ 操作员裁决: {:?}", decision);
        apply_decision(session, decision, &prompt.reason, wait_only)
    }
}

/// 把操作员裁决落到会话状态上（纯函数，便于测试）
fn apply_decision(
    session: &mut Session,
    decision: Decision,
    reason: &RecoveryReason,
    wait_only: &mut bool,
) -> Option<SessionEnd> {
    match decision {
        Decision::Retry => {
            session.rejection_retries = 0;
            session.timeout_extensions = 0;
            None
        }
        Decision::Resume(step) => {
            session.resume_at(step);
            None
        }
        Decision::Skip => {
            warn!("⏭️ 操作员选择跳过视频 {}", session.video.filename);
            Some(SessionEnd::Skipped)
        }
        Decision::Quit => Some(SessionEnd::Quit),
        Decision::Manual => {
            // 操作员已在浏览器里手动处理（比如换了账号），
            // 对话上下文不可信，从头重来
            session.identity = None;
            session.step_index = 1;
            session.payloads.clear();
            session.needs_upload = true;
            session.rejection_retries = 0;
            session.timeout_extensions = 0;
            session.last_rejection_at = None;
            None
        }
        Decision::Continue => {
            session.rejection_retries = 0;
            session.timeout_extensions = 0;
            // 只有"响应仍在生成"才有东西可等；其他升级场景下空等
            // 会把上一步的旧响应当成本步结果，按重试处理
            if matches!(reason, RecoveryReason::TurnStillRunning) {
                *wait_only = true;
            }
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_session() -> Session {
        let video = VideoEntry {
            filename: "v1.mp4".to_string(),
            duration: "10:00".to_string(),
            title: None,
        };
        Session::new(video, (1..=25).map(|i| format!("步骤{}", i)).collect())
    }

    #[test]
    fn test_retry_clears_counters_and_stays_on_step() {
        let mut session = test_session();
        session.step_index = 5;
        session.rejection_retries = 4;
        let mut wait_only = false;

        let end = apply_decision(
            &mut session,
            Decision::Retry,
            &RecoveryReason::RejectionBudgetExhausted,
            &mut wait_only,
        );
        assert_eq!(end, None);
        assert_eq!(session.step_index, 5);
        assert_eq!(session.rejection_retries, 0);
        assert!(!wait_only);
    }

    #[test]
    fn test_resume_jumps_to_requested_step() {
        let mut session = test_session();
        session.step_index = 20;
        let mut wait_only = false;

        apply_decision(
            &mut session,
            Decision::Resume(14),
            &RecoveryReason::TurnStillRunning,
            &mut wait_only,
        );
        assert_eq!(session.step_index, 14);
    }

    #[test]
    fn test_skip_and_quit_end_session() {
        let mut session = test_session();
        let mut wait_only = false;
        let reason = RecoveryReason::StepFailed("测试".to_string());
        assert_eq!(
            apply_decision(&mut session, Decision::Skip, &reason, &mut wait_only),
            Some(SessionEnd::Skipped)
        );
        assert_eq!(
            apply_decision(&mut session, Decision::Quit, &reason, &mut wait_only),
            Some(SessionEnd::Quit)
        );
    }

    #[test]
    fn test_manual_restarts_with_unknown_identity() {
        let mut session = test_session();
        session.step_index = 9;
        session.identity = Some("a@gmail.com".to_string());
        session.needs_upload = false;
        let mut wait_only = false;

        apply_decision(
            &mut session,
            Decision::Manual,
            &RecoveryReason::NoUsableIdentity,
            &mut wait_only,
        );
        assert_eq!(session.step_index, 1);
        assert_eq!(session.identity, None);
        assert!(session.needs_upload);
        assert!(session.payloads.is_empty());
    }

    #[test]
    fn test_continue_switches_to_wait_only_while_still_running() {
        let mut session = test_session();
        session.timeout_extensions = 3;
        let mut wait_only = false;

        let end = apply_decision(
            &mut session,
            Decision::Continue,
            &RecoveryReason::TurnStillRunning,
            &mut wait_only,
        );
        assert_eq!(end, None);
        assert!(wait_only);
        assert_eq!(session.timeout_extensions, 0);
    }

    #[test]
    fn test_continue_on_step_failure_retries_instead_of_waiting() {
        // 提交前就失败的步骤没有可等的响应，空等会把上一步的
        // 旧响应错收成本步结果
        let mut session = test_session();
        session.step_index = 7;
        session.rejection_retries = 2;
        let mut wait_only = false;

        let end = apply_decision(
            &mut session,
            Decision::Continue,
            &RecoveryReason::StepFailed("找不到页面元素".to_string()),
            &mut wait_only,
        );
        assert_eq!(end, None);
        assert!(!wait_only);
        assert_eq!(session.step_index, 7);
        assert_eq!(session.rejection_retries, 0);
    }
}
