//! 恢复控制器 - 工作流层
//!
//! 把一轮的结果映射成下一步动作的纯函数状态机。三类故障各有
//! 自动恢复路径，自动手段用尽才升级给操作员：
//! - 内容拦截：发续写提示词重试，超过重试上限后升级；
//! - 配额耗尽：标记当前账号并轮换；
//! - 超时未完成：延长等待，连续超过上限后升级。
//!
//! 操作员接口抽象成 trait，生产用 stdin 问答，测试用脚本化应答。

use std::io::{self, BufRead, Write};

use tracing::{info, warn};

use crate::models::{Session, TurnOutcome};

/// 恢复策略参数
#[derive(Debug, Clone)]
pub struct RecoveryPolicy {
    pub max_rejection_retries: usize,
    pub max_timeout_extensions: usize,
}

/// 升级给操作员的原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryReason {
    /// 内容拦截重试次数用尽
    RejectionBudgetExhausted,
    /// 所有账号都已配额耗尽
    NoUsableIdentity,
    /// 浏览器未登录 Google 账号
    LoginRequired,
    /// 响应长时间未完成
    TurnStillRunning,
    /// 步骤执行出错（元素找不到、脚本失败等）
    StepFailed(String),
    /// 批次处理完毕（询问是否再跑一轮）
    BatchComplete,
}

impl std::fmt::Display for RecoveryReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecoveryReason::RejectionBudgetExhausted => {
                write!(f, "内容拦截自动重试已用尽")
            }
            RecoveryReason::NoUsableIdentity => write!(f, "没有可用的账号"),
            RecoveryReason::LoginRequired => {
                write!(f, "浏览器未登录，请在浏览器中完成登录")
            }
            RecoveryReason::TurnStillRunning => write!(f, "响应长时间未完成"),
            RecoveryReason::StepFailed(msg) => write!(f, "步骤执行失败: {}", msg),
            RecoveryReason::BatchComplete => write!(f, "批次处理完毕"),
        }
    }
}

/// 状态机给出的下一步动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    /// 本步完成，前进到下一步
    Advance,
    /// 发送续写提示词重做本步
    SubmitContinuation,
    /// 轮换账号后从步骤 1 重来
    RotateIdentity,
    /// 继续等待当前响应
    KeepWaiting,
    /// 自动手段用尽，交给操作员
    AskOperator(RecoveryReason),
}

/// 一轮结果 -> 下一步动作
///
/// 除了升级判断外还更新会话的重试/延长计数。
pub fn on_turn_outcome(
    session: &mut Session,
    outcome: &TurnOutcome,
    policy: &RecoveryPolicy,
) -> RecoveryAction {
    match outcome {
        TurnOutcome::Completed(_) => RecoveryAction::Advance,
        TurnOutcome::ContentRejected => {
            session.rejection_retries += 1;
            if session.rejection_retries > policy.max_rejection_retries {
                warn!(
                    "❌ 步骤 {} 内容拦截重试 {} 次仍失败",
                    session.step_index, policy.max_rejection_retries
                );
                RecoveryAction::AskOperator(RecoveryReason::RejectionBudgetExhausted)
            } else {
                info!(
                    "🔁 内容拦截，自动续写重试 ({}/{})",
                    session.rejection_retries, policy.max_rejection_retries
                );
                RecoveryAction::SubmitContinuation
            }
        }
        TurnOutcome::QuotaExhausted => {
            session.mark_identity_exhausted();
            RecoveryAction::RotateIdentity
        }
        TurnOutcome::TimedOutStillRunning => {
            session.timeout_extensions += 1;
            if session.timeout_extensions >= policy.max_timeout_extensions {
                warn!(
                    "⏰ 步骤 {} 连续 {} 次超时仍在运行",
                    session.step_index, session.timeout_extensions
                );
                RecoveryAction::AskOperator(RecoveryReason::TurnStillRunning)
            } else {
                info!(
                    "⏳ 响应超时但仍在运行，延长等待 ({}/{})",
                    session.timeout_extensions, policy.max_timeout_extensions
                );
                RecoveryAction::KeepWaiting
            }
        }
    }
}

/// 操作员的裁决
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// 重试当前步骤
    Retry,
    /// 从指定步骤恢复
    Resume(usize),
    /// 跳过当前视频
    Skip,
    /// 退出整个批次
    Quit,
    /// 操作员已手动处理（换号等），从步骤 1 重来
    Manual,
    /// 继续等待当前响应
    Continue,
}

/// 解析操作员输入
///
/// 空输入表示"继续等待"；数字表示从该步骤恢复；其余按关键词。
pub fn parse_decision(input: &str) -> Decision {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Decision::Continue;
    }
    if let Ok(step) = trimmed.parse::<usize>() {
        return Decision::Resume(step);
    }
    match trimmed.to_lowercase().as_str() {
        "r" | "retry" | "重试" => Decision::Retry,
        "s" | "skip" | "跳过" => Decision::Skip,
        "q" | "quit" | "退出" => Decision::Quit,
        "m" | "manual" | "手动" => Decision::Manual,
        _ => Decision::Retry,
    }
}

/// 升级给操作员时的上下文
#[derive(Debug, Clone)]
pub struct RecoveryPrompt {
    pub video: String,
    pub step_index: usize,
    pub reason: RecoveryReason,
}

/// 操作员接口
///
/// 工作流在这里挂起，拿到裁决后继续。
pub trait OperatorConsole {
    fn decide(&mut self, prompt: &RecoveryPrompt) -> Decision;
}

/// 标准输入问答实现
pub struct StdinConsole;

impl OperatorConsole for StdinConsole {
    fn decide(&mut self, prompt: &RecoveryPrompt) -> Decision {
        println!();
        println!("========================================");
        println!("⚠️  需要人工介入");
        println!("  视频: {}", prompt.video);
        println!("  步骤: {}", prompt.step_index);
        println!("  原因: {}", prompt.reason);
        println!("----------------------------------------");
        println!("  [r]重试  [s]跳过  [q]退出  [m]已手动处理");
        println!("  数字=从该步骤恢复  回车=继续等待");
        print!("> ");
        let _ = io::stdout().flush();

        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(_) => parse_decision(&line),
            Err(_) => Decision::Quit,
        }
    }
}
