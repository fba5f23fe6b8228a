//! 会话状态
//!
//! 一个视频的完整处理过程对应一个 `Session`。所有可变状态（当前步骤、
//! 已提取产物、已耗尽的账号、冷却时间戳）都是它的显式字段，
//! 恢复控制器的状态转移因此可以离线测试。

use std::collections::{BTreeMap, HashSet};
use std::time::{Duration, Instant};

use crate::models::payload::ExtractedPayload;
use crate::models::video::VideoEntry;

/// 一轮提示词/响应往返的结果
///
/// 每轮恰好产生一个变体，"正在运行"和"已失败"互斥。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// 响应完成，携带渲染后的内容
    Completed(RenderedContent),
    /// 内容被拦截（瞬态，可通过续写提示词自动恢复）
    ContentRejected,
    /// 配额耗尽（需要切换账号）
    QuotaExhausted,
    /// 超时但 AI 仍在运行（继续等待或交给操作员）
    TimedOutStillRunning,
}

/// 完成轮次的渲染内容快照
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedContent {
    /// innerText（用于纯文本解析）
    pub text: String,
    /// innerHTML（用于表格/代码块重建）
    pub html: String,
}

/// 会话终止方式，供批处理编排器统计
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// 全部步骤完成
    Success,
    /// 操作员选择跳过该视频
    Skipped,
    /// 操作员要求退出整个批次
    Quit,
}

/// 一个视频的会话状态
#[derive(Debug)]
pub struct Session {
    /// 正在处理的视频
    pub video: VideoEntry,
    /// 渲染后的提示词序列（步骤 1..N）
    pub prompts: Vec<String>,
    /// 下一个要执行的步骤（从 1 开始）
    pub step_index: usize,
    /// 已提取的产物，按步骤索引键控
    pub payloads: BTreeMap<usize, ExtractedPayload>,
    /// 当前使用的账号（惰性发现，可能未知）
    pub identity: Option<String>,
    /// 本次运行中已配额耗尽的账号，不会再被选中
    pub exhausted_identities: HashSet<String>,
    /// 是否需要（重新）上传视频
    pub needs_upload: bool,
    /// 当前步骤的内容拦截重试次数
    pub rejection_retries: usize,
    /// 当前步骤的超时延长次数
    pub timeout_extensions: usize,
    /// 上次处理内容拦截的时间（冷却去重用）
    pub last_rejection_at: Option<Instant>,
}

impl Session {
    pub fn new(video: VideoEntry, prompts: Vec<String>) -> Self {
        Self {
            video,
            prompts,
            step_index: 1,
            payloads: BTreeMap::new(),
            identity: None,
            exhausted_identities: HashSet::new(),
            needs_upload: true,
            rejection_retries: 0,
            timeout_extensions: 0,
            last_rejection_at: None,
        }
    }

    pub fn total_steps(&self) -> usize {
        self.prompts.len()
    }

    /// 所有步骤是否已完成
    pub fn is_finished(&self) -> bool {
        self.step_index > self.total_steps()
    }

    /// 当前步骤的提示词
    pub fn current_prompt(&self) -> Option<&str> {
        self.prompts.get(self.step_index - 1).map(|s| s.as_str())
    }

    /// 步骤完成：前进并清零本步骤的重试计数
    pub fn advance(&mut self) {
        self.step_index += 1;
        self.rejection_retries = 0;
        self.timeout_extensions = 0;
    }

    /// 从指定步骤恢复执行（对话上下文仍在，之前的步骤不必重做）
    pub fn resume_at(&mut self, step: usize) {
        self.step_index = step.clamp(1, self.total_steps());
        self.rejection_retries = 0;
        self.timeout_extensions = 0;
    }

    /// 把当前账号标记为配额耗尽
    pub fn mark_identity_exhausted(&mut self) {
        let label = self
            .identity
            .clone()
            .unwrap_or_else(|| "<当前账号>".to_string());
        self.exhausted_identities.insert(label);
    }

    /// 账号轮换后重置会话
    ///
    /// 新账号没有之前轮次的记忆，必须从步骤 1 重来并重新上传视频。
    /// 已耗尽账号集合跨轮换保留，本次运行内不会再选中它们。
    pub fn reset_for_rotation(&mut self, new_identity: String) {
        self.identity = Some(new_identity);
        self.step_index = 1;
        self.payloads.clear();
        self.needs_upload = true;
        self.rejection_retries = 0;
        self.timeout_extensions = 0;
        self.last_rejection_at = None;
    }

    /// 内容拦截是否还在冷却窗口内（同一横幅不重复响应）
    pub fn rejection_in_cooldown(&self, cooldown: Duration) -> bool {
        match self.last_rejection_at {
            Some(at) => at.elapsed() < cooldown,
            None => false,
        }
    }

    /// 记录一次内容拦截处理时间
    pub fn note_rejection(&mut self) {
        self.last_rejection_at = Some(Instant::now());
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
        let prompts = (1..=25).map(|i| format!("步骤{}", i)).collect();
        Session::new(video, prompts)
    }

    #[test]
    fn test_advance_resets_counters() {
        let mut session = test_session();
        session.rejection_retries = 2;
        session.timeout_extensions = 1;
        session.advance();
        assert_eq!(session.step_index, 2);
        assert_eq!(session.rejection_retries, 0);
        assert_eq!(session.timeout_extensions, 0);
    }

    #[test]
    fn test_rotation_restarts_from_step_one() {
        let mut session = test_session();
        session.step_index = 14;
        session.identity = Some("a@gmail.com".to_string());
        session.needs_upload = false;
        session.mark_identity_exhausted();

        session.reset_for_rotation("b@gmail.com".to_string());

        assert_eq!(session.step_index, 1);
        assert!(session.needs_upload);
        assert!(session.payloads.is_empty());
        // 耗尽账号集合跨轮换保留
        assert!(session.exhausted_identities.contains("a@gmail.com"));
        assert!(!session.exhausted_identities.contains("b@gmail.com"));
    }

    #[test]
    fn test_rejection_cooldown() {
        let mut session = test_session();
        assert!(!session.rejection_in_cooldown(Duration::from_secs(60)));
        session.note_rejection();
        assert!(session.rejection_in_cooldown(Duration::from_secs(60)));
        assert!(!session.rejection_in_cooldown(Duration::from_secs(0)));
    }

    #[test]
    fn test_resume_clamps_to_range() {
        let mut session = test_session();
        session.resume_at(99);
        assert_eq!(session.step_index, 25);
        session.resume_at(0);
        assert_eq!(session.step_index, 1);
    }
}
