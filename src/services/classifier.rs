//! UI 状态分类器 - 服务层
//!
//! 对页面快照做纯函数判定：模型是否仍在生成、是否触发了内容拦截
//! 或额度耗尽提示。唯一可信的完成信号是 Run/Stop 按钮状态，
//! 响应气泡出现与否不作依据（流式渲染期间气泡早就存在了）。

use crate::infrastructure::RunButtonProbe;

/// 模型是否仍在生成
///
/// 按钮内出现 "Stop" 或带 stoppable 类即认为在忙。
pub fn is_busy(probe: &RunButtonProbe) -> bool {
    if !probe.found {
        return false;
    }
    probe.html.contains("Stop") || probe.class_name.contains("stoppable")
}

/// 按钮当前是否可点击（可以提交新一轮）
pub fn is_enabled(probe: &RunButtonProbe) -> bool {
    if !probe.found || is_busy(probe) {
        return false;
    }
    match probe.aria_disabled.as_deref() {
        Some("true") => false,
        _ => true,
    }
}

/// 页面文本里是否出现了某条提示语（忽略大小写的子串匹配）
///
/// 命中则返回命中的提示语原文，便于日志记录。
pub fn matched_phrase<'a>(text: &str, phrases: &'a [String]) -> Option<&'a str> {
    let lowered = text.to_lowercase();
    phrases
        .iter()
        .find(|p| lowered.contains(&p.to_lowercase()))
        .map(|p| p.as_str())
}
