//! 响应提取器 - 服务层
//!
//! 按步骤角色把一轮模型响应变成结构化产物，兜底链从高保真到低保真：
//! 复制按钮 + 剪贴板（最干净）→ 渲染 HTML 解析 → 纯文本扫描 → 原始
//! 文本保底。提取永远不返回错误，任何一级失败都只是落到下一级。

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::selectors;
use crate::infrastructure::UiExecutor;
use crate::models::{ExtractedPayload, RenderedContent, StepRole};
use crate::services::{srt_parser, table_parser};

/// 点击复制按钮后等剪贴板写入的时间
const CLIPBOARD_SETTLE: Duration = Duration::from_millis(400);

pub struct ResponseExtractor;

impl ResponseExtractor {
    pub fn new() -> Self {
        Self
    }

    /// 提取一轮响应
    pub async fn extract(
        &self,
        ui: &UiExecutor,
        role: StepRole,
        content: &RenderedContent,
    ) -> ExtractedPayload {
        match role {
            StepRole::Captions => self.extract_captions(ui, content).await,
            StepRole::Table => self.extract_table(ui, content).await,
            StepRole::PassThrough => ExtractedPayload::Raw(content.text.clone()),
        }
    }

    /// 字幕提取：每个复制按钮对应一条候选轨道
    async fn extract_captions(
        &self,
        ui: &UiExecutor,
        content: &RenderedContent,
    ) -> ExtractedPayload {
        let mut tracks = Vec::new();

        let button_count = match ui.copy_button_count(selectors::MODEL_RESPONSE).await {
            Ok(n) => n,
            Err(e) => {
                warn!("统计复制按钮失败，改走内容解析: {}", e);
                0
            }
        };
        debug!("最后一轮响应内复制按钮数量: {}", button_count);

        for i in 0..button_count {
            match self.copy_nth(ui, i).await {
                Some(clip) => {
                    if let Some(track) = srt_parser::reconstruct(&clip) {
                        debug!("剪贴板 #{} 重建出 {} 条字幕", i + 1, track.len());
                        tracks.push(track);
                    } else {
                        debug!("剪贴板 #{} 内容不是字幕，跳过", i + 1);
                    }
                }
                None => warn!("读取剪贴板 #{} 失败", i + 1),
            }
        }

        if tracks.is_empty() {
            tracks = extract_caption_tracks(content);
        }

        if tracks.is_empty() {
            warn!("未能重建任何字幕轨，退回原始文本");
            ExtractedPayload::Raw(content.text.clone())
        } else {
            ExtractedPayload::Captions(tracks)
        }
    }

    /// 表格提取：优先拿剪贴板里的源文本
    async fn extract_table(&self, ui: &UiExecutor, content: &RenderedContent) -> ExtractedPayload {
        let button_count = ui
            .copy_button_count(selectors::MODEL_RESPONSE)
            .await
            .unwrap_or(0);

        if button_count > 0 {
            if let Some(clip) = self.copy_nth(ui, 0).await {
                if let Some(table) = table_parser::from_delimited(&clip) {
                    debug!("剪贴板重建出表格: {} 行", table.row_count());
                    return ExtractedPayload::Table(table);
                }
            }
        }

        extract_table_payload(content)
    }

    /// 点击第 n 个复制按钮并读剪贴板
    async fn copy_nth(&self, ui: &UiExecutor, nth: usize) -> Option<String> {
        let clicked = ui
            .click_copy_button(selectors::MODEL_RESPONSE, nth)
            .await
            .ok()?;
        if !clicked {
            return None;
        }
        sleep(CLIPBOARD_SETTLE).await;

        let clip = ui.read_clipboard().await.ok()?;
        if clip.trim().is_empty() {
            None
        } else {
            Some(clip)
        }
    }
}

impl Default for ResponseExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// 不依赖剪贴板的字幕提取链（HTML → 纯文本）
fn extract_caption_tracks(content: &RenderedContent) -> Vec<crate::models::CaptionTrack> {
    let from_html = srt_parser::from_html(&content.html);
    if !from_html.is_empty() {
        return from_html;
    }
    srt_parser::reconstruct(&content.text)
        .map(|t| vec![t])
        .unwrap_or_default()
}

/// 不依赖剪贴板的表格提取链（HTML → Markdown → 原始文本）
fn extract_table_payload(content: &RenderedContent) -> ExtractedPayload {
    if let Some(table) = table_parser::from_html(&content.html) {
        return ExtractedPayload::Table(table);
    }
    if let Some(table) = table_parser::from_markdown(&content.text) {
        return ExtractedPayload::Table(table);
    }
    warn!("未能重建表格，退回原始文本");
    ExtractedPayload::Raw(content.text.clone())
}

/// 纯内容提取（不经过页面），供批处理后备与单元测试使用
pub fn extract_from_content(role: StepRole, content: &RenderedContent) -> ExtractedPayload {
    match role {
        StepRole::Captions => {
            let tracks = extract_caption_tracks(content);
            if tracks.is_empty() {
                ExtractedPayload::Raw(content.text.clone())
            } else {
                ExtractedPayload::Captions(tracks)
            }
        }
        StepRole::Table => extract_table_payload(content),
        StepRole::PassThrough => ExtractedPayload::Raw(content.text.clone()),
    }
}
