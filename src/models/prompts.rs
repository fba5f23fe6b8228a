//! 提示词集合与 TOML 加载
//!
//! prompts.toml 按步骤顺序列出提示词，支持 `{文件名称}` / `{视频时长}`
//! 占位符，每个视频渲染一份独立的提示词序列。

use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::models::video::VideoEntry;

/// 单个步骤的提示词
#[derive(Debug, Clone, Deserialize)]
pub struct PromptStep {
    /// 步骤索引（从 1 开始，文件内按此排序）
    pub index: usize,
    /// 提示词模板
    pub text: String,
}

/// 提示词集合
#[derive(Debug, Clone, Deserialize)]
pub struct PromptSet {
    #[serde(rename = "steps")]
    pub steps: Vec<PromptStep>,
}

impl PromptSet {
    /// 从 TOML 文件加载并按步骤索引排序
    pub fn load(path: &str) -> AppResult<Self> {
        if !Path::new(path).exists() {
            return Err(AppError::File(crate::error::FileError::NotFound {
                path: path.to_string(),
            }));
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::file_read_failed(path, e))?;

        let mut set: PromptSet = toml::from_str(&content).map_err(|e| {
            AppError::File(crate::error::FileError::TomlParseFailed {
                path: path.to_string(),
                source: Box::new(e),
            })
        })?;

        set.steps.sort_by_key(|s| s.index);
        info!("✅ 加载提示词文件，共 {} 个步骤", set.steps.len());
        Ok(set)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// 为某个视频渲染完整的提示词序列
    ///
    /// 替换文件名/时长占位符。中英文占位符都支持。
    pub fn render(&self, video: &VideoEntry) -> Vec<String> {
        self.steps
            .iter()
            .map(|step| {
                step.text
                    .replace("{文件名称}", &video.filename)
                    .replace("{视频时长}", &video.duration)
                    .replace("{filename}", &video.filename)
                    .replace("{duration}", &video.duration)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_video() -> VideoEntry {
        VideoEntry {
            filename: "v1.mp4".to_string(),
            duration: "12:34".to_string(),
            title: None,
        }
    }

    #[test]
    fn test_render_replaces_placeholders() {
        let set = PromptSet {
            steps: vec![
                PromptStep {
                    index: 1,
                    text: "请分析视频 {文件名称}，时长 {视频时长}".to_string(),
                },
                PromptStep {
                    index: 2,
                    text: "file={filename} dur={duration}".to_string(),
                },
            ],
        };

        let rendered = set.render(&test_video());
        assert_eq!(rendered[0], "请分析视频 v1.mp4，时长 12:34");
        assert_eq!(rendered[1], "file=v1.mp4 dur=12:34");
    }

    #[test]
    fn test_load_sorts_by_index() {
        let toml_text = r#"
[[steps]]
index = 2
text = "第二步"

[[steps]]
index = 1
text = "第一步"
"#;
        let path = std::env::temp_dir().join("video_automation_test_prompts.toml");
        std::fs::write(&path, toml_text).unwrap();

        let set = PromptSet::load(path.to_str().unwrap()).unwrap();
        assert_eq!(set.steps[0].text, "第一步");
        assert_eq!(set.steps[1].text, "第二步");
        let _ = std::fs::remove_file(path);
    }
}
