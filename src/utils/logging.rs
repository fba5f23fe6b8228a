//! 日志初始化与小工具

use std::fs::OpenOptions;
use std::io::Write;

use tracing_subscriber::EnvFilter;

use crate::error::{AppError, AppResult};

/// 初始化 tracing 日志
///
/// 通过 RUST_LOG 环境变量控制级别，默认 info。
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// 在运行日志文件里追加一条运行分隔头
pub fn init_log_file(path: &str) -> AppResult<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| AppError::file_write_failed(path, e))?;

    let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
    writeln!(file, "\n===== 运行开始 {} =====", now)
        .map_err(|e| AppError::file_write_failed(path, e))?;
    Ok(())
}

/// 截断长文本用于日志预览（按字符数，不会切断多字节字符）
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    let flattened = text.replace('\n', " ");
    if flattened.chars().count() <= max_chars {
        return flattened;
    }
    let truncated: String = flattened.chars().take(max_chars).collect();
    format!("{}...", truncated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_text_unchanged() {
        assert_eq!(truncate_text("短文本", 10), "短文本");
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        let text = "这是一段很长的中文文本内容";
        let result = truncate_text(text, 5);
        assert_eq!(result, "这是一段很...");
    }

    #[test]
    fn test_truncate_flattens_newlines() {
        assert_eq!(truncate_text("第一行\n第二行", 20), "第一行 第二行");
    }
}
