//! 视频列表模型与加载

use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};

/// 待处理视频条目
///
/// 对应 VideoList.csv 的一行。`title` 等补充列可选，缺省不报错。
#[derive(Debug, Clone, Deserialize)]
pub struct VideoEntry {
    #[serde(rename = "Filename", alias = "filename")]
    pub filename: String,
    #[serde(rename = "Duration", alias = "duration")]
    pub duration: String,
    /// 可选的标题种子字段
    #[serde(rename = "Title", alias = "title", default)]
    pub title: Option<String>,
}

impl VideoEntry {
    /// 去掉扩展名的视频名，用作输出子目录名
    pub fn stem(&self) -> String {
        Path::new(&self.filename)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| self.filename.clone())
    }
}

/// 从 CSV 文件加载视频列表
pub fn load_video_list(path: &str) -> AppResult<Vec<VideoEntry>> {
    if !Path::new(path).exists() {
        return Err(AppError::File(crate::error::FileError::NotFound {
            path: path.to_string(),
        }));
    }

    let mut reader =
        csv::Reader::from_path(path).map_err(|e| AppError::File(crate::error::FileError::CsvParseFailed {
            path: path.to_string(),
            source: Box::new(e),
        }))?;

    let mut videos = Vec::new();
    for record in reader.deserialize::<VideoEntry>() {
        match record {
            Ok(video) => videos.push(video),
            Err(e) => {
                warn!("⚠️ 跳过无法解析的视频行: {}", e);
            }
        }
    }

    info!("✅ 加载了 {} 个视频", videos.len());
    Ok(videos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp_csv(name: &str, content: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_video_list() {
        let path = write_temp_csv(
            "video_automation_test_list.csv",
            "Filename,Duration\nv1.mp4,10:00\nv2.mp4,05:30\n",
        );
        let videos = load_video_list(path.to_str().unwrap()).unwrap();
        assert_eq!(videos.len(), 2);
        assert_eq!(videos[0].filename, "v1.mp4");
        assert_eq!(videos[1].duration, "05:30");
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_load_video_list_with_optional_title() {
        let path = write_temp_csv(
            "video_automation_test_list_title.csv",
            "Filename,Duration,Title\nv1.mp4,10:00,开场\n",
        );
        let videos = load_video_list(path.to_str().unwrap()).unwrap();
        assert_eq!(videos[0].title.as_deref(), Some("开场"));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(load_video_list("/nonexistent/VideoList.csv").is_err());
    }

    #[test]
    fn test_stem_strips_extension() {
        let video = VideoEntry {
            filename: "我的视频.MP4".to_string(),
            duration: "1:00".to_string(),
            title: None,
        };
        assert_eq!(video.stem(), "我的视频");
    }
}
