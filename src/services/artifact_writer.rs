//! 产物落盘与汇总 - 服务层
//!
//! 指定步骤的提取产物按视频落到 `<处理目录>/<视频名>/` 下：
//! 字幕轨 `step_{n}_output_{i}.srt`、表格 `step_{n}_output.csv`、
//! 原始文本 `step_{n}_output.txt`。批次结束后把各视频的表格 CSV
//! 合并成一份切片总表。

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::{CaptionTrack, ExtractedPayload, TableRecordSet};

pub struct ArtifactWriter {
    process_folder: PathBuf,
    clips_file: PathBuf,
}

impl ArtifactWriter {
    pub fn new(config: &Config) -> Self {
        Self {
            process_folder: PathBuf::from(&config.process_folder),
            clips_file: PathBuf::from(&config.clips_file),
        }
    }

    /// 某个视频的产物目录
    pub fn video_dir(&self, video_stem: &str) -> PathBuf {
        self.process_folder.join(video_stem)
    }

    /// 把一个步骤的提取产物写进视频目录，返回写出的文件列表
    pub fn persist(
        &self,
        video_stem: &str,
        step_index: usize,
        payload: &ExtractedPayload,
    ) -> AppResult<Vec<PathBuf>> {
        let dir = self.video_dir(video_stem);
        fs::create_dir_all(&dir).map_err(|e| AppError::file_write_failed(dir.display().to_string(), e))?;

        let written = match payload {
            ExtractedPayload::Captions(tracks) => self.write_tracks(&dir, step_index, tracks)?,
            ExtractedPayload::Table(table) => {
                vec![self.write_table(&dir, step_index, table)?]
            }
            ExtractedPayload::Raw(text) => {
                let path = dir.join(format!("step_{}_output.txt", step_index));
                fs::write(&path, text).map_err(|e| AppError::file_write_failed(path.display().to_string(), e))?;
                vec![path]
            }
        };

        for path in &written {
            info!("💾 已写出: {}", path.display());
        }
        Ok(written)
    }

    fn write_tracks(
        &self,
        dir: &Path,
        step_index: usize,
        tracks: &[CaptionTrack],
    ) -> AppResult<Vec<PathBuf>> {
        let mut written = Vec::new();
        for (i, track) in tracks.iter().enumerate() {
            let path = dir.join(format!("step_{}_output_{}.srt", step_index, i + 1));
            fs::write(&path, track.to_srt())
                .map_err(|e| AppError::file_write_failed(path.display().to_string(), e))?;
            written.push(path);
        }
        Ok(written)
    }

    fn write_table(
        &self,
        dir: &Path,
        step_index: usize,
        table: &TableRecordSet,
    ) -> AppResult<PathBuf> {
        let path = dir.join(format!("step_{}_output.csv", step_index));
        let mut writer = csv::Writer::from_path(&path)
            .map_err(|e| AppError::File(crate::error::FileError::CsvParseFailed {
                path: path.display().to_string(),
                source: Box::new(e),
            }))?;
        writer.write_record(table.headers())?;
        for row in table.rows() {
            writer.write_record(row)?;
        }
        writer.flush().map_err(|e| AppError::file_write_failed(path.display().to_string(), e))?;
        Ok(path)
    }

    /// 合并各视频目录里的表格 CSV 成切片总表
    ///
    /// 列集取所有文件表头的并集，按首次出现顺序排列；某文件缺的
    /// 列以空串填充。编辑器临时文件与备份文件一律跳过。
    /// 返回合并的数据行数。
    pub fn merge_tables(&self) -> AppResult<usize> {
        let mut union_headers: Vec<String> = Vec::new();
        let mut merged_rows: Vec<Vec<String>> = Vec::new();

        for csv_path in self.collect_table_files()? {
            debug!("合并表格: {}", csv_path.display());
            let mut reader = match csv::Reader::from_path(&csv_path) {
                Ok(r) => r,
                Err(e) => {
                    warn!("⚠️ 读取 {} 失败，跳过: {}", csv_path.display(), e);
                    continue;
                }
            };

            let headers: Vec<String> = match reader.headers() {
                Ok(h) => h.iter().map(|s| s.to_string()).collect(),
                Err(e) => {
                    warn!("⚠️ {} 缺少表头，跳过: {}", csv_path.display(), e);
                    continue;
                }
            };

            // 并集列按首次出现顺序扩展
            for h in &headers {
                if !union_headers.contains(h) {
                    union_headers.push(h.clone());
                }
            }
            let col_of: HashMap<&String, usize> =
                headers.iter().enumerate().map(|(i, h)| (h, i)).collect();

            for record in reader.records() {
                let record = match record {
                    Ok(r) => r,
                    Err(e) => {
                        warn!("⚠️ {} 内有坏行，跳过: {}", csv_path.display(), e);
                        continue;
                    }
                };
                let row = union_headers
                    .iter()
                    .map(|h| {
                        col_of
                            .get(h)
                            .and_then(|&i| record.get(i))
                            .unwrap_or("")
                            .to_string()
                    })
                    .collect();
                merged_rows.push(row);
            }
        }

        if union_headers.is_empty() {
            info!("没有可合并的表格文件");
            return Ok(0);
        }

        // 早并入的文件行数可能短于最终并集列数，统一补齐
        for row in &mut merged_rows {
            row.resize(union_headers.len(), String::new());
        }

        if let Some(parent) = self.clips_file.parent() {
            fs::create_dir_all(parent).map_err(|e| AppError::file_write_failed(parent.display().to_string(), e))?;
        }
        let mut writer = csv::Writer::from_path(&self.clips_file).map_err(|e| {
            AppError::File(crate::error::FileError::CsvParseFailed {
                path: self.clips_file.display().to_string(),
                source: Box::new(e),
            })
        })?;
        writer.write_record(&union_headers)?;
        for row in &merged_rows {
            writer.write_record(row)?;
        }
        writer
            .flush()
            .map_err(|e| AppError::file_write_failed(self.clips_file.display().to_string(), e))?;

        info!(
            "📊 切片总表已生成: {} ({} 行 x {} 列)",
            self.clips_file.display(),
            merged_rows.len(),
            union_headers.len()
        );
        Ok(merged_rows.len())
    }

    /// 收集待合并的 CSV 文件（按路径排序保证结果稳定）
    fn collect_table_files(&self) -> AppResult<Vec<PathBuf>> {
        let mut files = Vec::new();
        if !self.process_folder.exists() {
            return Ok(files);
        }

        let dirs = fs::read_dir(&self.process_folder)
            .map_err(|e| AppError::file_read_failed(self.process_folder.display().to_string(), e))?;
        for entry in dirs.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            // 处理目录下的 videos/ 放的是输入清单和视频，不参与合并
            if path.file_name().and_then(|n| n.to_str()) == Some("videos") {
                continue;
            }
            let videos = fs::read_dir(&path)
                .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?;
            for file in videos.flatten() {
                let file_path = file.path();
                if is_mergeable_csv(&file_path) && file_path != self.clips_file {
                    files.push(file_path);
                }
            }
        }

        files.sort();
        Ok(files)
    }
}

/// 是否是待合并的数据 CSV（排除临时文件与备份）
fn is_mergeable_csv(path: &Path) -> bool {
    let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(n) => n,
        None => return false,
    };
    if name.starts_with("~$") || name.starts_with('.') {
        return false;
    }
    if name.ends_with(".bak") || name.ends_with(".tmp") {
        return false;
    }
    name.ends_with(".csv")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CaptionEntry;

    fn writer_in(tag: &str) -> (ArtifactWriter, PathBuf) {
        let root = std::env::temp_dir().join(format!("video_automation_artifact_{}", tag));
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(&root).unwrap();
        let writer = ArtifactWriter {
            process_folder: root.join("process"),
            clips_file: root.join("clips.csv"),
        };
        (writer, root)
    }

    fn one_entry_track(text: &str) -> CaptionTrack {
        CaptionTrack {
            entries: vec![CaptionEntry {
                index: 1,
                start: "00:00:00,000".to_string(),
                end: "00:00:01,000".to_string(),
                text: text.to_string(),
            }],
        }
    }

    #[test]
    fn test_persist_captions_one_file_per_track() {
        let (writer, root) = writer_in("captions");
        let payload =
            ExtractedPayload::Captions(vec![one_entry_track("轨一"), one_entry_track("轨二")]);

        let written = writer.persist("v1", 23, &payload).unwrap();
        assert_eq!(written.len(), 2);
        assert!(written[0].ends_with("v1/step_23_output_1.srt"));
        assert!(written[1].ends_with("v1/step_23_output_2.srt"));
        assert!(fs::read_to_string(&written[0]).unwrap().contains("轨一"));
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn test_persist_raw_text() {
        let (writer, root) = writer_in("raw");
        let written = writer
            .persist("v1", 7, &ExtractedPayload::Raw("中间产物".to_string()))
            .unwrap();
        assert!(written[0].ends_with("v1/step_7_output.txt"));
        assert_eq!(fs::read_to_string(&written[0]).unwrap(), "中间产物");
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn test_merge_unions_headers_in_first_appearance_order() {
        let (writer, root) = writer_in("merge");

        let mut t1 = TableRecordSet::new(vec!["文件名".to_string(), "开始".to_string()]);
        t1.push_row(vec!["v1.mp4".to_string(), "0:00".to_string()]);
        writer.persist("v1", 25, &ExtractedPayload::Table(t1)).unwrap();

        let mut t2 = TableRecordSet::new(vec![
            "文件名".to_string(),
            "结束".to_string(),
        ]);
        t2.push_row(vec!["v2.mp4".to_string(), "1:00".to_string()]);
        writer.persist("v2", 25, &ExtractedPayload::Table(t2)).unwrap();

        let merged = writer.merge_tables().unwrap();
        assert_eq!(merged, 2);

        let clips = fs::read_to_string(root.join("clips.csv")).unwrap();
        let mut lines = clips.lines();
        assert_eq!(lines.next().unwrap(), "文件名,开始,结束");
        assert_eq!(lines.next().unwrap(), "v1.mp4,0:00,");
        assert_eq!(lines.next().unwrap(), "v2.mp4,,1:00");
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn test_merge_ignores_videos_input_folder() {
        let (writer, root) = writer_in("videos_dir");

        // 默认布局里视频清单就放在处理目录下的 videos/ 里
        let videos_dir = writer.process_folder.join("videos");
        fs::create_dir_all(&videos_dir).unwrap();
        fs::write(
            videos_dir.join("VideoList.csv"),
            "Filename,Duration\nv1.mp4,10:00\n",
        )
        .unwrap();

        let mut table = TableRecordSet::new(vec!["文件名".to_string(), "开始".to_string()]);
        table.push_row(vec!["v1.mp4".to_string(), "0:00".to_string()]);
        writer
            .persist("v1", 25, &ExtractedPayload::Table(table))
            .unwrap();

        let merged = writer.merge_tables().unwrap();
        assert_eq!(merged, 1);

        let clips = fs::read_to_string(root.join("clips.csv")).unwrap();
        assert_eq!(clips.lines().next().unwrap(), "文件名,开始");
        assert!(!clips.contains("Duration"));
        assert!(!clips.contains("10:00"));
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn test_merge_skips_temp_and_backup_files() {
        assert!(is_mergeable_csv(Path::new("a/step_25_output.csv")));
        assert!(!is_mergeable_csv(Path::new("a/~$step_25_output.csv")));
        assert!(!is_mergeable_csv(Path::new("a/.hidden.csv")));
        assert!(!is_mergeable_csv(Path::new("a/step_25_output.csv.bak")));
        assert!(!is_mergeable_csv(Path::new("a/notes.txt")));
    }
}
