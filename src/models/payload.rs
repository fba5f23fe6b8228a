//! 提取产物的数据类型
//!
//! 两种结构化产物：字幕轨（SRT 块序列）和表格记录集（固定列集的行序列）。
//! 任何一种都解析不出来时退回原始文本，保证每一轮的输出都不会丢失。

use std::fmt;

/// 步骤角色：决定响应走哪条重建路径
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepRole {
    /// 产出字幕轨（SRT）
    Captions,
    /// 产出表格数据
    Table,
    /// 中间步骤，响应不落盘
    PassThrough,
}

/// 单条字幕
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionEntry {
    /// 序号（从 1 开始）
    pub index: u32,
    /// 起始时间戳，规范化为 HH:MM:SS,mmm
    pub start: String,
    /// 结束时间戳
    pub end: String,
    /// 字幕文本（可多行）
    pub text: String,
}

/// 字幕轨：有序的字幕块序列
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptionTrack {
    pub entries: Vec<CaptionEntry>,
}

impl CaptionTrack {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 序列化为标准 SRT 文本
    ///
    /// 块格式：`<index>\n<start> --> <end>\n<text>\n`，块之间空行分隔。
    pub fn to_srt(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&format!(
                "{}\n{} --> {}\n{}\n\n",
                entry.index, entry.start, entry.end, entry.text
            ));
        }
        out
    }
}

/// 表格记录集
///
/// 列集在遇到第一个表头行时固定，之后所有数据行都补齐到相同列数，
/// 缺失的尾部单元格用空字符串占位，绝不丢行。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableRecordSet {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl TableRecordSet {
    /// 用表头创建记录集（列集自此固定）
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 追加一行数据
    ///
    /// 单元格少于表头时补空字符串，多于表头时截断多余部分，
    /// 保证每一行的键集与表头完全一致。
    pub fn push_row(&mut self, mut cells: Vec<String>) {
        cells.resize(self.headers.len(), String::new());
        self.rows.push(cells);
    }

    /// 按列名取某行的单元格
    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        let col = self.headers.iter().position(|h| h == column)?;
        self.rows.get(row).map(|r| r[col].as_str())
    }
}

/// 一轮响应的提取结果
///
/// 提取永远不失败：解析链全部落空时以 `Raw` 保底。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractedPayload {
    /// 一轮里可能出现多个独立字幕轨（多个复制按钮），各自单独落盘
    Captions(Vec<CaptionTrack>),
    Table(TableRecordSet),
    Raw(String),
}

impl fmt::Display for ExtractedPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractedPayload::Captions(tracks) => {
                write!(f, "字幕轨 x{}", tracks.len())
            }
            ExtractedPayload::Table(table) => {
                write!(f, "表格 {}行 x {}列", table.row_count(), table.column_count())
            }
            ExtractedPayload::Raw(text) => write!(f, "原始文本 {} 字符", text.chars().count()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_row_pads_missing_cells() {
        let headers: Vec<String> = (1..=9).map(|i| format!("c{}", i)).collect();
        let mut table = TableRecordSet::new(headers);

        table.push_row(vec![
            "v1.mp4".to_string(),
            "0:00".to_string(),
            "1:00".to_string(),
        ]);

        // 行键集必须与表头一致：9 列表头、3 个单元格 => 9 个键，6 个空串
        assert_eq!(table.rows()[0].len(), 9);
        assert_eq!(table.get(0, "c1"), Some("v1.mp4"));
        assert_eq!(table.get(0, "c3"), Some("1:00"));
        for i in 4..=9 {
            assert_eq!(table.get(0, &format!("c{}", i)), Some(""));
        }
    }

    #[test]
    fn test_push_row_truncates_extra_cells() {
        let mut table = TableRecordSet::new(vec!["a".to_string(), "b".to_string()]);
        table.push_row(vec!["1".to_string(), "2".to_string(), "3".to_string()]);
        assert_eq!(table.rows()[0], vec!["1".to_string(), "2".to_string()]);
    }

    #[test]
    fn test_caption_track_to_srt() {
        let track = CaptionTrack {
            entries: vec![CaptionEntry {
                index: 1,
                start: "00:00:00,000".to_string(),
                end: "00:00:02,000".to_string(),
                text: "Hello".to_string(),
            }],
        };
        assert_eq!(track.to_srt(), "1\n00:00:00,000 --> 00:00:02,000\nHello\n\n");
    }
}
