//! SRT 字幕重建 - 服务层
//!
//! 从被 UI 装饰污染的文本里重建干净的 SRT 轨道：
//! 1. 先把各种变体时间分隔符统一成 ` --> `；
//! 2. 找到第一个合法字幕块的起点，丢掉前面的 UI 文案；
//! 3. 顺序解析字幕块，遇到不合法的块就停，自然甩掉尾部杂质
//!    （如 `expand_less`、下一份文件的 `SRT File 2:` 标头）。
//!
//! 归一化对任意输入都不报错，且幂等（跑两遍结果不变）。

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

use crate::models::{CaptionEntry, CaptionTrack};

/// 时间行里的分隔符变体：`-->`、长短横线、箭头字符、`==>` 等
static TIME_RANGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(\d{2}:\d{2}:\d{2},\d{3})\s*(?:-->|[-\u{2013}\u{2014}\u{2015}\u{2212}]{1,3}>?|\u{2192}|\u{27F6}|=+>)\s*(\d{2}:\d{2}:\d{2},\d{3})",
    )
    .unwrap()
});

/// 归一化后的标准时间行
static TIME_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d{2}:\d{2}:\d{2},\d{3})\s*-->\s*(\d{2}:\d{2}:\d{2},\d{3})\s*$").unwrap()
});

/// 纯数字的序号行
static INDEX_LINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\d+)\s*$").unwrap());

static PRE_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("pre").unwrap());
static CODE_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("code").unwrap());

/// 把所有时间分隔符变体统一成 ` --> `
///
/// 对任意输入总能返回，已标准的文本原样不动。
pub fn normalize_time_separators(text: &str) -> String {
    TIME_RANGE_RE.replace_all(text, "$1 --> $2").into_owned()
}

/// 定位第一个合法字幕块的起始行
///
/// 合法起点 = 一个纯数字序号行，且下一行是标准时间行。
/// 返回该序号行在文本里的字节偏移。偏移按原文切分计算，
/// CRLF 换行不会让它偏到多字节字符中间。
pub fn find_caption_start(text: &str) -> Option<usize> {
    let mut offsets = Vec::new();
    let mut lines = Vec::new();
    let mut pos = 0usize;
    for segment in text.split_inclusive('\n') {
        offsets.push(pos);
        lines.push(segment.trim_end_matches(|c| c == '\n' || c == '\r'));
        pos += segment.len();
    }

    for (i, line) in lines.iter().enumerate() {
        if INDEX_LINE_RE.is_match(line) {
            if let Some(next) = lines.get(i + 1) {
                if TIME_LINE_RE.is_match(next) {
                    return Some(offsets[i]);
                }
            }
        }
    }
    None
}

/// 从文本起点顺序解析字幕块，遇到不合法块即停止
fn parse_entries(text: &str) -> Vec<CaptionEntry> {
    let mut entries = Vec::new();
    let mut lines = text.lines().peekable();

    loop {
        // 跳过块之间的空行
        while matches!(lines.peek(), Some(l) if l.trim().is_empty()) {
            lines.next();
        }

        let index_line = match lines.next() {
            Some(l) => l,
            None => break,
        };
        let index = match INDEX_LINE_RE
            .captures(index_line)
            .and_then(|c| c[1].parse::<u32>().ok())
        {
            Some(n) => n,
            None => break,
        };

        let time_line = match lines.next() {
            Some(l) => l,
            None => break,
        };
        let (start, end) = match TIME_LINE_RE.captures(time_line) {
            Some(c) => (c[1].to_string(), c[2].to_string()),
            None => break,
        };

        let mut text_lines = Vec::new();
        while let Some(l) = lines.peek() {
            if l.trim().is_empty() {
                break;
            }
            text_lines.push(lines.next().unwrap_or_default().trim().to_string());
        }
        if text_lines.is_empty() {
            break;
        }

        entries.push(CaptionEntry {
            index,
            start,
            end,
            text: text_lines.join("\n"),
        });
    }

    entries
}

/// 从污染文本里重建一条字幕轨道
///
/// 找不到任何合法字幕块时返回 None。重建结果再走一遍本函数
/// 输出不变（幂等）。
pub fn reconstruct(text: &str) -> Option<CaptionTrack> {
    let normalized = normalize_time_separators(text);
    let start = find_caption_start(&normalized)?;
    let entries = parse_entries(&normalized[start..]);
    if entries.is_empty() {
        None
    } else {
        Some(CaptionTrack { entries })
    }
}

/// 从渲染 HTML 里重建字幕轨道（每个含时间线的代码块一条）
pub fn from_html(html: &str) -> Vec<CaptionTrack> {
    let doc = Html::parse_fragment(html);

    let mut tracks: Vec<CaptionTrack> = doc
        .select(&PRE_SELECTOR)
        .map(|el| el.text().collect::<String>())
        .filter(|t| t.contains("-->") || TIME_RANGE_RE.is_match(t))
        .filter_map(|t| reconstruct(&t))
        .collect();

    if tracks.is_empty() {
        tracks = doc
            .select(&CODE_SELECTOR)
            .map(|el| el.text().collect::<String>())
            .filter(|t| t.contains("-->") || TIME_RANGE_RE.is_match(t))
            .filter_map(|t| reconstruct(&t))
            .collect();
    }

    tracks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_separator_variants() {
        let cases = [
            "00:00:01,000 --> 00:00:02,000",
            "00:00:01,000 -> 00:00:02,000",
            "00:00:01,000 — 00:00:02,000",
            "00:00:01,000 → 00:00:02,000",
            "00:00:01,000 ==> 00:00:02,000",
            "00:00:01,000-->00:00:02,000",
        ];
        for case in cases {
            assert_eq!(
                normalize_time_separators(case),
                "00:00:01,000 --> 00:00:02,000",
                "输入: {}",
                case
            );
        }
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize_time_separators("00:00:01,000 → 00:00:02,000");
        let twice = normalize_time_separators(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_reconstruct_strips_leading_ui_text() {
        let polluted = "content_copy\ndownload\nSRT File 1:\n1\n00:00:00,000 --> 00:00:02,000\n你好\n\n2\n00:00:02,000 --> 00:00:04,000\n世界\n";
        let track = reconstruct(polluted).unwrap();
        assert_eq!(track.entries.len(), 2);
        assert_eq!(track.entries[0].text, "你好");
        assert_eq!(track.entries[1].start, "00:00:02,000");
    }

    #[test]
    fn test_reconstruct_stops_at_trailing_garbage() {
        let polluted =
            "1\n00:00:00,000 --> 00:00:02,000\nHello\n\nexpand_less\nSRT File 2:\n";
        let track = reconstruct(polluted).unwrap();
        assert_eq!(track.entries.len(), 1);
        assert_eq!(track.entries[0].text, "Hello");
        assert!(!track.to_srt().contains("expand_less"));
    }

    #[test]
    fn test_reconstruct_is_idempotent() {
        let polluted = "垃圾开头\n1\n00:00:00,000 -> 00:00:02,000\n第一句\n\n2\n00:00:02,000 -> 00:00:03,500\n第二句\n\n尾部杂质";
        let track = reconstruct(polluted).unwrap();
        let srt = track.to_srt();
        let again = reconstruct(&srt).unwrap();
        assert_eq!(again.to_srt(), srt);
    }

    #[test]
    fn test_reconstruct_handles_crlf_with_multibyte_prefix() {
        // CRLF 换行 + 多字节前缀文本不能让起点偏移错位
        let polluted =
            "垃圾\r\n垃圾\r\n垃圾\r\n1\r\n00:00:00,000 --> 00:00:02,000\r\n你好\r\n";
        let track = reconstruct(polluted).unwrap();
        assert_eq!(track.entries.len(), 1);
        assert_eq!(track.entries[0].text, "你好");
    }

    #[test]
    fn test_find_caption_start_offset_on_crlf_text() {
        let text = "头部\r\n1\r\n00:00:00,000 --> 00:00:01,000\r\n正文\r\n";
        let start = find_caption_start(text).unwrap();
        assert!(text[start..].starts_with('1'));
    }

    #[test]
    fn test_reconstruct_none_without_captions() {
        assert!(reconstruct("这段文本里没有任何字幕").is_none());
        assert!(reconstruct("").is_none());
    }

    #[test]
    fn test_from_html_picks_code_blocks_with_timelines() {
        let html = r#"
            <div>
                <pre>1
00:00:00,000 --> 00:00:01,000
第一轨</pre>
                <pre>console.log("不是字幕");</pre>
                <pre>1
00:00:00,000 --> 00:00:02,000
第二轨</pre>
            </div>
        "#;
        let tracks = from_html(html);
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].entries[0].text, "第一轨");
        assert_eq!(tracks[1].entries[0].text, "第二轨");
    }

    #[test]
    fn test_multiline_caption_text() {
        let text = "1\n00:00:00,000 --> 00:00:02,000\n第一行\n第二行\n";
        let track = reconstruct(text).unwrap();
        assert_eq!(track.entries[0].text, "第一行\n第二行");
    }
}
