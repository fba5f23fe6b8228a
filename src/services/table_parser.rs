//! 表格重建 - 服务层
//!
//! 把模型输出的 Markdown 管道表格 / 渲染 HTML 表格 / 制表符文本
//! 还原成结构化记录集。列数以表头为准：短行用空串补齐，
//! 多出来的单元格截断，保证每条记录的列数恒等于表头列数。

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

use crate::models::TableRecordSet;

/// Markdown 表头下的分隔行，如 `|---|:---:|--|`
static SEPARATOR_ROW_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\s\-\|:]+$").unwrap());

static TABLE_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("table").unwrap());
static THEAD_CELL_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("thead th").unwrap());
static TR_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").unwrap());
static CELL_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("th, td").unwrap());
static TBODY_TR_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("tbody tr").unwrap());

/// 拆一行管道表格：去掉首尾管道带来的空单元格，逐格 trim
fn split_pipe_row(line: &str) -> Vec<String> {
    let mut cells: Vec<String> = line.split('|').map(|c| c.trim().to_string()).collect();
    if matches!(cells.first(), Some(c) if c.is_empty()) {
        cells.remove(0);
    }
    if matches!(cells.last(), Some(c) if c.is_empty()) {
        cells.pop();
    }
    cells
}

/// 从 Markdown 管道表格文本重建记录集
///
/// 第一个非分隔内容行视为表头，之后的每个管道行是一条记录。
pub fn from_markdown(text: &str) -> Option<TableRecordSet> {
    let mut headers: Option<Vec<String>> = None;
    let mut set: Option<TableRecordSet> = None;

    for line in text.lines() {
        let trimmed = line.trim();
        if !trimmed.contains('|') {
            continue;
        }
        if SEPARATOR_ROW_RE.is_match(trimmed) {
            continue;
        }

        let cells = split_pipe_row(trimmed);
        if cells.is_empty() {
            continue;
        }

        match headers {
            None => {
                if cells.len() < 2 {
                    // 单列的管道行大概率是正文，不当表头
                    continue;
                }
                set = Some(TableRecordSet::new(cells.clone()));
                headers = Some(cells);
            }
            Some(_) => {
                if let Some(s) = set.as_mut() {
                    s.push_row(cells);
                }
            }
        }
    }

    set
}

/// 从渲染 HTML 里的 `<table>` 重建记录集
pub fn from_html(html: &str) -> Option<TableRecordSet> {
    let doc = Html::parse_fragment(html);
    let table = doc.select(&TABLE_SELECTOR).next()?;

    let cell_text = |el: scraper::ElementRef<'_>| -> String {
        el.text().collect::<String>().trim().to_string()
    };

    // 表头优先取 thead，没有就用第一行
    let mut headers: Vec<String> = table.select(&THEAD_CELL_SELECTOR).map(cell_text).collect();
    let mut body_rows: Vec<Vec<String>> = table
        .select(&TBODY_TR_SELECTOR)
        .map(|tr| tr.select(&CELL_SELECTOR).map(cell_text).collect())
        .collect();

    if headers.is_empty() {
        let mut all_rows: Vec<Vec<String>> = table
            .select(&TR_SELECTOR)
            .map(|tr| tr.select(&CELL_SELECTOR).map(cell_text).collect())
            .collect();
        if all_rows.is_empty() {
            return None;
        }
        headers = all_rows.remove(0);
        body_rows = all_rows;
    } else if body_rows.is_empty() {
        // 有 thead 没 tbody 时，跳过表头行取剩余 tr
        body_rows = table
            .select(&TR_SELECTOR)
            .skip(1)
            .map(|tr| tr.select(&CELL_SELECTOR).map(cell_text).collect())
            .collect();
    }

    if headers.is_empty() {
        return None;
    }

    let mut set = TableRecordSet::new(headers);
    for row in body_rows {
        if !row.is_empty() {
            set.push_row(row);
        }
    }
    Some(set)
}

/// 从分隔符文本重建：有管道走 Markdown 解析，否则按制表符拆
pub fn from_delimited(text: &str) -> Option<TableRecordSet> {
    if text.contains('|') {
        return from_markdown(text);
    }

    let mut lines = text
        .lines()
        .map(str::trim)
        .filter(|l| l.contains('\t'));

    let headers: Vec<String> = lines
        .next()?
        .split('\t')
        .map(|c| c.trim().to_string())
        .collect();
    if headers.len() < 2 {
        return None;
    }

    let mut set = TableRecordSet::new(headers);
    for line in lines {
        let cells: Vec<String> = line.split('\t').map(|c| c.trim().to_string()).collect();
        set.push_row(cells);
    }
    Some(set)
}
