//! 历史条目模块
//!
//! 一条剪贴板历史记录：捕获时间 + 内容（文本或图片文件引用）。
//! 条目写入后不再修改，只会按日期或全部批量删除。

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};

/// 历史文件中使用的时间戳格式（本地时间，ISO 8601）
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// 条目类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Text,
    Image,
}

impl EntryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntryKind::Text => "text",
            EntryKind::Image => "image",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(EntryKind::Text),
            "image" => Ok(EntryKind::Image),
            other => Err(format!("未知条目类型: {}", other)),
        }
    }
}

/// 条目内容
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// 文本内容
    Text(String),
    /// 图片文件的完整路径
    Image(PathBuf),
}

/// 一条剪贴板历史
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub captured_at: NaiveDateTime,
    pub payload: Payload,
}

impl Entry {
    pub fn text(captured_at: NaiveDateTime, text: impl Into<String>) -> Self {
        Self {
            captured_at,
            payload: Payload::Text(text.into()),
        }
    }

    pub fn image(captured_at: NaiveDateTime, path: impl Into<PathBuf>) -> Self {
        Self {
            captured_at,
            payload: Payload::Image(path.into()),
        }
    }

    pub fn kind(&self) -> EntryKind {
        match self.payload {
            Payload::Text(_) => EntryKind::Text,
            Payload::Image(_) => EntryKind::Image,
        }
    }

    /// 所属日期（按本地日历日分组）
    pub fn date(&self) -> NaiveDate {
        self.captured_at.date()
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.payload {
            Payload::Text(text) => Some(text),
            Payload::Image(_) => None,
        }
    }

    pub fn image_path(&self) -> Option<&Path> {
        match &self.payload {
            Payload::Text(_) => None,
            Payload::Image(path) => Some(path),
        }
    }

    /// 列表中显示的时间，如 `14:03:27`
    pub fn time_label(&self) -> String {
        self.captured_at.format("%H:%M:%S").to_string()
    }

    /// 写入历史文件的时间戳
    pub fn timestamp(&self) -> String {
        self.captured_at.format(TIMESTAMP_FORMAT).to_string()
    }
}

/// 解析历史文件中的时间戳
///
/// 接受任意精度的小数秒（包括没有小数部分）。
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    raw.trim().parse::<NaiveDateTime>().ok()
}

/// 截断文本用于列表预览
///
/// 按字符计数，超出部分以 `...` 结尾；首尾空白会被去掉。
pub fn preview(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", head.trim())
    } else {
        head.trim().to_string()
    }
}
