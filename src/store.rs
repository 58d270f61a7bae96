//! 存储模块
//!
//! 负责把剪贴板历史写入本地磁盘。
//!
//! 存储布局：
//! - `history.csv`：每行一条记录 `(时间戳, 类型, 内容)`，文本直接存内容，图片存文件名
//! - `images/`：图片以 PNG 保存，文件名由时间戳和内容摘要组成
//!
//! 写入只追加；删除按日期或全部进行，删除时整体重写历史文件。

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use csv::{ByteRecord, ReaderBuilder, StringRecord, WriterBuilder};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::clipboard::{ClipboardContent, PngImage};
use crate::config;
use crate::entry::{parse_timestamp, Entry, EntryKind, Payload};

/// 存储错误
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("无法访问 {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("历史文件读写失败: {0}")]
    Csv(#[from] csv::Error),
}

impl StoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// 一次捕获：轮询器发现的新内容及其时间
#[derive(Debug, Clone)]
pub struct Capture {
    pub captured_at: NaiveDateTime,
    pub content: ClipboardContent,
}

/// 无法解析的历史行
#[derive(Debug, Error)]
enum MalformedRow {
    #[error("列数应为 3，实际为 {0}")]
    ColumnCount(usize),
    #[error("时间戳无效: {0}")]
    Timestamp(String),
    #[error("{0}")]
    Kind(String),
    #[error("内容不是有效的 UTF-8")]
    Encoding,
}

/// 剪贴板历史存储
///
/// 管理存储根目录下的历史文件和图片目录。
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
    log_path: PathBuf,
    images_dir: PathBuf,
}

impl Store {
    /// 打开存储目录，不存在时创建
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        let images_dir = root.join(config::IMAGES_DIR_NAME);
        fs::create_dir_all(&images_dir).map_err(|e| StoreError::io(&images_dir, e))?;

        Ok(Self {
            log_path: root.join(config::LOG_FILE_NAME),
            images_dir,
            root,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    /// 追加一条捕获
    ///
    /// 图片先写入 PNG 文件，再追加引用该文件的记录；记录写入失败时删除刚写入的图片。
    pub fn append(&self, capture: &Capture) -> Result<Entry, StoreError> {
        let entry = match &capture.content {
            ClipboardContent::Text(text) => Entry::text(capture.captured_at, text.clone()),
            ClipboardContent::Image(image) => {
                let path = self.write_image(capture.captured_at, image)?;
                Entry::image(capture.captured_at, path)
            }
        };

        let content = match &entry.payload {
            Payload::Text(text) => text.clone(),
            Payload::Image(path) => file_name_of(path),
        };
        if let Err(e) = self.append_row(&entry.timestamp(), entry.kind(), &content) {
            if let Payload::Image(path) = &entry.payload {
                if let Err(remove_err) = fs::remove_file(path) {
                    warn!("无法删除未记录的图片 {}: {}", path.display(), remove_err);
                }
            }
            return Err(e);
        }

        debug!("已记录 {} 条目 @ {}", entry.kind(), entry.timestamp());
        Ok(entry)
    }

    /// 写入图片文件，返回完整路径
    fn write_image(&self, captured_at: NaiveDateTime, image: &PngImage) -> Result<PathBuf, StoreError> {
        let stem = format!(
            "{}_{}",
            captured_at.format("%Y%m%d_%H%M%S"),
            &image.digest_hex()[..8]
        );

        let mut path = self.images_dir.join(format!("{}.png", stem));
        let mut suffix = 1;
        while path.exists() {
            path = self.images_dir.join(format!("{}_{}.png", stem, suffix));
            suffix += 1;
        }

        fs::write(&path, image.bytes()).map_err(|e| StoreError::io(&path, e))?;
        Ok(path)
    }

    /// 追加一行到历史文件
    fn append_row(&self, timestamp: &str, kind: EntryKind, content: &str) -> Result<(), StoreError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(|e| StoreError::io(&self.log_path, e))?;

        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        writer.write_record([timestamp, kind.as_str(), content])?;
        writer.flush().map_err(|e| StoreError::io(&self.log_path, e))?;
        Ok(())
    }

    /// 读取全部条目
    ///
    /// 无法解析的行会被跳过并记录警告。图片引用解析为完整路径，但不检查文件是否存在。
    pub fn entries(&self) -> Result<Vec<Entry>, StoreError> {
        Ok(self
            .read_rows()?
            .into_iter()
            .filter_map(|(_, entry)| entry)
            .collect())
    }

    /// 读取原始行及其解析结果
    fn read_rows(&self) -> Result<Vec<(ByteRecord, Option<Entry>)>, StoreError> {
        let file = match File::open(&self.log_path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&self.log_path, e)),
        };

        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(file);

        let mut rows = Vec::new();
        for record in reader.byte_records() {
            let record = match record {
                Ok(record) => record,
                Err(e) if e.is_io_error() => return Err(e.into()),
                Err(e) => {
                    warn!("跳过无法读取的历史行: {}", e);
                    continue;
                }
            };

            let entry = match self.parse_row(&record) {
                Ok(entry) => Some(entry),
                Err(reason) => {
                    let line = record.position().map(|p| p.line()).unwrap_or(0);
                    warn!("跳过第 {} 行历史记录: {}", line, reason);
                    None
                }
            };
            rows.push((record, entry));
        }

        Ok(rows)
    }

    fn parse_row(&self, record: &ByteRecord) -> Result<Entry, MalformedRow> {
        if record.len() != 3 {
            return Err(MalformedRow::ColumnCount(record.len()));
        }
        let record = StringRecord::from_byte_record(record.clone()).map_err(|_| MalformedRow::Encoding)?;

        let captured_at = parse_timestamp(&record[0])
            .ok_or_else(|| MalformedRow::Timestamp(record[0].to_string()))?;
        let kind = record[1].parse::<EntryKind>().map_err(MalformedRow::Kind)?;

        let entry = match kind {
            EntryKind::Text => Entry::text(captured_at, &record[2]),
            EntryKind::Image => Entry::image(captured_at, self.resolve_image(&record[2])),
        };
        Ok(entry)
    }

    /// 图片引用：文件名相对于图片目录；旧版本写入的绝对路径原样使用
    fn resolve_image(&self, reference: &str) -> PathBuf {
        let path = Path::new(reference);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.images_dir.join(path)
        }
    }

    /// 删除指定日期的全部条目及其图片，返回删除的条目数
    pub fn clear_date(&self, date: NaiveDate) -> Result<usize, StoreError> {
        let rows = self.read_rows()?;

        let mut kept = Vec::with_capacity(rows.len());
        let mut removed = Vec::new();
        for (record, entry) in rows {
            match entry {
                Some(entry) if entry.date() == date => removed.push(entry),
                _ => kept.push(record),
            }
        }

        if removed.is_empty() {
            return Ok(0);
        }

        self.rewrite(&kept)?;
        for entry in &removed {
            if let Some(path) = entry.image_path() {
                remove_image(path);
            }
        }

        info!("已清除 {} 的 {} 条记录", date, removed.len());
        Ok(removed.len())
    }

    /// 清空全部历史和图片
    pub fn clear_all(&self) -> Result<(), StoreError> {
        // 旧版本的绝对路径可能指向图片目录之外
        for entry in self.entries()? {
            if let Some(path) = entry.image_path() {
                if !path.starts_with(&self.images_dir) {
                    remove_image(path);
                }
            }
        }

        File::create(&self.log_path).map_err(|e| StoreError::io(&self.log_path, e))?;

        let dir = fs::read_dir(&self.images_dir).map_err(|e| StoreError::io(&self.images_dir, e))?;
        for item in dir {
            let path = item.map_err(|e| StoreError::io(&self.images_dir, e))?.path();
            if path.is_file() {
                fs::remove_file(&path).map_err(|e| StoreError::io(&path, e))?;
            }
        }

        info!("已清空全部历史");
        Ok(())
    }

    /// 用给定的行重写历史文件（先写临时文件再替换）
    fn rewrite(&self, records: &[ByteRecord]) -> Result<(), StoreError> {
        let tmp_path = self.log_path.with_extension("csv.tmp");
        let file = File::create(&tmp_path).map_err(|e| StoreError::io(&tmp_path, e))?;

        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        for record in records {
            writer.write_byte_record(record)?;
        }
        let mut file = writer
            .into_inner()
            .map_err(|e| StoreError::io(&tmp_path, e.into_error()))?;
        file.flush().map_err(|e| StoreError::io(&tmp_path, e))?;
        drop(file);

        fs::rename(&tmp_path, &self.log_path).map_err(|e| StoreError::io(&self.log_path, e))
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

fn remove_image(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("无法删除图片 {}: {}", path.display(), e),
    }
}
