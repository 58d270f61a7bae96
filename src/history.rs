//! 历史索引模块
//!
//! 把存储中的全部条目读入内存并按日期分组，供界面显示和搜索。
//! 每次调用 `load` 都完整重新读取，不做增量索引。

use chrono::NaiveDate;
use tracing::debug;

use crate::entry::Entry;
use crate::store::{Store, StoreError};

/// 同一天的条目，按捕获时间升序
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateBucket {
    pub date: NaiveDate,
    pub entries: Vec<Entry>,
}

/// 按日期分组的历史
///
/// 日期降序（最近的在前），同一天内按时间升序。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryIndex {
    buckets: Vec<DateBucket>,
}

impl HistoryIndex {
    /// 从存储加载，跳过图片文件已不存在的条目
    pub fn load(store: &Store) -> Result<Self, StoreError> {
        let entries = store.entries()?;
        let total = entries.len();

        let available: Vec<Entry> = entries
            .into_iter()
            .filter(|entry| match entry.image_path() {
                Some(path) if !path.is_file() => {
                    debug!("图片文件已不存在，跳过: {}", path.display());
                    false
                }
                _ => true,
            })
            .collect();

        debug!("加载历史: {} 条，其中 {} 条可用", total, available.len());
        Ok(Self::from_entries(available))
    }

    /// 对任意顺序的条目分组排序
    pub fn from_entries(mut entries: Vec<Entry>) -> Self {
        // 稳定排序：同一时刻的条目保持写入顺序
        entries.sort_by_key(|entry| entry.captured_at);

        let mut buckets: Vec<DateBucket> = Vec::new();
        for entry in entries {
            match buckets.last_mut() {
                Some(bucket) if bucket.date == entry.date() => bucket.entries.push(entry),
                _ => buckets.push(DateBucket {
                    date: entry.date(),
                    entries: vec![entry],
                }),
            }
        }
        buckets.reverse();

        Self { buckets }
    }

    pub fn buckets(&self) -> &[DateBucket] {
        &self.buckets
    }

    pub fn bucket(&self, date: NaiveDate) -> Option<&DateBucket> {
        self.buckets.iter().find(|bucket| bucket.date == date)
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.buckets.iter().map(|bucket| bucket.date)
    }

    /// 最近捕获的条目
    pub fn latest(&self) -> Option<&Entry> {
        self.buckets.first().and_then(|bucket| bucket.entries.last())
    }

    /// 条目总数
    pub fn len(&self) -> usize {
        self.buckets.iter().map(|bucket| bucket.entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// 在所有日期的文本条目中搜索（不区分大小写）
    ///
    /// 结果顺序与列表一致：日期降序，同一天内时间升序。图片条目不参与搜索。
    pub fn search(&self, query: &str) -> Vec<&Entry> {
        let needle = query.to_lowercase();
        self.buckets
            .iter()
            .flat_map(|bucket| bucket.entries.iter())
            .filter(|entry| {
                entry
                    .as_text()
                    .is_some_and(|text| text.to_lowercase().contains(&needle))
            })
            .collect()
    }
}
