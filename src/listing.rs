//! 文件列表排序：按名称、上传时间或大小。

use serde::Deserialize;
use std::cmp::Ordering;

use crate::storage::StoredFile;

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    Name,
    #[default]
    Date,
    Size,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortKey {
    pub const ALL: [SortKey; 3] = [SortKey::Date, SortKey::Name, SortKey::Size];

    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::Name => "name",
            SortKey::Date => "date",
            SortKey::Size => "size",
        }
    }
}

impl SortOrder {
    pub const ALL: [SortOrder; 2] = [SortOrder::Desc, SortOrder::Asc];

    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// 列表查询参数；缺省为按上传时间降序。
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListQuery {
    #[serde(default)]
    pub sort: SortKey,
    #[serde(default)]
    pub order: SortOrder,
}

/// 返回排序后的新列表（稳定排序，不修改输入）。
pub fn sort_files(files: &[StoredFile], key: SortKey, order: SortOrder) -> Vec<StoredFile> {
    let mut sorted = files.to_vec();
    sorted.sort_by(|a, b| {
        let ordering = compare(a, b, key);
        match order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
    sorted
}

fn compare(a: &StoredFile, b: &StoredFile, key: SortKey) -> Ordering {
    match key {
        SortKey::Name => a
            .original_name
            .to_lowercase()
            .cmp(&b.original_name.to_lowercase()),
        SortKey::Date => a.created_at.cmp(&b.created_at),
        SortKey::Size => a.size_bytes.cmp(&b.size_bytes),
    }
}
