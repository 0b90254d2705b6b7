//! 存储目录：扁平目录下的文件解析、枚举、创建与删除。

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::ErrorKind;
use tracing::debug;

use crate::codec;

#[derive(Clone, Debug)]
pub struct Storage {
    root: PathBuf,
}

/// 存储目录中的一个条目，展示名与时间均由文件名和文件元数据推导。
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    pub stored_name: String,
    pub original_name: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

impl Storage {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub async fn ensure_root(&self) -> io::Result<()> {
        fs::create_dir_all(&self.root).await
    }

    pub fn root_path(&self) -> &Path {
        &self.root
    }

    /// 将存储文件名解析为目录内的路径，拒绝分隔符、`..` 与符号链接。
    pub async fn resolve_checked(
        &self,
        stored_name: &str,
        allow_missing: bool,
    ) -> Result<PathBuf, StorageError> {
        if !codec::is_safe_name(stored_name) {
            return Err(StorageError::InvalidPath);
        }
        let target = self.root.join(stored_name);
        match fs::symlink_metadata(&target).await {
            Ok(metadata) if metadata.file_type().is_symlink() => Err(StorageError::InvalidPath),
            Ok(_) => Ok(target),
            Err(err) if err.kind() == ErrorKind::NotFound && allow_missing => Ok(target),
            Err(err) => Err(StorageError::Io(err)),
        }
    }

    /// 扫描存储目录并返回全部条目（不排除任何条目，顺序由文件系统决定）。
    pub async fn list(&self) -> Result<Vec<StoredFile>, StorageError> {
        let mut dir = fs::read_dir(&self.root).await?;
        let mut files = Vec::new();

        while let Some(entry) = dir.next_entry().await? {
            let stored_name = entry.file_name().to_string_lossy().to_string();
            if let Some(file) = stored_file(stored_name, entry.metadata().await)? {
                files.push(file);
            }
        }

        Ok(files)
    }

    /// 打开已存储的普通文件用于读取。
    pub async fn open(&self, stored_name: &str) -> Result<(File, Metadata), StorageError> {
        let target = self.resolve_checked(stored_name, false).await?;
        let metadata = fs::metadata(&target).await?;
        if !metadata.is_file() {
            return Err(StorageError::InvalidPath);
        }
        let file = File::open(&target).await?;
        Ok((file, metadata))
    }

    /// 以截断方式创建目标文件；同名文件被覆盖。
    pub async fn create(&self, stored_name: &str) -> Result<(PathBuf, File), StorageError> {
        let target = self.resolve_checked(stored_name, true).await?;
        let file = File::create(&target).await?;
        Ok((target, file))
    }

    /// 删除已存储的文件；不存在时返回 NotFound 类 IO 错误。
    pub async fn remove(&self, stored_name: &str) -> Result<(), StorageError> {
        let target = self.resolve_checked(stored_name, false).await?;
        let metadata = fs::metadata(&target).await?;
        if metadata.is_dir() {
            return Err(StorageError::InvalidPath);
        }
        fs::remove_file(target).await?;
        Ok(())
    }
}

/// 由目录条目构造 `StoredFile`；扫描期间被删除的条目返回 `None`。
fn stored_file(
    stored_name: String,
    metadata: io::Result<Metadata>,
) -> Result<Option<StoredFile>, StorageError> {
    let metadata = match metadata {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!(stored_name, "entry removed during listing");
            return Ok(None);
        }
        Err(err) => return Err(err.into()),
    };
    Ok(Some(StoredFile {
        original_name: codec::decode(&stored_name).to_string(),
        size_bytes: metadata.len(),
        created_at: created_at(&stored_name, &metadata),
        stored_name,
    }))
}

/// 上传时间优先取文件名前缀，其次为文件系统的创建/修改时间。
fn created_at(stored_name: &str, metadata: &Metadata) -> DateTime<Utc> {
    codec::parse_timestamp(stored_name)
        .or_else(|| {
            metadata
                .created()
                .or_else(|_| metadata.modified())
                .ok()
                .map(DateTime::<Utc>::from)
        })
        .unwrap_or_default()
}

#[derive(Debug)]
pub enum StorageError {
    InvalidPath,
    Io(io::Error),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::InvalidPath => f.write_str("invalid path"),
            StorageError::Io(err) => write!(f, "{err}"),
        }
    }
}

impl From<io::Error> for StorageError {
    fn from(err: io::Error) -> Self {
        StorageError::Io(err)
    }
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::Io(err) if err.kind() == ErrorKind::NotFound)
    }
}
