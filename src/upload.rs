//! multipart 上传处理：逐块流式写入存储目录。

use axum::extract::{Extension, Multipart, multipart::Field};
use axum::response::Json as JsonResponse;
use chrono::Utc;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::codec;
use crate::config::UPLOAD_FIELD_NAME;
use crate::error::ApiError;
use crate::storage::{Storage, StorageError};

#[derive(Debug)]
pub struct UploadConfig {
    /// 单个文件的大小上限（字节），0 表示不限制。
    pub max_file_size: u64,
}

#[derive(Debug)]
pub enum UploadError {
    TooLarge { file_name: String, limit: u64 },
    InvalidName(String),
    Multipart(String),
    Storage(StorageError),
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadError::TooLarge { file_name, limit } => {
                write!(f, "{file_name} exceeds the {limit} byte limit")
            }
            UploadError::InvalidName(name) => write!(f, "invalid file name: {name:?}"),
            UploadError::Multipart(msg) => write!(f, "malformed upload: {msg}"),
            UploadError::Storage(err) => write!(f, "{err}"),
        }
    }
}

impl From<StorageError> for UploadError {
    fn from(err: StorageError) -> Self {
        UploadError::Storage(err)
    }
}

impl From<std::io::Error> for UploadError {
    fn from(err: std::io::Error) -> Self {
        UploadError::Storage(StorageError::Io(err))
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::TooLarge { .. } => ApiError::PayloadTooLarge(err.to_string()),
            UploadError::InvalidName(_) | UploadError::Multipart(_) => {
                ApiError::BadRequest(err.to_string())
            }
            UploadError::Storage(err) => err.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UploadSummary {
    pub success: bool,
    pub message: String,
    pub count: usize,
}

/// 上传接口：保存 `files` 字段中的全部文件。
pub async fn upload_files(
    Extension(storage): Extension<Arc<Storage>>,
    Extension(upload): Extension<Arc<UploadConfig>>,
    multipart: Multipart,
) -> Result<JsonResponse<UploadSummary>, ApiError> {
    let count = store_multipart(&storage, &upload, multipart)
        .await
        .inspect_err(|err| warn!(error = %err, "upload failed"))?;
    info!(count, "upload request complete");
    Ok(JsonResponse(UploadSummary {
        success: true,
        message: "Files uploaded successfully".to_string(),
        count,
    }))
}

/// 依次写入每个文件字段，返回写入的文件数。
///
/// 某个字段失败时立即返回错误；此前已写入的文件保留。
pub async fn store_multipart(
    storage: &Storage,
    upload: &UploadConfig,
    mut multipart: Multipart,
) -> Result<usize, UploadError> {
    let mut count = 0;
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|err| UploadError::Multipart(err.body_text()))?
    {
        if field.name() != Some(UPLOAD_FIELD_NAME) {
            debug!(field = ?field.name(), "skip non-file field");
            continue;
        }
        // 未选择文件的表单项会带上空文件名
        let Some(original_name) = field
            .file_name()
            .filter(|name| !name.is_empty())
            .map(str::to_owned)
        else {
            continue;
        };
        if !codec::is_safe_name(&original_name) {
            return Err(UploadError::InvalidName(original_name));
        }

        let stored_name = codec::encode(&original_name, Utc::now());
        let size = write_field(storage, upload, &stored_name, &original_name, &mut field).await?;
        info!(stored_name, size, "file stored");
        count += 1;
    }
    Ok(count)
}

async fn write_field(
    storage: &Storage,
    upload: &UploadConfig,
    stored_name: &str,
    original_name: &str,
    field: &mut Field<'_>,
) -> Result<u64, UploadError> {
    let (path, mut file) = storage.create(stored_name).await?;
    let write_result: Result<u64, UploadError> = async {
        let mut total_written: u64 = 0;
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|err| UploadError::Multipart(err.body_text()))?
        {
            total_written += chunk.len() as u64;
            if upload.max_file_size > 0 && total_written > upload.max_file_size {
                return Err(UploadError::TooLarge {
                    file_name: original_name.to_string(),
                    limit: upload.max_file_size,
                });
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(total_written)
    }
    .await;

    if write_result.is_err() {
        drop(file);
        if let Err(err) = fs::remove_file(&path).await {
            warn!(path = ?path, error = %err, "failed to remove partial upload");
        }
    }
    write_result
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body as AxumBody;
    use axum::extract::FromRequest;
    use axum::http::{Request, header};
    use tempfile::tempdir;

    const BOUNDARY: &str = "uploadbox-test-boundary";

    fn make_storage() -> (tempfile::TempDir, Arc<Storage>) {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("uploads");
        std::fs::create_dir_all(&root).expect("create storage root");
        (temp, Arc::new(Storage::new(root)))
    }

    async fn multipart(parts: &[(&str, Option<&str>, &[u8])]) -> Multipart {
        let mut body = Vec::new();
        for (name, file_name, data) in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            let disposition = match file_name {
                Some(file_name) => format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                ),
                None => format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n"),
            };
            body.extend_from_slice(disposition.as_bytes());
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        let request = Request::builder()
            .method("POST")
            .uri("/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(AxumBody::from(body))
            .expect("request");
        Multipart::from_request(request, &())
            .await
            .unwrap_or_else(|_| panic!("multipart rejected"))
    }

    fn stored_names(storage: &Storage) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(storage.root_path())
            .expect("read dir")
            .map(|entry| entry.expect("entry").file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn upload_stores_each_file_with_prefix() {
        let (_temp, storage) = make_storage();
        let upload = Arc::new(UploadConfig { max_file_size: 1024 });
        let body = multipart(&[
            ("files", Some("report.pdf"), b"pdf-bytes"),
            ("files", Some("notes.txt"), b"hello"),
        ])
        .await;

        let JsonResponse(summary) = upload_files(Extension(storage.clone()), Extension(upload), body)
            .await
            .unwrap_or_else(|_| panic!("upload failed"));
        assert!(summary.success);
        assert_eq!(summary.count, 2);

        let files = storage.list().await.expect("list");
        let mut originals: Vec<&str> = files.iter().map(|f| f.original_name.as_str()).collect();
        originals.sort();
        assert_eq!(originals, ["notes.txt", "report.pdf"]);
        for file in &files {
            assert_eq!(codec::encode(&file.original_name, file.created_at), file.stored_name);
        }
    }

    #[tokio::test]
    async fn upload_skips_other_fields_and_nameless_parts() {
        let (_temp, storage) = make_storage();
        let upload = UploadConfig { max_file_size: 0 };
        let body = multipart(&[
            ("comment", None, b"hi"),
            ("other", Some("x.txt"), b"x"),
            ("files", None, b"no name"),
            ("files", Some(""), b""),
            ("files", Some("kept.txt"), b"kept"),
        ])
        .await;

        let count = store_multipart(&storage, &upload, body)
            .await
            .expect("store");
        assert_eq!(count, 1);
        let names = stored_names(&storage);
        assert_eq!(names.len(), 1);
        assert_eq!(codec::decode(&names[0]), "kept.txt");
    }

    #[tokio::test]
    async fn empty_file_input_is_skipped() {
        let (_temp, storage) = make_storage();
        let upload = UploadConfig { max_file_size: 0 };
        let body = multipart(&[("files", Some(""), b"")]).await;

        let count = store_multipart(&storage, &upload, body)
            .await
            .expect("store");
        assert_eq!(count, 0);
        assert!(stored_names(&storage).is_empty());
    }

    #[tokio::test]
    async fn oversized_file_fails_but_earlier_files_stay() {
        let (_temp, storage) = make_storage();
        let upload = UploadConfig { max_file_size: 4 };
        let body = multipart(&[
            ("files", Some("small.txt"), b"1234"),
            ("files", Some("big.txt"), b"123456789"),
        ])
        .await;

        let result = store_multipart(&storage, &upload, body).await;
        assert!(matches!(result, Err(UploadError::TooLarge { ref file_name, limit: 4 }) if file_name == "big.txt"));

        let names = stored_names(&storage);
        assert_eq!(names.len(), 1);
        assert_eq!(codec::decode(&names[0]), "small.txt");
        let contents = std::fs::read(storage.root_path().join(&names[0])).expect("read");
        assert_eq!(contents, b"1234");
    }

    #[tokio::test]
    async fn too_large_maps_to_413() {
        let err = ApiError::from(UploadError::TooLarge {
            file_name: "big.txt".into(),
            limit: 1,
        });
        assert!(matches!(err, ApiError::PayloadTooLarge(_)));
    }

    #[tokio::test]
    async fn upload_rejects_traversal_name() {
        let (temp, storage) = make_storage();
        let upload = UploadConfig { max_file_size: 0 };
        let body = multipart(&[("files", Some("../escape.txt"), b"x")]).await;

        let result = store_multipart(&storage, &upload, body).await;
        assert!(matches!(result, Err(UploadError::InvalidName(_))));
        assert!(stored_names(&storage).is_empty());
        assert!(!temp.path().join("escape.txt").exists());
    }
}
