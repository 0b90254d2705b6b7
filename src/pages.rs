//! 嵌入式页面：上传页、登录页与文件列表页。

use axum::response::Html;
use rust_embed::RustEmbed;

use crate::error::ApiError;
use crate::listing::{SortKey, SortOrder};
use crate::storage::StoredFile;

#[derive(RustEmbed)]
#[folder = "static/"]
/// 嵌入式页面模板。
pub struct PageAssets;

const LOGIN_ERROR_HTML: &str =
    r#"<div class="error">Invalid password. Please try again.</div>"#;
const EMPTY_LIST_HTML: &str =
    r#"<div class="empty-state"><h3>No files uploaded yet</h3><p>Upload some files to get started!</p></div>"#;

/// 上传页处理器。
pub async fn upload_page() -> Result<Html<String>, ApiError> {
    load_template("index.html").map(Html)
}

pub fn login_page(show_error: bool) -> Result<Html<String>, ApiError> {
    let template = load_template("login.html")?;
    let error = if show_error { LOGIN_ERROR_HTML } else { "" };
    Ok(Html(template.replace("{{error}}", error)))
}

/// 渲染文件列表页，`files` 须已按 `key`/`order` 排好序。
pub fn file_list_page(
    files: &[StoredFile],
    key: SortKey,
    order: SortOrder,
) -> Result<Html<String>, ApiError> {
    let template = load_template("view.html")?;
    let cards = if files.is_empty() {
        EMPTY_LIST_HTML.to_string()
    } else {
        files.iter().map(render_card).collect::<String>()
    };
    let sort_options = SortKey::ALL
        .iter()
        .map(|k| render_option(k.as_str(), sort_label(*k), *k == key))
        .collect::<String>();
    let order_options = SortOrder::ALL
        .iter()
        .map(|o| render_option(o.as_str(), order_label(*o), *o == order))
        .collect::<String>();

    Ok(Html(
        template
            .replace("{{count}}", &files.len().to_string())
            .replace("{{sort_options}}", &sort_options)
            .replace("{{order_options}}", &order_options)
            .replace("{{files}}", &cards),
    ))
}

fn render_card(file: &StoredFile) -> String {
    let href = format!("/download/{}", urlencoding::encode(&file.stored_name));
    format!(
        r#"<div class="file-card">
<div class="file-name">{name}</div>
<div class="file-meta"><span>{date}</span><span>{size}</span></div>
<div class="file-actions"><a href="{href}" class="btn btn-small">Download</a><button class="btn btn-danger btn-small" data-name="{stored}" onclick="deleteFile(this.dataset.name)">Delete</button></div>
</div>
"#,
        name = escape_html(&file.original_name),
        date = file.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
        size = format_size(file.size_bytes),
        href = escape_html(&href),
        stored = escape_html(&file.stored_name),
    )
}

fn render_option(value: &str, label: &str, selected: bool) -> String {
    let selected = if selected { " selected" } else { "" };
    format!(r#"<option value="{value}"{selected}>{label}</option>"#)
}

fn sort_label(key: SortKey) -> &'static str {
    match key {
        SortKey::Date => "Sort by Upload Date",
        SortKey::Name => "Sort by File Name",
        SortKey::Size => "Sort by File Size",
    }
}

fn order_label(order: SortOrder) -> &'static str {
    match order {
        SortOrder::Desc => "Descending",
        SortOrder::Asc => "Ascending",
    }
}

fn load_template(path: &str) -> Result<String, ApiError> {
    let asset = PageAssets::get(path)
        .ok_or_else(|| ApiError::Internal(format!("missing page template {path}")))?;
    String::from_utf8(asset.data.into_owned())
        .map_err(|_| ApiError::Internal(format!("page template {path} is not utf-8")))
}

/// 以 MB 为单位显示大小，保留两位小数。
pub fn format_size(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / 1024.0 / 1024.0)
}

pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
