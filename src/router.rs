//! 路由组装：公开路由、需登录路由与上传目录静态挂载。

use axum::extract::{DefaultBodyLimit, Extension};
use axum::routing::{delete, get, post};
use axum::{Router, middleware};
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::auth::{self, AuthConfig};
use crate::files;
use crate::http::{add_security_headers, make_request_span};
use crate::pages;
use crate::storage::Storage;
use crate::upload::{self, UploadConfig};

/// 构建完整的应用路由。
pub fn build_router(
    storage: Arc<Storage>,
    auth_config: Arc<AuthConfig>,
    upload_config: Arc<UploadConfig>,
) -> Router {
    let protected = Router::new()
        .route("/view", get(files::view_files))
        .route("/api/files", get(files::list_files))
        .route("/download/{name}", get(files::download_file))
        .route("/delete/{name}", delete(files::delete_file))
        .route_layer(middleware::from_fn(auth::require_auth));

    Router::new()
        .route("/", get(pages::upload_page))
        .route("/login", get(auth::login_page).post(auth::login_submit))
        .route("/logout", get(auth::logout))
        .route(
            "/upload",
            post(upload::upload_files).layer(DefaultBodyLimit::disable()),
        )
        .merge(protected)
        .nest_service("/uploads", ServeDir::new(storage.root_path()))
        .layer(middleware::from_fn(add_security_headers))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(make_request_span)
                .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(Extension(storage))
        .layer(Extension(auth_config))
        .layer(Extension(upload_config))
}
