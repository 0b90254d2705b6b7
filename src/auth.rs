//! 认证处理：共享口令登录、会话存储与访问守卫。

use axum::body::Body as AxumBody;
use axum::extract::rejection::FormRejection;
use axum::extract::{Extension, Form, Query};
use axum::http::Request;
use axum::middleware;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum_extra::extract::{
    CookieJar,
    cookie::{Cookie, SameSite},
};
use cookie::time::Duration as CookieDuration;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{MAX_SESSION_TTL_SECS, SESSION_COOKIE_NAME};
use crate::error::ApiError;
use crate::pages;

#[derive(Debug)]
pub struct AuthConfig {
    pub password: String,
    pub sessions: Mutex<HashMap<String, SessionEntry>>,
    pub session_ttl: Duration,
}

#[derive(Debug)]
pub struct SessionEntry {
    pub expires_at: Instant,
}

#[derive(Debug, PartialEq, Eq)]
pub enum AuthError {
    InvalidCredentials,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::InvalidCredentials => f.write_str("invalid credentials"),
        }
    }
}

/// 未登录时的导航结果：重定向到登录页。
#[derive(Debug)]
pub struct RedirectToLogin;

impl IntoResponse for RedirectToLogin {
    fn into_response(self) -> Response {
        Redirect::to("/login").into_response()
    }
}

impl AuthConfig {
    /// 会话有效期上限为 `MAX_SESSION_TTL_SECS`。
    pub fn new(password: String, session_ttl: Duration) -> Self {
        Self {
            password,
            sessions: Mutex::new(HashMap::new()),
            session_ttl: session_ttl.min(Duration::from_secs(MAX_SESSION_TTL_SECS)),
        }
    }
}

/// 校验口令，成功时创建会话并返回令牌。
pub async fn login(auth: &AuthConfig, password: &str) -> Result<String, AuthError> {
    if !constant_time_eq(password.as_bytes(), auth.password.as_bytes()) {
        return Err(AuthError::InvalidCredentials);
    }

    let token = Uuid::new_v4().to_string();
    let expires_at = Instant::now() + auth.session_ttl;
    let mut sessions = auth.sessions.lock().await;
    sessions.insert(token.clone(), SessionEntry { expires_at });
    Ok(token)
}

/// 根据请求 Cookie 判断会话是否有效。
pub async fn check_session(auth: &AuthConfig, jar: &CookieJar) -> Result<(), RedirectToLogin> {
    match jar.get(SESSION_COOKIE_NAME) {
        Some(cookie) if is_session_valid(auth, cookie.value()).await => Ok(()),
        _ => Err(RedirectToLogin),
    }
}

/// 访问守卫中间件：未登录请求被重定向到登录页。
pub async fn require_auth(
    Extension(auth): Extension<Arc<AuthConfig>>,
    jar: CookieJar,
    req: Request<AxumBody>,
    next: middleware::Next,
) -> Response {
    match check_session(&auth, &jar).await {
        Ok(()) => next.run(req).await,
        Err(redirect) => redirect.into_response(),
    }
}

#[derive(Deserialize)]
pub(crate) struct LoginPageQuery {
    error: Option<String>,
}

/// 登录页；`error` 参数存在时显示错误提示。
pub async fn login_page(Query(query): Query<LoginPageQuery>) -> Result<Html<String>, ApiError> {
    pages::login_page(query.error.is_some())
}

#[derive(Deserialize)]
pub(crate) struct LoginForm {
    #[serde(default)]
    password: String,
}

/// 登录表单提交：成功写入会话 Cookie 并跳转文件列表。
///
/// 无法解析的表单与错误口令一样跳回登录页。
pub async fn login_submit(
    Extension(auth): Extension<Arc<AuthConfig>>,
    jar: CookieJar,
    form: Result<Form<LoginForm>, FormRejection>,
) -> (CookieJar, Redirect) {
    let form = match form {
        Ok(Form(form)) => form,
        Err(rejection) => {
            warn!(error = %rejection, "login form rejected");
            return (jar, Redirect::to("/login?error=1"));
        }
    };
    let token = match login(&auth, &form.password).await {
        Ok(token) => token,
        Err(err) => {
            warn!(error = %err, "login rejected");
            return (jar, Redirect::to("/login?error=1"));
        }
    };

    info!("login accepted");
    let cookie = Cookie::build((SESSION_COOKIE_NAME, token))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Strict)
        .max_age(CookieDuration::seconds(
            i64::try_from(auth.session_ttl.as_secs()).unwrap_or(i64::MAX),
        ))
        .build();
    (jar.add(cookie), Redirect::to("/view"))
}

/// 登出：清理会话并删除 Cookie。
pub async fn logout(
    Extension(auth): Extension<Arc<AuthConfig>>,
    jar: CookieJar,
) -> (CookieJar, Redirect) {
    if let Some(cookie) = jar.get(SESSION_COOKIE_NAME) {
        remove_session(&auth, cookie.value()).await;
    }

    (
        jar.remove(Cookie::build(SESSION_COOKIE_NAME).path("/").build()),
        Redirect::to("/"),
    )
}

async fn is_session_valid(auth: &AuthConfig, token: &str) -> bool {
    let mut sessions = auth.sessions.lock().await;
    let now = Instant::now();
    match sessions.get(token) {
        Some(entry) if entry.expires_at > now => true,
        _ => {
            sessions.remove(token);
            false
        }
    }
}

async fn remove_session(auth: &AuthConfig, token: &str) {
    let mut sessions = auth.sessions.lock().await;
    sessions.remove(token);
}

/// 清理过期会话。
pub async fn prune_expired_sessions(auth: &AuthConfig) {
    let mut sessions = auth.sessions.lock().await;
    let now = Instant::now();
    sessions.retain(|_, entry| entry.expires_at > now);
}

fn constant_time_eq(left: &[u8], right: &[u8]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    left.iter()
        .zip(right)
        .fold(0u8, |acc, (l, r)| acc | (l ^ r))
        == 0
}
