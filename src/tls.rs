//! TLS 证书加载与自签名生成。

use axum_server::tls_rustls::RustlsConfig;
use rcgen::generate_simple_self_signed;
use std::fmt;
use std::io;
use std::net::IpAddr;
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::config::Args;

#[derive(Debug)]
pub enum CertGenerationError {
    Generate(rcgen::Error),
    Write(io::Error),
}

impl fmt::Display for CertGenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CertGenerationError::Generate(err) => {
                write!(f, "failed to generate self-signed certificate: {err}")
            }
            CertGenerationError::Write(err) => {
                write!(f, "failed to write self-signed certificate: {err}")
            }
        }
    }
}

impl std::error::Error for CertGenerationError {}

/// 构建 Rustls 配置；证书或私钥缺失时先生成自签名证书。
pub async fn build_rustls_config(args: &Args, host: IpAddr) -> Result<RustlsConfig, io::Error> {
    let cert_path = Path::new(&args.tls_cert);
    let key_path = Path::new(&args.tls_key);

    if !fs::try_exists(cert_path).await? || !fs::try_exists(key_path).await? {
        info!("generating self-signed certificate");
        generate_self_signed(cert_path, key_path, host)
            .await
            .map_err(io::Error::other)?;
    }

    let cert = fs::read(cert_path).await?;
    let key = fs::read(key_path).await?;
    RustlsConfig::from_pem(cert, key).await
}

/// 为 `localhost` 与绑定地址生成自签名证书并写入指定路径。
///
/// 私钥文件在 unix 上仅属主可读写。
async fn generate_self_signed(
    cert_path: &Path,
    key_path: &Path,
    host: IpAddr,
) -> Result<(), CertGenerationError> {
    let mut subject_alt_names = vec!["localhost".to_string()];
    if !host.is_unspecified() {
        subject_alt_names.push(host.to_string());
    }
    let cert =
        generate_simple_self_signed(subject_alt_names).map_err(CertGenerationError::Generate)?;
    fs::write(cert_path, cert.cert.pem())
        .await
        .map_err(CertGenerationError::Write)?;
    write_private_key(key_path, cert.key_pair.serialize_pem().as_bytes())
        .await
        .map_err(CertGenerationError::Write)?;
    info!(cert = ?cert_path, key = ?key_path, "self-signed certificate written");
    Ok(())
}

#[cfg(unix)]
async fn write_private_key(path: &Path, pem: &[u8]) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .await?;
    file.write_all(pem).await?;
    file.flush().await?;
    // 已存在的文件不受 mode 影响
    fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await
}

#[cfg(not(unix))]
async fn write_private_key(path: &Path, pem: &[u8]) -> io::Result<()> {
    fs::write(path, pem).await
}
