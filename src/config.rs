//! CLI arguments and server configuration defaults.

use clap::Parser;
use shadow_rs::formatcp;

use crate::build;

const VERSION_INFO: &str = formatcp!(
    r#"{}\ncommit_hash: {}\nbuild_time: {}\nbuild_env: {},{}"#,
    build::PKG_VERSION,
    build::SHORT_COMMIT,
    build::BUILD_TIME,
    build::RUST_VERSION,
    build::RUST_CHANNEL
);

pub const DEFAULT_PASSWORD: &str = "admin123";
pub const SESSION_COOKIE_NAME: &str = "UPLOADBOX_SESSION";
pub const UPLOAD_FIELD_NAME: &str = "files";
pub const DEFAULT_PORT: u16 = 3443;
pub const DEFAULT_SESSION_TTL_SECS: u64 = 60 * 60;
pub const MAX_SESSION_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;
pub const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;
pub const SESSION_PRUNE_INTERVAL_SECS: u64 = 300;

/// CLI arguments and environment configuration for the server.
#[derive(Parser, Debug)]
#[command(name = "uploadbox", version = VERSION_INFO, about = "Self-hosted file upload portal")]
pub struct Args {
    #[arg(
        short = 's',
        long,
        env = "UPLOADBOX_STORAGE_DIR",
        default_value = "uploads",
        help = "Directory holding uploaded files"
    )]
    pub storage_dir: String,
    #[arg(
        long,
        env = "UPLOADBOX_PASSWORD",
        default_value = DEFAULT_PASSWORD,
        hide_env_values = true,
        help = "Password for the file list"
    )]
    pub password: String,
    #[arg(
        short = 'b',
        long = "bind",
        env = "UPLOADBOX_BIND",
        default_value = "0.0.0.0",
        help = "Bind address"
    )]
    pub host: String,
    #[arg(
        short = 'p',
        long,
        env = "UPLOADBOX_PORT",
        default_value_t = DEFAULT_PORT,
        help = "HTTPS port"
    )]
    pub port: u16,
    #[arg(
        short = 'c',
        long,
        env = "UPLOADBOX_TLS_CERT",
        default_value = "server.cert",
        help = "TLS cert path, generated when missing"
    )]
    pub tls_cert: String,
    #[arg(
        short = 'k',
        long,
        env = "UPLOADBOX_TLS_KEY",
        default_value = "server.key",
        help = "TLS key path, generated when missing"
    )]
    pub tls_key: String,
    #[arg(
        long,
        env = "UPLOADBOX_SESSION_TTL_SECS",
        default_value_t = DEFAULT_SESSION_TTL_SECS,
        value_parser = clap::value_parser!(u64).range(1..=MAX_SESSION_TTL_SECS),
        help = "Session expiration in seconds"
    )]
    pub session_ttl_secs: u64,
    #[arg(
        long,
        env = "UPLOADBOX_MAX_FILE_SIZE",
        default_value_t = DEFAULT_MAX_FILE_SIZE,
        help = "Max size per uploaded file in bytes (0 to disable)"
    )]
    pub max_file_size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_setup() {
        let args = Args::try_parse_from(["uploadbox"]).expect("parse");
        assert_eq!(args.port, 3443);
        assert_eq!(args.storage_dir, "uploads");
        assert_eq!(args.session_ttl_secs, 3600);
        assert_eq!(args.max_file_size, 100 * 1024 * 1024);
        assert_eq!(args.tls_cert, "server.cert");
        assert_eq!(args.tls_key, "server.key");
    }

    #[test]
    fn flags_override_defaults() {
        let args = Args::try_parse_from([
            "uploadbox",
            "-s",
            "/srv/drop",
            "--password",
            "hunter2",
            "-p",
            "8443",
            "--max-file-size",
            "0",
        ])
        .expect("parse");
        assert_eq!(args.storage_dir, "/srv/drop");
        assert_eq!(args.password, "hunter2");
        assert_eq!(args.port, 8443);
        assert_eq!(args.max_file_size, 0);
    }

    #[test]
    fn session_ttl_must_be_in_range() {
        let args = Args::try_parse_from(["uploadbox", "--session-ttl-secs", "86400"]).expect("parse");
        assert_eq!(args.session_ttl_secs, 86400);

        for value in ["0", "18446744073709551615"] {
            let result = Args::try_parse_from(["uploadbox", "--session-ttl-secs", value]);
            assert!(result.is_err(), "{value}");
        }
    }
}
