use anyhow::Context;
use faceid_core::FaceModel;
use std::path::PathBuf;
use std::str::FromStr;

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// Postgres connection string. Required; startup fails without it.
    pub database_url: String,
    /// Address the HTTP server binds to.
    pub bind_addr: String,
    /// Directory containing the ONNX model files.
    pub model_dir: PathBuf,
    /// Recognition model used for extraction and matching.
    pub model: FaceModel,
    /// Maximum accepted multipart upload size in bytes.
    pub max_upload_bytes: usize,
}

impl Config {
    /// Load configuration from `DATABASE_URL` and `FACEID_*` variables.
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .context("DATABASE_URL must be set to the Postgres connection string")?;

        let model = match std::env::var("FACEID_MODEL") {
            Ok(name) => name.parse().context("FACEID_MODEL")?,
            Err(_) => FaceModel::VggFace,
        };

        Ok(Self {
            database_url,
            bind_addr: std::env::var("FACEID_BIND_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:8000".to_string()),
            model_dir: std::env::var("FACEID_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("models")),
            model,
            max_upload_bytes: parse_or(
                std::env::var("FACEID_MAX_UPLOAD_BYTES").ok(),
                8 * 1024 * 1024,
            ),
        })
    }
}

fn parse_or<T: FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_or_uses_default_when_absent() {
        assert_eq!(parse_or::<usize>(None, 42), 42);
    }

    #[test]
    fn test_parse_or_uses_default_when_invalid() {
        assert_eq!(parse_or::<usize>(Some("not-a-number".into()), 42), 42);
    }

    #[test]
    fn test_parse_or_parses_value() {
        assert_eq!(parse_or::<usize>(Some("1024".into()), 42), 1024);
    }
}
