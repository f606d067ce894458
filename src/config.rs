use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Staging,
    Prod,
}

impl Environment {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "prod" | "production" => Self::Prod,
            "staging" => Self::Staging,
            _ => Self::Dev,
        }
    }

    pub fn is_dev(&self) -> bool {
        matches!(self, Self::Dev)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dev => "dev",
            Self::Staging => "staging",
            Self::Prod => "prod",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub env: Environment,
    pub server_addr: String,

    // CORS
    pub cors_allow_origins: Vec<String>,

    // Gemini API
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub gemini_structured_output: bool,
    pub gemini_timeout_seconds: u64,
    pub gemini_max_retry_seconds: u64,

    // Upload pipeline
    pub max_upload_bytes: usize,
    pub max_image_dimension_px: u32,
    pub jpeg_quality: u8,
    pub allowed_mime_types: Vec<String>,
    pub request_deadline_seconds: u64,
    pub upload_dir: Option<PathBuf>,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let env = Environment::from_str(&env::var("ENV").unwrap_or_else(|_| "dev".to_string()));
        let server_addr = env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:5000".to_string());

        // CORS
        let cors_allow_origins = env::var("CORS_ALLOW_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        // Gemini API. The key is required with no fallback: a missing
        // credential must stop startup, not degrade into a shared default.
        let gemini_api_key = env::var("GEMINI_API_KEY")
            .context("GEMINI_API_KEY must be set (there is no fallback credential)")?;
        let gemini_model =
            env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-2.0-flash".to_string());
        let gemini_base_url = env::var("GEMINI_BASE_URL")
            .unwrap_or_else(|_| "https://generativelanguage.googleapis.com/v1beta".to_string());
        let gemini_structured_output = env::var("GEMINI_STRUCTURED_OUTPUT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(true);
        let gemini_timeout_seconds = env::var("GEMINI_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(60);
        let gemini_max_retry_seconds = env::var("GEMINI_MAX_RETRY_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(20);

        // Upload pipeline
        let max_upload_bytes = env::var("MAX_UPLOAD_BYTES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10 * 1024 * 1024); // 10 MiB
        let max_image_dimension_px = env::var("MAX_IMAGE_DIMENSION_PX")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(2000);
        let jpeg_quality = env::var("JPEG_QUALITY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(90);
        let allowed_mime_types = env::var("ALLOWED_MIME_TYPES")
            .unwrap_or_else(|_| "image/jpeg,image/jpg,image/png,image/webp".to_string())
            .split(',')
            .map(|s| s.trim().to_ascii_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        let request_deadline_seconds = env::var("REQUEST_DEADLINE_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(120); // generous: covers two LLM round trips
        let upload_dir = env::var("UPLOAD_DIR").ok().map(PathBuf::from);

        Ok(Settings {
            env,
            server_addr,
            cors_allow_origins,
            gemini_api_key,
            gemini_model,
            gemini_base_url,
            gemini_structured_output,
            gemini_timeout_seconds,
            gemini_max_retry_seconds,
            max_upload_bytes,
            max_image_dimension_px,
            jpeg_quality,
            allowed_mime_types,
            request_deadline_seconds,
            upload_dir,
        })
    }

    pub fn mime_allowed(&self, mime: &str) -> bool {
        let mime = mime.to_ascii_lowercase();
        self.allowed_mime_types.iter().any(|m| *m == mime)
    }
}

#[cfg(test)]
pub(crate) fn test_settings() -> Settings {
    Settings {
        env: Environment::Dev,
        server_addr: "127.0.0.1:0".to_string(),
        cors_allow_origins: vec!["http://localhost:3000".to_string()],
        gemini_api_key: "test-key".to_string(),
        gemini_model: "gemini-2.0-flash".to_string(),
        gemini_base_url: "http://127.0.0.1:1".to_string(),
        gemini_structured_output: true,
        gemini_timeout_seconds: 5,
        gemini_max_retry_seconds: 1,
        max_upload_bytes: 10 * 1024 * 1024,
        max_image_dimension_px: 2000,
        jpeg_quality: 90,
        allowed_mime_types: vec![
            "image/jpeg".to_string(),
            "image/jpg".to_string(),
            "image/png".to_string(),
            "image/webp".to_string(),
        ],
        request_deadline_seconds: 30,
        upload_dir: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_parsing() {
        assert_eq!(Environment::from_str("production"), Environment::Prod);
        assert_eq!(Environment::from_str("STAGING"), Environment::Staging);
        assert_eq!(Environment::from_str("anything"), Environment::Dev);
    }

    #[test]
    fn mime_membership_is_case_insensitive() {
        let settings = test_settings();
        assert!(settings.mime_allowed("image/jpeg"));
        assert!(settings.mime_allowed("IMAGE/PNG"));
        assert!(!settings.mime_allowed("text/plain"));
        assert!(!settings.mime_allowed("application/pdf"));
    }
}
