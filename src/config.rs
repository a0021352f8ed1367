use crate::error::{DatasetBobError, Result};
use crate::pipeline::AdmissionPolicy;
use dataset_bob_common::defaults::DEFAULT_UPLOAD_MIME_TYPE;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ACCESS_TOKEN_ENV: &str = "DATASET_BOB_ACCESS_TOKEN";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub access_token: Option<String>,
    pub api_base_url: String,
    pub upload_base_url: String,
    /// 撮影画像の保存先（省略時はカレント）
    pub capture_dir: Option<PathBuf>,
    /// Sample データセットに writer 権限を付与するアカウント
    pub permission_principals: Vec<String>,
    pub upload_mime_type: String,
    pub timeout_seconds: u64,
    pub job_policy: AdmissionPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            access_token: None,
            api_base_url: "https://www.googleapis.com/drive/v3".into(),
            upload_base_url: "https://www.googleapis.com/upload/drive/v3".into(),
            capture_dir: None,
            permission_principals: Vec::new(),
            upload_mime_type: DEFAULT_UPLOAD_MIME_TYPE.into(),
            timeout_seconds: 120,
            job_policy: AdmissionPolicy::Reject,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| DatasetBobError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("dataset-bob").join("config.json"))
    }

    /// 環境変数を優先してアクセストークンを返す
    pub fn access_token(&self) -> Option<String> {
        if let Ok(token) = std::env::var(ACCESS_TOKEN_ENV) {
            if !token.trim().is_empty() {
                return Some(token);
            }
        }

        self.access_token.clone().filter(|t| !t.trim().is_empty())
    }

    pub fn set_access_token(&mut self, token: String) -> Result<()> {
        self.access_token = Some(token);
        self.save()
    }

    pub fn capture_dir(&self) -> PathBuf {
        self.capture_dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();

        assert_eq!(config.upload_mime_type, "image/jpeg");
        assert_eq!(config.timeout_seconds, 120);
        assert_eq!(config.job_policy, AdmissionPolicy::Reject);
        assert!(config.permission_principals.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = Config {
            permission_principals: vec!["labeler@example.com".into()],
            job_policy: AdmissionPolicy::Queue,
            ..Default::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.permission_principals, vec!["labeler@example.com".to_string()]);
        assert_eq!(loaded.job_policy, AdmissionPolicy::Queue);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "timeout_seconds": 5 }"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.timeout_seconds, 5);
        assert_eq!(config.api_base_url, "https://www.googleapis.com/drive/v3");
    }

    #[test]
    fn test_capture_dir_defaults_to_current() {
        assert_eq!(Config::default().capture_dir(), PathBuf::from("."));
    }
}
