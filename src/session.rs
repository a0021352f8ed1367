//! 認証済みセッション
//!
//! アクセストークンの取得自体は扱わない。トークンがあればセッションを作り、
//! なければ `SessionNotReady` を返す。

use crate::config::Config;
use crate::error::{DatasetBobError, Result};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug)]
struct SessionInner {
    client: reqwest::Client,
    access_token: String,
    api_base_url: String,
    upload_base_url: String,
}

/// セッション単位で1回だけ作り、読み取り専用で共有する
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    pub fn from_config(config: &Config) -> Result<Self> {
        let access_token = config.access_token().ok_or(DatasetBobError::SessionNotReady)?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self::new(
            client,
            access_token,
            &config.api_base_url,
            &config.upload_base_url,
        ))
    }

    pub fn new(
        client: reqwest::Client,
        access_token: String,
        api_base_url: &str,
        upload_base_url: &str,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                client,
                access_token,
                api_base_url: api_base_url.trim_end_matches('/').to_string(),
                upload_base_url: upload_base_url.trim_end_matches('/').to_string(),
            }),
        }
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.inner.client
    }

    pub fn access_token(&self) -> &str {
        &self.inner.access_token
    }

    pub fn api_url(&self, path: &str) -> String {
        format!("{}/{}", self.inner.api_base_url, path.trim_start_matches('/'))
    }

    pub fn upload_url(&self, path: &str) -> String {
        format!("{}/{}", self.inner.upload_base_url, path.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_join_without_double_slash() {
        let session = Session::new(
            reqwest::Client::new(),
            "token".into(),
            "https://example.com/drive/v3/",
            "https://example.com/upload/drive/v3",
        );
        assert_eq!(session.api_url("/files"), "https://example.com/drive/v3/files");
        assert_eq!(
            session.upload_url("files/abc"),
            "https://example.com/upload/drive/v3/files/abc"
        );
    }

    #[test]
    fn test_session_not_ready_without_token() {
        if std::env::var(crate::config::ACCESS_TOKEN_ENV).is_ok() {
            return;
        }
        let err = Session::from_config(&Config::default()).unwrap_err();
        assert!(matches!(err, DatasetBobError::SessionNotReady));
    }
}
