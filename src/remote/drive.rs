//! Google Drive v3 REST 連携

use super::RemoteStore;
use crate::error::{DatasetBobError, Result};
use crate::session::Session;
use async_trait::async_trait;
use dataset_bob_common::defaults::{FOLDER_MIME_TYPE, PERMISSION_ROLE};
use dataset_bob_common::{EntryQuery, RemoteEntry};
use reqwest::{header, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

const LIST_FIELDS: &str = "nextPageToken,files(id,name,parents,mimeType)";

/// ファイル作成リクエスト
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateRequest<'a> {
    name: &'a str,
    parents: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    mime_type: Option<&'a str>,
}

#[derive(Deserialize)]
struct CreateResponse {
    #[serde(default)]
    id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    parents: Vec<String>,
    #[serde(default)]
    mime_type: String,
}

impl From<DriveFile> for RemoteEntry {
    fn from(file: DriveFile) -> Self {
        RemoteEntry {
            is_folder: file.mime_type == FOLDER_MIME_TYPE,
            id: file.id,
            name: file.name,
            parent_ids: file.parents.into_iter().collect(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PermissionRequest<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    role: &'a str,
    email_address: &'a str,
}

pub struct DriveClient {
    session: Session,
}

impl DriveClient {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.bearer_auth(self.session.access_token())
    }
}

#[async_trait]
impl RemoteStore for DriveClient {
    async fn create_entry(&self, name: &str, parent_ids: &[String], is_folder: bool) -> Result<String> {
        debug!("Drive create: {} (parents={:?}, folder={})", name, parent_ids, is_folder);
        let body = CreateRequest {
            name,
            parents: parent_ids,
            mime_type: is_folder.then_some(FOLDER_MIME_TYPE),
        };

        let response = self
            .authorized(self.session.client().post(self.session.api_url("files")))
            .query(&[("fields", "id")])
            .json(&body)
            .send()
            .await?;
        let text = check_status(response, "create").await?.text().await?;

        parse_created_id(&text, name)
    }

    async fn upload_content(&self, id: &str, bytes: Vec<u8>, mime_type: &str) -> Result<()> {
        debug!("Drive upload: {} ({} bytes, {})", id, bytes.len(), mime_type);
        let response = self
            .authorized(
                self.session
                    .client()
                    .patch(self.session.upload_url(&format!("files/{}", id))),
            )
            .query(&[("uploadType", "media")])
            .header(header::CONTENT_TYPE, mime_type)
            .body(bytes)
            .send()
            .await?;
        check_status(response, "upload").await?;
        Ok(())
    }

    async fn list_entries(&self, query: &EntryQuery) -> Result<Vec<RemoteEntry>> {
        let q = query.to_drive_query();
        debug!("Drive list: {}", q);

        let mut entries = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut params = vec![
                ("q", q.as_str()),
                ("spaces", "drive"),
                ("fields", LIST_FIELDS),
            ];
            if let Some(token) = page_token.as_deref() {
                params.push(("pageToken", token));
            }

            let response = self
                .authorized(self.session.client().get(self.session.api_url("files")))
                .query(&params)
                .send()
                .await?;
            let text = check_status(response, "list").await?.text().await?;
            let page = parse_file_list(&text)?;

            entries.extend(page.files.into_iter().map(RemoteEntry::from));
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(entries)
    }

    async fn grant_permission(&self, id: &str, principal: &str) -> Result<()> {
        debug!("Drive permission: {} -> {}", principal, id);
        let body = PermissionRequest {
            kind: "user",
            role: PERMISSION_ROLE,
            email_address: principal,
        };
        let response = self
            .authorized(
                self.session
                    .client()
                    .post(self.session.api_url(&format!("files/{}/permissions", id))),
            )
            .json(&body)
            .send()
            .await?;
        check_status(response, "permission").await?;
        Ok(())
    }
}

/// 非2xxを型付きエラーへ変換（401は認証エラー）
async fn check_status(response: reqwest::Response, op: &str) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(status_error(status, op, &body))
}

fn status_error(status: StatusCode, op: &str, body: &str) -> DatasetBobError {
    let message = format!("{} failed with status {}: {}", op, status, body.trim());
    if status == StatusCode::UNAUTHORIZED {
        DatasetBobError::Auth(message)
    } else {
        DatasetBobError::RemoteIo(message)
    }
}

fn parse_created_id(body: &str, name: &str) -> Result<String> {
    if body.trim().is_empty() {
        return Err(DatasetBobError::EmptyResult(format!("create {}: empty response", name)));
    }

    let created: CreateResponse = serde_json::from_str(body)
        .map_err(|e| DatasetBobError::RemoteIo(format!("create {}: invalid response: {}", name, e)))?;

    created
        .id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| DatasetBobError::EmptyResult(format!("create {}: no id returned", name)))
}

fn parse_file_list(body: &str) -> Result<FileList> {
    serde_json::from_str(body)
        .map_err(|e| DatasetBobError::RemoteIo(format!("list: invalid response: {}", e)))
}
