//! インメモリのリモートストア
//!
//! テストとオフライン実行用。呼び出し順を記録し、操作ごとに失敗を注入できる。

use super::RemoteStore;
use crate::error::{DatasetBobError, Result};
use async_trait::async_trait;
use dataset_bob_common::{EntryQuery, RemoteEntry};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Create,
    Upload,
    List,
    Grant,
}

/// 記録された1回の呼び出し
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCall {
    pub op: StoreOp,
    /// create: 名前 / upload・grant: エントリID / list: クエリ
    pub target: String,
}

#[derive(Debug, Clone)]
enum Failure {
    RemoteIo(String),
    EmptyResult,
}

#[derive(Default)]
struct Inner {
    entries: Vec<RemoteEntry>,
    contents: HashMap<String, Vec<u8>>,
    permissions: Vec<(String, String)>,
    calls: Vec<StoreCall>,
    failures: HashMap<StoreOp, VecDeque<Failure>>,
    /// 名前指定の create 失敗（1回で消費）
    failing_names: HashMap<String, String>,
    next_id: u64,
}

impl Inner {
    fn record(&mut self, op: StoreOp, target: &str) -> Result<()> {
        self.calls.push(StoreCall {
            op,
            target: target.to_string(),
        });

        match self.failures.get_mut(&op).and_then(|q| q.pop_front()) {
            Some(Failure::RemoteIo(message)) => Err(DatasetBobError::RemoteIo(message)),
            Some(Failure::EmptyResult) => {
                Err(DatasetBobError::EmptyResult(format!("create {}: no id returned", target)))
            }
            None => Ok(()),
        }
    }

    fn insert(&mut self, name: &str, parent_ids: &[String], is_folder: bool) -> String {
        self.next_id += 1;
        let id = format!("mem-{}", self.next_id);
        let entry = if is_folder {
            RemoteEntry::folder(id.clone(), name, parent_ids)
        } else {
            RemoteEntry::file(id.clone(), name, parent_ids)
        };
        self.entries.push(entry);
        id
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
    latency: Option<Duration>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 各呼び出しの前に待ち時間を入れる（並行実行テスト用）
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    /// 呼び出しログに残さずにフォルダを追加
    pub fn insert_folder(&self, name: &str, parent_ids: &[String]) -> String {
        self.lock().insert(name, parent_ids, true)
    }

    pub fn insert_file(&self, name: &str, parent_ids: &[String]) -> String {
        self.lock().insert(name, parent_ids, false)
    }

    /// 次の `op` 呼び出しを `RemoteIo` で失敗させる
    pub fn fail_next(&self, op: StoreOp, message: &str) {
        self.lock()
            .failures
            .entry(op)
            .or_default()
            .push_back(Failure::RemoteIo(message.to_string()));
    }

    /// `name` の create だけを1回失敗させる
    pub fn fail_create_of(&self, name: &str, message: &str) {
        self.lock()
            .failing_names
            .insert(name.to_string(), message.to_string());
    }

    /// 次の create 呼び出しで ID を返さない
    pub fn fail_next_create_empty(&self) {
        self.lock()
            .failures
            .entry(StoreOp::Create)
            .or_default()
            .push_back(Failure::EmptyResult);
    }

    pub fn entries(&self) -> Vec<RemoteEntry> {
        self.lock().entries.clone()
    }

    pub fn find_by_name(&self, name: &str) -> Vec<RemoteEntry> {
        self.lock()
            .entries
            .iter()
            .filter(|e| e.name == name)
            .cloned()
            .collect()
    }

    pub fn children(&self, parent_id: &str) -> Vec<RemoteEntry> {
        self.lock()
            .entries
            .iter()
            .filter(|e| e.is_child_of(parent_id))
            .cloned()
            .collect()
    }

    pub fn content(&self, id: &str) -> Option<Vec<u8>> {
        self.lock().contents.get(id).cloned()
    }

    /// (エントリID, 付与先)
    pub fn permissions(&self) -> Vec<(String, String)> {
        self.lock().permissions.clone()
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().calls.clone()
    }

    pub fn count(&self, op: StoreOp) -> usize {
        self.lock().calls.iter().filter(|c| c.op == op).count()
    }
}

#[async_trait]
impl RemoteStore for InMemoryStore {
    async fn create_entry(&self, name: &str, parent_ids: &[String], is_folder: bool) -> Result<String> {
        self.delay().await;
        let mut inner = self.lock();
        inner.record(StoreOp::Create, name)?;
        if let Some(message) = inner.failing_names.remove(name) {
            return Err(DatasetBobError::RemoteIo(message));
        }
        Ok(inner.insert(name, parent_ids, is_folder))
    }

    async fn upload_content(&self, id: &str, bytes: Vec<u8>, _mime_type: &str) -> Result<()> {
        self.delay().await;
        let mut inner = self.lock();
        inner.record(StoreOp::Upload, id)?;
        if !inner.entries.iter().any(|e| e.id == id) {
            return Err(DatasetBobError::RemoteIo(format!("upload: file not found: {}", id)));
        }
        inner.contents.insert(id.to_string(), bytes);
        Ok(())
    }

    async fn list_entries(&self, query: &EntryQuery) -> Result<Vec<RemoteEntry>> {
        self.delay().await;
        let mut inner = self.lock();
        inner.record(StoreOp::List, &query.to_drive_query())?;
        Ok(inner
            .entries
            .iter()
            .filter(|e| query.matches(e))
            .cloned()
            .collect())
    }

    async fn grant_permission(&self, id: &str, principal: &str) -> Result<()> {
        self.delay().await;
        let mut inner = self.lock();
        inner.record(StoreOp::Grant, id)?;
        inner.permissions.push((id.to_string(), principal.to_string()));
        Ok(())
    }
}
