//! 単一ワーカーの直列実行キュー
//!
//! 全てのリモート呼び出しを投入順に1件ずつ実行する。呼び出し側はスレッドを
//! ブロックせず、結果は oneshot 経由で受け取る。キャンセルもタイムアウトもない。

use super::RemoteStore;
use crate::error::{DatasetBobError, Result};
use async_trait::async_trait;
use dataset_bob_common::{EntryQuery, RemoteEntry};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

type Job = Box<dyn FnOnce(Arc<dyn RemoteStore>) -> BoxFuture<'static, ()> + Send>;

#[derive(Clone)]
pub struct SerialStore {
    tx: mpsc::UnboundedSender<Job>,
}

impl SerialStore {
    /// ワーカータスクを起動する。tokio ランタイム内で呼ぶこと
    pub fn spawn(inner: Arc<dyn RemoteStore>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();

        tokio::spawn(async move {
            let mut executed: u64 = 0;
            while let Some(job) = rx.recv().await {
                executed += 1;
                trace!("remote queue: running job #{}", executed);
                job(Arc::clone(&inner)).await;
            }
            debug!("remote queue closed after {} jobs", executed);
        });

        Self { tx }
    }

    async fn submit<T, F>(&self, call: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(Arc<dyn RemoteStore>) -> BoxFuture<'static, Result<T>> + Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();
        let job: Job = Box::new(move |store| {
            async move {
                let result = call(store).await;
                // 呼び出し側が先に破棄されていても結果は捨てるだけ
                let _ = done_tx.send(result);
            }
            .boxed()
        });

        self.tx.send(job).map_err(|_| DatasetBobError::QueueClosed)?;
        done_rx.await.map_err(|_| DatasetBobError::QueueClosed)?
    }
}

#[async_trait]
impl RemoteStore for SerialStore {
    async fn create_entry(&self, name: &str, parent_ids: &[String], is_folder: bool) -> Result<String> {
        let name = name.to_string();
        let parent_ids = parent_ids.to_vec();
        self.submit(move |store| {
            async move { store.create_entry(&name, &parent_ids, is_folder).await }.boxed()
        })
        .await
    }

    async fn upload_content(&self, id: &str, bytes: Vec<u8>, mime_type: &str) -> Result<()> {
        let id = id.to_string();
        let mime_type = mime_type.to_string();
        self.submit(move |store| {
            async move { store.upload_content(&id, bytes, &mime_type).await }.boxed()
        })
        .await
    }

    async fn list_entries(&self, query: &EntryQuery) -> Result<Vec<RemoteEntry>> {
        let query = query.clone();
        self.submit(move |store| async move { store.list_entries(&query).await }.boxed())
            .await
    }

    async fn grant_permission(&self, id: &str, principal: &str) -> Result<()> {
        let id = id.to_string();
        let principal = principal.to_string();
        self.submit(move |store| {
            async move { store.grant_permission(&id, &principal).await }.boxed()
        })
        .await
    }
}
