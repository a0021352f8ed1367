//! リモートストア操作
//!
//! - [`RemoteStore`]: 作成・アップロード・一覧・権限付与の4操作
//! - [`DriveClient`]: Google Drive v3 REST 実装
//! - [`InMemoryStore`]: 呼び出しログと失敗注入つきのメモリ実装
//! - [`SerialStore`]: 全呼び出しを単一ワーカーの FIFO キューで直列化するラッパー

mod drive;
mod memory;
mod queue;

pub use drive::DriveClient;
pub use memory::{InMemoryStore, StoreCall, StoreOp};
pub use queue::SerialStore;

use crate::error::Result;
use async_trait::async_trait;
use dataset_bob_common::{EntryQuery, RemoteEntry};

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// エントリを作成してIDを返す。IDが返らなければ `EmptyResult`
    async fn create_entry(&self, name: &str, parent_ids: &[String], is_folder: bool) -> Result<String>;

    /// 既存エントリの内容を上書きする
    async fn upload_content(&self, id: &str, bytes: Vec<u8>, mime_type: &str) -> Result<()>;

    async fn list_entries(&self, query: &EntryQuery) -> Result<Vec<RemoteEntry>>;

    /// `principal` に writer 権限を付与する
    async fn grant_permission(&self, id: &str, principal: &str) -> Result<()>;
}
