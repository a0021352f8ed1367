//! リモート階層の解決
//!
//! ルート "Datasets" を探し、なければ Datasets/Sample/{label1,label2} を作る。
//! ブートストラップ途中で失敗してもロールバックはしない。次回の解決で
//! 中途半端な階層が見つかっても修復しない。

use crate::error::Result;
use crate::remote::RemoteStore;
use dataset_bob_common::defaults::{BOOTSTRAP_CATEGORIES, ROOT_FOLDER_NAME, SAMPLE_DATASET_NAME};
use dataset_bob_common::{Category, Dataset, EntryQuery, RemoteEntry, RootFolder};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// ブートストラップで起きたこと
#[derive(Debug, Clone, Default)]
pub struct BootstrapReport {
    pub root_id: String,
    pub sample_id: String,
    /// 作成できたカテゴリ (名前, ID)
    pub categories: Vec<(String, String)>,
    /// 失敗したカテゴリ (名前, エラー)
    pub failed_categories: Vec<(String, String)>,
    /// writer 権限を付与できた付与先
    pub granted: Vec<String>,
    /// 権限付与に失敗した (付与先, エラー)
    pub failed_permissions: Vec<(String, String)>,
}

impl BootstrapReport {
    pub fn is_complete(&self) -> bool {
        self.failed_categories.is_empty() && self.failed_permissions.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct RootResolution {
    pub root: RootFolder,
    /// 既存ルートが見つかった場合は `None`
    pub bootstrap: Option<BootstrapReport>,
}

pub struct HierarchyResolver {
    store: Arc<dyn RemoteStore>,
    principals: Vec<String>,
    last_root: Mutex<Option<RootFolder>>,
}

impl HierarchyResolver {
    /// `principals` は Sample データセットに writer 権限を付与するアカウント
    pub fn new(store: Arc<dyn RemoteStore>, principals: Vec<String>) -> Self {
        Self {
            store,
            principals,
            last_root: Mutex::new(None),
        }
    }

    /// 直近に解決したルート（キャッシュではない）
    pub fn last_root(&self) -> Option<RootFolder> {
        self.last_root
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub async fn resolve_root(&self) -> Result<RootFolder> {
        Ok(self.resolve_root_detailed().await?.root)
    }

    /// 毎回リモートを問い合わせる。複数見つかった場合は先頭を採用する
    pub async fn resolve_root_detailed(&self) -> Result<RootResolution> {
        let found = self
            .store
            .list_entries(&EntryQuery::name(ROOT_FOLDER_NAME))
            .await?;

        let resolution = match found.into_iter().next() {
            Some(entry) => {
                debug!("root folder found: {}", entry.id);
                RootResolution {
                    root: RootFolder::new(entry),
                    bootstrap: None,
                }
            }
            None => {
                info!("root folder {:?} not found, bootstrapping", ROOT_FOLDER_NAME);
                let (root, report) = self.bootstrap().await?;
                RootResolution {
                    root,
                    bootstrap: Some(report),
                }
            }
        };

        *self
            .last_root
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(resolution.root.clone());
        Ok(resolution)
    }

    async fn bootstrap(&self) -> Result<(RootFolder, BootstrapReport)> {
        let root_id = self.store.create_entry(ROOT_FOLDER_NAME, &[], true).await?;
        let root_parents = vec![root_id.clone()];
        let sample_id = self
            .store
            .create_entry(SAMPLE_DATASET_NAME, &root_parents, true)
            .await?;

        let mut report = BootstrapReport {
            root_id: root_id.clone(),
            sample_id: sample_id.clone(),
            ..Default::default()
        };

        if self.principals.is_empty() {
            info!("no permission principals configured; {} is not shared", SAMPLE_DATASET_NAME);
        }
        for principal in &self.principals {
            match self.store.grant_permission(&sample_id, principal).await {
                Ok(()) => report.granted.push(principal.clone()),
                Err(e) => {
                    warn!("failed to grant {} on {}: {}", principal, SAMPLE_DATASET_NAME, e);
                    report.failed_permissions.push((principal.clone(), e.to_string()));
                }
            }
        }

        let sample_parents = vec![sample_id.clone()];
        let [first, second] = BOOTSTRAP_CATEGORIES;
        let (first_result, second_result) = futures::join!(
            self.store.create_entry(first, &sample_parents, true),
            self.store.create_entry(second, &sample_parents, true),
        );

        for (name, result) in [(first, first_result), (second, second_result)] {
            match result {
                Ok(id) => report.categories.push((name.to_string(), id)),
                Err(e) => {
                    warn!("failed to create bootstrap category {}: {}", name, e);
                    report.failed_categories.push((name.to_string(), e.to_string()));
                }
            }
        }

        info!(
            "bootstrapped {}/{} with {} categories",
            ROOT_FOLDER_NAME,
            SAMPLE_DATASET_NAME,
            report.categories.len()
        );

        let root = RootFolder::new(RemoteEntry::folder(root_id, ROOT_FOLDER_NAME, &[]));
        Ok((root, report))
    }

    pub async fn list_datasets(&self, root: &RootFolder) -> Result<Vec<Dataset>> {
        let entries = self
            .store
            .list_entries(&EntryQuery::parent(root.id()))
            .await?;
        Ok(entries
            .into_iter()
            .filter_map(Dataset::from_entry)
            .filter(|d| d.is_under(root))
            .collect())
    }

    pub async fn list_categories(&self, dataset: &Dataset) -> Result<Vec<Category>> {
        let entries = self
            .store
            .list_entries(&EntryQuery::parent(dataset.id()))
            .await?;
        Ok(entries
            .into_iter()
            .filter_map(Category::from_entry)
            .filter(|c| c.is_under(dataset))
            .collect())
    }
}
