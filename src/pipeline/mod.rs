//! 分類パイプライン
//!
//! 画像1枚の分類 = リモートエントリ作成 → 内容アップロード → ローカル削除。
//! 各ステップの失敗はその場でジョブを終了させ、自動リトライはしない。
//!
//! ジョブ本体は `tokio::spawn` したタスクで走る。呼び出し側の future が
//! 途中で drop されても、ジョブは最後まで進み進捗フラグも必ず戻る。
//!
//! アップロード失敗時、作成済みのリモートエントリは削除しない。
//! 中身のないエントリが残るため、ジョブの `orphaned_entry()` とログで明示する。

mod guard;

pub use guard::{AdmissionPolicy, JobGuard, JobTicket};

use crate::config::Config;
use crate::error::{DatasetBobError, Result};
use crate::hierarchy::HierarchyResolver;
use crate::remote::{DriveClient, RemoteStore, SerialStore};
use crate::scanner::LocalMediaScanner;
use crate::session::Session;
use crate::state::BobState;
use dataset_bob_common::{Category, ClassificationJob, Dataset, JobState, LocalImage};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub struct ClassificationPipeline {
    runner: JobRunner,
    resolver: HierarchyResolver,
    guard: JobGuard,
}

impl ClassificationPipeline {
    /// `store` への呼び出しは全て単一ワーカーのキューを通る
    pub fn new(
        store: Arc<dyn RemoteStore>,
        scanner: Arc<dyn LocalMediaScanner>,
        config: &Config,
    ) -> Self {
        let store: Arc<dyn RemoteStore> = Arc::new(SerialStore::spawn(store));
        let resolver =
            HierarchyResolver::new(Arc::clone(&store), config.permission_principals.clone());

        Self {
            runner: JobRunner {
                store,
                scanner,
                state: Arc::new(BobState::new()),
                upload_mime_type: Arc::from(config.upload_mime_type.as_str()),
            },
            resolver,
            guard: JobGuard::new(config.job_policy),
        }
    }

    /// 認証済みセッションから Drive 向けのパイプラインを作る
    pub fn for_session(
        session: Session,
        scanner: Arc<dyn LocalMediaScanner>,
        config: &Config,
    ) -> Self {
        Self::new(Arc::new(DriveClient::new(session)), scanner, config)
    }

    pub fn state(&self) -> &Arc<BobState> {
        &self.runner.state
    }

    pub fn resolver(&self) -> &HierarchyResolver {
        &self.resolver
    }

    pub fn is_busy(&self) -> bool {
        self.guard.is_busy()
    }

    /// ルートを解決してデータセット一覧を公開する
    ///
    /// 未選択なら先頭のデータセットを選択する。
    pub async fn load_datasets(&self) -> Result<Vec<Dataset>> {
        let root = self.resolver.resolve_root().await?;
        let datasets = self.resolver.list_datasets(&root).await?;
        info!("{} dataset(s) under {}", datasets.len(), root);
        self.state().datasets.publish(datasets.clone());

        if self.state().current_dataset.get().is_none() {
            if let Some(first) = datasets.first() {
                if let Err(e) = self.select_dataset(first.clone()).await {
                    warn!("initial category fetch for {} failed: {}", first, e);
                }
            }
        }

        Ok(datasets)
    }

    /// 取得に失敗した場合、公開中のカテゴリ一覧はそのまま残す
    pub async fn select_dataset(&self, dataset: Dataset) -> Result<Vec<Category>> {
        self.state().current_dataset.publish(Some(dataset.clone()));

        match self.resolver.list_categories(&dataset).await {
            Ok(categories) => {
                debug!("{} categories in {}", categories.len(), dataset);
                self.state().categories.publish(categories.clone());
                Ok(categories)
            }
            Err(e) => {
                warn!("failed to list categories of {}: {}", dataset, e);
                Err(e)
            }
        }
    }

    pub fn select_image(&self, image: Option<LocalImage>) {
        self.state().current_image.publish(image);
    }

    /// スキャナに再列挙させ、画像一覧と現在画像を更新する
    pub async fn refresh_images(&self) -> Result<Vec<LocalImage>> {
        self.runner.refresh_images().await
    }

    /// 画像1枚をカテゴリへ分類する
    ///
    /// リモート失敗は `Ok(job)`（状態 `Failed`）で返し、エラーは `upload_error` に流す。
    /// `Err` になるのは受付前の拒否（未選択・範囲外カテゴリ・実行中ジョブあり）のみ。
    /// 受付後にこの future を drop してもジョブは取り消されない。
    pub async fn classify(&self, image: &LocalImage, category: &Category) -> Result<ClassificationJob> {
        let dataset = self
            .state()
            .current_dataset
            .get()
            .ok_or(DatasetBobError::NoDatasetSelected)?;
        if !category.is_under(&dataset) {
            return Err(DatasetBobError::CategoryOutsideDataset {
                category: category.name().to_string(),
                dataset: dataset.name().to_string(),
            });
        }

        let ticket = self.guard.acquire().await?;
        let job = ClassificationJob::new(image.clone(), category.clone());
        self.state().upload_in_progress.publish(true);

        let runner = self.runner.clone();
        let handle = tokio::spawn(async move {
            let _ticket = ticket;
            runner.execute(job, dataset).await
        });
        handle
            .await
            .map_err(|e| DatasetBobError::Io(std::io::Error::other(e)))
    }

    /// アップロードせずにローカル画像を捨てる
    pub async fn discard(&self, image: &LocalImage) -> Result<()> {
        let _ticket = self.guard.acquire().await?;
        remove_local(image.path()).await;
        info!("discarded {}", image.file_name);
        self.refresh_images().await?;
        Ok(())
    }
}

/// ジョブ実行に必要なものだけを持つ。spawn したタスクへ渡すために clone する
#[derive(Clone)]
struct JobRunner {
    store: Arc<dyn RemoteStore>,
    scanner: Arc<dyn LocalMediaScanner>,
    state: Arc<BobState>,
    upload_mime_type: Arc<str>,
}

impl JobRunner {
    async fn refresh_images(&self) -> Result<Vec<LocalImage>> {
        let scanner = Arc::clone(&self.scanner);
        let images = tokio::task::spawn_blocking(move || scanner.refresh())
            .await
            .map_err(|e| DatasetBobError::Io(std::io::Error::other(e)))??;

        let current = self
            .state
            .current_image
            .get()
            .filter(|c| images.contains(c))
            .or_else(|| images.first().cloned());

        self.state.images.publish(images.clone());
        self.state.current_image.publish(current);
        Ok(images)
    }

    /// 終了時は成否にかかわらず `upload_in_progress` を false に戻す
    async fn execute(&self, mut job: ClassificationJob, dataset: Dataset) -> ClassificationJob {
        let file_name = job.image().file_name.clone();
        let category = job.category().clone();

        if let Err(e) = self.run(&mut job).await {
            let message = e.to_string();
            if let Err(transition) = job.fail(message.clone()) {
                error!("job for {} could not be marked failed: {}", file_name, transition);
            }
            if let Some(orphan) = job.orphaned_entry() {
                warn!(
                    "upload of {} failed after create; remote entry {} left empty",
                    file_name, orphan
                );
            }
            warn!("classify {} -> {} failed: {}", file_name, category, message);
            self.state.upload_in_progress.publish(false);
            self.state.upload_error.publish(message);
            return job;
        }

        self.state.upload_in_progress.publish(false);
        info!("classified {} into {}/{}", file_name, dataset, category);
        job
    }

    async fn run(&self, job: &mut ClassificationJob) -> Result<()> {
        job.advance(JobState::Creating)?;
        let parents = vec![job.category().id().to_string()];
        let remote_id = self
            .store
            .create_entry(&job.image().file_name, &parents, false)
            .await?;
        debug!("created remote entry {} for {}", remote_id, job.image().file_name);
        job.entry_created(remote_id.clone())?;

        let bytes = tokio::fs::read(job.image().path()).await?;
        self.store
            .upload_content(&remote_id, bytes, &self.upload_mime_type)
            .await?;

        remove_local(job.image().path()).await;
        if let Err(e) = self.refresh_images().await {
            warn!("image refresh after classify failed: {}", e);
        }
        job.advance(JobState::Done)?;
        Ok(())
    }
}

/// 削除失敗とファイル不在は区別しない
async fn remove_local(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("deleted {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("{} already gone", path.display())
        }
        Err(e) => warn!("could not delete {}: {}", path.display(), e),
    }
}
