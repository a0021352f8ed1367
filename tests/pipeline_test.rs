//! 分類パイプラインテスト
//!
//! InMemoryStore と一時フォルダを使って、作成→アップロード→削除の流れと
//! 失敗時の状態を検証

use dataset_bob::common::{Category, JobState, LocalImage, RemoteEntry};
use dataset_bob::config::Config;
use dataset_bob::remote::{InMemoryStore, StoreOp};
use dataset_bob::scanner::FolderScanner;
use dataset_bob::{AdmissionPolicy, ClassificationPipeline, DatasetBobError};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::{tempdir, TempDir};

struct Fixture {
    dir: TempDir,
    memory: Arc<InMemoryStore>,
    pipeline: ClassificationPipeline,
}

impl Fixture {
    fn new(memory: InMemoryStore, policy: AdmissionPolicy) -> Self {
        let dir = tempdir().expect("Failed to create temp dir");
        let memory = Arc::new(memory);
        let config = Config {
            job_policy: policy,
            ..Config::default()
        };
        let pipeline = ClassificationPipeline::new(
            memory.clone(),
            Arc::new(FolderScanner::new(dir.path())),
            &config,
        );
        Self {
            dir,
            memory,
            pipeline,
        }
    }

    /// ブートストラップ済みで Sample が選択された状態
    async fn loaded(memory: InMemoryStore, policy: AdmissionPolicy) -> Self {
        let fixture = Self::new(memory, policy);
        fixture
            .pipeline
            .load_datasets()
            .await
            .expect("データセット読み込みに失敗");
        fixture
    }

    fn write_image(&self, name: &str, bytes: &[u8]) -> LocalImage {
        let path = self.dir.path().join(name);
        std::fs::write(&path, bytes).expect("Failed to write image");
        LocalImage::new(path)
    }

    fn category(&self, name: &str) -> Category {
        self.pipeline
            .state()
            .categories
            .get()
            .into_iter()
            .find(|c| c.name() == name)
            .unwrap_or_else(|| panic!("カテゴリ {} がない", name))
    }

    /// 読み込み後に記録された create/upload 呼び出し
    fn job_calls(&self) -> Vec<(StoreOp, String)> {
        self.memory
            .calls()
            .into_iter()
            .filter(|c| matches!(c.op, StoreOp::Create | StoreOp::Upload))
            .filter(|c| c.op == StoreOp::Upload || c.target.ends_with(".jpg"))
            .map(|c| (c.op, c.target))
            .collect()
    }
}

fn exists(path: &Path) -> bool {
    path.exists()
}

/// 初回読み込みで Sample が自動選択され、カテゴリが公開される
#[tokio::test]
async fn test_load_datasets_selects_first() {
    let fx = Fixture::loaded(InMemoryStore::new(), AdmissionPolicy::Reject).await;
    let state = fx.pipeline.state();

    let datasets = state.datasets.get();
    assert_eq!(datasets.len(), 1);
    assert_eq!(datasets[0].name(), "Sample");
    assert_eq!(state.current_dataset.get().unwrap().name(), "Sample");

    let names: Vec<String> = state
        .categories
        .get()
        .iter()
        .map(|c| c.name().to_string())
        .collect();
    assert_eq!(names, vec!["label1", "label2"]);
}

/// 成功時: カテゴリ直下にエントリができ、内容が一致し、ローカルは消える
#[tokio::test]
async fn test_classify_success() {
    let fx = Fixture::loaded(InMemoryStore::new(), AdmissionPolicy::Reject).await;
    let image = fx.write_image("2024-05-01-10-00-00-000.jpg", b"jpeg bytes");
    fx.pipeline.refresh_images().await.unwrap();
    let category = fx.category("label1");

    let job = fx.pipeline.classify(&image, &category).await.unwrap();

    assert_eq!(job.state(), JobState::Done);
    let remote_id = job.remote_id().expect("リモートIDがない").to_string();
    assert!(job.orphaned_entry().is_none());

    let children = fx.memory.children(category.id());
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].id, remote_id);
    assert_eq!(children[0].name, "2024-05-01-10-00-00-000.jpg");
    assert!(!children[0].is_folder);
    assert_eq!(fx.memory.content(&remote_id).unwrap(), b"jpeg bytes".to_vec());

    assert!(!exists(image.path()));
    let state = fx.pipeline.state();
    assert!(state.images.get().is_empty());
    assert!(state.current_image.get().is_none());
    assert!(!state.upload_in_progress.get());
    assert!(state.upload_error.take().is_none());
    assert!(!fx.pipeline.is_busy());
}

/// アップロード失敗時: ローカルは残り、エラーが通知され、空エントリが残る
#[tokio::test]
async fn test_upload_failure_keeps_local_file() {
    let fx = Fixture::loaded(InMemoryStore::new(), AdmissionPolicy::Reject).await;
    let image = fx.write_image("a.jpg", b"abc");
    let category = fx.category("label2");
    fx.memory.fail_next(StoreOp::Upload, "connection reset");

    let job = fx.pipeline.classify(&image, &category).await.unwrap();

    assert_eq!(job.state(), JobState::Failed);
    assert!(job.error().unwrap().contains("connection reset"));
    let orphan = job.orphaned_entry().expect("作成済みエントリが記録されていない");
    assert!(fx.memory.content(orphan).is_none());
    assert_eq!(fx.memory.children(category.id()).len(), 1);

    assert!(exists(image.path()));
    let state = fx.pipeline.state();
    assert!(!state.upload_in_progress.get());
    let message = state.upload_error.take().expect("エラーが通知されていない");
    assert!(message.contains("connection reset"));
    // 1回だけ通知される
    assert!(state.upload_error.take().is_none());
}

/// 作成失敗時: アップロードは行われず、空エントリも残らない
#[tokio::test]
async fn test_create_failure_skips_upload() {
    let fx = Fixture::loaded(InMemoryStore::new(), AdmissionPolicy::Reject).await;
    let image = fx.write_image("b.jpg", b"abc");
    let category = fx.category("label1");
    fx.memory.fail_next(StoreOp::Create, "quota exceeded");

    let job = fx.pipeline.classify(&image, &category).await.unwrap();

    assert_eq!(job.state(), JobState::Failed);
    assert!(job.remote_id().is_none());
    assert!(job.orphaned_entry().is_none());
    assert_eq!(fx.memory.count(StoreOp::Upload), 0);
    assert!(fx.memory.children(category.id()).is_empty());
    assert!(exists(image.path()));
    assert!(fx.pipeline.state().upload_error.take().is_some());
}

/// 作成が空の結果を返した場合も失敗として扱う
#[tokio::test]
async fn test_empty_create_result_fails_job() {
    let fx = Fixture::loaded(InMemoryStore::new(), AdmissionPolicy::Reject).await;
    let image = fx.write_image("c.jpg", b"abc");
    let category = fx.category("label1");
    fx.memory.fail_next_create_empty();

    let job = fx.pipeline.classify(&image, &category).await.unwrap();

    assert_eq!(job.state(), JobState::Failed);
    assert_eq!(fx.memory.count(StoreOp::Upload), 0);
    assert!(exists(image.path()));
}

/// 失敗後も次の分類は受け付ける（自動リトライはしない）
#[tokio::test]
async fn test_failure_then_manual_retry() {
    let fx = Fixture::loaded(InMemoryStore::new(), AdmissionPolicy::Reject).await;
    let image = fx.write_image("d.jpg", b"abc");
    let category = fx.category("label1");
    fx.memory.fail_next(StoreOp::Create, "timeout");
    let creates_before = fx.memory.count(StoreOp::Create);

    let failed = fx.pipeline.classify(&image, &category).await.unwrap();
    assert_eq!(failed.state(), JobState::Failed);
    assert_eq!(fx.memory.count(StoreOp::Create), creates_before + 1);

    let retried = fx.pipeline.classify(&image, &category).await.unwrap();
    assert_eq!(retried.state(), JobState::Done);
    assert!(!exists(image.path()));
}

/// データセット未選択では分類しない
#[tokio::test]
async fn test_classify_without_dataset() {
    let fx = Fixture::new(InMemoryStore::new(), AdmissionPolicy::Reject);
    let image = fx.write_image("e.jpg", b"abc");
    let category = Category::new(RemoteEntry::folder("cat-1", "label1", &["ds-1".to_string()]));

    let result = fx.pipeline.classify(&image, &category).await;

    assert!(matches!(result, Err(DatasetBobError::NoDatasetSelected)));
    assert!(fx.memory.calls().is_empty());
    assert!(exists(image.path()));
}

/// 選択中データセット外のカテゴリは拒否する
#[tokio::test]
async fn test_category_outside_dataset() {
    let fx = Fixture::loaded(InMemoryStore::new(), AdmissionPolicy::Reject).await;
    let root_id = fx.memory.find_by_name("Datasets")[0].id.clone();
    let other = fx.memory.insert_folder("Other", &[root_id]);
    let foreign_id = fx.memory.insert_folder("foreign", &[other.clone()]);
    let foreign = Category::new(RemoteEntry::folder(foreign_id, "foreign", &[other]));
    let image = fx.write_image("f.jpg", b"abc");
    let calls_before = fx.memory.calls().len();

    let result = fx.pipeline.classify(&image, &foreign).await;

    match result {
        Err(DatasetBobError::CategoryOutsideDataset { category, dataset }) => {
            assert_eq!(category, "foreign");
            assert_eq!(dataset, "Sample");
        }
        other => panic!("unexpected result: {:?}", other.map(|j| j.state())),
    }
    assert_eq!(fx.memory.calls().len(), calls_before);
}

/// カテゴリ取得に失敗しても前回の一覧は残る
#[tokio::test]
async fn test_stale_categories_on_list_failure() {
    let fx = Fixture::loaded(InMemoryStore::new(), AdmissionPolicy::Reject).await;
    let sample = fx.pipeline.state().current_dataset.get().unwrap();
    fx.memory.fail_next(StoreOp::List, "offline");

    let result = fx.pipeline.select_dataset(sample.clone()).await;

    assert!(matches!(result, Err(DatasetBobError::RemoteIo(_))));
    assert_eq!(fx.pipeline.state().categories.get().len(), 2);
    assert_eq!(fx.pipeline.state().current_dataset.get(), Some(sample));
}

/// 実行中に2件目が来た場合、Reject では受け付けない
#[tokio::test]
async fn test_reject_policy_refuses_concurrent_job() {
    let fx = Fixture::loaded(
        InMemoryStore::new().with_latency(Duration::from_millis(5)),
        AdmissionPolicy::Reject,
    )
    .await;
    let first = fx.write_image("g1.jpg", b"one");
    let second = fx.write_image("g2.jpg", b"two");
    let category = fx.category("label1");

    let (a, b) = tokio::join!(
        fx.pipeline.classify(&first, &category),
        fx.pipeline.classify(&second, &category),
    );

    assert_eq!(a.unwrap().state(), JobState::Done);
    assert!(matches!(b, Err(DatasetBobError::JobInFlight)));
    assert!(!exists(first.path()));
    assert!(exists(second.path()));
    assert_eq!(fx.memory.children(category.id()).len(), 1);
}

/// Queue では2件目が待機し、ジョブの呼び出しは混ざらない
#[tokio::test]
async fn test_queue_policy_runs_jobs_back_to_back() {
    let fx = Fixture::loaded(
        InMemoryStore::new().with_latency(Duration::from_millis(5)),
        AdmissionPolicy::Queue,
    )
    .await;
    let first = fx.write_image("h1.jpg", b"one");
    let second = fx.write_image("h2.jpg", b"two");
    let category = fx.category("label2");

    let (a, b) = tokio::join!(
        fx.pipeline.classify(&first, &category),
        fx.pipeline.classify(&second, &category),
    );
    let a = a.unwrap();
    let b = b.unwrap();
    assert_eq!(a.state(), JobState::Done);
    assert_eq!(b.state(), JobState::Done);

    let calls = fx.job_calls();
    let expected = vec![
        (StoreOp::Create, "h1.jpg".to_string()),
        (StoreOp::Upload, a.remote_id().unwrap().to_string()),
        (StoreOp::Create, "h2.jpg".to_string()),
        (StoreOp::Upload, b.remote_id().unwrap().to_string()),
    ];
    assert_eq!(calls, expected);
    assert_eq!(fx.memory.content(b.remote_id().unwrap()).unwrap(), b"two".to_vec());
}

/// 画像一覧は新しい順で、選択中の画像は残っていれば維持される
#[tokio::test]
async fn test_refresh_keeps_current_image() {
    let fx = Fixture::new(InMemoryStore::new(), AdmissionPolicy::Reject);
    let older = fx.write_image("2024-01-01-00-00-00-000.jpg", b"1");
    let middle = fx.write_image("2024-01-02-00-00-00-000.jpg", b"2");
    let newer = fx.write_image("2024-01-03-00-00-00-000.JPG", b"3");
    fx.write_image("memo.txt", b"ignored");

    let images = fx.pipeline.refresh_images().await.unwrap();
    assert_eq!(images, vec![newer.clone(), middle.clone(), older.clone()]);
    assert_eq!(fx.pipeline.state().current_image.get(), Some(newer.clone()));

    fx.pipeline.select_image(Some(middle.clone()));
    std::fs::remove_file(newer.path()).unwrap();
    fx.pipeline.refresh_images().await.unwrap();
    assert_eq!(fx.pipeline.state().current_image.get(), Some(middle.clone()));

    std::fs::remove_file(middle.path()).unwrap();
    fx.pipeline.refresh_images().await.unwrap();
    assert_eq!(fx.pipeline.state().current_image.get(), Some(older));
}

/// 破棄はリモートに触れずにローカルだけ消す
#[tokio::test]
async fn test_discard_removes_local_only() {
    let fx = Fixture::new(InMemoryStore::new(), AdmissionPolicy::Reject);
    let image = fx.write_image("i.jpg", b"abc");
    fx.pipeline.refresh_images().await.unwrap();

    fx.pipeline.discard(&image).await.unwrap();

    assert!(!exists(image.path()));
    assert!(fx.pipeline.state().images.get().is_empty());
    assert!(fx.memory.calls().is_empty());

    // 既に消えていてもエラーにしない
    fx.pipeline.discard(&image).await.unwrap();
}

/// アップロード中フラグは開始時に true、終了時に false が通知される
#[tokio::test]
async fn test_progress_flag_transitions() {
    let fx = Fixture::loaded(
        InMemoryStore::new().with_latency(Duration::from_millis(5)),
        AdmissionPolicy::Reject,
    )
    .await;
    let image = fx.write_image("j.jpg", b"abc");
    let category = fx.category("label1");
    let mut rx = fx.pipeline.state().upload_in_progress.subscribe();

    let (job, observed) = tokio::join!(fx.pipeline.classify(&image, &category), async {
        rx.changed().await.unwrap();
        *rx.borrow_and_update()
    });

    assert_eq!(job.unwrap().state(), JobState::Done);
    assert!(observed);
    assert!(!fx.pipeline.state().upload_in_progress.get());
}

/// 呼び出し側が待つのをやめても、受付済みのジョブは最後まで進みフラグも戻る
#[tokio::test]
async fn test_dropped_classify_still_completes() {
    let fx = Fixture::loaded(
        InMemoryStore::new().with_latency(Duration::from_millis(50)),
        AdmissionPolicy::Reject,
    )
    .await;
    let image = fx.write_image("k.jpg", b"abc");
    let category = fx.category("label1");

    let result = tokio::time::timeout(
        Duration::from_millis(10),
        fx.pipeline.classify(&image, &category),
    )
    .await;
    assert!(result.is_err(), "タイムアウトするはず");

    // ジョブはまだ枠を占有している
    assert!(fx.pipeline.is_busy());
    assert!(fx.pipeline.state().upload_in_progress.get());

    tokio::time::timeout(Duration::from_secs(5), async {
        while fx.pipeline.is_busy() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("ジョブが終わらない");

    assert!(!fx.pipeline.state().upload_in_progress.get());
    let children = fx.memory.children(category.id());
    assert_eq!(children.len(), 1);
    assert_eq!(fx.memory.content(&children[0].id).unwrap(), b"abc".to_vec());
    assert!(!exists(image.path()));
}

/// 途中で見捨てられたジョブの失敗もエラーとして通知される
#[tokio::test]
async fn test_dropped_classify_failure_is_published() {
    let fx = Fixture::loaded(
        InMemoryStore::new().with_latency(Duration::from_millis(50)),
        AdmissionPolicy::Reject,
    )
    .await;
    let image = fx.write_image("l.jpg", b"abc");
    let category = fx.category("label2");
    fx.memory.fail_next(StoreOp::Upload, "connection reset");

    let result = tokio::time::timeout(
        Duration::from_millis(10),
        fx.pipeline.classify(&image, &category),
    )
    .await;
    assert!(result.is_err());

    tokio::time::timeout(Duration::from_secs(5), async {
        while fx.pipeline.is_busy() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("ジョブが終わらない");

    let state = fx.pipeline.state();
    assert!(!state.upload_in_progress.get());
    assert!(state.upload_error.take().unwrap().contains("connection reset"));
    assert!(exists(image.path()));
}
