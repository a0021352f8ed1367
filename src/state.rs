//! 画面フレームワークに依存しない状態ストア
//!
//! 値の変更は tokio の `watch` チャネルで通知する。どのフロントエンドからでも
//! `subscribe()` で購読できる。

use dataset_bob_common::{Category, Dataset, LocalImage};
use tokio::sync::watch;

/// 現在値を保持し、変更を購読者へ通知する
#[derive(Debug)]
pub struct Observable<T> {
    tx: watch::Sender<T>,
}

impl<T: Clone> Observable<T> {
    pub fn new(initial: T) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }

    /// 購読者がいなくても値は更新される
    pub fn publish(&self, value: T) {
        self.tx.send_replace(value);
    }

    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }
}

impl<T: Clone + Default> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// 一度だけ消費されるイベント
///
/// `take()` した時点で値は消える。購読者は publish のたびに起こされる。
#[derive(Debug)]
pub struct EventSlot<T> {
    tx: watch::Sender<Option<T>>,
}

impl<T: Clone> EventSlot<T> {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    pub fn publish(&self, value: T) {
        self.tx.send_replace(Some(value));
    }

    pub fn take(&self) -> Option<T> {
        let mut taken = None;
        self.tx.send_if_modified(|slot| {
            taken = slot.take();
            false
        });
        taken
    }

    pub fn peek(&self) -> Option<T> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<T>> {
        self.tx.subscribe()
    }
}

impl<T: Clone> Default for EventSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// 外部コラボレータへ公開する状態一式
#[derive(Debug, Default)]
pub struct BobState {
    /// ルート解決後に利用可能なデータセット
    pub datasets: Observable<Vec<Dataset>>,
    pub current_dataset: Observable<Option<Dataset>>,
    /// 選択中データセット直下のカテゴリ
    pub categories: Observable<Vec<Category>>,
    pub upload_in_progress: Observable<bool>,
    /// 直近のアップロードエラー
    pub upload_error: EventSlot<String>,
    pub images: Observable<Vec<LocalImage>>,
    pub current_image: Observable<Option<LocalImage>>,
}

impl BobState {
    pub fn new() -> Self {
        Self::default()
    }
}
