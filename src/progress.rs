//! アップロード中スピナー
//!
//! `upload_in_progress` を購読して indicatif のスピナーを出し入れする。

use crate::state::BobState;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub struct ProgressIndicator {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl ProgressIndicator {
    pub fn spawn(state: &BobState) -> Self {
        let mut rx = state.upload_in_progress.subscribe();
        let (stop, mut stop_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            let mut spinner: Option<ProgressBar> = None;

            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let in_progress = *rx.borrow_and_update();
                        match (in_progress, spinner.take()) {
                            (true, None) => spinner = Some(new_spinner()),
                            (true, Some(pb)) => spinner = Some(pb),
                            (false, Some(pb)) => pb.finish_and_clear(),
                            (false, None) => {}
                        }
                    }
                }
            }

            if let Some(pb) = spinner {
                pb.finish_and_clear();
            }
        });

        Self { stop, handle }
    }

    /// 表示中のスピナーを消してからタスクを終える
    pub async fn finish(self) {
        let _ = self.stop.send(());
        let _ = self.handle.await;
    }
}

fn new_spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message("アップロード中...");
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
