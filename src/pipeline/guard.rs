//! 分類ジョブの同時実行ガード
//!
//! 実行中のジョブは常に1件まで。2件目の扱いはポリシーで決まる:
//! - `Reject`: 即座に `JobInFlight`
//! - `Queue`: 1件だけ待機できる（深さ1）。3件目は `JobInFlight`

use crate::error::{DatasetBobError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AdmissionPolicy {
    #[default]
    Reject,
    Queue,
}

impl AdmissionPolicy {
    fn admission_permits(self) -> usize {
        match self {
            AdmissionPolicy::Reject => 1,
            AdmissionPolicy::Queue => 2,
        }
    }
}

/// 保持している間はジョブ枠を占有する
#[derive(Debug)]
pub struct JobTicket {
    _admission: OwnedSemaphorePermit,
    _running: OwnedSemaphorePermit,
}

#[derive(Debug)]
pub struct JobGuard {
    admission: Arc<Semaphore>,
    running: Arc<Semaphore>,
}

impl JobGuard {
    pub fn new(policy: AdmissionPolicy) -> Self {
        Self {
            admission: Arc::new(Semaphore::new(policy.admission_permits())),
            running: Arc::new(Semaphore::new(1)),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.running.available_permits() == 0
    }

    pub async fn acquire(&self) -> Result<JobTicket> {
        let admission = Arc::clone(&self.admission)
            .try_acquire_owned()
            .map_err(|_| DatasetBobError::JobInFlight)?;
        let running = Arc::clone(&self.running)
            .acquire_owned()
            .await
            .map_err(|_| DatasetBobError::JobInFlight)?;

        Ok(JobTicket {
            _admission: admission,
            _running: running,
        })
    }
}
