//! 分類ジョブの状態遷移
//!
//! Pending → Creating → Uploading → Done
//!            ↘ Failed   ↘ Failed
//!
//! Done / Failed は終端。逆方向の遷移はない。

use crate::error::{Error, Result};
use crate::types::{Category, LocalImage};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Creating,
    Uploading,
    Done,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Failed)
    }

    pub fn can_advance_to(self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Pending, Creating)
                | (Creating, Uploading)
                | (Creating, Failed)
                | (Uploading, Done)
                | (Uploading, Failed)
        )
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobState::Pending => "pending",
            JobState::Creating => "creating",
            JobState::Uploading => "uploading",
            JobState::Done => "done",
            JobState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// 画像1枚をカテゴリ1つへ登録する作業単位（永続化しない）
#[derive(Debug, Clone)]
pub struct ClassificationJob {
    image: LocalImage,
    category: Category,
    state: JobState,
    /// 作成済みリモートエントリのID
    remote_id: Option<String>,
    error: Option<String>,
}

impl ClassificationJob {
    pub fn new(image: LocalImage, category: Category) -> Self {
        Self {
            image,
            category,
            state: JobState::Pending,
            remote_id: None,
            error: None,
        }
    }

    pub fn image(&self) -> &LocalImage {
        &self.image
    }

    pub fn category(&self) -> &Category {
        &self.category
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn remote_id(&self) -> Option<&str> {
        self.remote_id.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn advance(&mut self, next: JobState) -> Result<()> {
        if !self.state.can_advance_to(next) {
            return Err(Error::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    /// エントリ作成成功 → Uploading
    pub fn entry_created(&mut self, remote_id: String) -> Result<()> {
        self.advance(JobState::Uploading)?;
        self.remote_id = Some(remote_id);
        Ok(())
    }

    pub fn fail(&mut self, message: impl Into<String>) -> Result<()> {
        self.advance(JobState::Failed)?;
        self.error = Some(message.into());
        Ok(())
    }

    /// アップロード失敗で中身のないまま残ったリモートエントリ
    pub fn orphaned_entry(&self) -> Option<&str> {
        match self.state {
            JobState::Failed => self.remote_id.as_deref(),
            _ => None,
        }
    }
}
