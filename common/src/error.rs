//! エラー型定義

use crate::job::JobState;
use thiserror::Error;

/// 共通エラー型
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid job transition: {from} -> {to}")]
    InvalidTransition { from: JobState, to: JobState },
}

/// Result型エイリアス
pub type Result<T> = std::result::Result<T, Error>;
