use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatasetBobError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("セッションが未準備です。`dataset-bob config --set-access-token TOKEN` か DATASET_BOB_ACCESS_TOKEN を設定してください")]
    SessionNotReady,

    #[error("認証エラー: {0}")]
    Auth(String),

    #[error("リモートI/Oエラー: {0}")]
    RemoteIo(String),

    #[error("リモートが空の結果を返しました: {0}")]
    EmptyResult(String),

    #[error("別の分類ジョブが実行中です")]
    JobInFlight,

    #[error("データセットが選択されていません")]
    NoDatasetSelected,

    #[error("カテゴリ {category} は選択中のデータセット {dataset} に属していません")]
    CategoryOutsideDataset { category: String, dataset: String },

    #[error("リモート呼び出しキューが停止しています")]
    QueueClosed,

    #[error("フォルダが見つかりません: {0}")]
    FolderNotFound(String),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] dataset_bob_common::Error),
}

impl DatasetBobError {
    /// 呼び出し側が同一に扱うリモート失敗
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            DatasetBobError::Auth(_) | DatasetBobError::RemoteIo(_) | DatasetBobError::EmptyResult(_)
        )
    }
}

impl From<reqwest::Error> for DatasetBobError {
    fn from(e: reqwest::Error) -> Self {
        DatasetBobError::RemoteIo(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DatasetBobError>;
