//! Dataset Bob
//!
//! ローカルの撮影画像をリモートの Datasets/<データセット>/<カテゴリ> へ
//! アップロードして分類し、成功したらローカルから削除する。

pub mod cli;
pub mod config;
pub mod error;
pub mod hierarchy;
pub mod logger;
pub mod pipeline;
pub mod progress;
pub mod remote;
pub mod scanner;
pub mod session;
pub mod state;

pub use dataset_bob_common as common;
pub use error::{DatasetBobError, Result};
pub use hierarchy::{BootstrapReport, HierarchyResolver, RootResolution};
pub use pipeline::{AdmissionPolicy, ClassificationPipeline};
pub use remote::{DriveClient, InMemoryStore, RemoteStore, SerialStore};
pub use session::Session;
pub use state::BobState;
