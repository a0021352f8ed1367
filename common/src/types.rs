//! リモート階層とローカル画像の型定義

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// リモートストア上のエントリ（ファイルまたはフォルダ）
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEntry {
    /// ストアが採番する不透明なID
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub parent_ids: BTreeSet<String>,

    #[serde(default)]
    pub is_folder: bool,
}

impl RemoteEntry {
    pub fn folder(id: impl Into<String>, name: impl Into<String>, parents: &[String]) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parent_ids: parents.iter().cloned().collect(),
            is_folder: true,
        }
    }

    pub fn file(id: impl Into<String>, name: impl Into<String>, parents: &[String]) -> Self {
        Self {
            is_folder: false,
            ..Self::folder(id, name, parents)
        }
    }

    /// `parent_id` の直下にあるか
    pub fn is_child_of(&self, parent_id: &str) -> bool {
        self.parent_ids.contains(parent_id)
    }
}

macro_rules! folder_kind {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(RemoteEntry);

        impl $name {
            /// フォルダでないエントリは `None`
            pub fn from_entry(entry: RemoteEntry) -> Option<Self> {
                entry.is_folder.then_some(Self(entry))
            }

            /// フォルダであることが呼び出し側で確定しているエントリから作る
            pub fn new(mut entry: RemoteEntry) -> Self {
                entry.is_folder = true;
                Self(entry)
            }

            pub fn id(&self) -> &str {
                &self.0.id
            }

            pub fn name(&self) -> &str {
                &self.0.name
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0.name)
            }
        }
    };
}

folder_kind!(
    /// 全データセットを格納する最上位フォルダ（"Datasets"）
    RootFolder
);

folder_kind!(
    /// ラベリングプロジェクト1件分のフォルダ（ルート直下）
    Dataset
);

folder_kind!(
    /// ラベル1種類分のフォルダ（データセット直下）
    Category
);

impl Dataset {
    pub fn is_under(&self, root: &RootFolder) -> bool {
        self.0.is_child_of(root.id())
    }
}

impl Category {
    pub fn is_under(&self, dataset: &Dataset) -> bool {
        self.0.is_child_of(dataset.id())
    }
}

/// 分類待ちのローカル画像
///
/// 撮影時刻はファイル名の並び順で表される。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalImage {
    pub path: PathBuf,
    pub file_name: String,
}

impl LocalImage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Self { path, file_name }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
