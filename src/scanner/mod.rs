mod capture;

pub use capture::{capture_file_name, import_capture, CAPTURE_FILENAME_FORMAT};

use crate::error::{DatasetBobError, Result};
use dataset_bob_common::defaults::is_whitelisted_extension;
use dataset_bob_common::LocalImage;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 分類候補のローカル画像を並び順つきで返す外部コラボレータ
pub trait LocalMediaScanner: Send + Sync {
    /// ローカル削除のたびに呼ばれる
    fn refresh(&self) -> Result<Vec<LocalImage>>;
}

/// 撮影フォルダ直下の JPG を新しい順に列挙する
#[derive(Debug, Clone)]
pub struct FolderScanner {
    folder: PathBuf,
}

impl FolderScanner {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }
}

impl LocalMediaScanner for FolderScanner {
    fn refresh(&self) -> Result<Vec<LocalImage>> {
        scan_folder(&self.folder)
    }
}

pub fn scan_folder(folder: &Path) -> Result<Vec<LocalImage>> {
    if !folder.is_dir() {
        return Err(DatasetBobError::FolderNotFound(folder.display().to_string()));
    }

    let mut images: Vec<LocalImage> = WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1) // 直下のみ（再帰しない）
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .map(|ext| is_whitelisted_extension(&ext.to_string_lossy()))
                .unwrap_or(false)
        })
        .map(|e| LocalImage::new(e.into_path()))
        .collect();

    // ファイル名はタイムスタンプなので降順 = 新しい順
    images.sort_by(|a, b| b.path.cmp(&a.path));

    Ok(images)
}
