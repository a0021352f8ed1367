//! 撮影画像の取り込み
//!
//! カメラ撮影の代わりに既存ファイルを撮影フォルダへタイムスタンプ名でコピーする。

use crate::error::{DatasetBobError, Result};
use chrono::{DateTime, Local};
use dataset_bob_common::LocalImage;
use std::path::Path;

pub const CAPTURE_FILENAME_FORMAT: &str = "%Y-%m-%d-%H-%M-%S-%3f";

pub fn capture_file_name(at: DateTime<Local>) -> String {
    format!("{}.jpg", at.format(CAPTURE_FILENAME_FORMAT))
}

pub fn import_capture(source: &Path, capture_dir: &Path) -> Result<LocalImage> {
    if !source.is_file() {
        return Err(DatasetBobError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("ファイルが見つかりません: {}", source.display()),
        )));
    }

    std::fs::create_dir_all(capture_dir)?;
    let target = capture_dir.join(capture_file_name(Local::now()));
    std::fs::copy(source, &target)?;

    Ok(LocalImage::new(target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    #[test]
    fn test_capture_file_name() {
        let at = Local.with_ymd_and_hms(2019, 5, 1, 9, 8, 7).unwrap();
        assert_eq!(capture_file_name(at), "2019-05-01-09-08-07-000.jpg");
    }

    #[test]
    fn test_import_capture_copies_bytes() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("IMG_0001.JPG");
        std::fs::write(&source, b"jpeg bytes").unwrap();

        let capture_dir = dir.path().join("captures");
        let image = import_capture(&source, &capture_dir).unwrap();

        assert!(image.file_name.ends_with(".jpg"));
        assert_eq!(std::fs::read(image.path()).unwrap(), b"jpeg bytes");
        assert!(source.exists());
    }

    #[test]
    fn test_import_capture_missing_source() {
        let dir = tempdir().unwrap();
        let err = import_capture(&dir.path().join("none.jpg"), dir.path()).unwrap_err();
        assert!(matches!(err, DatasetBobError::Io(_)));
    }
}
