//! リモート階層の固定値

/// ルートフォルダ名
pub const ROOT_FOLDER_NAME: &str = "Datasets";

/// 初回ブートストラップで作るデータセット
pub const SAMPLE_DATASET_NAME: &str = "Sample";

/// 初回ブートストラップで Sample 直下に作るカテゴリ
pub const BOOTSTRAP_CATEGORIES: [&str; 2] = ["label1", "label2"];

pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

pub const DEFAULT_UPLOAD_MIME_TYPE: &str = "image/jpeg";

/// 付与する権限ロール
pub const PERMISSION_ROLE: &str = "writer";

/// 分類対象の拡張子（大文字小文字は区別しない）
pub const EXTENSION_WHITELIST: &[&str] = &["JPG"];

pub fn is_whitelisted_extension(ext: &str) -> bool {
    EXTENSION_WHITELIST
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(ext))
}
