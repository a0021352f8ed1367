use crate::pipeline::AdmissionPolicy;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dataset-bob")]
#[command(about = "撮影画像をリモートのデータセット/カテゴリへ分類アップロードするツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Drive の代わりにメモリ上のストアを使う（動作確認用。分類した画像はローカルから削除される）
    #[arg(long, global = true)]
    pub offline: bool,

    /// 撮影フォルダ（省略時は設定値、未設定ならカレント）
    #[arg(short, long, global = true)]
    pub dir: Option<PathBuf>,

    /// 実行中に次の分類が来たときの扱い (reject/queue)
    #[arg(long, global = true)]
    pub job_policy: Option<AdmissionPolicy>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// データセット一覧（ルートがなければ作成）
    Datasets,

    /// データセット内のカテゴリ一覧
    Categories {
        /// データセット名
        #[arg(required = true)]
        dataset: String,
    },

    /// 分類待ちのローカル画像一覧
    Images,

    /// 画像1枚を分類してアップロード
    Classify {
        /// 画像ファイル
        #[arg(required = true)]
        image: PathBuf,

        /// データセット名（省略時は先頭）
        #[arg(short = 's', long)]
        dataset: Option<String>,

        /// カテゴリ名
        #[arg(short, long)]
        category: String,
    },

    /// 撮影フォルダの画像を対話的に分類
    Run,

    /// 画像を撮影フォルダへタイムスタンプ名で取り込む
    Capture {
        /// 取り込む画像ファイル
        #[arg(required = true)]
        source: PathBuf,
    },

    /// 設定を表示/編集
    Config {
        /// アクセストークンを設定
        #[arg(long)]
        set_access_token: Option<String>,

        /// Sample データセットの writer 権限付与先を追加
        #[arg(long)]
        add_principal: Option<String>,

        /// 撮影フォルダを設定
        #[arg(long)]
        set_capture_dir: Option<PathBuf>,

        /// 設定を表示
        #[arg(long)]
        show: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_classify() {
        let cli = Cli::try_parse_from([
            "dataset-bob",
            "classify",
            "a.jpg",
            "--dataset",
            "Sample",
            "--category",
            "label1",
            "--job-policy",
            "queue",
        ])
        .unwrap();

        assert_eq!(cli.job_policy, Some(AdmissionPolicy::Queue));
        match cli.command {
            Commands::Classify { image, dataset, category } => {
                assert_eq!(image, PathBuf::from("a.jpg"));
                assert_eq!(dataset.as_deref(), Some("Sample"));
                assert_eq!(category, "label1");
            }
            _ => panic!("expected classify"),
        }
    }
}
