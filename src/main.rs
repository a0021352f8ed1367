use anyhow::{bail, Context};
use clap::Parser;
use dataset_bob::common::{Category, Dataset, JobState, LocalImage};
use dataset_bob::{cli, config, logger, scanner};
use dataset_bob::progress::ProgressIndicator;
use dataset_bob::{ClassificationPipeline, InMemoryStore, Session};
use cli::{Cli, Commands};
use config::Config;
use dialoguer::Select;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let Cli {
        command,
        verbose,
        offline,
        dir,
        job_policy,
    } = Cli::parse();
    logger::setup_logging(verbose);

    let mut config = Config::load().context("設定の読み込みに失敗しました")?;
    if let Some(policy) = job_policy {
        config.job_policy = policy;
    }
    let capture_dir = dir.unwrap_or_else(|| config.capture_dir());

    match command {
        Commands::Config {
            set_access_token,
            add_principal,
            set_capture_dir,
            show,
        } => {
            if let Some(token) = set_access_token {
                config.set_access_token(token)?;
                println!("✔ アクセストークンを設定しました");
            }

            if let Some(principal) = add_principal {
                if !config.permission_principals.contains(&principal) {
                    config.permission_principals.push(principal.clone());
                }
                config.save()?;
                println!("✔ 権限付与先を追加しました: {}", principal);
            }

            if let Some(path) = set_capture_dir {
                config.capture_dir = Some(path.clone());
                config.save()?;
                println!("✔ 撮影フォルダを設定しました: {}", path.display());
            }

            if show {
                println!("設定:");
                println!("  API: {}", config.api_base_url);
                println!("  アップロードAPI: {}", config.upload_base_url);
                println!("  撮影フォルダ: {}", config.capture_dir().display());
                println!("  権限付与先: {:?}", config.permission_principals);
                println!("  Content-Type: {}", config.upload_mime_type);
                println!("  タイムアウト: {}秒", config.timeout_seconds);
                println!("  同時分類: {:?}", config.job_policy);
                println!(
                    "  アクセストークン: {}",
                    if config.access_token().is_some() { "設定済み" } else { "未設定" }
                );
            }
        }

        Commands::Capture { source } => {
            let image = scanner::import_capture(&source, &capture_dir)
                .with_context(|| format!("{} の取り込みに失敗しました", source.display()))?;
            println!("✔ 取り込みました: {}", image.path.display());
        }

        Commands::Images => {
            let images = scanner::scan_folder(&capture_dir)?;
            println!("📷 {}枚の画像 ({})", images.len(), capture_dir.display());
            for image in &images {
                println!("  {}", image.file_name);
            }
        }

        Commands::Datasets => {
            let pipeline = build_pipeline(offline, &config, &capture_dir)?;
            let resolution = pipeline.resolver().resolve_root_detailed().await?;

            if let Some(report) = &resolution.bootstrap {
                println!("✔ ルートフォルダを作成しました");
                if report.granted.is_empty() && report.failed_permissions.is_empty() {
                    println!("  ⚠ 権限付与先が未設定のため Sample は共有されていません");
                }
                for (name, error) in &report.failed_categories {
                    println!("  ⚠ カテゴリ {} の作成に失敗: {}", name, error);
                }
                for (principal, error) in &report.failed_permissions {
                    println!("  ⚠ {} への権限付与に失敗: {}", principal, error);
                }
            }

            let datasets = pipeline.resolver().list_datasets(&resolution.root).await?;
            println!("📁 {} ({}件)", resolution.root, datasets.len());
            for dataset in &datasets {
                println!("  {}", dataset);
            }
        }

        Commands::Categories { dataset } => {
            let pipeline = build_pipeline(offline, &config, &capture_dir)?;
            let dataset = choose_dataset(&pipeline, Some(&dataset)).await?;
            let categories = pipeline.select_dataset(dataset.clone()).await?;

            println!("📁 {} ({}件)", dataset, categories.len());
            for category in &categories {
                println!("  {}", category);
            }
        }

        Commands::Classify {
            image,
            dataset,
            category,
        } => {
            let pipeline = build_pipeline(offline, &config, &capture_dir)?;
            let dataset = choose_dataset(&pipeline, dataset.as_deref()).await?;
            let categories = pipeline.select_dataset(dataset.clone()).await?;
            let target = categories
                .iter()
                .find(|c| c.name() == category)
                .with_context(|| format!("カテゴリが見つかりません: {}/{}", dataset, category))?;

            let progress = ProgressIndicator::spawn(pipeline.state());
            let result = pipeline.classify(&LocalImage::new(image.clone()), target).await;
            progress.finish().await;
            let job = result?;

            if job.state() != JobState::Done {
                bail!(
                    "{} の分類に失敗しました: {}",
                    image.display(),
                    job.error().unwrap_or_default()
                );
            }
            println!("✔ {} → {}/{}", job.image().file_name, dataset, target);
        }

        Commands::Run => {
            let pipeline = build_pipeline(offline, &config, &capture_dir)?;
            run_interactive(&pipeline).await?;
        }
    }

    Ok(())
}

fn build_pipeline(
    offline: bool,
    config: &Config,
    capture_dir: &Path,
) -> anyhow::Result<ClassificationPipeline> {
    let scanner = Arc::new(scanner::FolderScanner::new(capture_dir));

    if offline {
        println!("⚠ オフラインモード: リモートはメモリ上のみです");
        return Ok(ClassificationPipeline::new(
            Arc::new(InMemoryStore::new()),
            scanner,
            config,
        ));
    }

    let session = Session::from_config(config)?;
    Ok(ClassificationPipeline::for_session(session, scanner, config))
}

/// 名前指定があればそのデータセット、なければ先頭
async fn choose_dataset(pipeline: &ClassificationPipeline, name: Option<&str>) -> anyhow::Result<Dataset> {
    let datasets = pipeline.load_datasets().await?;
    let found = match name {
        Some(name) => datasets.into_iter().find(|d| d.name() == name),
        None => datasets.into_iter().next(),
    };
    found.with_context(|| format!("データセットが見つかりません: {}", name.unwrap_or("(先頭)")))
}

enum RunAction {
    Classify(Category),
    Skip,
    Discard,
    Quit,
}

async fn run_interactive(pipeline: &ClassificationPipeline) -> anyhow::Result<()> {
    let datasets = pipeline.load_datasets().await?;
    if datasets.is_empty() {
        bail!("データセットがありません");
    }

    let names: Vec<String> = datasets.iter().map(|d| d.to_string()).collect();
    let index = Select::new()
        .with_prompt("データセットを選択")
        .items(&names)
        .default(0)
        .interact()?;
    let dataset = datasets[index].clone();
    let categories = pipeline.select_dataset(dataset.clone()).await?;
    if categories.is_empty() {
        bail!("{} にカテゴリがありません", dataset);
    }

    pipeline.refresh_images().await?;
    let progress = ProgressIndicator::spawn(pipeline.state());
    let result = classify_images(pipeline, &categories).await;
    progress.finish().await;
    result
}

async fn classify_images(pipeline: &ClassificationPipeline, categories: &[Category]) -> anyhow::Result<()> {
    let mut skipped: Vec<PathBuf> = Vec::new();

    loop {
        let images = pipeline.state().images.get();
        let Some(image) = images.into_iter().find(|i| !skipped.contains(&i.path)) else {
            println!("✅ 分類待ちの画像はありません");
            break;
        };
        pipeline.select_image(Some(image.clone()));

        match prompt_action(&image, categories)? {
            RunAction::Classify(category) => {
                let job = pipeline.classify(&image, &category).await?;
                match job.state() {
                    JobState::Done => println!("✔ {} → {}", image.file_name, category),
                    _ => {
                        let message = pipeline.state().upload_error.take().unwrap_or_default();
                        println!("⚠ {} の分類に失敗: {}", image.file_name, message);
                        skipped.push(image.path.clone());
                    }
                }
            }
            RunAction::Skip => skipped.push(image.path.clone()),
            RunAction::Discard => {
                pipeline.discard(&image).await?;
                println!("🗑 {} を削除しました", image.file_name);
            }
            RunAction::Quit => break,
        }
    }

    Ok(())
}

fn prompt_action(image: &LocalImage, categories: &[Category]) -> anyhow::Result<RunAction> {
    let mut items: Vec<String> = categories.iter().map(|c| c.to_string()).collect();
    items.push("(スキップ)".into());
    items.push("(削除)".into());
    items.push("(終了)".into());

    let choice = Select::new()
        .with_prompt(format!("{} のカテゴリ", image.file_name))
        .items(&items)
        .default(0)
        .interact()?;

    let action = match choice {
        i if i < categories.len() => RunAction::Classify(categories[i].clone()),
        i if i == categories.len() => RunAction::Skip,
        i if i == categories.len() + 1 => RunAction::Discard,
        _ => RunAction::Quit,
    };
    Ok(action)
}
