use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pagekit::config::Config;
use pagekit::dom::FileDescriptor;
use pagekit::format::{file_icon, format_file_size, guess_mime_type};
use pagekit::preferences::FileStorage;
use pagekit::PageContext;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting pagekit v{}", env!("CARGO_PKG_VERSION"));

    let storage = Arc::new(FileStorage::new(config.storage_path.clone()));
    info!("Preferences stored at {}", storage.path().display());

    // No system clipboard in a terminal session; copies use the page fallback.
    let ctx = PageContext::init(config, storage, None)?;
    info!("Theme restored: {}", ctx.preferences.stored_theme());

    let outcome = match std::env::args().nth(1) {
        Some(path) => upload(&ctx, Path::new(&path)).await,
        None => {
            health_check(&ctx).await;
            Ok(())
        }
    };
    if let Err(e) = outcome {
        ctx.notifier.report_unexpected(&e);
    }

    for notification in ctx.notifier.active() {
        println!("[{}] {}", notification.severity, notification.message);
    }
    Ok(())
}

async fn upload(ctx: &PageContext, path: &Path) -> Result<()> {
    let contents = tokio::fs::read(path)
        .await
        .with_context(|| format!("Cannot read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    let file = FileDescriptor::new(&name, contents.len() as u64, guess_mime_type(&name));
    info!(
        icon = file_icon(&file.name),
        "Uploading {} ({})",
        file.name,
        format_file_size(file.size)
    );

    let task = ctx.progress.create_task_in(ctx.page.body(), &file.name);
    let result = ctx
        .requests
        .upload(
            &ctx.config.endpoint("upload"),
            "file",
            &file,
            Bytes::from(contents),
            Some((&ctx.progress, &task)),
        )
        .await;

    match result {
        Ok(_) => {
            ctx.notifier.success(format!("{} uploaded", file.name));
        }
        Err(e) => {
            ctx.notifier.report(&e);
        }
    }
    Ok(())
}

async fn health_check(ctx: &PageContext) {
    match ctx.requests.get(&ctx.config.endpoint("health")).await {
        Ok(payload) => {
            let status = payload
                .get("status")
                .and_then(|s| s.as_str())
                .unwrap_or("ok");
            ctx.notifier.success(format!("Backend reachable: {status}"));
        }
        Err(e) => {
            ctx.notifier.report(&e);
        }
    }
}
