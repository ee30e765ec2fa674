use std::path::{Path, PathBuf};

use anyhow::Context;
use cabinet_core::CabinetClient;
use cabsync::config::{self, ServiceConfig};
use cabsync::sync::cache::FolderCache;
use cabsync::sync::engine::SyncEngine;
use cabsync::sync::overwrite::OverwritePolicy;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

const DEFAULT_CABINET_ROOT: &str = "FileCabinet";

#[derive(Parser)]
#[command(
    name = "cabsync",
    version,
    about = "Mirror folders of a remote file cabinet onto the local filesystem"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Pull a cabinet folder and its files into the local mirror
    PullFolder {
        /// Folder path under the configured file cabinet root
        path: PathBuf,
        /// Only fetch files directly inside the folder, skipping subfolders
        #[arg(long)]
        no_recursive: bool,
        /// Overwrite existing local files without prompting
        #[arg(long, conflicts_with = "keep_existing")]
        overwrite: bool,
        /// Keep existing local files without prompting
        #[arg(long)]
        keep_existing: bool,
    },
    /// Set the local directory that mirrors the cabinet root
    SetFileCabinetRoot {
        /// Defaults to ./FileCabinet when omitted
        path: Option<String>,
    },
    /// Upload a single local file into a cabinet folder
    Upload {
        /// Local file to send
        file: PathBuf,
        /// Description shown by the remote service
        #[arg(short, long)]
        description: Option<String>,
        /// Target folder id; defaults to CABSYNC_FOLDER_ID
        #[arg(short, long)]
        folder: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Command::SetFileCabinetRoot { path } => set_file_cabinet_root(path.as_deref()),
        Command::PullFolder {
            path,
            no_recursive,
            overwrite,
            keep_existing,
        } => {
            let policy = if overwrite {
                OverwritePolicy::Always
            } else if keep_existing {
                OverwritePolicy::Never
            } else {
                OverwritePolicy::Prompt
            };
            pull_folder(&path, !no_recursive, policy).await
        }
        Command::Upload {
            file,
            description,
            folder,
        } => upload(&file, description.as_deref(), folder.as_deref()).await,
    }
}

fn set_file_cabinet_root(path: Option<&str>) -> anyhow::Result<()> {
    let mut cache = FolderCache::open(&config::state_dir())?;
    let root = path.unwrap_or(DEFAULT_CABINET_ROOT);
    cache.set_file_cabinet_root(root)?;
    eprintln!("[cabsync] file cabinet root set to {root}");
    Ok(())
}

async fn pull_folder(path: &Path, recursive: bool, policy: OverwritePolicy) -> anyhow::Result<()> {
    let config = ServiceConfig::from_env()?;
    let client =
        CabinetClient::with_timeout(&config.endpoint, config.passport, config.request_timeout)?;
    let cache = FolderCache::open(&config::state_dir())?;
    let mut engine = SyncEngine::new(client, cache, policy, cancel_on_ctrl_c())?;

    let report = engine.pull_folder(path, recursive).await?;
    println!(
        "Pulled folder {}: {} fetched, {} skipped, {} failed",
        report.folder_id, report.stats.fetched, report.stats.skipped, report.stats.failed
    );
    if report.stats.failed > 0 {
        anyhow::bail!("{} files failed to download", report.stats.failed);
    }
    Ok(())
}

async fn upload(file: &Path, description: Option<&str>, folder: Option<&str>) -> anyhow::Result<()> {
    let config = ServiceConfig::from_env()?;
    let folder_id = folder
        .map(str::to_string)
        .or_else(|| config.default_folder_id.clone())
        .context("no target folder: pass --folder or set CABSYNC_FOLDER_ID")?;
    let name = file
        .file_name()
        .and_then(|name| name.to_str())
        .context("file name is not valid UTF-8")?
        .to_string();
    let content = tokio::fs::read(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;

    let client =
        CabinetClient::with_timeout(&config.endpoint, config.passport, config.request_timeout)?;
    let receipt = client
        .add_file(&name, description, &folder_id, &content)
        .await?;
    println!(
        "File uploaded successfully as internal id {}",
        receipt.internal_id
    );
    Ok(())
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("[cabsync] interrupt received, stopping after the current step");
            trigger.cancel();
        }
    });
    cancel
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn pull_folder_defaults_to_recursive_prompting_mode() {
        let cli = Cli::try_parse_from(["cabsync", "pull-folder", "Scripts/Events"]).unwrap();
        match cli.command {
            Command::PullFolder {
                path,
                no_recursive,
                overwrite,
                keep_existing,
            } => {
                assert_eq!(path, PathBuf::from("Scripts/Events"));
                assert!(!no_recursive);
                assert!(!overwrite);
                assert!(!keep_existing);
            }
            _ => panic!("expected pull-folder"),
        }
    }

    #[test]
    fn overwrite_and_keep_existing_conflict() {
        assert!(
            Cli::try_parse_from([
                "cabsync",
                "pull-folder",
                "Scripts",
                "--overwrite",
                "--keep-existing"
            ])
            .is_err()
        );
    }
}
