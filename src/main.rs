use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rust_drive::{
    config::{Config, ServerMode},
    delete::DeletionOutcome,
    progress::{format_eta, format_file_size},
    session::DirectorySink,
    FolderKey, HttpStorageClient, SessionContext, SessionOptions, StorageApi, StorageSession,
    UploadSource,
};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

#[derive(Parser)]
#[command(name = "rust-drive")]
#[command(about = "Browse and manage files on a personal storage server", long_about = None)]
struct Cli {
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[arg(short, long)]
    verbose: bool,

    #[arg(short, long, help = "Act as this user")]
    username: Option<String>,

    #[arg(short, long, help = "Server to talk to: local or remote")]
    server: Option<ServerMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the files of a folder
    Ls {
        #[arg(help = "Folder name (default: Home)")]
        folder: Option<String>,
    },

    /// List your folders
    Folders,

    /// Create a folder
    Mkdir {
        name: String,
    },

    Upload {
        #[arg(required = true, help = "Local files to upload")]
        files: Vec<PathBuf>,

        #[arg(short, long, help = "Destination folder (default: Home)")]
        folder: Option<String>,
    },

    Download {
        #[arg(help = "File name")]
        name: String,

        #[arg(short, long, help = "Folder holding the file (default: Home)")]
        folder: Option<String>,

        #[arg(short, long, default_value = ".", help = "Directory to save into")]
        output: PathBuf,
    },

    /// Delete a file
    Rm {
        name: String,

        #[arg(short, long)]
        folder: Option<String>,

        #[arg(short, long, help = "Do not ask for confirmation")]
        yes: bool,
    },

    /// Delete a folder and everything in it
    Rmdir {
        folder: String,

        #[arg(short, long, help = "Do not ask for confirmation")]
        yes: bool,
    },

    /// Show your activity history
    Activity,

    /// Check credentials against the server
    Login {
        #[arg(short, long)]
        password: String,
    },

    /// Create an account
    Register {
        #[arg(short, long)]
        password: String,
    },

    /// Write the effective configuration to a file
    SaveConfig {
        #[arg(help = "Target path (default: per-user config file)")]
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(username) = cli.username {
        config.username = Some(username);
    }
    if let Some(mode) = cli.server {
        config.server.mode = mode;
    }

    if let Commands::SaveConfig { path } = &cli.command {
        let path = match path.clone().or_else(Config::default_path) {
            Some(path) => path,
            None => bail!("No config directory available; pass a path"),
        };
        config.save_to_file(&path)?;
        println!("Configuration saved to {}", path.display());
        return Ok(());
    }

    let base_url = config.base_url()?;
    info!("Using {} server at {}", config.server.mode, base_url);
    let client = Arc::new(
        HttpStorageClient::new(base_url).context("Failed to create storage client")?,
    );

    let username = config
        .username
        .clone()
        .context("No username configured; pass --username or set DRIVE_USERNAME")?;

    let session = StorageSession::new(
        client.clone(),
        SessionContext::new(username.clone()),
        SessionOptions::from(&config),
    );

    match cli.command {
        Commands::Ls { folder } => {
            let folder = folder_arg(folder);
            session.select_folder(folder.clone()).await
                .with_context(|| format!("Failed to list {}", folder))?;

            let listing = session.snapshot().listing;
            if listing.entries.is_empty() {
                println!("No files in {}", folder);
            } else {
                println!("Files in {}:", folder);
                for entry in &listing.entries {
                    println!(
                        "  {:<40} {:>10}  {}",
                        entry.name,
                        format_file_size(entry.size),
                        entry.created.format("%Y-%m-%d %H:%M:%S")
                    );
                }
            }
        }

        Commands::Folders => {
            session.refresh_subfolders().await
                .context("Failed to list folders")?;
            println!("{}", FolderKey::Home);
            for name in session.snapshot().subfolders {
                println!("{}", name);
            }
        }

        Commands::Mkdir { name } => {
            session.create_folder(&name).await
                .with_context(|| format!("Failed to create folder {}", name))?;
            println!("Created folder {}", name.trim());
        }

        Commands::Upload { files, folder } => {
            let folder = folder_arg(folder);
            let mut sources = Vec::with_capacity(files.len());
            for path in &files {
                let source = UploadSource::from_path(path).await
                    .with_context(|| format!("Cannot upload {}", path.display()))?;
                sources.push(source);
            }

            session.select_folder(folder.clone()).await
                .with_context(|| format!("Failed to open {}", folder))?;
            let total = sources.len();

            let upload = session.upload_files(sources);
            tokio::pin!(upload);
            let mut ticker = tokio::time::interval(Duration::from_millis(250));
            let report = loop {
                tokio::select! {
                    report = &mut upload => break report,
                    _ = ticker.tick() => print_progress(&session),
                }
            };
            print_progress(&session);
            eprintln!();

            for name in &report.succeeded {
                println!("Uploaded {} to {}", name, folder);
            }
            for (name, error) in &report.failed {
                eprintln!("Failed to upload {}: {}", name, error);
            }
            if !report.all_succeeded() {
                bail!("{} of {} uploads failed", report.failed.len(), total);
            }
        }

        Commands::Download { name, folder, output } => {
            let folder = folder_arg(folder);
            session.select_folder(folder.clone()).await
                .with_context(|| format!("Failed to open {}", folder))?;
            let path = session.download_file(&name, &DirectorySink::new(output)).await
                .with_context(|| format!("Failed to download {}", name))?;
            println!("Downloaded to: {}", path.display());
        }

        Commands::Rm { name, folder, yes } => {
            let folder = folder_arg(folder);
            session.select_folder(folder.clone()).await
                .with_context(|| format!("Failed to open {}", folder))?;
            session.delete_file(&name)?;
            confirm_or_cancel(&session, yes).await?;
        }

        Commands::Rmdir { folder, yes } => {
            let folder = FolderKey::parse(&folder);
            session.select_folder(folder.clone()).await
                .with_context(|| format!("Failed to open {}", folder))?;
            session.delete_current_folder()?;
            confirm_or_cancel(&session, yes).await?;
        }

        Commands::Activity => {
            let records = session.activity_log().await
                .context("Failed to fetch activity log")?;
            if records.is_empty() {
                println!("No activity yet.");
            }
            for record in records {
                println!(
                    "{}  {:<10} {}",
                    record.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    record.action.to_uppercase(),
                    record.filename
                );
            }
        }

        Commands::Login { password } => {
            client.login(&username, &password).await
                .context("Login failed")?;
            println!("Credentials accepted for {}", username);
        }

        Commands::Register { password } => {
            client.register(&username, &password).await
                .context("Account creation failed")?;
            println!("Account created. You can now log in as {}", username);
        }

        // written before connecting
        Commands::SaveConfig { .. } => {}
    }

    Ok(())
}

fn folder_arg(folder: Option<String>) -> FolderKey {
    folder.as_deref().map(FolderKey::parse).unwrap_or_default()
}

fn print_progress(session: &StorageSession) {
    let now = Instant::now();
    let line = session
        .snapshot()
        .uploads
        .iter()
        .map(|item| match item.eta(now) {
            Some(eta) if item.whole_percent() < 100 => {
                format!("{} {}% ({})", item.name, item.whole_percent(), format_eta(eta))
            }
            _ => format!("{} {}%", item.name, item.whole_percent()),
        })
        .collect::<Vec<_>>()
        .join(" | ");
    eprint!("\r{}", line);
    let _ = std::io::stderr().flush();
}

async fn confirm_or_cancel(session: &StorageSession, assume_yes: bool) -> Result<()> {
    let message = session
        .snapshot()
        .pending_deletion
        .message()
        .unwrap_or_default();

    if !assume_yes && !ask(&message)? {
        session.cancel_deletion();
        println!("Cancelled");
        return Ok(());
    }

    match session.confirm_deletion().await? {
        Some(DeletionOutcome::File(name)) => println!("Deleted {}", name),
        Some(DeletionOutcome::Folder(name)) => println!("Deleted folder {}", name),
        None => println!("Nothing to delete"),
    }
    Ok(())
}

fn ask(message: &str) -> Result<bool> {
    print!("{} [y/N] ", message);
    std::io::stdout().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(matches!(input.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}
