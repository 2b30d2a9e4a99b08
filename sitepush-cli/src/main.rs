//! sitepush: resilient incremental FTPS deploys.
//!
//! Mirrors a local build directory onto an FTPS host, skipping files whose
//! remote size already matches and reconnecting whenever the server drops
//! the session.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use sitepush_deploy::ftps_transport::FtpsConnector;
use sitepush_deploy::hash_ledger::HashLedger;
use sitepush_deploy::scan::{LocalFile, TreeScanner};
use sitepush_deploy::sync_engine::create_sync_engine;
use sitepush_deploy::{CompareMode, Credentials, DeployConfig, SyncReport, TransferOutcome};

#[derive(Parser)]
#[command(name = "sitepush")]
#[command(version)]
#[command(about = "Incremental FTPS uploader that survives flaky sessions")]
#[command(long_about = r#"
sitepush uploads a local directory tree to an FTPS server.

  • Skips files whose remote size matches (or, with --compare hash, whose
    content hash matches the local ledger)
  • Retries failed uploads on a fresh session
  • Reopens the session every N uploads to dodge server-side limits

Credentials are read from an env file (FTP_HOST, FTP_USER, FTP_PASS,
FTP_PORT, FTP_REMOTE_ROOT, SITE_URL).

Examples:
  sitepush deploy ./web                 Upload changed files
  sitepush push index.html app.js       Force-upload specific files
  sitepush scan ./web                   List what would be considered
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Credential file
    #[arg(long, global = true, default_value = ".env", env = "SITEPUSH_ENV_FILE")]
    env_file: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a directory tree, skipping files that are already current
    Deploy {
        /// Local directory to mirror
        root: PathBuf,

        #[command(flatten)]
        remote: RemoteArgs,

        /// Change detection: size or hash
        #[arg(long, default_value = "size")]
        compare: CompareMode,

        /// Hash ledger used with --compare hash
        #[arg(long, default_value = ".sitepush-ledger.json")]
        ledger: PathBuf,
    },

    /// Upload specific files to the remote root unconditionally
    Push {
        /// Files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[command(flatten)]
        remote: RemoteArgs,
    },

    /// List the files a deploy would consider
    Scan {
        /// Directory to scan
        root: PathBuf,
    },
}

#[derive(Args)]
struct RemoteArgs {
    /// Remote directory to upload into
    #[arg(long)]
    remote_root: Option<String>,

    /// Upload attempts per file
    #[arg(long)]
    retries: Option<u32>,

    /// Uploads per session before reconnecting
    #[arg(long)]
    cycle_after: Option<u32>,

    /// Pause between attempts in milliseconds
    #[arg(long)]
    backoff_ms: Option<u64>,

    /// Location printed after a successful run
    #[arg(long)]
    site_url: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Scan { root } => scan_command(&root),
        Commands::Deploy {
            root,
            remote,
            compare,
            ledger,
        } => {
            let mut config = load_config(&cli.env_file, &remote)?;
            config.compare = compare;
            deploy_command(&root, &cli.env_file, &config, &ledger)
        }
        Commands::Push { files, remote } => {
            let config = load_config(&cli.env_file, &remote)?;
            push_command(&files, &config)
        }
    }
}

fn load_config(env_file: &Path, args: &RemoteArgs) -> Result<DeployConfig> {
    let creds = Credentials::load(env_file);
    let mut config = DeployConfig::from_credentials(&creds)
        .with_context(|| format!("reading {}", env_file.display()))?;

    if let Some(root) = &args.remote_root {
        config.remote_root = sitepush_deploy::config::normalize_remote_root(root);
    }
    if let Some(retries) = args.retries {
        config.retry_attempts = retries;
    }
    if let Some(cycle) = args.cycle_after {
        config.session_cycle_threshold = cycle;
    }
    if let Some(backoff) = args.backoff_ms {
        config.retry_backoff_ms = backoff;
    }
    if let Some(url) = &args.site_url {
        config.site_url = Some(url.clone());
    }

    config.validate()?;
    Ok(config)
}

fn scan_command(root: &Path) -> Result<()> {
    let files = TreeScanner::new(root).scan()?;
    let total: u64 = files.iter().map(|f| f.size).sum();

    println!("Files: {}", files.len());
    println!("Total size: {total} bytes");
    for file in &files {
        println!("  {} ({} bytes)", file.relative, file.size);
    }
    Ok(())
}

/// Files a deploy would send. The credential file and the hash ledger never
/// leave the machine, even when they sit inside the sync root.
fn deploy_files(root: &Path, env_file: &Path, ledger_path: &Path) -> Result<Vec<LocalFile>> {
    let files = TreeScanner::new(root)
        .exclude(env_file)
        .exclude(ledger_path)
        .scan()?;
    Ok(files)
}

fn deploy_command(
    root: &Path,
    env_file: &Path,
    config: &DeployConfig,
    ledger_path: &Path,
) -> Result<()> {
    let files = deploy_files(root, env_file, ledger_path)?;
    info!("Found {} files to deploy", files.len());

    let mut engine = create_sync_engine(config, FtpsConnector::from_config(config))?;
    if config.compare == CompareMode::Hash {
        engine = engine.with_ledger(HashLedger::load(ledger_path));
    }

    let report = engine.run(&files);
    print!("{}", render_summary(&report, config));

    if config.compare == CompareMode::Hash
        && let Err(e) = engine.ledger().save(ledger_path)
    {
        warn!("could not save hash ledger {}: {e}", ledger_path.display());
    }
    Ok(())
}

fn push_command(paths: &[PathBuf], config: &DeployConfig) -> Result<()> {
    let files = paths
        .iter()
        .map(LocalFile::standalone)
        .collect::<Result<Vec<_>, _>>()?;

    let mut engine = create_sync_engine(config, FtpsConnector::from_config(config))?;
    let report = engine.push(&files);

    print!("{}", render_summary(&report, config));
    Ok(())
}

fn render_summary(report: &SyncReport, config: &DeployConfig) -> String {
    let mut out = format!(
        "\nDone! Uploaded: {}, Skipped (unchanged): {}, Failed: {}\n",
        report.uploaded, report.skipped, report.failed
    );
    if !report.is_clean() {
        for path in report.paths_with(TransferOutcome::Failed) {
            out.push_str(&format!("  failed: {path}\n"));
        }
    }
    out.push_str(&format!("Live at: {}\n", live_location(config)));
    out
}

/// The site URL when configured, otherwise the remote target itself.
fn live_location(config: &DeployConfig) -> String {
    if let Some(url) = &config.site_url {
        return url.clone();
    }
    if config.port == 21 {
        format!("ftps://{}{}", config.host, config.remote_root)
    } else {
        format!("ftps://{}:{}{}", config.host, config.port, config.remote_root)
    }
}
