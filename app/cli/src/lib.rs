mod commands;

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use offline_core::log::{LogConfig, LogLevel};
use offline_core::{DiskCacheStorage, HttpNetwork, Interceptor, ShimConfig};
use url::Url;

/// Pre-populates an offline cache region and answers requests from it.
#[derive(Clone, Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// JSON config file. Defaults apply to anything it leaves out.
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Origin the manifest and relative URLs resolve against.
    #[arg(long, global = true)]
    pub origin: Option<Url>,

    /// Directory holding the cache regions.
    #[arg(long, global = true)]
    pub storage_root: Option<PathBuf>,

    /// Print request statistics as JSON to stderr when done.
    #[arg(long, global = true)]
    pub stats: bool,

    /// Log debug output to stderr.
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Clone, Subcommand, Debug)]
pub enum Command {
    /// Fetch every manifest entry and store it in the cache region.
    Install,
    /// Resolve one request through the interceptor and write the body to stdout.
    Fetch {
        /// Absolute URL, or a path relative to the origin.
        target: String,
        /// Treat the request as a page navigation.
        #[arg(long)]
        navigate: bool,
        /// Request destination, e.g. `style`, `script`, `image`.
        #[arg(long)]
        dest: Option<String>,
    },
    /// List the keys stored in the cache region.
    Keys,
}

impl Cli {
    /// Merge the config file with the command-line overrides.
    pub fn shim_config(&self) -> offline_core::Result<ShimConfig> {
        let mut config = match &self.config {
            Some(path) => ShimConfig::load(path)?,
            None => ShimConfig::default(),
        };
        if let Some(origin) = &self.origin {
            config = config.with_origin(origin.clone());
        }
        if let Some(root) = &self.storage_root {
            config = config.with_storage_root(root);
        }
        config.validate()?;
        Ok(config)
    }
}

pub async fn run() -> ExitCode {
    let cli = Cli::parse();

    let mut log_config = LogConfig::default();
    if cli.verbose {
        log_config = log_config.with_console_level(LogLevel::DEBUG);
    }
    if let Err(err) = offline_core::log::init(log_config) {
        eprintln!("failed to initialise logging: {err:#}");
    }

    let mut stdout = std::io::stdout().lock();
    let mut stderr = std::io::stderr();
    match execute(&cli, &mut stdout, &mut stderr).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err:#}");
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Run the selected command. Command output goes to `out`; the stats report goes to `diag` so it
/// never mixes with a fetched body.
async fn execute<O, D>(cli: &Cli, out: &mut O, diag: &mut D) -> anyhow::Result<()>
where
    O: Write,
    D: Write,
{
    let config = cli.shim_config()?;
    let storage = DiskCacheStorage::new(&config.storage_root)?;
    let interceptor = Interceptor::new(config, storage, HttpNetwork::new());

    match &cli.command {
        Command::Install => commands::install(&interceptor, out).await?,
        Command::Fetch { target, navigate, dest } => {
            let request = commands::build_request(
                &interceptor.config().origin,
                target,
                *navigate,
                dest.as_deref(),
            )?;
            commands::fetch(&interceptor, &request, out).await?
        }
        Command::Keys => commands::keys(&interceptor, out).await?,
    }

    if cli.stats {
        let snapshot = interceptor.stats().snapshot();
        serde_json::to_writer_pretty(&mut *diag, &snapshot)?;
        diag.write_all(b"\n")?;
    }
    Ok(())
}
