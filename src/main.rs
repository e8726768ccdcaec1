//! hdfs — a command line client for HDFS clusters.
//!
//! Paths are given as plain absolute or relative paths, or as
//! `hdfs://authority/path` URLs. Plain paths are routed through
//! `fs.defaultFS`, including ViewFS mount tables and HA namenode groups, as
//! configured in the Hadoop site files. Shell-style wildcards are expanded
//! against the remote tree.
//!
//! - `hdfs ls [-l] [-a] [-h] <paths…>`
//! - `hdfs mkdir [-p] <paths…>`
//! - `hdfs touch [-c] <paths…>`
//! - `hdfs get <src> [dest]`
//! - `hdfs getmerge [-n] <src> <dest>`

mod backend;
mod commands;
mod conf;
mod errors;
mod glob;
mod resolver;
mod uri;

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context as _;
use clap::{ArgAction, Parser, Subcommand};

use backend::webhdfs::WebHdfsConnector;
use commands::Context;
use commands::ls::LsOptions;
use conf::Configuration;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "hdfs", version, about = "Command line client for HDFS")]
struct Cli {
    /// Directory holding core-site.xml and hdfs-site.xml
    #[arg(long, global = true, env = "HADOOP_CONF_DIR")]
    conf_dir: Option<PathBuf>,

    /// User to act as
    #[arg(long, global = true, env = "HADOOP_USER_NAME")]
    user: Option<String>,

    /// Request timeout in seconds
    #[arg(long, global = true, default_value_t = 30)]
    timeout: u64,

    /// Override a configuration value (repeatable)
    #[arg(short = 'D', global = true, value_name = "KEY=VALUE", value_parser = parse_define)]
    define: Vec<(String, String)>,

    /// More logging (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List files and directories
    #[command(disable_help_flag = true)]
    Ls {
        /// Long listing
        #[arg(short)]
        l: bool,
        /// Include hidden entries
        #[arg(short)]
        a: bool,
        /// Human readable sizes
        #[arg(short)]
        h: bool,
        /// Print help
        #[arg(long, action = ArgAction::Help)]
        help: Option<bool>,
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Create directories
    Mkdir {
        /// Create missing parents, ignore existing directories
        #[arg(short)]
        p: bool,
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Update timestamps, creating empty files where missing
    Touch {
        /// Do not create missing files
        #[arg(short)]
        c: bool,
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Copy a file or directory tree to the local disk
    Get { src: String, dest: Option<PathBuf> },
    /// Concatenate the files in a directory into one local file
    Getmerge {
        /// Add a newline after each file
        #[arg(short)]
        n: bool,
        src: String,
        dest: PathBuf,
    },
}

fn parse_define(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{s}'")),
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("hdfs: {e:#}");
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let conf = match &cli.conf_dir {
        Some(dir) => Configuration::load_from_dir(dir)?,
        None => Configuration::load_from_environment()?,
    }
    .with_overrides(cli.define);
    log::debug!("loaded {} configuration values", conf.len());

    let user = match cli.user {
        Some(user) => user,
        None => std::env::var("USER").context("cannot determine user, set HADOOP_USER_NAME")?,
    };
    let connector = WebHdfsConnector::new(&conf, &user, Duration::from_secs(cli.timeout))?;
    let ctx = Context::new(&conf, &connector);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;

    runtime.block_on(async {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        match cli.command {
            Commands::Ls { l, a, h, paths, .. } => {
                let opts = LsOptions {
                    long: l,
                    all: a,
                    human: h,
                };
                commands::ls::run(&ctx, &paths, opts, &mut out).await?;
            }
            Commands::Mkdir { p, paths } => commands::mkdir::run(&ctx, &paths, p).await?,
            Commands::Touch { c, paths } => commands::touch::run(&ctx, &paths, c).await?,
            Commands::Get { src, dest } => {
                commands::get::get(&ctx, &src, dest.as_deref()).await?;
            }
            Commands::Getmerge { n, src, dest } => {
                commands::get::getmerge(&ctx, &src, &dest, n).await?;
            }
        }
        out.flush()?;
        Ok::<(), anyhow::Error>(())
    })
}
