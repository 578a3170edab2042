//! Command-line front end for persistfs.
//!
//! Every invocation behaves like an application start: the volume is
//! mounted over a durable store on local disk and populated, and only once
//! the load entry point has fired does the command touch the volume.

use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use persistfs::{ConfigError, InitContext, InitError, Initializer, VolumeConfig};
use persistfs_host::{
    Bytes, Capability, CapabilityRegistry, EntryKind, HostEnv, HostError, HostFilesystem,
    MountPath, PathError,
};
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// persistfs - inspect and edit a persistent volume
#[derive(Parser, Debug)]
#[command(name = "persistfs")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Directory holding the durable store (defaults to the user data dir)
    #[arg(long)]
    pub store: Option<PathBuf>,

    /// JSON volume config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Give up on the initial sync after this many milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List the volume root
    Ls,
    /// Print a file from the volume
    Cat { name: String },
    /// Write a file into the volume
    Put { name: String, value: String },
    /// Remove a file from the volume
    Rm { name: String },
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("no user data directory; pass --store")]
    NoDataDir,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Init(#[from] InitError),

    #[error(transparent)]
    Host(#[from] HostError),

    #[error(transparent)]
    Path(#[from] PathError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Install the stderr log subscriber, honouring `RUST_LOG`.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn default_store_dir() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("persistfs"))
        .ok_or(CliError::NoDataDir)
}

fn count_files(fs: &dyn HostFilesystem, dir: &MountPath) -> usize {
    fs.read_dir(dir)
        .unwrap_or_default()
        .into_iter()
        .map(|entry| match entry.kind {
            EntryKind::File => 1,
            EntryKind::Directory => dir
                .join(&entry.name)
                .map(|sub| count_files(fs, &sub))
                .unwrap_or(0),
        })
        .sum()
}

/// Create every missing directory between `volume` and `path`.
async fn ensure_parents(
    fs: &dyn HostFilesystem,
    volume: &MountPath,
    path: &MountPath,
) -> Result<(), CliError> {
    let mut missing = Vec::new();
    let mut dir = path.parent();
    while let Some(current) = dir {
        if &current == volume || fs.exists(&current) {
            break;
        }
        dir = current.parent();
        missing.push(current);
    }
    for dir in missing.into_iter().rev() {
        fs.create_dir(&dir).await?;
    }
    Ok(())
}

async fn execute(
    command: &Command,
    fs: &dyn HostFilesystem,
    volume: &MountPath,
    out: &mut impl Write,
) -> Result<(), CliError> {
    match command {
        Command::Ls => {
            for entry in fs.read_dir(volume)? {
                let suffix = match entry.kind {
                    EntryKind::Directory => "/",
                    EntryKind::File => "",
                };
                writeln!(out, "{}{}", entry.name, suffix)?;
            }
        }
        Command::Cat { name } => {
            let data = fs.read_file(&volume.join(name)?)?;
            out.write_all(&data)?;
        }
        Command::Put { name, value } => {
            let path = volume.join(name)?;
            ensure_parents(fs, volume, &path).await?;
            fs.write_file(&path, Bytes::from(value.clone())).await?;
        }
        Command::Rm { name } => {
            fs.remove_file(&volume.join(name)?).await?;
        }
    }
    Ok(())
}

/// Bring the volume online, then run the command against it.
pub async fn run(args: Args, out: &mut impl Write) -> Result<(), CliError> {
    let mut config = match &args.config {
        Some(path) => VolumeConfig::load(path)?,
        None => VolumeConfig::default(),
    };
    if let Some(ms) = args.timeout_ms {
        config.sync_timeout_ms = Some(ms);
    }

    let store = match args.store {
        Some(dir) => dir,
        None => default_store_dir()?,
    };
    let env = HostEnv::local_disk(store)?;
    let fs = env.filesystem().ok_or(InitError::EnvironmentUnavailable {
        missing: Capability::Filesystem,
    })?;
    let volume = config.mount_path.clone();

    let ctx = InitContext::with_config(env, config, {
        let fs = fs.clone();
        let volume = volume.clone();
        move || {
            let files = count_files(fs.as_ref(), &volume);
            info!(files, "persisted state restored");
        }
    });
    Initializer::new(ctx).run().await?;

    execute(&args.command, fs.as_ref(), &volume, out).await
}
