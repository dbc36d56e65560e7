pub mod archive;
pub mod cache;
pub mod cli;
pub mod error;
pub mod field;
pub mod filter;
pub mod format;
pub mod io_utils;
pub mod pipeline;
pub mod suite;

use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::OnceLock,
};

use anyhow::Context;
use clap::Parser;
use log::{LevelFilter, debug, info, warn};

use crate::{
    cli::Cli,
    error::RunError,
    field::Prefixes,
    suite::{ARCHIVE_EXT, Options, Workspace},
};

static LOGGER: OnceLock<()> = OnceLock::new();

const DEFAULT_EXTRACT_DIR: &str = ".";

fn init_logging(quiet: bool) {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            let level = if quiet {
                LevelFilter::Error
            } else {
                LevelFilter::Info
            };
            builder.filter_module("csm", level);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<(), RunError> {
    let cli = Cli::parse();
    init_logging(cli.quiet);
    execute(&cli)
}

/// Resolved output locations for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub extract_dir: PathBuf,
    pub output: Option<PathBuf>,
}

/// Applies the output rules: an output suite not named `*.zip` is a
/// directory that receives the input's file name, and the suite is always
/// assembled in the directory that holds it.
pub fn resolve_paths(input: &Path, output: Option<&Path>, extract_dir: Option<&Path>) -> Paths {
    let requested = extract_dir.unwrap_or(Path::new(DEFAULT_EXTRACT_DIR));
    let Some(output) = output else {
        return Paths {
            extract_dir: requested.to_path_buf(),
            output: None,
        };
    };

    let output = if output.extension().is_some_and(|ext| ext == ARCHIVE_EXT) {
        output.to_path_buf()
    } else {
        let joined = output.join(input.file_name().unwrap_or(input.as_os_str()));
        warn!("using default output file name: {joined:?}");
        joined
    };
    let parent = parent_dir(&output);
    if requested != Path::new(DEFAULT_EXTRACT_DIR) && requested != parent {
        warn!("using directory of output suite instead of extraction path: {parent:?}");
    }
    Paths {
        extract_dir: parent,
        output: Some(output),
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from(DEFAULT_EXTRACT_DIR),
    }
}

fn options_from(cli: &Cli) -> Options {
    Options {
        list_fields: cli.list_fields,
        invert: cli.invert,
        keep_content: cli.keep_content,
        quiet: cli.quiet,
        filters: cli.filters.clone(),
        format: cli.format.clone().unwrap_or_default(),
        columns: cli.columns.clone(),
        takeoff: cli.takeoff,
        landing: cli.landing,
        prefixes: Prefixes::default(),
    }
}

pub fn execute(cli: &Cli) -> Result<(), RunError> {
    let paths = resolve_paths(&cli.input, cli.output.as_deref(), cli.extract_dir.as_deref());
    debug!("Resolved paths: {paths:?}");
    fs::create_dir_all(&paths.extract_dir)
        .with_context(|| format!("Creating directory {:?}", paths.extract_dir))
        .map_err(RunError::Prepare)?;

    let mut workspace = Workspace::new(&cli.input, &paths.extract_dir, paths.output.as_deref());
    let meta = fs::metadata(&cli.input)
        .with_context(|| format!("Reading {:?}", cli.input))
        .map_err(RunError::Stat)?;
    if meta.is_dir() {
        workspace.replicate().map_err(RunError::Replicate)?;
    } else if workspace.stale() {
        workspace.extract().map_err(RunError::Extract)?;
    } else {
        info!("{:?} is up to date", workspace.content_dir());
    }

    let opts = options_from(cli);
    for filter in &opts.filters {
        debug!("filter {filter}");
    }
    workspace.filter(&opts).map_err(RunError::Filter)?;

    if paths.output.is_some() && !opts.list_fields {
        workspace.compress().map_err(RunError::Compress)?;
        workspace.cleanup(&opts).map_err(RunError::Cleanup)?;
    }

    info!("ok!");
    Ok(())
}
