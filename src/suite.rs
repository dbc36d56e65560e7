//! A suite workspace: the source archive, its extracted content and the
//! filtered output files.
//!
//! Layout under the extraction directory `X`:
//!
//! - `X/.csv/` holds the extracted (or replicated) suite plus the cache
//!   snapshot;
//! - `X/takeoff.testcase.csv` and `X/landing.testcase.csv` are the filtered
//!   results, which may then be zipped into the output suite.

use std::{
    io::{self, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use csv::StringRecord;
use log::{info, warn};

use crate::{
    archive,
    cache::Cache,
    field::{FieldDef, Prefixes, Spec},
    filter::{Filter, FilterSet},
    format, io_utils,
    pipeline::{self, HeaderOnly, Outcome, PassStats, RecordHandler},
};

pub const ARCHIVE_EXT: &str = "zip";
pub const CONTENT_DIR: &str = ".csv";
pub const TAKEOFF_NAME: &str = "takeoff.testcase.csv";
pub const LANDING_NAME: &str = "landing.testcase.csv";

#[derive(Debug, Clone, Default)]
pub struct Options {
    pub list_fields: bool,
    pub invert: bool,
    pub keep_content: bool,
    pub quiet: bool,
    pub filters: Vec<Filter>,
    pub format: String,
    pub columns: Vec<String>,
    pub takeoff: bool,
    pub landing: bool,
    pub prefixes: Prefixes,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub takeoff: PassStats,
    pub landing: PassStats,
}

impl Summary {
    pub fn total(&self) -> PassStats {
        self.takeoff + self.landing
    }
}

#[derive(Debug)]
pub struct Workspace {
    source: PathBuf,
    content: PathBuf,
    extract_dir: PathBuf,
    output: Option<PathBuf>,
    cache: Cache,
}

impl Workspace {
    pub fn new(source: &Path, extract_dir: &Path, output: Option<&Path>) -> Self {
        let content = extract_dir.join(CONTENT_DIR);
        Workspace {
            source: source.to_path_buf(),
            cache: Cache::new(source, &content),
            content,
            extract_dir: extract_dir.to_path_buf(),
            output: output.map(Path::to_path_buf),
        }
    }

    pub fn content_dir(&self) -> &Path {
        &self.content
    }

    pub fn filtered_path(&self, name: &str) -> PathBuf {
        self.extract_dir.join(name)
    }

    /// True when the archive has to be extracted again.
    pub fn stale(&mut self) -> bool {
        match self.cache.read() {
            Ok(true) => {}
            Ok(false) => {
                warn!(
                    "No cache snapshot at {:?}; will create a new one",
                    self.cache.cache_file()
                );
                return true;
            }
            Err(err) => {
                warn!("Ignoring unreadable cache snapshot: {err:#}");
                return true;
            }
        }
        if let Err(err) = self.cache.update() {
            warn!("Could not refresh cache snapshot: {err:#}");
            return true;
        }
        self.cache.stale().stale
    }

    pub fn extract(&mut self) -> Result<()> {
        info!("extract {:?} -> {:?}", self.source, self.content);
        io_utils::recreate_dir(&self.content)?;
        archive::unpack(&self.source, &self.content)?;
        self.cache.update()?;
        for name in self.cache.stale().changed {
            warn!("updated {name:?}");
        }
        self.cache.write()
    }

    pub fn replicate(&self) -> Result<()> {
        info!("replicate {:?} -> {:?}", self.source, self.content);
        io_utils::recreate_dir(&self.content)?;
        archive::replicate(&self.source, &self.content, &[LANDING_NAME, TAKEOFF_NAME])
    }

    pub fn filter(&self, opts: &Options) -> Result<Summary> {
        if !opts.list_fields {
            info!("filter {:?} -> {:?}", self.content, self.extract_dir);
        }
        let summary = Summary {
            takeoff: self.filter_one(TAKEOFF_NAME, opts.takeoff, opts)?,
            landing: self.filter_one(LANDING_NAME, opts.landing, opts)?,
        };
        if !opts.list_fields {
            let total = summary.total();
            info!(
                "retained {} of {} records ({} of {} takeoff, {} of {} landing)",
                total.retained,
                total.processed,
                summary.takeoff.retained,
                summary.takeoff.processed,
                summary.landing.retained,
                summary.landing.processed,
            );
        }
        Ok(summary)
    }

    fn filter_one(&self, name: &str, enabled: bool, opts: &Options) -> Result<PassStats> {
        let source = self.content.join(name);
        let destination = (!opts.list_fields).then(|| self.filtered_path(name));
        if enabled {
            let mut handler = SuiteHandler::new(name, opts);
            pipeline::filter_file(&source, destination.as_deref(), &mut handler)
        } else {
            pipeline::filter_file(&source, destination.as_deref(), &mut HeaderOnly)
        }
    }

    pub fn compress(&self) -> Result<()> {
        let output = self
            .output
            .as_deref()
            .ok_or_else(|| anyhow!("No output suite path configured"))?;
        info!("compress {:?} -> {:?}", self.extract_dir, output);
        io_utils::remove_if_exists(output)
            .with_context(|| format!("Removing previous suite {output:?}"))?;
        let takeoff = self.filtered_path(TAKEOFF_NAME);
        let landing = self.filtered_path(LANDING_NAME);
        archive::pack(&[takeoff.as_path(), landing.as_path()], output)
    }

    pub fn cleanup(&self, opts: &Options) -> Result<()> {
        if opts.keep_content {
            return Ok(());
        }
        let takeoff = self.filtered_path(TAKEOFF_NAME);
        let landing = self.filtered_path(LANDING_NAME);
        info!("cleanup {:?} {:?}", takeoff, landing);
        for path in [&takeoff, &landing] {
            io_utils::remove_if_exists(path).with_context(|| format!("Removing {path:?}"))?;
        }
        Ok(())
    }
}

/// Per-file state built from the header row.
struct FileState<'a> {
    filters: FilterSet<'a>,
    selected: Vec<Spec>,
}

/// Filters one suite file against the configured filters.
pub struct SuiteHandler<'a> {
    name: &'a str,
    opts: &'a Options,
    state: Option<FileState<'a>>,
}

impl<'a> SuiteHandler<'a> {
    pub fn new(name: &'a str, opts: &'a Options) -> Self {
        SuiteHandler {
            name,
            opts,
            state: None,
        }
    }

    fn print(&self, line: Option<String>) -> Result<()> {
        if self.opts.quiet {
            return Ok(());
        }
        if let Some(line) = line {
            writeln!(io::stdout().lock(), "{line}").context("Writing to stdout")?;
        }
        Ok(())
    }
}

impl RecordHandler for SuiteHandler<'_> {
    fn header(&mut self, record: StringRecord) -> Result<Outcome> {
        let opts = self.opts;
        let names: Vec<&str> = record.iter().collect();
        let def = FieldDef::new(&names, opts.prefixes.clone());
        if opts.list_fields {
            def.describe(&mut io::stdout().lock(), self.name)
                .context("Writing field definitions")?;
            return Ok(Outcome::stop(record));
        }

        let filters = FilterSet::bind(self.name, &opts.filters, &def);
        let mut selected = Vec::with_capacity(opts.columns.len());
        for column in &opts.columns {
            match def.column_for(column) {
                Some(col) => selected.push(Spec {
                    name: column.clone(),
                    col,
                }),
                None => warn!("ignoring unknown format field: {}: {column:?}", self.name),
            }
        }
        let heading: Vec<&str> = selected.iter().map(|s| s.name.as_str()).collect();
        self.print(format::render(&opts.format, &heading))?;

        self.state = Some(FileState { filters, selected });
        Ok(Outcome::keep(record))
    }

    fn record(&mut self, record: StringRecord) -> Result<Outcome> {
        let state = self
            .state
            .as_mut()
            .ok_or_else(|| anyhow!("Record seen before the header of {}", self.name))?;
        let matched = state.filters.is_empty() || state.filters.matches(&record) > 0;
        if matched == self.opts.invert {
            return Ok(Outcome::skip(record));
        }
        let values: Vec<&str> = state
            .selected
            .iter()
            .map(|s| record.get(s.col).unwrap_or(""))
            .collect();
        let line = format::render(&self.opts.format, &values);
        self.print(line)?;
        Ok(Outcome::keep(record))
    }
}
