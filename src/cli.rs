use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::filter::Filter;

#[derive(Debug, Parser)]
#[command(
    name = "csm",
    author,
    version,
    about = "Filter and repackage takeoff/landing test case suites",
    long_about = None
)]
pub struct Cli {
    /// Input test suite (.zip file or directory holding the suite files)
    pub input: PathBuf,
    /// Suppress printing non-error log messages
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,
    /// List the field definitions parsed from headers and exit
    #[arg(short = 'd', long = "list-fields")]
    pub list_fields: bool,
    /// Invert matching semantics (select records matching no filter)
    #[arg(short = 'r', long = "invert")]
    pub invert: bool,
    /// Keep filtered files in the extraction directory after suite creation
    #[arg(short = 'k', long = "keep")]
    pub keep_content: bool,
    /// Select records matching `field<op>value` (logical-OR of each flag given)
    #[arg(
        short = 'f',
        long = "filter",
        value_name = "EXPRESSION",
        action = ArgAction::Append,
        value_parser = parse_filter
    )]
    pub filters: Vec<Filter>,
    /// Create output test suite (.zip) at this path
    #[arg(short = 'o', long = "output", value_name = "FILEPATH")]
    pub output: Option<PathBuf>,
    /// Extract and save filtered test suites to this directory (default ".")
    #[arg(short = 'x', long = "extract-dir", value_name = "DIRPATH")]
    pub extract_dir: Option<PathBuf>,
    /// Print each column named in trailing arguments per this format
    #[arg(short = 'p', long = "format", value_name = "FORMAT")]
    pub format: Option<String>,
    /// Process takeoff test cases
    #[arg(
        short = 't',
        long = "takeoff",
        value_name = "BOOL",
        default_value_t = true,
        action = ArgAction::Set
    )]
    pub takeoff: bool,
    /// Process landing test cases
    #[arg(
        short = 'l',
        long = "landing",
        value_name = "BOOL",
        default_value_t = true,
        action = ArgAction::Set
    )]
    pub landing: bool,
    /// Columns printed for each retained record (after `--`)
    #[arg(last = true, value_name = "COLUMNS")]
    pub columns: Vec<String>,
}

pub fn parse_filter(value: &str) -> Result<Filter, String> {
    value.parse::<Filter>().map_err(|err| err.to_string())
}
