//! CSV reader/writer construction and file replacement helpers.
//!
//! Suite files are plain comma-separated UTF-8 with a header row and a fixed
//! number of fields per row. Output is written with minimal quoting and `\n`
//! terminators so that unchanged rows come out byte-for-byte as they went in.

use std::{
    fs::{self, File},
    io::{self, BufReader, BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result};
use csv::{QuoteStyle, Terminator};

pub fn open_csv_reader<R>(reader: R) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(false)
        .double_quote(true)
        .flexible(false);
    builder.from_reader(reader)
}

pub fn open_csv_writer<W>(writer: W) -> csv::Writer<W>
where
    W: Write,
{
    let mut builder = csv::WriterBuilder::new();
    builder
        .quote_style(QuoteStyle::Necessary)
        .terminator(Terminator::Any(b'\n'))
        .double_quote(true);
    builder.from_writer(writer)
}

pub fn open_input(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).with_context(|| format!("Opening input file {path:?}"))?;
    Ok(BufReader::new(file))
}

/// Removes whatever is at `path` and creates a fresh, empty file there.
pub fn replace_file(path: &Path) -> Result<BufWriter<File>> {
    remove_if_exists(path).with_context(|| format!("Removing {path:?}"))?;
    let file = File::create(path).with_context(|| format!("Creating output file {path:?}"))?;
    Ok(BufWriter::new(file))
}

/// `fs::remove_file` that treats a missing file as success.
pub fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Removes `dir` with everything in it and recreates it empty.
pub fn recreate_dir(dir: &Path) -> Result<()> {
    match fs::remove_dir_all(dir) {
        Err(err) if err.kind() != io::ErrorKind::NotFound => {
            return Err(err).with_context(|| format!("Removing directory {dir:?}"));
        }
        _ => {}
    }
    fs::create_dir_all(dir).with_context(|| format!("Creating directory {dir:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn replace_file_truncates_existing_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        fs::write(&path, "stale contents that are long").unwrap();
        {
            let mut writer = replace_file(&path).unwrap();
            writer.write_all(b"a\n").unwrap();
        }
        assert_eq!(fs::read_to_string(&path).unwrap(), "a\n");
    }

    #[test]
    fn remove_if_exists_ignores_missing_files() {
        let dir = tempdir().unwrap();
        remove_if_exists(&dir.path().join("missing")).unwrap();
    }

    #[test]
    fn recreate_dir_empties_directory() {
        let dir = tempdir().unwrap();
        let target = dir.path().join(".csv");
        fs::create_dir_all(target.join("nested")).unwrap();
        fs::write(target.join("nested").join("x"), "1").unwrap();
        recreate_dir(&target).unwrap();
        assert!(target.is_dir());
        assert_eq!(fs::read_dir(&target).unwrap().count(), 0);
    }
}
