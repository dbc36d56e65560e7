//! Streaming row filter for a single suite file.
//!
//! Rows are read one at a time and handed to a [`RecordHandler`]: the first
//! row to [`RecordHandler::header`], all later rows to
//! [`RecordHandler::record`]. Each call returns an [`Outcome`] that decides
//! whether the (possibly rewritten) row is written and whether reading stops.
//!
//! A header handler that skips row 1 declines to treat it as a header; the row
//! is then passed straight to the record handler like any other data row.

use std::{
    io::{self, Read, Write},
    path::Path,
};

use anyhow::{Context, Result};
use csv::StringRecord;

use crate::io_utils;

#[derive(Debug, Clone)]
pub struct Outcome {
    pub record: StringRecord,
    pub skip: bool,
    pub stop: bool,
}

impl Outcome {
    pub fn keep(record: StringRecord) -> Self {
        Outcome {
            record,
            skip: false,
            stop: false,
        }
    }

    pub fn skip(record: StringRecord) -> Self {
        Outcome {
            record,
            skip: true,
            stop: false,
        }
    }

    pub fn stop(record: StringRecord) -> Self {
        Outcome {
            record,
            skip: false,
            stop: true,
        }
    }
}

pub trait RecordHandler {
    fn header(&mut self, record: StringRecord) -> Result<Outcome>;
    fn record(&mut self, record: StringRecord) -> Result<Outcome>;
}

/// Row counts for one pass over a file. Header rows are not counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    pub processed: usize,
    pub retained: usize,
}

impl std::ops::Add for PassStats {
    type Output = PassStats;

    fn add(self, other: PassStats) -> PassStats {
        PassStats {
            processed: self.processed + other.processed,
            retained: self.retained + other.retained,
        }
    }
}

/// Filters `source` into `destination`, replacing any existing destination
/// file. Without a destination the surviving rows are discarded.
pub fn filter_file<H: RecordHandler>(
    source: &Path,
    destination: Option<&Path>,
    handler: &mut H,
) -> Result<PassStats> {
    let writer: Box<dyn Write> = match destination {
        Some(path) => Box::new(io_utils::replace_file(path)?),
        None => Box::new(io::sink()),
    };
    let reader = io_utils::open_input(source)?;
    filter_stream(reader, writer, handler).with_context(|| {
        format!(
            "{} -> {}",
            source.display(),
            destination
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        )
    })
}

pub fn filter_stream<R, W, H>(reader: R, writer: W, handler: &mut H) -> Result<PassStats>
where
    R: Read,
    W: Write,
    H: RecordHandler,
{
    let mut reader = io_utils::open_csv_reader(reader);
    let mut writer = io_utils::open_csv_writer(writer);
    let mut stats = PassStats::default();

    let mut rows = reader.records();
    if let Some(first) = rows.next() {
        let first = first.context("Reading row 1")?;
        let outcome = handler.header(first.clone())?;
        if outcome.stop {
            writer.flush().context("Flushing output")?;
            return Ok(stats);
        }
        if !outcome.skip {
            writer
                .write_record(&outcome.record)
                .context("Writing header row")?;
        } else if !process_row(handler, first, &mut writer, &mut stats)? {
            writer.flush().context("Flushing output")?;
            return Ok(stats);
        }
    }

    for (idx, row) in rows.enumerate() {
        let row = row.with_context(|| format!("Reading row {}", idx + 2))?;
        if !process_row(handler, row, &mut writer, &mut stats)? {
            break;
        }
    }

    writer.flush().context("Flushing output")?;
    Ok(stats)
}

/// Returns false when the handler asked to stop.
fn process_row<H, W>(
    handler: &mut H,
    row: StringRecord,
    writer: &mut csv::Writer<W>,
    stats: &mut PassStats,
) -> Result<bool>
where
    H: RecordHandler,
    W: Write,
{
    let outcome = handler.record(row)?;
    stats.processed += 1;
    if outcome.stop {
        return Ok(false);
    }
    if !outcome.skip {
        writer
            .write_record(&outcome.record)
            .context("Writing row")?;
        stats.retained += 1;
    }
    Ok(true)
}

/// Copies the header and stops at the first data row.
#[derive(Debug, Default)]
pub struct HeaderOnly;

impl RecordHandler for HeaderOnly {
    fn header(&mut self, record: StringRecord) -> Result<Outcome> {
        Ok(Outcome::keep(record))
    }

    fn record(&mut self, record: StringRecord) -> Result<Outcome> {
        Ok(Outcome::stop(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INPUT: &str = "mode,gw\nEWO,1\nMIN,2\nEWO,3\nMCL,4\n";

    struct Scripted<F: FnMut(usize, &StringRecord) -> (bool, bool)> {
        header: (bool, bool),
        rows: F,
        seen: usize,
    }

    impl<F: FnMut(usize, &StringRecord) -> (bool, bool)> RecordHandler for Scripted<F> {
        fn header(&mut self, record: StringRecord) -> Result<Outcome> {
            let (skip, stop) = self.header;
            Ok(Outcome { record, skip, stop })
        }

        fn record(&mut self, record: StringRecord) -> Result<Outcome> {
            self.seen += 1;
            let (skip, stop) = (self.rows)(self.seen, &record);
            Ok(Outcome { record, skip, stop })
        }
    }

    fn run<F>(header: (bool, bool), rows: F) -> (PassStats, String, usize)
    where
        F: FnMut(usize, &StringRecord) -> (bool, bool),
    {
        let mut handler = Scripted {
            header,
            rows,
            seen: 0,
        };
        let mut out = Vec::new();
        let stats = filter_stream(INPUT.as_bytes(), &mut out, &mut handler).unwrap();
        (stats, String::from_utf8(out).unwrap(), handler.seen)
    }

    #[test]
    fn keeps_all_rows_in_order() {
        let (stats, out, _) = run((false, false), |_, _| (false, false));
        assert_eq!(stats, PassStats { processed: 4, retained: 4 });
        assert_eq!(out, INPUT);
    }

    #[test]
    fn skipped_rows_are_counted_not_written() {
        let (stats, out, _) = run((false, false), |_, r| (&r[0] != "EWO", false));
        assert_eq!(stats, PassStats { processed: 4, retained: 2 });
        assert_eq!(out, "mode,gw\nEWO,1\nEWO,3\n");
    }

    #[test]
    fn stop_on_header_writes_nothing() {
        let (stats, out, seen) = run((false, true), |_, _| (false, false));
        assert_eq!(stats, PassStats::default());
        assert!(out.is_empty());
        assert_eq!(seen, 0);
    }

    #[test]
    fn skipped_header_is_processed_as_data() {
        let (stats, out, seen) = run((true, false), |_, _| (false, false));
        assert_eq!(seen, 5);
        assert_eq!(stats, PassStats { processed: 5, retained: 5 });
        assert_eq!(out, INPUT);
    }

    #[test]
    fn stop_counts_the_stopping_row_but_does_not_write_it() {
        let (stats, out, seen) = run((false, false), |n, _| (false, n == 2));
        assert_eq!(seen, 2);
        assert_eq!(stats, PassStats { processed: 2, retained: 1 });
        assert_eq!(out, "mode,gw\nEWO,1\n");
    }

    #[test]
    fn header_only_handler_copies_header() {
        let mut out = Vec::new();
        let stats = filter_stream(INPUT.as_bytes(), &mut out, &mut HeaderOnly).unwrap();
        assert_eq!(stats, PassStats { processed: 1, retained: 0 });
        assert_eq!(String::from_utf8(out).unwrap(), "mode,gw\n");
    }

    #[test]
    fn empty_input_yields_no_rows() {
        let mut out = Vec::new();
        let stats = filter_stream("".as_bytes(), &mut out, &mut HeaderOnly).unwrap();
        assert_eq!(stats, PassStats::default());
        assert!(out.is_empty());
    }

    #[test]
    fn ragged_rows_are_errors() {
        let mut out = Vec::new();
        let result = filter_stream("a,b\n1\n".as_bytes(), &mut out, &mut HeaderOnly);
        assert!(result.is_err());
    }

    #[test]
    fn quoted_fields_round_trip() {
        let input = "name,note\n\"a,b\",\"say \"\"hi\"\"\"\n";
        let mut out = Vec::new();
        let mut handler = Scripted {
            header: (false, false),
            rows: |_: usize, _: &StringRecord| (false, false),
            seen: 0,
        };
        filter_stream(input.as_bytes(), &mut out, &mut handler).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), input);
    }
}
