//! Field definitions inferred from a test-case header row.
//!
//! A suite header lists the case's input columns first, followed by the
//! computed outputs. Every output occupies two adjacent columns: the primary
//! value (named with the `[out]` prefix) and its extended-precision qualifier
//! (named with the `[outext]` prefix). The first prefixed column marks the
//! input/output boundary.
//!
//! Which member of each adjacent pair is the qualifier is decided by column
//! parity alone: a column is the extended-precision member when its index has
//! the same parity as the number of inputs. That holds whether a suite writes
//! `[out]` before `[outext]` or the other way around.

use std::io::{self, Write};

use log::warn;

pub const DEFAULT_OUT_PREFIX: &str = "[out]";
pub const DEFAULT_EXT_PREFIX: &str = "[outext]";

/// Name prefixes that mark output columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prefixes {
    pub output: String,
    pub extended: String,
}

impl Prefixes {
    pub fn new(output: impl Into<String>, extended: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            extended: extended.into(),
        }
    }

    pub fn is_output(&self, name: &str) -> bool {
        name.starts_with(&self.output) || name.starts_with(&self.extended)
    }
}

impl Default for Prefixes {
    fn default() -> Self {
        Self::new(DEFAULT_OUT_PREFIX, DEFAULT_EXT_PREFIX)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputField {
    pub col: usize,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputField {
    pub col: usize,
    pub name: String,
    pub ext_col: usize,
    pub ext_name: String,
}

/// A column selected by name, e.g. for formatted printing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spec {
    pub name: String,
    pub col: usize,
}

#[derive(Debug, Clone)]
pub struct FieldDef {
    pub inputs: Vec<InputField>,
    pub outputs: Vec<OutputField>,
    pub prefixes: Prefixes,
}

impl FieldDef {
    pub fn new<S: AsRef<str>>(header: &[S], prefixes: Prefixes) -> Self {
        let input_count = header
            .iter()
            .position(|name| prefixes.is_output(name.as_ref()))
            .unwrap_or(header.len());
        let output_count = (header.len() - input_count) / 2;

        let mut inputs = Vec::with_capacity(input_count);
        let mut outputs = vec![OutputField::default(); output_count];

        for (col, name) in header.iter().enumerate() {
            let name = name.as_ref().to_string();
            if col < input_count {
                inputs.push(InputField { col, name });
                continue;
            }
            let pair = (col - input_count) / 2;
            let Some(out) = outputs.get_mut(pair) else {
                warn!("ignoring unpaired output column {col}: {name:?}");
                continue;
            };
            if input_count & 1 == col & 1 {
                out.ext_col = col;
                out.ext_name = name;
            } else {
                out.col = col;
                out.name = name;
            }
        }

        FieldDef {
            inputs,
            outputs,
            prefixes,
        }
    }

    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    fn output_id(&self, col: usize) -> Option<usize> {
        let first = self.inputs.len();
        let end = first + self.outputs.len() * 2;
        (first..end).contains(&col).then(|| (col - first) / 2)
    }

    /// Name of the input field at `col`.
    pub fn input(&self, col: usize) -> Option<&str> {
        self.inputs.get(col).map(|f| f.name.as_str())
    }

    /// Primary and extended-precision names of the output pair covering `col`.
    pub fn output(&self, col: usize) -> Option<(&str, &str)> {
        self.output_id(col)
            .map(|id| &self.outputs[id])
            .map(|f| (f.name.as_str(), f.ext_name.as_str()))
    }

    /// Returns true when `col` is the extended-precision member of its pair.
    pub fn is_extended(&self, col: usize) -> bool {
        self.output_id(col).is_some() && self.inputs.len() & 1 == col & 1
    }

    /// Reverse lookup of a column index by its header name.
    pub fn column_for(&self, name: &str) -> Option<usize> {
        if !self.prefixes.is_output(name) {
            return self.inputs.iter().find(|f| f.name == name).map(|f| f.col);
        }
        self.outputs.iter().find_map(|f| {
            if f.name == name {
                Some(f.col)
            } else if f.ext_name == name {
                Some(f.ext_col)
            } else {
                None
            }
        })
    }

    /// Writes the field listing shown by `csm -d`.
    pub fn describe<W: Write>(&self, out: &mut W, file_name: &str) -> io::Result<()> {
        let width = digits(self.inputs.len() + self.outputs.len());
        writeln!(out, "== {file_name}")?;
        for f in &self.inputs {
            writeln!(out, "  I {:0width$} {:?}", f.col, f.name)?;
        }
        for f in &self.outputs {
            writeln!(out, "  E {:0width$} {:?}", f.ext_col, f.ext_name)?;
            writeln!(out, "  O {:0width$} {:?}", f.col, f.name)?;
        }
        Ok(())
    }
}

fn digits(mut n: usize) -> usize {
    let mut count = 1;
    while n >= 10 {
        n /= 10;
        count += 1;
    }
    count
}
