//! Filter expressions of the form `<field><op><value>`.
//!
//! Operators are fixed two-character tokens:
//!
//! | token | meaning |
//! | --- | --- |
//! | `==` | equal |
//! | `>>` | greater than |
//! | `>=` | greater or equal |
//! | `<<` | less than |
//! | `<=` | less or equal |
//! | `=~` | regular expression match |
//! | `..` | set membership (reserved, always disables the filter) |
//!
//! Comparisons probe the operands' representation: both values are tried as
//! unsigned integers, then signed integers, then floats, and finally compared
//! as strings. Equality additionally tries booleans first and treats floats
//! within `1e-8` of each other as equal.
//!
//! Integer literals follow the usual base-prefix rules: `0x`, `0o` and `0b`
//! select hex, octal and binary, a bare leading `0` means octal, and `_` may
//! separate digits. `08` is therefore not an integer and compares as a float.
//!
//! Filters are parsed once per run. For each file, a [`FilterSet`] binds them
//! to that file's [`FieldDef`]; filters whose field is missing from the header,
//! or that fail on first use, stay disabled for the rest of the file only.

use std::{cmp::Ordering, fmt, str::FromStr};

use anyhow::{Result, anyhow};
use csv::StringRecord;
use log::warn;
use regex::Regex;

use crate::field::FieldDef;

const FLOAT_TOLERANCE: f64 = 1e-8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Gt,
    Ge,
    Lt,
    Le,
    Match,
    In,
}

impl FilterOp {
    /// Scan priority when several tokens start at the same offset.
    pub const ALL: [FilterOp; 7] = [
        FilterOp::Eq,
        FilterOp::Gt,
        FilterOp::Ge,
        FilterOp::Lt,
        FilterOp::Le,
        FilterOp::Match,
        FilterOp::In,
    ];

    pub fn token(self) -> &'static str {
        match self {
            FilterOp::Eq => "==",
            FilterOp::Gt => ">>",
            FilterOp::Ge => ">=",
            FilterOp::Lt => "<<",
            FilterOp::Le => "<=",
            FilterOp::Match => "=~",
            FilterOp::In => "..",
        }
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for FilterOp {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        FilterOp::ALL
            .into_iter()
            .find(|op| op.token() == s)
            .ok_or_else(|| anyhow!("Unknown filter operator '{s}'"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub arg: String,
}

impl Filter {
    /// Prepares the filter for evaluation.
    pub fn compile(&self) -> Result<Predicate> {
        match self.op {
            FilterOp::Match => Regex::new(&self.arg)
                .map(Predicate::Pattern)
                .map_err(|err| anyhow!("invalid pattern {:?}: {err}", self.arg)),
            FilterOp::In => Err(anyhow!("set membership is not supported")),
            op => Ok(Predicate::Compare(op, self.arg.clone())),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{ {:?} {} {:?} }}", self.field, self.op, self.arg)
    }
}

impl FromStr for Filter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (idx, op) = find_operator(s).ok_or_else(|| anyhow!("unrecognized filter: {s:?}"))?;
        Ok(Filter {
            field: s[..idx].trim().to_string(),
            op,
            arg: s[idx + 2..].trim().to_string(),
        })
    }
}

/// Leftmost operator token that has at least one character on either side.
fn find_operator(s: &str) -> Option<(usize, FilterOp)> {
    let bytes = s.as_bytes();
    (1..bytes.len().saturating_sub(2)).find_map(|idx| {
        FilterOp::ALL
            .into_iter()
            .find(|op| &bytes[idx..idx + 2] == op.token().as_bytes())
            .map(|op| (idx, op))
    })
}

pub fn parse_filters(filters: &[String]) -> Result<Vec<Filter>> {
    filters.iter().map(|f| f.parse()).collect()
}

/// A filter ready to test values.
#[derive(Debug, Clone)]
pub enum Predicate {
    Compare(FilterOp, String),
    Pattern(Regex),
}

impl Predicate {
    pub fn matches(&self, value: &str) -> bool {
        match self {
            Predicate::Pattern(re) => re.is_match(value),
            Predicate::Compare(FilterOp::Eq, arg) => equals(value, arg),
            Predicate::Compare(op, arg) => {
                let ord = compare(value, arg);
                match op {
                    FilterOp::Gt => ord == Some(Ordering::Greater),
                    FilterOp::Ge => matches!(ord, Some(Ordering::Greater | Ordering::Equal)),
                    FilterOp::Lt => ord == Some(Ordering::Less),
                    FilterOp::Le => matches!(ord, Some(Ordering::Less | Ordering::Equal)),
                    _ => false,
                }
            }
        }
    }
}

pub fn equals(value: &str, arg: &str) -> bool {
    if let (Some(v), Some(a)) = (parse_bool(value), parse_bool(arg)) {
        return v == a;
    }
    if let (Some(v), Some(a)) = (parse_unsigned(value), parse_unsigned(arg)) {
        return v == a;
    }
    if let (Some(v), Some(a)) = (parse_signed(value), parse_signed(arg)) {
        return v == a;
    }
    if let (Some(v), Some(a)) = (parse_float(value), parse_float(arg)) {
        return (a - v).abs() < FLOAT_TOLERANCE;
    }
    value == arg
}

/// Orders `value` against `arg` using the first representation both parse as.
/// `None` only for float comparisons involving NaN.
pub fn compare(value: &str, arg: &str) -> Option<Ordering> {
    if let (Some(v), Some(a)) = (parse_unsigned(value), parse_unsigned(arg)) {
        return Some(v.cmp(&a));
    }
    if let (Some(v), Some(a)) = (parse_signed(value), parse_signed(arg)) {
        return Some(v.cmp(&a));
    }
    if let (Some(v), Some(a)) = (parse_float(value), parse_float(arg)) {
        return v.partial_cmp(&a);
    }
    Some(value.cmp(arg))
}

fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

/// Base prefix of an integer literal: `0x`, `0o`, `0b`, or a bare leading
/// `0` for octal. The flag is set when a prefix was consumed.
fn split_radix(literal: &str) -> (u32, &str, bool) {
    let lowered = literal.get(..2).map(|p| p.to_ascii_lowercase());
    match lowered.as_deref() {
        Some("0x") => (16, &literal[2..], true),
        Some("0o") => (8, &literal[2..], true),
        Some("0b") => (2, &literal[2..], true),
        _ if literal.len() > 1 && literal.starts_with('0') => (8, &literal[1..], true),
        _ => (10, literal, false),
    }
}

/// Underscores may only separate digits, or follow a base prefix.
fn underscores_ok(digits: &str, prefixed: bool) -> bool {
    let mut after_digit = prefixed;
    for b in digits.bytes() {
        if b == b'_' {
            if !after_digit {
                return false;
            }
            after_digit = false;
        } else {
            after_digit = true;
        }
    }
    after_digit
}

fn parse_unsigned(s: &str) -> Option<u64> {
    let (radix, digits, prefixed) = split_radix(s);
    if digits.is_empty() || !underscores_ok(digits, prefixed) {
        return None;
    }
    let digits = digits.replace('_', "");
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    u64::from_str_radix(&digits, radix).ok()
}

fn parse_signed(s: &str) -> Option<i64> {
    let (negative, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let magnitude = parse_unsigned(rest)?;
    if negative {
        0i64.checked_sub_unsigned(magnitude)
    } else {
        i64::try_from(magnitude).ok()
    }
}

fn parse_float(s: &str) -> Option<f64> {
    s.parse::<f64>().ok()
}

/// Filters bound to one file's header.
#[derive(Debug)]
pub struct FilterSet<'a> {
    file: String,
    entries: Vec<BoundFilter<'a>>,
}

#[derive(Debug)]
struct BoundFilter<'a> {
    filter: &'a Filter,
    column: Option<usize>,
    predicate: Option<Result<Predicate>>,
}

impl BoundFilter<'_> {
    fn active(&self) -> bool {
        self.column.is_some() && !matches!(self.predicate, Some(Err(_)))
    }
}

impl<'a> FilterSet<'a> {
    pub fn bind(file: &str, filters: &'a [Filter], def: &FieldDef) -> Self {
        let entries = filters
            .iter()
            .map(|filter| {
                let column = def.column_for(&filter.field);
                if column.is_none() {
                    warn!(
                        "ignoring filter on unknown field: {file}: {:?}",
                        filter.field
                    );
                }
                BoundFilter {
                    filter,
                    column,
                    predicate: None,
                }
            })
            .collect();
        FilterSet {
            file: file.to_string(),
            entries,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.entries.iter().filter(|e| e.active()).count()
    }

    /// Number of active filters matching `record`. A filter that cannot be
    /// evaluated is disabled here and never consulted again for this file.
    pub fn matches(&mut self, record: &StringRecord) -> usize {
        let mut count = 0;
        for entry in &mut self.entries {
            let Some(col) = entry.column else {
                continue;
            };
            let filter = entry.filter;
            let predicate = entry.predicate.get_or_insert_with(|| filter.compile());
            match predicate {
                Ok(predicate) => {
                    if predicate.matches(record.get(col).unwrap_or("")) {
                        count += 1;
                    }
                }
                Err(err) => {
                    warn!("disabling invalid filter: {}: {filter}: {err}", self.file);
                    entry.column = None;
                }
            }
        }
        count
    }
}
