//! Printf-style rendering of selected columns.
//!
//! Supported verbs are `%s` and `%v` (value as-is), `%q` (double-quoted with
//! escapes) and `%%`. A verb without a matching argument renders as
//! `%!<verb>(MISSING)`; arguments left over are ignored.

use itertools::Itertools;

/// Renders `args` through `format`. An empty format separates the arguments
/// with single spaces. Returns `None` when there is nothing to print.
pub fn render<S: AsRef<str>>(format: &str, args: &[S]) -> Option<String> {
    if format.is_empty() {
        if args.is_empty() {
            return None;
        }
        return Some(args.iter().map(|arg| arg.as_ref()).join(" "));
    }

    let mut out = String::with_capacity(format.len());
    let mut next = args.iter().map(|arg| arg.as_ref());
    let mut chars = format.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('%') => out.push('%'),
            Some(verb @ ('s' | 'v')) => match next.next() {
                Some(arg) => out.push_str(arg),
                None => out.push_str(&format!("%!{verb}(MISSING)")),
            },
            Some('q') => match next.next() {
                Some(arg) => out.push_str(&format!("{arg:?}")),
                None => out.push_str("%!q(MISSING)"),
            },
            Some(other) => {
                out.push('%');
                out.push(other);
            }
            None => out.push('%'),
        }
    }
    Some(out)
}
