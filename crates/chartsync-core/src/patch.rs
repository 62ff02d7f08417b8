//! In-place edits of block-style YAML documents
//!
//! Charts are written by hand: comments, quoting and scalars such as
//! `appVersion: 1.10` must come back exactly as they were. Rather than
//! re-serializing a parsed document, these helpers replace single scalar
//! values in the original text and leave every other byte alone.
//!
//! Only the layouts `helm` itself writes and people commonly type are
//! understood: a top-level block sequence of block mappings. Anything else
//! (flow collections, multi-line scalars, anchors, tags) makes the helpers
//! return `None` so the caller can fall back to a full rewrite.

use serde_yaml::Value;

/// Quoting of a scalar as written in the document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScalarStyle {
    Plain,
    SingleQuoted,
    DoubleQuoted,
}

/// Byte range of a scalar value inside a line
#[derive(Debug, Clone, Copy)]
struct ValueSpan {
    start: usize,
    end: usize,
    style: ScalarStyle,
}

/// Set `field` on entries of the top-level block sequence `key`
///
/// `values` holds one slot per entry, `None` leaves the entry alone. A field
/// missing from an entry is appended to it. Returns `None` when the document
/// layout is not understood or the sequence does not have `values.len()`
/// entries.
pub(crate) fn set_entry_fields(
    content: &str,
    key: &str,
    field: &str,
    values: &[Option<&str>],
) -> Option<String> {
    if values.iter().all(Option::is_none) {
        return Some(content.to_string());
    }

    let lines: Vec<&str> = content.split_inclusive('\n').collect();
    let key_line = find_top_level_key(&lines, key)?;

    // `dependencies: []` or `dependencies: ~` has no entries to edit
    let after_colon = key_offset(lines[key_line], 0, key)?;
    if !value_is_empty(line_body(lines[key_line]), after_colon) {
        return None;
    }

    let block_end = (key_line + 1..lines.len())
        .find(|&i| ends_top_level_block(lines[i]))
        .unwrap_or(lines.len());
    let entries = sequence_entries(&lines, key_line + 1, block_end)?;
    if entries.len() != values.len() {
        return None;
    }

    let mut out: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
    // Back to front, so appended lines never shift an entry still to edit
    for (&(start, end), value) in entries.iter().zip(values).rev() {
        let Some(value) = value else {
            continue;
        };
        set_entry_field(&lines, &mut out, start, end, field, value)?;
    }

    Some(out.concat())
}

/// Set the top-level scalar `key`, appending it when missing
///
/// Returns `None` when the existing value is not a single-line scalar.
pub(crate) fn set_top_level_scalar(content: &str, key: &str, value: &str) -> Option<String> {
    let lines: Vec<&str> = content.split_inclusive('\n').collect();

    let Some(index) = find_top_level_key(&lines, key) else {
        let mut out = content.to_string();
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&format!("{}: {}\n", key, render(value, ScalarStyle::Plain)));
        return Some(out);
    };

    let after_colon = key_offset(lines[index], 0, key)?;
    let span = value_span(line_body(lines[index]), after_colon)?;
    if continues_below(&lines, index + 1, lines.len(), 0) {
        return None;
    }

    let mut out: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
    out[index] = replace_span(lines[index], span, value);
    Some(out.concat())
}

fn set_entry_field(
    lines: &[&str],
    out: &mut Vec<String>,
    start: usize,
    end: usize,
    field: &str,
    value: &str,
) -> Option<()> {
    let dash_line = lines[start];
    let seq_indent = indent(dash_line);
    let after_dash = seq_indent + 1;
    let body = line_body(dash_line);
    let inline_col = after_dash + body[after_dash..].len() - body[after_dash..].trim_start().len();
    let inline = body[inline_col..].trim_end();

    let key_col = if inline.is_empty() || inline.starts_with('#') {
        let first = (start + 1..end).find(|&i| !is_filler(lines[i]))?;
        let col = indent(lines[first]);
        if col <= seq_indent {
            return None;
        }
        col
    } else {
        // Only block mappings can carry the field
        if inline.starts_with(['{', '[', '|', '>', '"', '\'', '&', '*', '!', '-']) {
            return None;
        }
        inline_col
    };

    let mut last_content = start;
    for i in start..end {
        let line = lines[i];
        if is_filler(line) {
            continue;
        }
        last_content = i;
        let at_key_col = if i == start {
            inline_col == key_col && !inline.is_empty()
        } else {
            indent(line) == key_col
        };
        if !at_key_col {
            continue;
        }
        let Some(after_colon) = key_offset(line, key_col, field) else {
            continue;
        };

        let span = value_span(line_body(line), after_colon)?;
        if continues_below(lines, i + 1, end, key_col) {
            return None;
        }
        out[i] = replace_span(line, span, value);
        return Some(());
    }

    // Field absent: append it after the last line of the entry
    let newline = if lines[last_content].ends_with("\r\n") { "\r\n" } else { "\n" };
    if !out[last_content].ends_with('\n') {
        out[last_content].push_str(newline);
    }
    out.insert(
        last_content + 1,
        format!(
            "{}{}: {}{}",
            " ".repeat(key_col),
            field,
            render(value, ScalarStyle::Plain),
            newline
        ),
    );
    Some(())
}

/// Entries of the block sequence spanning `lines[from..to]`, as line ranges
fn sequence_entries(lines: &[&str], from: usize, to: usize) -> Option<Vec<(usize, usize)>> {
    let mut starts = Vec::new();
    let mut seq_indent = None;

    for (i, line) in lines.iter().enumerate().take(to).skip(from) {
        if is_filler(line) {
            continue;
        }
        let col = indent(line);
        let expected = *seq_indent.get_or_insert(col);
        if col < expected {
            return None;
        }
        if col == expected {
            if !is_dash_item(&line[col..]) {
                return None;
            }
            starts.push(i);
        }
    }

    let mut entries = Vec::with_capacity(starts.len());
    for (n, &start) in starts.iter().enumerate() {
        let end = starts.get(n + 1).copied().unwrap_or(to);
        entries.push((start, end));
    }
    Some(entries)
}

fn find_top_level_key(lines: &[&str], key: &str) -> Option<usize> {
    for (i, line) in lines.iter().enumerate() {
        if i > 0 && is_document_marker(line) {
            return None;
        }
        if key_offset(line, 0, key).is_some() {
            return Some(i);
        }
    }
    None
}

/// Offset just past the colon of `key` written at column `col`
fn key_offset(line: &str, col: usize, key: &str) -> Option<usize> {
    let body = line_body(line);
    let rest = body.get(col..)?.strip_prefix(key)?;
    let trimmed = rest.trim_start_matches([' ', '\t']);
    let after = trimmed.strip_prefix(':')?;
    if !(after.is_empty() || after.starts_with([' ', '\t'])) {
        return None;
    }
    Some(body.len() - after.len())
}

/// Locate the scalar following a key, `body` excluding the line break
fn value_span(body: &str, after_colon: usize) -> Option<ValueSpan> {
    let rest = &body[after_colon..];
    let start = after_colon + rest.len() - rest.trim_start_matches([' ', '\t']).len();
    let value = &body[start..];

    if value.is_empty() || value.starts_with('#') {
        return Some(ValueSpan {
            start,
            end: start,
            style: ScalarStyle::Plain,
        });
    }

    match value.as_bytes()[0] {
        b'"' => {
            let mut escaped = false;
            for (offset, c) in value.char_indices().skip(1) {
                match c {
                    '\\' if !escaped => escaped = true,
                    '"' if !escaped => {
                        return Some(ValueSpan {
                            start,
                            end: start + offset + 1,
                            style: ScalarStyle::DoubleQuoted,
                        });
                    }
                    _ => escaped = false,
                }
            }
            None
        }
        b'\'' => {
            let bytes = value.as_bytes();
            let mut i = 1;
            while i < bytes.len() {
                if bytes[i] == b'\'' {
                    if bytes.get(i + 1) == Some(&b'\'') {
                        i += 2;
                        continue;
                    }
                    return Some(ValueSpan {
                        start,
                        end: start + i + 1,
                        style: ScalarStyle::SingleQuoted,
                    });
                }
                i += 1;
            }
            None
        }
        b'|' | b'>' | b'&' | b'*' | b'!' | b'{' | b'[' => None,
        _ => {
            let end = [" #", "\t#"]
                .iter()
                .filter_map(|marker| value.find(marker))
                .min()
                .unwrap_or(value.len());
            Some(ValueSpan {
                start,
                end: start + value[..end].trim_end().len(),
                style: ScalarStyle::Plain,
            })
        }
    }
}

fn value_is_empty(body: &str, after_colon: usize) -> bool {
    let value = body[after_colon..].trim_start();
    value.is_empty() || value.starts_with('#')
}

/// Whether a line deeper than `col` follows, i.e. the value spans lines
fn continues_below(lines: &[&str], from: usize, to: usize, col: usize) -> bool {
    lines[from..to]
        .iter()
        .find(|line| !is_filler(line))
        .is_some_and(|line| indent(line) > col && !is_document_marker(line))
}

fn replace_span(line: &str, span: ValueSpan, value: &str) -> String {
    let rendered = render(value, span.style);
    let mut out = String::with_capacity(line.len() + rendered.len());
    out.push_str(&line[..span.start]);
    if span.start == span.end && span.start > 0 && !line[..span.start].ends_with([' ', '\t']) {
        out.push(' ');
    }
    out.push_str(&rendered);
    if span.start == span.end && line[span.end..].starts_with('#') {
        out.push(' ');
    }
    out.push_str(&line[span.end..]);
    out
}

/// Write `value` in the quoting it replaces, quoting plain scalars YAML
/// would read back as something else
fn render(value: &str, style: ScalarStyle) -> String {
    match style {
        ScalarStyle::SingleQuoted if !value.contains('\n') => {
            format!("'{}'", value.replace('\'', "''"))
        }
        ScalarStyle::Plain if reads_back_as_string(value) => value.to_string(),
        _ => double_quoted(value),
    }
}

fn reads_back_as_string(value: &str) -> bool {
    !value.is_empty()
        && value.trim() == value
        && !value.contains(['\n', '\r', '\t'])
        && !value.contains(" #")
        && matches!(
            serde_yaml::from_str::<Value>(value),
            Ok(Value::String(parsed)) if parsed == value
        )
}

fn double_quoted(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// The line without its line break
fn line_body(line: &str) -> &str {
    line.trim_end_matches('\n').trim_end_matches('\r')
}

fn indent(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

fn is_filler(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.starts_with('#')
}

fn is_dash_item(text: &str) -> bool {
    let body = line_body(text);
    body == "-" || body.starts_with("- ") || body.starts_with("-\t")
}

fn is_document_marker(line: &str) -> bool {
    let body = line_body(line);
    body.starts_with("---") || body.starts_with("...")
}

/// A top-level sequence may sit at column 0, so only keys and document
/// markers close it
fn ends_top_level_block(line: &str) -> bool {
    if is_filler(line) {
        return false;
    }
    is_document_marker(line) || (indent(line) == 0 && !is_dash_item(line))
}
