use std::fmt::Write;
use std::path::Path;

use tracing::debug;

use crate::error::{GradeError, Result};
use crate::models::{display_mark, ScoreMap, ScoreSchema};

const ORDINARY_MARKER: &str = "Ordinary maxima:";
const EXTRA_MARKER: &str = "Extra maxima:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Searching,
    Ordinary,
    Extra,
}

/// Splits a `* name : value` list element into its name and numeric value.
pub fn parse_entry(line: &str) -> Result<(String, f64)> {
    let body = line
        .strip_prefix('*')
        .ok_or_else(|| GradeError::malformed(line, "list element should start with '*'"))?;
    let mut parts = body.split(':');
    let (key, value) = match (parts.next(), parts.next(), parts.next()) {
        (Some(key), Some(value), None) => (key.trim(), value.trim()),
        _ => {
            return Err(GradeError::malformed(
                line,
                "expected exactly one ':' between name and value",
            ))
        }
    };
    let value = value
        .parse::<f64>()
        .map_err(|_| GradeError::malformed(line, format!("{value:?} is not a number")))?;
    Ok((key.to_string(), value))
}

/// Reads the ordinary and extra maxima from the header of a marking log.
///
/// Text before `Ordinary maxima:` is ignored and a line starting with
/// `Total` ends the header. A log without the header has an empty schema.
pub fn parse_schema(contents: &str) -> Result<ScoreSchema> {
    let mut schema = ScoreSchema::default();
    let mut section = Section::Searching;

    for line in contents.lines().map(str::trim) {
        if line.is_empty() {
            continue;
        }
        match section {
            Section::Searching => {
                if line == ORDINARY_MARKER {
                    section = Section::Ordinary;
                }
                continue;
            }
            Section::Ordinary if line == EXTRA_MARKER => {
                section = Section::Extra;
                continue;
            }
            Section::Ordinary | Section::Extra if line.starts_with("Total") => break,
            Section::Ordinary | Section::Extra => {}
        }

        let (key, value) = parse_entry(line)?;
        if schema.required.contains_key(&key) || schema.optional.contains_key(&key) {
            return Err(GradeError::DuplicateComponent { name: key });
        }
        match section {
            Section::Extra => schema.optional.insert(key, value),
            _ => schema.required.insert(key, value),
        };
    }

    debug!(
        required = schema.required.len(),
        optional = schema.optional.len(),
        "read score schema"
    );
    Ok(schema)
}

pub fn read_schema(path: &Path) -> Result<ScoreSchema> {
    let contents = std::fs::read_to_string(path)?;
    parse_schema(&contents)
}

/// Renders the blank score listing written into each new student section.
pub fn render_template(schema: &ScoreSchema) -> String {
    let mut output = String::new();
    write_entries(&mut output, &schema.required);
    if !schema.optional.is_empty() {
        output.push('\n');
        write_entries(&mut output, &schema.optional);
    }
    if output.is_empty() {
        output.push('\n');
    }
    output
}

fn write_entries(output: &mut String, entries: &ScoreMap) {
    for (name, value) in entries.iter() {
        let _ = writeln!(output, "* {}: {}", name, display_mark(value));
    }
}
