use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::error::{GradeError, Result};
use crate::models::Student;

/// Columns needed to upload marks back to Canvas.
pub const MINIMAL_FIELDS: [&str; 4] = ["Student", "SIS User ID", "SIS Login ID", "Section"];

const SIS_ID: &str = "SIS User ID";

static FNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([a-z\-_]+)(\d+)_").expect("filename pattern is valid"));

/// Selected gradebook columns, one row per enrolled student.
#[derive(Debug, Clone, PartialEq)]
pub struct StudentTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Reduces a full Canvas gradebook export to `fields`.
///
/// Rows without a `SIS User ID` (points possible, the test student) are
/// dropped and the ID column is normalized to an integer.
pub fn to_minimal<R: Read>(reader: R, fields: &[&str]) -> Result<StudentTable> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    // Canvas has prefixed the first header with stray characters in some exports.
    let first = headers.first().cloned().unwrap_or_default();
    if !first.ends_with("Student") {
        return Err(GradeError::BadGradebookHeader { found: first });
    }
    headers[0] = "Student".to_string();

    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| GradeError::MissingColumn {
                column: name.to_string(),
            })
    };
    let sis_column = column(SIS_ID)?;
    let selected = fields
        .iter()
        .map(|&f| column(f))
        .collect::<Result<Vec<_>>>()?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.get(sis_column).map_or(true, |v| v.trim().is_empty()) {
            continue;
        }
        let mut row = Vec::with_capacity(selected.len());
        for (&index, &field) in selected.iter().zip(fields) {
            let value = record.get(index).unwrap_or_default();
            row.push(if field == SIS_ID {
                parse_sis_id(value)?.to_string()
            } else {
                value.to_string()
            });
        }
        rows.push(row);
    }

    debug!(students = rows.len(), "reduced gradebook");
    Ok(StudentTable {
        headers: fields.iter().map(|f| f.to_string()).collect(),
        rows,
    })
}

fn parse_sis_id(value: &str) -> Result<i64> {
    let value = value.trim();
    if let Ok(id) = value.parse::<i64>() {
        return Ok(id);
    }
    match value.parse::<f64>() {
        Ok(id) if id.fract() == 0.0 && id.abs() < i64::MAX as f64 => Ok(id as i64),
        _ => Err(GradeError::InvalidId {
            value: value.to_string(),
        }),
    }
}

pub fn write_table<W: Write>(table: &StudentTable, writer: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(&table.headers)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_students(path: &Path) -> Result<Vec<Student>> {
    let mut reader = csv::Reader::from_path(path)?;
    let students = reader
        .deserialize::<Student>()
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(students)
}

/// Student identity encoded in a Canvas submission filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentKey {
    pub surname: String,
    pub given_names: String,
    pub id: String,
}

/// Extracts the student key from names like `last_first139727_question_...`.
pub fn fname_to_key(path: &Path) -> Result<StudentKey> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let bad = |reason: &str| GradeError::FilenameFormat {
        filename: name.clone(),
        reason: reason.to_string(),
    };
    let caps = FNAME_RE
        .captures(&name)
        .ok_or_else(|| bad("expected lowercase names, student ID and '_'"))?;
    let names: Vec<String> = caps[1].split('_').map(capitalize).collect();
    let Some((surname, given)) = names.split_first().filter(|(_, rest)| !rest.is_empty()) else {
        return Err(bad("should be names separated by '_'"));
    };
    Ok(StudentKey {
        surname: surname.clone(),
        given_names: given.join(" "),
        id: caps[2].to_string(),
    })
}

fn capitalize(name: &str) -> String {
    if name.contains('-') {
        return name.split('-').map(capitalize).collect::<Vec<_>>().join("-");
    }
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Returns the key for each file, failing on the first repeated student ID.
pub fn check_unique_ids<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<StudentKey>> {
    let mut found: HashMap<String, String> = HashMap::new();
    let mut keys = Vec::with_capacity(paths.len());
    for path in paths {
        let path = path.as_ref();
        let key = fname_to_key(path)?;
        let fname = path.display().to_string();
        if let Some(first) = found.get(&key.id) {
            return Err(GradeError::DuplicateIdentifier {
                id: key.id,
                first: first.clone(),
                second: fname,
            });
        }
        found.insert(key.id.clone(), fname);
        keys.push(key);
    }
    Ok(keys)
}
