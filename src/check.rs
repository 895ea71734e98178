use std::path::Path;

use tracing::{debug, warn};

use crate::error::{GradeError, Result};
use crate::models::{display_mark, CheckedTotals, ScoreMap, ScoreSchema};
use crate::schema::{parse_entry, parse_schema};

/// One student's marking section, headed by a `##` line.
#[derive(Debug, Clone, PartialEq)]
pub struct StudentBlock {
    pub id: String,
    pub marks: ScoreMap,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedLog {
    /// Blocks in encounter order. A repeated id replaces the earlier marks.
    pub blocks: Vec<StudentBlock>,
    pub diagnostics: Vec<String>,
}

#[derive(Debug)]
enum ParseState {
    Searching,
    InList(StudentBlock),
}

struct LogParser<'a> {
    required: &'a [String],
    optional: &'a [String],
    parsed: ParsedLog,
}

impl<'a> LogParser<'a> {
    fn new(required: &'a [String], optional: &'a [String]) -> Self {
        Self {
            required,
            optional,
            parsed: ParsedLog::default(),
        }
    }

    fn expects(&self, key: &str) -> bool {
        self.required.iter().chain(self.optional).any(|f| f == key)
    }

    fn step(&mut self, state: ParseState, line: &str) -> Result<ParseState> {
        if line.trim().is_empty() {
            return Ok(state);
        }
        match state {
            ParseState::Searching => Ok(match open_block(line) {
                Some(block) => ParseState::InList(block),
                None => ParseState::Searching,
            }),
            ParseState::InList(mut block) => {
                if !line.starts_with("* ") {
                    // The line ending the list is the candidate total line.
                    self.close_block(block, line)?;
                    return Ok(ParseState::Searching);
                }
                let (key, value) = parse_entry(line)?;
                if !self.expects(&key) {
                    self.parsed
                        .diagnostics
                        .push(format!("Did not expect key: '{key}' here"));
                }
                block.marks.insert(key, value);
                Ok(ParseState::InList(block))
            }
        }
    }

    fn finish(mut self, state: ParseState) -> Result<ParsedLog> {
        if let ParseState::InList(block) = state {
            self.close_block(block, "")?;
        }
        Ok(self.parsed)
    }

    fn close_block(&mut self, block: StudentBlock, total_line: &str) -> Result<()> {
        self.check_total(&block, total_line)?;
        debug!(id = %block.id, components = block.marks.len(), "closed student block");
        match self.parsed.blocks.iter_mut().find(|b| b.id == block.id) {
            Some(existing) => existing.marks = block.marks,
            None => self.parsed.blocks.push(block),
        }
        Ok(())
    }

    fn check_total(&mut self, block: &StudentBlock, line: &str) -> Result<()> {
        let diagnostics = &mut self.parsed.diagnostics;
        let mut missing: Vec<&str> = self
            .required
            .iter()
            .map(String::as_str)
            .filter(|f| !block.marks.contains_key(f))
            .collect();
        missing.sort_unstable();
        missing.dedup();
        if !missing.is_empty() {
            diagnostics.push(format!(
                "Required field{} {} not present",
                if missing.len() > 1 { "s" } else { "" },
                missing.join(", ")
            ));
        }

        let actual = block.marks.total();
        let is_total = line
            .get(..5)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("total"));
        if !is_total {
            diagnostics.push(format!(
                "Expecting total {} for {}",
                display_mark(actual),
                block.id
            ));
            return Ok(());
        }

        let declared = declared_total(line)?;
        if declared != actual {
            diagnostics.push(format!(
                "Expected {} for {}, got {}",
                display_mark(actual),
                block.id,
                display_mark(declared)
            ));
        }
        Ok(())
    }
}

/// Opens a block for `## <id> ...` headers. Deeper headings are not blocks.
fn open_block(line: &str) -> Option<StudentBlock> {
    let rest = line.strip_prefix("##")?;
    if rest.starts_with('#') {
        return None;
    }
    match rest.split_whitespace().next() {
        Some(id) => Some(StudentBlock {
            id: id.to_string(),
            marks: ScoreMap::new(),
        }),
        None => {
            warn!(line, "student header without an identifier, ignoring");
            None
        }
    }
}

fn declared_total(line: &str) -> Result<f64> {
    let text = line
        .split(':')
        .nth(1)
        .ok_or_else(|| GradeError::malformed(line, "total line should have ':' before the value"))?
        .trim();
    if text.is_empty() {
        return Ok(0.0);
    }
    text.parse::<f64>()
        .map_err(|_| GradeError::malformed(line, format!("{text:?} is not a number")))
}

/// Parses every student block in `contents`, collecting validation messages.
///
/// Grammar errors in `* key : value` lines abort the parse; missing fields,
/// unexpected keys and total mismatches are returned as diagnostics.
pub fn parse_log(contents: &str, required: &[String], optional: &[String]) -> Result<ParsedLog> {
    let mut parser = LogParser::new(required, optional);
    let state = contents
        .lines()
        .try_fold(ParseState::Searching, |state, line| parser.step(state, line))?;
    parser.finish(state)
}

pub fn checked_totals(contents: &str, schema: &ScoreSchema) -> Result<CheckedTotals> {
    let parsed = parse_log(
        contents,
        &schema.required_names(),
        &schema.optional_names(),
    )?;
    Ok(CheckedTotals {
        totals: parsed
            .blocks
            .iter()
            .map(|block| (block.id.clone(), block.marks.total()))
            .collect(),
        diagnostics: parsed.diagnostics,
    })
}

/// Reads a marking log and checks it against the maxima in its own header.
pub fn check_log_file(path: &Path) -> Result<CheckedTotals> {
    let contents = std::fs::read_to_string(path)?;
    let schema = parse_schema(&contents)?;
    checked_totals(&contents, &schema)
}

pub fn diagnostics_report(diagnostics: &[String]) -> String {
    diagnostics.join("\n")
}

pub fn totals_report(checked: &CheckedTotals) -> String {
    let mut out = Vec::new();
    if !checked.diagnostics.is_empty() {
        out.push(diagnostics_report(&checked.diagnostics));
    }
    for (id, total) in checked.totals.iter() {
        out.push(format!("{:<10} : {}", id, display_mark(total)));
    }
    out.join("\n")
}
