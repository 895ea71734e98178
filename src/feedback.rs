use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

use crate::error::{GradeError, Result};

static STUDENT_SPLITTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^##\s+").expect("splitter pattern is valid"));
static STID_FINDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\w\w\w\d+").expect("student id pattern is valid"));
static TOTAL_FINDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Total\s*:\s*[0-9.]+").expect("total pattern is valid"));

/// Public feedback for one student: the part of their section after the total.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackPart {
    pub id: String,
    pub text: String,
}

fn prune_part(part: &str) -> String {
    part.lines()
        .skip_while(|line| !TOTAL_FINDER.is_match(line))
        .skip(1)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Splits a marking log into per-student feedback, keyed by login.
///
/// Sections whose header does not start with a login (three word characters
/// then digits) are skipped.
pub fn split_parts(text: &str) -> Vec<FeedbackPart> {
    let mut parts: Vec<FeedbackPart> = Vec::new();
    for section in STUDENT_SPLITTER.split(text) {
        let Some(found) = STID_FINDER.find(section) else {
            continue;
        };
        let part = FeedbackPart {
            id: found.as_str().to_string(),
            text: prune_part(section),
        };
        match parts.iter_mut().find(|p| p.id == part.id) {
            Some(existing) => existing.text = part.text,
            None => parts.push(part),
        }
    }
    parts
}

pub fn write_parts(parts: &[FeedbackPart], out_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(out_dir)?;
    for part in parts {
        std::fs::write(out_dir.join(format!("{}_notes.md", part.id)), &part.text)?;
    }
    let ids: Vec<&str> = parts.iter().map(|p| p.id.as_str()).collect();
    std::fs::write(out_dir.join("stids.txt"), ids.join("\n"))?;
    info!(parts = parts.len(), dir = %out_dir.display(), "wrote feedback fragments");
    Ok(())
}

/// Builds `<id>_notes.pdf` with pandoc and `<id>_nb.pdf` from the student's
/// notebook in the working directory.
pub fn render_pdfs(parts: &[FeedbackPart], out_dir: &Path) -> Result<()> {
    for part in parts {
        let out_root = out_dir.join(&part.id);
        let notes = format!("{}_notes.pdf", out_root.display());
        let mut child = Command::new("pandoc")
            .args(["-f", "gfm", "-t", "latex", "-o", notes.as_str()])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| tool_error("pandoc", e))?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(part.text.as_bytes())
                .map_err(|e| tool_error("pandoc", e))?;
        }
        let output = child.wait_with_output().map_err(|e| tool_error("pandoc", e))?;
        if !output.stderr.is_empty() || !output.status.success() {
            return Err(tool_error(
                "pandoc",
                String::from_utf8_lossy(&output.stderr).trim(),
            ));
        }

        let notebook = format!("{}.ipynb", part.id);
        let status = Command::new("jupyter")
            .args(["nbconvert", notebook.as_str(), "--to", "pdf", "--output"])
            .arg(format!("{}_nb", out_root.display()))
            .status()
            .map_err(|e| tool_error("jupyter nbconvert", e))?;
        if !status.success() {
            return Err(tool_error(
                "jupyter nbconvert",
                format!("{notebook} exited with {status}"),
            ));
        }
        info!(id = %part.id, "rendered feedback pdfs");
    }
    Ok(())
}

fn tool_error(tool: &str, reason: impl ToString) -> GradeError {
    GradeError::ExternalTool {
        tool: tool.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOG: &str = "# Marking log\n\nOrdinary maxima:\n* q1: 5\n\nTotal: 5\n\n\
        ## abc123\n\n* q1: 4\n\nTotal: 4\n\nNice work.\n\nSee the notes.\n\n\
        ### Details\n\nMore.\n\n\
        ## Not a student\n\nTotal: 1\n\nignored\n\n\
        ## xyz987 late\n\n* q1: 2\n\nTotal : 2.0\n\nPlease ask.\n";

    #[test]
    fn splits_sections_by_login() {
        let parts = split_parts(LOG);
        let ids: Vec<&str> = parts.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["abc123", "xyz987"]);
    }

    #[test]
    fn keeps_only_text_after_total() {
        let parts = split_parts(LOG);
        assert_eq!(parts[0].text, "\nNice work.\n\nSee the notes.\n\n### Details\n\nMore.\n");
        assert_eq!(parts[1].text, "\nPlease ask.");
    }

    #[test]
    fn section_without_total_has_no_public_text() {
        let parts = split_parts("## abc123\n\n* q1: 4\n\nTotal: \n\nNotes\n");
        assert_eq!(parts[0].text, "");
    }

    #[test]
    fn writes_fragments_and_id_list() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("feedback");
        write_parts(&split_parts(LOG), &out).unwrap();
        assert_eq!(
            std::fs::read_to_string(out.join("stids.txt")).unwrap(),
            "abc123\nxyz987"
        );
        assert_eq!(
            std::fs::read_to_string(out.join("xyz987_notes.md")).unwrap(),
            "\nPlease ask."
        );
    }
}
