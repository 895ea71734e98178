use std::path::Path;

use tracing::{debug, info};

use crate::error::{GradeError, Result};
use crate::models::Student;

const LOGIN_PLACEHOLDER: &str = "{{ login }}";

/// Builds the marking-log section for a student who has just submitted.
pub fn student_section(login: &str, students: &[Student], template: &str) -> Result<String> {
    let student = students
        .iter()
        .find(|s| s.login == login)
        .ok_or_else(|| GradeError::UnknownStudent {
            login: login.to_string(),
        })?;
    Ok(format!(
        "## {login}\n\n{}\n\nTotal: \n\n{}\n\n",
        template.trim_end_matches('\n'),
        student.name
    ))
}

/// Copies the grading notebook template for `login`.
///
/// Returns whether a notebook was written. Nothing is written when the
/// template is absent, or when `out_path` exists and `clobber` is false.
pub fn write_notebook(login: &str, template_path: &Path, out_path: &Path, clobber: bool) -> Result<bool> {
    if !template_path.exists() {
        debug!(template = %template_path.display(), "no notebook template");
        return Ok(false);
    }
    if out_path.exists() && !clobber {
        return Ok(false);
    }
    let template = std::fs::read_to_string(template_path)?;
    std::fs::write(out_path, template.replace(LOGIN_PLACEHOLDER, login))?;
    info!(notebook = %out_path.display(), "wrote grading notebook");
    Ok(true)
}
