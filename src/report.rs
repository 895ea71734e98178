use std::fmt::Write as _;
use std::io::Write;

use chrono::NaiveDate;

use crate::error::{GradeError, Result};
use crate::models::{display_mark, CheckedTotals, ScoreMap, Student, YearSummary};

const MAX_MARK: f64 = 100.0;
const PASS_MARK: f64 = 50.0;
const UNDERLINE: &str = "---------------";

/// Reads a previous year's `login: mark` listing, capping marks at 100.
pub fn read_totals(text: &str) -> Result<ScoreMap> {
    let mut marks = ScoreMap::new();
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        let malformed = || GradeError::MalformedTotal {
            line: line.to_string(),
        };
        let (login, value) = line.split_once(':').ok_or_else(malformed)?;
        let value: f64 = value.trim().parse().map_err(|_| malformed())?;
        marks.insert(login.trim(), value.min(MAX_MARK));
    }
    Ok(marks)
}

/// Applies this year's fudge to checked totals. A log with any diagnostics
/// is refused so that unchecked marks never reach the gradebook.
pub fn current_marks(checked: &CheckedTotals, fudge: f64) -> Result<ScoreMap> {
    if !checked.diagnostics.is_empty() {
        return Err(GradeError::UncheckedLog {
            report: checked.diagnostics.join("\n"),
        });
    }
    Ok(checked
        .totals
        .iter()
        .map(|(login, total)| (login, (total + fudge).min(MAX_MARK)))
        .collect())
}

pub fn summarize_year(marks: &ScoreMap, year: i32) -> YearSummary {
    let values: Vec<f64> = marks.iter().map(|(_, v)| v).collect();
    let count = values.len();
    let mean = if count == 0 {
        0.0
    } else {
        values.iter().sum::<f64>() / count as f64
    };
    let stdev = (count > 1).then(|| {
        let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
        (ss / (count - 1) as f64).sqrt()
    });
    YearSummary {
        year,
        count,
        mean,
        stdev,
        failed: marks
            .iter()
            .filter(|(_, mark)| *mark < PASS_MARK)
            .map(|(login, _)| login.to_string())
            .collect(),
    }
}

pub fn build_report(generated: NaiveDate, summaries: &[YearSummary]) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Marks Report");
    let _ = writeln!(output, "Generated {}", generated);

    for summary in summaries {
        let _ = writeln!(output);
        let _ = writeln!(output, "Marks for {}", summary.year);
        let _ = writeln!(output, "{UNDERLINE}");
        let _ = writeln!(output, "n: {}", summary.count);
        let _ = writeln!(output, "Mean: {:.2}", summary.mean);
        match summary.stdev {
            Some(stdev) => {
                let _ = writeln!(output, "Stdev: {:.2}", stdev);
            }
            None => {
                let _ = writeln!(output, "Stdev: n/a");
            }
        }
        if !summary.failed.is_empty() {
            let _ = writeln!(output, "Failed:");
            for login in &summary.failed {
                let _ = writeln!(output, "{login}");
            }
        }
    }

    output
}

/// Writes the upload table: the minimal student columns plus `assignment`,
/// for students that have a mark.
pub fn write_marks<W: Write>(
    students: &[Student],
    marks: &ScoreMap,
    assignment: &str,
    writer: W,
) -> Result<usize> {
    if let Some(login) = marks
        .keys()
        .find(|login| !students.iter().any(|s| s.login == *login))
    {
        return Err(GradeError::UnknownStudent {
            login: login.to_string(),
        });
    }

    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(["Student", "SIS User ID", "SIS Login ID", "Section", assignment])?;
    let mut written = 0;
    for student in students {
        let Some(mark) = marks.get(&student.login) else {
            continue;
        };
        writer.write_record([
            student.name.as_str(),
            student.sis_user_id.to_string().as_str(),
            student.login.as_str(),
            student.section.as_str(),
            display_mark(mark).as_str(),
        ])?;
        written += 1;
    }
    writer.flush()?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student(name: &str, id: i64, login: &str) -> Student {
        Student {
            name: name.to_string(),
            sis_user_id: id,
            login: login.to_string(),
            section: "A Module Title".to_string(),
        }
    }

    #[test]
    fn reads_previous_totals() {
        let marks = read_totals("mbr312: 43.5\nvrr110 : 104\n\nlxl101:80.5\n").unwrap();
        assert_eq!(
            marks.iter().collect::<Vec<_>>(),
            vec![("mbr312", 43.5), ("vrr110", 100.0), ("lxl101", 80.5)]
        );
        assert!(read_totals("mbr312 43.5\n").is_err());
        assert!(read_totals("mbr312: lots\n").is_err());
    }

    #[test]
    fn fudge_is_capped() {
        let checked = CheckedTotals {
            totals: [("a", 60.0), ("b", 99.0)].into_iter().collect(),
            diagnostics: vec![],
        };
        let marks = current_marks(&checked, 2.5).unwrap();
        assert_eq!(marks.get("a"), Some(62.5));
        assert_eq!(marks.get("b"), Some(100.0));
    }

    #[test]
    fn diagnostics_block_current_marks() {
        let checked = CheckedTotals {
            totals: [("a", 60.0)].into_iter().collect(),
            diagnostics: vec!["Expecting total 60.0 for a".to_string()],
        };
        let err = current_marks(&checked, 0.0).unwrap_err();
        assert_eq!(
            err.to_string(),
            "check returns message \"Expecting total 60.0 for a\""
        );
    }

    #[test]
    fn summary_statistics() {
        let marks: ScoreMap = [("a", 40.0), ("b", 60.0), ("c", 80.0)].into_iter().collect();
        let summary = summarize_year(&marks, 2024);
        assert_eq!(summary.count, 3);
        assert!((summary.mean - 60.0).abs() < 1e-9);
        assert!((summary.stdev.unwrap() - 20.0).abs() < 1e-9);
        assert_eq!(summary.failed, vec!["a"]);

        let single = summarize_year(&[("a", 70.0)].into_iter().collect(), 2023);
        assert_eq!(single.stdev, None);
        assert!(single.failed.is_empty());
    }

    #[test]
    fn report_lists_each_year() {
        let this_year = summarize_year(&[("a", 40.0), ("b", 60.0)].into_iter().collect(), 2024);
        let last_year = summarize_year(&[("c", 75.0)].into_iter().collect(), 2023);
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let report = build_report(date, &[this_year, last_year]);
        assert_eq!(
            report,
            "# Marks Report\nGenerated 2024-06-01\n\n\
             Marks for 2024\n---------------\nn: 2\nMean: 50.00\nStdev: 14.14\nFailed:\na\n\n\
             Marks for 2023\n---------------\nn: 1\nMean: 75.00\nStdev: n/a\n"
        );
    }

    #[test]
    fn marks_table_drops_students_without_marks() {
        let students = vec![
            student("Matthew Brett", 9876543, "mb312"),
            student("Martin Brett", 1357908, "mb110"),
        ];
        let marks: ScoreMap = [("mb110", 72.5)].into_iter().collect();
        let mut out = Vec::new();
        let written = write_marks(&students, &marks, "Project (1234)", &mut out).unwrap();
        assert_eq!(written, 1);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Student,SIS User ID,SIS Login ID,Section,Project (1234)\n\
             Martin Brett,1357908,mb110,A Module Title,72.5\n"
        );
    }

    #[test]
    fn marks_for_unknown_login_are_rejected() {
        let students = vec![student("Matthew Brett", 9876543, "mb312")];
        let marks: ScoreMap = [("zz999", 50.0)].into_iter().collect();
        let err = write_marks(&students, &marks, "Project", Vec::<u8>::new()).unwrap_err();
        assert!(matches!(err, GradeError::UnknownStudent { login } if login == "zz999"));
    }
}
