use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{debug, warn};

mod canvas;
mod check;
mod config;
mod error;
mod feedback;
mod logging;
mod models;
mod report;
mod schema;
mod stinit;

use config::{Config, CONFIG_FILE};

#[derive(Parser)]
#[command(name = "marklog")]
#[command(about = "Marking log checks and gradebook tools for course grading", long_about = None)]
struct Cli {
    /// Course configuration file
    #[arg(long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,
    /// Log parser decisions to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reduce a Canvas gradebook export to the minimal student table
    Mkstable {
        /// CSV file downloaded from Canvas
        full_gradebook: PathBuf,
        /// Output path, defaults to students_<year>.csv
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Check the marking log and print per-student totals
    Check {
        /// Marking log, defaults to the configured log
        log: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Print the blank score listing from the marking log maxima
    Template {
        /// Marking log, defaults to the configured log
        log: Option<PathBuf>,
    },
    /// Print a new marking section and create the grading notebook
    Stinit {
        /// Login name of submitting student
        login: String,
        /// Overwrite an existing notebook
        #[arg(long)]
        clobber: bool,
    },
    /// Print student keys for submission files, checking IDs are unique
    Keys {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Split the marking log into per-student feedback
    Mkfb {
        #[arg(long, default_value = "feedback")]
        out_dir: PathBuf,
        /// Also build PDFs with pandoc and jupyter nbconvert
        #[arg(long)]
        pdf: bool,
    },
    /// Summarize marks and write the upload CSV
    Report,
}

fn load_config(path: &Path) -> anyhow::Result<Config> {
    let config = Config::load(path).with_context(|| format!("failed to load {}", path.display()))?;
    debug!(year = config.year, log = %config.log.display(), "loaded config");
    Ok(config)
}

fn log_path(log: Option<PathBuf>, config_path: &Path) -> anyhow::Result<PathBuf> {
    match log {
        Some(log) => Ok(log),
        None => Ok(load_config(config_path)?.log),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if let Err(e) = logging::init_tracing(cli.verbose) {
        eprintln!("Warning: failed to initialize logging: {e}");
    }

    match cli.command {
        Commands::Mkstable {
            full_gradebook,
            output,
        } => {
            let output = match output {
                Some(output) => output,
                None => load_config(&cli.config)?.student_file(),
            };
            let file = std::fs::File::open(&full_gradebook)
                .with_context(|| format!("cannot open {}", full_gradebook.display()))?;
            let table = canvas::to_minimal(file, &canvas::MINIMAL_FIELDS)
                .with_context(|| format!("cannot read gradebook {}", full_gradebook.display()))?;
            canvas::write_table(&table, std::fs::File::create(&output)?)?;
            println!("Wrote {} students to {}.", table.rows.len(), output.display());
        }
        Commands::Check { log, json } => {
            let log = log_path(log, &cli.config)?;
            let checked = check::check_log_file(&log)
                .with_context(|| format!("failed to check {}", log.display()))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&checked)?);
            } else {
                println!("{}", check::totals_report(&checked));
            }
        }
        Commands::Template { log } => {
            let log = log_path(log, &cli.config)?;
            let schema = schema::read_schema(&log)
                .with_context(|| format!("failed to read maxima from {}", log.display()))?;
            print!("{}", schema::render_template(&schema));
        }
        Commands::Stinit { login, clobber } => {
            let config = load_config(&cli.config)?;
            let schema = schema::read_schema(&config.log)?;
            let students_file = config.student_file();
            let students = canvas::read_students(&students_file).with_context(|| {
                format!(
                    "cannot read {}, run `marklog mkstable` here",
                    students_file.display()
                )
            })?;
            let notebook = PathBuf::from(format!("{login}.Rmd"));
            stinit::write_notebook(&login, &config.notebook_template, &notebook, clobber)?;
            let section = stinit::student_section(&login, &students, &schema::render_template(&schema))?;
            println!("{section}");
        }
        Commands::Keys { files } => {
            let keys = canvas::check_unique_ids(&files)?;
            for (key, file) in keys.iter().zip(&files) {
                println!(
                    "{}\t{}\t{}\t{}",
                    key.id,
                    key.surname,
                    key.given_names,
                    file.display()
                );
            }
        }
        Commands::Mkfb { out_dir, pdf } => {
            let config = load_config(&cli.config)?;
            let text = std::fs::read_to_string(&config.log)
                .with_context(|| format!("cannot read {}", config.log.display()))?;
            let parts = feedback::split_parts(&text);
            feedback::write_parts(&parts, &out_dir)?;
            if pdf {
                feedback::render_pdfs(&parts, &out_dir)?;
            }
            println!("Feedback for {} students written to {}.", parts.len(), out_dir.display());
        }
        Commands::Report => {
            let config = load_config(&cli.config)?;
            let checked = check::check_log_file(&config.log)?;
            let this_year = report::current_marks(&checked, config.fudge())?;
            let mut summaries = vec![report::summarize_year(&this_year, config.year)];

            let previous = config.previous_totals_file();
            match std::fs::read_to_string(&previous) {
                Ok(text) => summaries.push(report::summarize_year(
                    &report::read_totals(&text)?,
                    config.year - 1,
                )),
                Err(e) => warn!(file = %previous.display(), error = %e, "no previous marks"),
            }
            print!(
                "{}",
                report::build_report(chrono::Local::now().date_naive(), &summaries)
            );

            let assignment = config.assignment()?;
            let students = canvas::read_students(&config.student_file())
                .with_context(|| format!("cannot read {}", config.student_file().display()))?;
            let out = config.marks_file();
            let written =
                report::write_marks(&students, &this_year, assignment, std::fs::File::create(&out)?)?;
            println!();
            println!("Marks for {written} students written to {}.", out.display());
        }
    }

    Ok(())
}
