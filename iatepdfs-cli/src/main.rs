//! iatepdfs - Merge, compress, split and reorder the pages of PDF documents.
//!
//! The command line drives the same application state as the desktop
//! front-end: it queues one operation, waits for it and prints the notices
//! it produced.

mod cli;

use clap::Parser;
use std::path::Path;
use std::process;
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, parse_page_list};
use iatepdfs::app::{AppState, CompletedJob, NoticeLevel};
use iatepdfs::error::{PdfToolError, Result};
use iatepdfs::io::DocumentInfo;
use iatepdfs::output::{
    OutputFormatter, display_document_info, display_notices, display_split_report,
    display_tool_status,
};
use iatepdfs::utils::{collect_paths_for_patterns, file_stem, format_file_size};

/// Upper bound on waiting for one operation; the tools carry their own
/// timeouts.
const WAIT_LIMIT: Duration = Duration::from_secs(60 * 60);

fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();
    init_logging(&cli);

    // Run the application and handle errors
    if let Err(err) = run(&cli) {
        eprintln!("Error: {err}");
        process::exit(err.exit_code());
    }
}

/// Log to stderr; `RUST_LOG` overrides the verbosity flags.
fn init_logging(cli: &Cli) {
    let default_level = if cli.quiet {
        "error"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Main application logic.
fn run(cli: &Cli) -> Result<()> {
    let settings = cli.to_settings()?;
    let formatter = OutputFormatter::new(cli.quiet, cli.verbose);

    let mut app = AppState::new(settings)?;
    let result = execute(&mut app, cli, &formatter);

    // Failures are reported once, by main.
    if !cli.json {
        let notices: Vec<_> = app
            .take_notices()
            .into_iter()
            .filter(|notice| notice.level != NoticeLevel::Error)
            .collect();
        display_notices(&formatter, &notices);
    }

    app.shutdown();
    result
}

fn execute(app: &mut AppState, cli: &Cli, formatter: &OutputFormatter) -> Result<()> {
    match &cli.command {
        Command::Merge { inputs, output } => {
            let patterns = inputs.iter().map(|p| p.to_string_lossy().into_owned());
            let paths = collect_paths_for_patterns(patterns)?;
            debug!(files = paths.len(), "merge inputs resolved");

            let mut added = app.add_files(&paths);
            if let Some((_, err)) = added.rejected.drain(..).next() {
                return Err(err);
            }

            app.merge_all(output)?;
            let CompletedJob::Merged(report) = finish(app)? else {
                return Err(unexpected());
            };

            if cli.json {
                print_json(serde_json::to_value(&report))?;
            } else {
                formatter.detail("Pages", &report.total_pages.to_string());
                formatter.detail("Size", &format_file_size(report.file_size));
            }
        }

        Command::Compress {
            input,
            output,
            quality,
        } => {
            add_input(app, input)?;
            app.set_quality(*quality);
            app.compress_selected(output.as_deref())?;

            let CompletedJob::Compressed(report) = finish(app)? else {
                return Err(unexpected());
            };
            if cli.json {
                print_json(serde_json::to_value(&report))?;
            }
        }

        Command::Split { input, dir } => {
            add_input(app, input)?;
            app.split_selected(dir.as_deref())?;

            let CompletedJob::Split(report) = finish(app)? else {
                return Err(unexpected());
            };
            if cli.json {
                print_json(serde_json::to_value(&report))?;
            } else {
                display_split_report(formatter, &report);
            }
        }

        Command::Reorder {
            input,
            output,
            order,
            delete,
        } => {
            let info = open(app, input)?;

            // Positions still match page numbers until the reorder below.
            if let Some(delete) = delete {
                for number in parse_page_list(delete)? {
                    if number > info.page_count {
                        return Err(PdfToolError::out_of_range(number, info.page_count));
                    }
                    app.delete_page(number - 1)?;
                }
            }
            if let Some(order) = order {
                let positions: Vec<usize> = parse_page_list(order)?
                    .into_iter()
                    .map(|number| number - 1)
                    .collect();
                app.reorder_pages(&positions)?;
            }

            app.save_reordered(output.as_deref())?;
            let CompletedJob::Saved(report) = finish(app)? else {
                return Err(unexpected());
            };
            if cli.json {
                print_json(serde_json::to_value(&report))?;
            }
        }

        Command::Thumbnails { input, dir } => {
            std::fs::create_dir_all(dir).map_err(|e| PdfToolError::write_error(dir, e))?;
            open(app, input)?;

            let stem = file_stem(input);
            let mut written = Vec::new();
            let mut placeholders = 0;
            for entry in app.pages().ordered() {
                match &entry.thumbnail {
                    Some(thumbnail) if !thumbnail.is_placeholder() => {
                        let path = dir.join(format!("{stem}_thumb_{}.png", entry.page_number()));
                        std::fs::write(&path, &thumbnail.png)
                            .map_err(|e| PdfToolError::write_error(&path, e))?;
                        written.push(path);
                    }
                    _ => placeholders += 1,
                }
            }

            if cli.json {
                print_json(Ok(serde_json::json!({
                    "input": input,
                    "outputs": written,
                    "skipped": placeholders,
                })))?;
            } else {
                formatter.success(&format!(
                    "Wrote {} previews to {}",
                    written.len(),
                    dir.display()
                ));
            }
        }

        Command::Info { input } => {
            let info = app.probe(input)?;
            if cli.json {
                print_json(serde_json::to_value(&info))?;
            } else {
                display_document_info(formatter, &info);
            }
        }

        Command::Check => {
            let tools = app.check_tools();
            let all_available = if cli.json {
                print_json(serde_json::to_value(&tools))?;
                tools.iter().all(|tool| tool.available)
            } else {
                display_tool_status(formatter, &tools)
            };

            if !all_available
                && let Some(missing) = tools.iter().find(|tool| !tool.available)
            {
                return Err(PdfToolError::missing_tool(
                    missing.name,
                    missing.program.clone(),
                ));
            }
        }
    }

    Ok(())
}

/// Add one file and select it.
fn add_input(app: &mut AppState, input: &Path) -> Result<()> {
    let mut report = app.add_files(&[input]);
    match report.rejected.pop() {
        Some((_, err)) => Err(err),
        None => Ok(()),
    }
}

/// Open a document for page editing and wait until it is ready.
fn open(app: &mut AppState, input: &Path) -> Result<DocumentInfo> {
    app.open_document(input)?;
    app.wait_for_session_ready(WAIT_LIMIT)
}

/// Wait for the queued job; a failed job becomes the error.
fn finish(app: &mut AppState) -> Result<CompletedJob> {
    match app.wait_for_job(WAIT_LIMIT) {
        Some(CompletedJob::Failed { error, .. }) => Err(error),
        Some(done) => Ok(done),
        None => Err(PdfToolError::other("Timed out waiting for the operation")),
    }
}

fn unexpected() -> PdfToolError {
    PdfToolError::other("Operation finished with an unexpected result")
}

fn print_json(value: serde_json::Result<serde_json::Value>) -> Result<()> {
    let value = value.map_err(|e| PdfToolError::other(format!("Failed to encode report: {e}")))?;
    let text = serde_json::to_string_pretty(&value)
        .map_err(|e| PdfToolError::other(format!("Failed to encode report: {e}")))?;
    println!("{text}");
    Ok(())
}
