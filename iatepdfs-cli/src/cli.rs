//! CLI argument parsing for iatepdfs.
//!
//! This module defines the command-line interface structure using `clap`.
//! It is also compiled by the build script to render the man page, so it
//! only depends on `clap` and the library.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use iatepdfs::backend::DEFAULT_MERGE_NAME;
use iatepdfs::config::{QualityPreset, Settings, Timeouts, ToolPaths};
use iatepdfs::error::{PdfToolError, Result};

/// Merge, compress, split and reorder the pages of PDF documents.
///
/// Merging, splitting and reordering run in-process. Compression needs
/// Ghostscript (`gs`); page previews need Poppler's `pdftoppm`.
#[derive(Parser, Debug)]
#[command(name = "iatepdfs")]
#[command(version)]
#[command(about = "Merge, compress, split and reorder the pages of PDF documents", long_about = None)]
#[command(author)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Operation to run
    #[command(subcommand)]
    pub command: Command,

    /// Ghostscript binary used for compression
    #[arg(long, global = true, value_name = "PROGRAM", default_value = "gs")]
    pub gs: PathBuf,

    /// Poppler rasterizer used for previews
    #[arg(long, global = true, value_name = "PROGRAM", default_value = "pdftoppm")]
    pub pdftoppm: PathBuf,

    /// Time limit for compression, in seconds
    ///
    /// The Ghostscript process is killed when it runs longer.
    #[arg(long, global = true, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Number of background workers
    ///
    /// Default is the number of CPU cores.
    #[arg(short, long, global = true, value_name = "N")]
    pub jobs: Option<usize>,

    /// Print the operation's report as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all non-error output
    #[arg(long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Show detailed output and informational logs
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Operations.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Merge PDF files in the given order
    ///
    /// Examples:
    ///   iatepdfs merge a.pdf b.pdf -o both.pdf
    ///   iatepdfs merge 'chapter*.pdf' -o book.pdf
    Merge {
        /// Input files or glob patterns, in merge order
        #[arg(required = true, value_name = "FILE")]
        inputs: Vec<PathBuf>,

        /// Output file
        #[arg(short, long, value_name = "FILE", default_value = DEFAULT_MERGE_NAME)]
        output: PathBuf,
    },

    /// Compress a PDF with Ghostscript
    Compress {
        /// Input file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file [default: <stem>_compressed.pdf]
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Quality preset: screen, ebook, printer or prepress
        #[arg(short, long, value_name = "PRESET", default_value = "ebook")]
        quality: QualityPreset,
    },

    /// Write every page to its own file
    Split {
        /// Input file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output directory [default: the input's directory]
        #[arg(short, long, value_name = "DIR")]
        dir: Option<PathBuf>,
    },

    /// Reorder or drop pages
    ///
    /// Page numbers are 1-based and refer to the input document.
    ///
    /// Examples:
    ///   iatepdfs reorder doc.pdf --order 3,1,2
    ///   iatepdfs reorder doc.pdf --delete 2,4 -o trimmed.pdf
    Reorder {
        /// Input file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file [default: <stem>_reordered.pdf]
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// New order of the kept pages, e.g. "3,1,2"
        #[arg(long, value_name = "PAGES")]
        order: Option<String>,

        /// Pages to drop, e.g. "2,4"
        #[arg(long, value_name = "PAGES")]
        delete: Option<String>,
    },

    /// Render a PNG preview of every page
    Thumbnails {
        /// Input file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output directory
        #[arg(short, long, value_name = "DIR")]
        dir: PathBuf,
    },

    /// Show page count, version and size
    Info {
        /// Input file
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Check that Ghostscript and pdftoppm can be run
    Check,
}

impl Cli {
    /// Build library settings from the global flags.
    ///
    /// Previews are only rendered for the `thumbnails` command.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if a flag is out of range.
    pub fn to_settings(&self) -> Result<Settings> {
        let mut timeouts = Timeouts::default();
        if let Some(seconds) = self.timeout {
            timeouts.compression = Duration::from_secs(seconds);
        }

        let settings = Settings {
            tools: ToolPaths {
                ghostscript: self.gs.clone(),
                rasterizer: self.pdftoppm.clone(),
            },
            timeouts,
            jobs: self.jobs,
            previews: matches!(self.command, Command::Thumbnails { .. }),
            ..Settings::default()
        };

        settings.validate()?;
        Ok(settings)
    }
}

/// Parse a comma-separated list of 1-based page numbers.
///
/// # Errors
///
/// `InvalidConfig` for an empty list, an empty entry, a non-number or 0.
pub fn parse_page_list(text: &str) -> Result<Vec<usize>> {
    if text.trim().is_empty() {
        return Err(PdfToolError::invalid_config("Page list is empty"));
    }

    text.split(',')
        .map(|part| {
            let part = part.trim();
            match part.parse::<usize>() {
                Ok(0) => Err(PdfToolError::invalid_config(
                    "Page numbers start at 1",
                )),
                Ok(number) => Ok(number),
                Err(_) => Err(PdfToolError::invalid_config(format!(
                    "Invalid page number: '{part}'"
                ))),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use rstest::rstest;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("iatepdfs").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_merge_defaults() {
        let cli = parse(&["merge", "a.pdf", "b.pdf"]);
        match cli.command {
            Command::Merge { inputs, output } => {
                assert_eq!(inputs.len(), 2);
                assert_eq!(output, PathBuf::from("merged.pdf"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_compress_quality_flag() {
        let cli = parse(&["compress", "scan.pdf", "-q", "screen", "--quiet"]);
        assert!(cli.quiet);
        match cli.command {
            Command::Compress { quality, output, .. } => {
                assert_eq!(quality, QualityPreset::Screen);
                assert!(output.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_compress_rejects_unknown_preset() {
        assert!(Cli::try_parse_from(["iatepdfs", "compress", "a.pdf", "-q", "tiny"]).is_err());
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["iatepdfs", "check", "--quiet", "--verbose"]).is_err());
    }

    #[test]
    fn test_to_settings() {
        let cli = parse(&["--gs", "/opt/gs", "--timeout", "30", "-j", "3", "thumbnails", "a.pdf", "-d", "out"]);
        let settings = cli.to_settings().unwrap();

        assert_eq!(settings.tools.ghostscript, PathBuf::from("/opt/gs"));
        assert_eq!(settings.tools.rasterizer, PathBuf::from("pdftoppm"));
        assert_eq!(settings.timeouts.compression, Duration::from_secs(30));
        assert_eq!(settings.jobs, Some(3));
        assert!(settings.previews);
    }

    #[test]
    fn test_to_settings_rejects_zero() {
        assert!(parse(&["--jobs", "0", "check"]).to_settings().is_err());
        assert!(parse(&["--timeout", "0", "check"]).to_settings().is_err());
        assert!(!parse(&["check"]).to_settings().unwrap().previews);
    }

    #[rstest]
    #[case("3,1,2", vec![3, 1, 2])]
    #[case(" 2 , 4 ", vec![2, 4])]
    #[case("7", vec![7])]
    fn test_parse_page_list(#[case] text: &str, #[case] expected: Vec<usize>) {
        assert_eq!(parse_page_list(text).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("1,,2")]
    #[case("0,1")]
    #[case("one")]
    #[case("-1")]
    fn test_parse_page_list_invalid(#[case] text: &str) {
        assert!(matches!(
            parse_page_list(text),
            Err(PdfToolError::InvalidConfig { .. })
        ));
    }
}
