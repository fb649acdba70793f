// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Lesewerk — text extraction from scanned images and PDFs.
//
// Entry point. Parses arguments, initialises logging on stderr, and dispatches
// to the `extract` and `clean` commands. Standard output carries only
// extracted text.

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgGroup, Args, Parser, Subcommand};
use lesewerk_core::error::LesewerkError;
use lesewerk_core::human_errors::humanize_error;

#[derive(Parser, Debug)]
#[command(name = "lesewerk")]
#[command(version, about = "Extract text from scanned images and PDFs", long_about = None)]
struct Cli {
    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run OCR over one file or every file in a directory
    Extract(ExtractArgs),

    /// Clean images for OCR and save them as `<name>_annotated.<ext>`
    Clean(CleanArgs),
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("input").required(true).args(["directory", "file"])))]
struct ExtractArgs {
    /// Directory containing the images or PDFs to extract text from
    #[arg(short, long)]
    directory: Option<PathBuf>,

    /// Image or PDF file to extract text from
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Directory to save the extracted text files to
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the extracted text (always on when no output directory is given)
    #[arg(short, long)]
    print: bool,

    /// Extract word-level data (position and confidence) instead of plain text
    #[arg(short = 'g', long = "get_data", visible_alias = "get-data")]
    get_data: bool,

    /// Also process files in subdirectories
    #[arg(short, long)]
    recursive: bool,

    /// Number of files processed in parallel
    #[arg(short, long)]
    workers: Option<usize>,

    /// Rasterization resolution for PDF pages
    #[arg(long)]
    dpi: Option<u32>,

    /// Drop words below this confidence (word data only)
    #[arg(long)]
    min_confidence: Option<f32>,

    /// Directory containing the OCR model files
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// TOML configuration file; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write a JSON summary of a directory run to this file
    #[arg(long)]
    summary: Option<PathBuf>,
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("input").required(true).args(["image", "directory"])))]
struct CleanArgs {
    /// Image to clean
    #[arg(short, long)]
    image: Option<PathBuf>,

    /// Directory of images to clean
    #[arg(short, long)]
    directory: Option<PathBuf>,

    /// Directory to save cleaned images to (default: next to the input)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.quiet { "warn" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Extract(args) => commands::extract(args),
        Commands::Clean(args) => commands::clean(args),
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            if let Some(cause) = err.downcast_ref::<LesewerkError>() {
                let human = humanize_error(cause);
                eprintln!("{}", human.message);
                eprintln!("  {}", human.suggestion);
            }
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_requires_exactly_one_input() {
        assert!(Cli::try_parse_from(["lesewerk", "extract"]).is_err());
        assert!(Cli::try_parse_from(["lesewerk", "extract", "-d", "in", "-f", "a.png"]).is_err());

        let argv = ["lesewerk", "extract", "-f", "a.png", "--get_data", "-o", "out"];
        let cli = Cli::try_parse_from(argv).unwrap();
        let Commands::Extract(args) = cli.command else {
            panic!("expected extract");
        };
        assert!(args.get_data);
        assert_eq!(args.output, Some(PathBuf::from("out")));
    }

    #[test]
    fn clean_accepts_image_or_directory() {
        assert!(Cli::try_parse_from(["lesewerk", "clean", "--image", "a.png"]).is_ok());
        assert!(Cli::try_parse_from(["lesewerk", "-q", "clean", "-d", "scans"]).is_ok());
        assert!(Cli::try_parse_from(["lesewerk", "clean"]).is_err());
    }
}
