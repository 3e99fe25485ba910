//! CLI tool for extracting per-slide text from PowerPoint files.

use anyhow::{bail, Context, Result};
use clap::Parser;
use deck_core::{ExtractOptions, PresentationFormat, SlideText};
use deck_extract::{Extraction, Extractor};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Extract the text of each slide from PowerPoint files.
#[derive(Parser, Debug)]
#[command(name = "deck-text")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input PowerPoint file(s) (.ppt or .pptx)
    #[arg(required = true)]
    input: Vec<PathBuf>,

    /// Output directory for one .txt file per input (default: print to stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Show only this slide (1-based)
    #[arg(short, long)]
    slide: Option<usize>,

    /// Print slides as JSON
    #[arg(short, long)]
    json: bool,

    /// Declared content type (default: derived from the file extension)
    #[arg(short, long)]
    mime: Option<String>,

    /// Maximum group nesting to descend into
    #[arg(long, default_value_t = deck_core::options::DEFAULT_MAX_GROUP_DEPTH)]
    max_depth: usize,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// JSON form of one processed file.
#[derive(Debug, Serialize)]
struct FileReport<'a> {
    file: String,
    format: PresentationFormat,
    slide_count: usize,
    slides: &'a [SlideText],
    warnings: Vec<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    if args.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    let extractor = Extractor::with_options(ExtractOptions::new().with_max_group_depth(args.max_depth));
    let mut failed = 0;

    for input_path in &args.input {
        if args.verbose {
            eprintln!("Processing: {}", input_path.display());
        }

        match process_file(input_path, &args, &extractor) {
            Ok(output) => match &args.output {
                Some(dir) => {
                    let output_path = get_output_path(input_path, dir, args.json)?;
                    write_output(&output_path, &output)?;
                    if args.verbose {
                        eprintln!("Written to: {}", output_path.display());
                    }
                }
                None => print!("{}", output),
            },
            Err(e) => {
                failed += 1;
                eprintln!("Error processing {}: {:#}", input_path.display(), e);
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} file(s) failed", failed, args.input.len());
    }
    Ok(())
}

/// Extract a single file and render it for output.
fn process_file(input_path: &Path, args: &Args, extractor: &Extractor) -> Result<String> {
    let bytes = std::fs::read(input_path).with_context(|| format!("Failed to read {}", input_path.display()))?;

    let hint = args.mime.clone().or_else(|| mime_from_extension(input_path));
    log::debug!("Declared type for {}: {:?}", input_path.display(), hint);

    let extraction = extractor
        .extract_report(&bytes, hint.as_deref())
        .with_context(|| format!("Failed to extract {}", input_path.display()))?;

    if args.verbose {
        eprintln!(
            "  Found {} slides ({}), {} shape(s) skipped",
            extraction.slides.len(),
            extraction.format,
            extraction.warnings.len()
        );
    }
    for warning in &extraction.warnings {
        log::debug!("{}: {}", input_path.display(), warning);
    }

    let slides = select_slides(&extraction, args.slide)?;
    if args.json {
        render_json(input_path, &extraction, slides)
    } else {
        Ok(render_text(slides, extraction.slides.len()))
    }
}

/// All slides, or the one at the 1-based `cursor`.
fn select_slides(extraction: &Extraction, cursor: Option<usize>) -> Result<&[SlideText]> {
    let total = extraction.slides.len();
    match cursor {
        None => Ok(&extraction.slides),
        Some(n) if n >= 1 && n <= total => Ok(&extraction.slides[n - 1..n]),
        Some(n) => bail!("Slide {} out of range (presentation has {} slides)", n, total),
    }
}

fn render_text(slides: &[SlideText], total: usize) -> String {
    let mut out = String::new();
    for slide in slides {
        out.push_str(&format!("--- Slide {} of {} ---\n{}\n\n", slide.number(), total, slide));
    }
    out
}

fn render_json(input_path: &Path, extraction: &Extraction, slides: &[SlideText]) -> Result<String> {
    let report = FileReport {
        file: input_path.display().to_string(),
        format: extraction.format,
        slide_count: extraction.slides.len(),
        slides,
        warnings: extraction.warnings.iter().map(ToString::to_string).collect(),
    };
    let mut json = serde_json::to_string_pretty(&report).context("Failed to serialize slides")?;
    json.push('\n');
    Ok(json)
}

fn mime_from_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(PresentationFormat::from_extension)
        .map(|format| format.mime_type().to_string())
}

/// Determine the output path for a processed file.
fn get_output_path(input_path: &Path, output_dir: &Path, json: bool) -> Result<PathBuf> {
    let stem = input_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");

    let extension = if json { "json" } else { "txt" };
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory: {}", output_dir.display()))?;

    Ok(output_dir.join(format!("{}.{}", stem, extension)))
}

/// Write output to a file.
fn write_output(path: &Path, content: &str) -> Result<()> {
    let mut file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;

    file.write_all(content.as_bytes())
        .with_context(|| format!("Failed to write to {}", path.display()))?;

    Ok(())
}
