//! transpdf CLI - layout-preserving PDF translation tool

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use transpdf::font::{display_name, FontRegistry};
use transpdf::parser::load_document;
use transpdf::pipeline::save_document;
use transpdf::{
    create_bilingual_pdf, export_glossary_csv, BuilderConfig, DocumentResult, PageSelection,
    PageStatus, ProgressEvent, TranslateOptions, Translator,
};

#[derive(Parser)]
#[command(name = "transpdf")]
#[command(author = "iyulab")]
#[command(version)]
#[command(about = "Translate PDF documents while keeping their layout", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract translatable blocks as JSON
    Extract {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Page range (e.g., "1-10", "1,3,5")
        #[arg(long)]
        pages: Option<String>,

        /// Layout rendering resolution (72-600)
        #[arg(long, default_value = "300")]
        dpi: u32,

        /// Builder thresholds as JSON
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Write translations into a PDF
    Apply {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// JSON object mapping block ids to translated text
        #[arg(value_name = "TRANSLATIONS")]
        translations: PathBuf,

        /// Output PDF file
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        /// Target language (ja, en, zh-CN, zh-TW, ko, ...)
        #[arg(long, env = "TRANSPDF_LANG", default_value = "ja")]
        lang: String,

        /// Page range (e.g., "1-10", "1,3,5")
        #[arg(long)]
        pages: Option<String>,

        /// Layout rendering resolution (72-600)
        #[arg(long, default_value = "300")]
        dpi: u32,

        /// Font file for the target language
        #[arg(long, value_name = "FILE")]
        font: Option<PathBuf>,

        /// Additional font directory
        #[arg(long, value_name = "DIR")]
        font_dir: Vec<PathBuf>,

        /// Builder thresholds as JSON
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Interleave original and translated pages into one PDF
    Bilingual {
        /// Original PDF file
        #[arg(value_name = "ORIGINAL")]
        original: PathBuf,

        /// Translated PDF file
        #[arg(value_name = "TRANSLATED")]
        translated: PathBuf,

        /// Output PDF file
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Export source and translated text pairs as CSV
    Glossary {
        /// Input PDF file (the untranslated original)
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// JSON object mapping block ids to translated text
        #[arg(value_name = "TRANSLATIONS")]
        translations: PathBuf,

        /// Output CSV file
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        /// Add page and block id columns
        #[arg(long)]
        with_location: bool,

        /// Page range (e.g., "1-10", "1,3,5")
        #[arg(long)]
        pages: Option<String>,

        /// Layout rendering resolution (72-600)
        #[arg(long, default_value = "300")]
        dpi: u32,

        /// Builder thresholds as JSON
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// List the fonts of a PDF and how they are encoded
    Fonts {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Show version information
    Version,
}

/// How a command finished.
enum Outcome {
    Done,
    PartialFailure,
}

fn main() -> ExitCode {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Extract {
            input,
            output,
            pages,
            dpi,
            config,
        } => cmd_extract(&input, output.as_deref(), pages.as_deref(), dpi, config.as_deref()),
        Commands::Apply {
            input,
            translations,
            output,
            lang,
            pages,
            dpi,
            font,
            font_dir,
            config,
        } => {
            let options = base_options(&lang, pages.as_deref(), dpi, config.as_deref()).map(|o| {
                let o = font_dir.into_iter().fold(o, |o, dir| o.with_font_dir(dir));
                match font {
                    Some(path) => o.with_font_file(path),
                    None => o,
                }
            });
            options.and_then(|o| cmd_apply(&input, &translations, &output, o))
        }
        Commands::Bilingual {
            original,
            translated,
            output,
        } => cmd_bilingual(&original, &translated, &output),
        Commands::Glossary {
            input,
            translations,
            output,
            with_location,
            pages,
            dpi,
            config,
        } => base_options("ja", pages.as_deref(), dpi, config.as_deref())
            .and_then(|o| cmd_glossary(&input, &translations, &output, with_location, o)),
        Commands::Fonts { input } => cmd_fonts(&input),
        Commands::Version => {
            cmd_version();
            Ok(Outcome::Done)
        }
    };

    match result {
        Ok(Outcome::Done) => ExitCode::SUCCESS,
        Ok(Outcome::PartialFailure) => ExitCode::from(2),
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), e);
            ExitCode::from(1)
        }
    }
}

fn base_options(
    lang: &str,
    pages: Option<&str>,
    dpi: u32,
    config: Option<&Path>,
) -> Result<TranslateOptions, Box<dyn std::error::Error>> {
    let page_selection = if let Some(p) = pages {
        PageSelection::parse(p).map_err(|e| format!("Invalid page range: {}", e))?
    } else {
        PageSelection::All
    };

    let mut options = TranslateOptions::new(lang)
        .with_pages(page_selection)
        .with_dpi(dpi);
    if let Some(path) = config {
        options = options.with_builder_config(BuilderConfig::from_json_file(path)?);
    }
    Ok(options)
}

fn progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

/// Progress callback that advances `pb` once per finished page.
fn track(pb: &ProgressBar) -> impl Fn(ProgressEvent) + Send + Sync + 'static {
    let pb = pb.clone();
    move |event| match event {
        ProgressEvent::PageStarted { page, stage } => {
            pb.set_message(format!("{:?} page {}", stage, page));
        }
        ProgressEvent::PageFinished { .. } => pb.inc(1),
        ProgressEvent::PageFailed { page, reason } => {
            pb.inc(1);
            pb.println(format!("{} page {}: {}", "Failed".red(), page, reason));
        }
        ProgressEvent::TranslationBatch { index, total } => {
            pb.set_message(format!("Translating batch {}/{}", index + 1, total));
        }
    }
}

fn cmd_extract(
    input: &Path,
    output: Option<&Path>,
    pages: Option<&str>,
    dpi: u32,
    config: Option<&Path>,
) -> Result<Outcome, Box<dyn std::error::Error>> {
    let options = base_options("ja", pages, dpi, config)?;
    let doc = load_document(input)?;

    let pb = progress_bar(doc.get_pages().len() as u64);
    let translator = Translator::new(options)?.with_progress(track(&pb));
    let extracted = translator.extract(&doc)?;
    pb.finish_and_clear();

    let json = serde_json::to_string_pretty(&extracted)?;
    if let Some(path) = output {
        fs::write(path, &json)?;
        let blocks: usize = extracted.iter().map(|p| p.blocks.len()).sum();
        println!(
            "{} {} blocks from {} pages to {}",
            "Saved".green(),
            blocks,
            extracted.len(),
            path.display()
        );
    } else {
        println!("{}", json);
    }

    if extracted.iter().any(|p| p.job.is_failed()) {
        Ok(Outcome::PartialFailure)
    } else {
        Ok(Outcome::Done)
    }
}

fn cmd_apply(
    input: &Path,
    translations: &Path,
    output: &Path,
    options: TranslateOptions,
) -> Result<Outcome, Box<dyn std::error::Error>> {
    let translations: HashMap<String, String> =
        serde_json::from_str(&fs::read_to_string(translations)?)?;

    let mut doc = load_document(input)?;
    let pb = progress_bar(doc.get_pages().len() as u64 * 2);
    let translator = Translator::new(options)?.with_progress(track(&pb));

    pb.set_message("Extracting...");
    let pages = translator.extract(&doc)?;
    pb.set_length(pages.len() as u64 * 2);

    pb.set_message("Writing...");
    let mut result = translator.apply(&mut doc, pages, &translations)?;
    save_document(&mut doc, output)?;
    result.output_path = Some(output.to_path_buf());
    pb.finish_and_clear();

    print_summary(&result);

    if result.failed_pages.is_empty() {
        Ok(Outcome::Done)
    } else {
        Ok(Outcome::PartialFailure)
    }
}

fn print_summary(result: &DocumentResult) {
    println!("{}", "Pages".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    for page in &result.per_page {
        let status = match page.status {
            PageStatus::Written => "written".green(),
            PageStatus::Skipped => "skipped".yellow(),
            PageStatus::Cancelled => "cancelled".yellow(),
            PageStatus::Failed => "failed".red(),
        };
        match &page.reason {
            Some(reason) => println!("  {:>4}  {}  {}", page.page, status, reason.dimmed()),
            None => println!("  {:>4}  {}", page.page, status),
        }
    }

    println!();
    println!(
        "{}: {} blocks, {} translated, {} overflowing",
        "Blocks".bold(),
        result.stats.block_count,
        result.stats.translated_count,
        result.stats.overflow_count
    );
    if result.stats.fallback_pages > 0 {
        println!(
            "{}: {} pages used the threshold fallback",
            "Layout".bold(),
            result.stats.fallback_pages
        );
    }
    if let Some(path) = &result.output_path {
        println!("{} {}", "Saved to".green(), path.display());
    }
    if !result.failed_pages.is_empty() {
        println!("{}: {:?}", "Failed pages".red().bold(), result.failed_pages);
    }
}

fn cmd_bilingual(
    original: &Path,
    translated: &Path,
    output: &Path,
) -> Result<Outcome, Box<dyn std::error::Error>> {
    let stats = create_bilingual_pdf(original, translated, output)?;
    println!(
        "{} {} pages ({} original, {} translated) to {}",
        "Saved".green(),
        stats.total_pages,
        stats.original_pages,
        stats.translated_pages,
        output.display()
    );
    if stats.original_pages != stats.translated_pages {
        println!(
            "{}: page counts differ, surplus pages appended unpaired",
            "Warning".yellow().bold()
        );
    }
    Ok(Outcome::Done)
}

fn cmd_glossary(
    input: &Path,
    translations: &Path,
    output: &Path,
    with_location: bool,
    options: TranslateOptions,
) -> Result<Outcome, Box<dyn std::error::Error>> {
    let translations: HashMap<String, String> =
        serde_json::from_str(&fs::read_to_string(translations)?)?;

    let doc = load_document(input)?;
    let pb = progress_bar(doc.get_pages().len() as u64);
    let translator = Translator::new(options)?.with_progress(track(&pb));
    let pages = translator.extract(&doc)?;
    pb.finish_and_clear();

    let stats = export_glossary_csv(&pages, &translations, output, with_location)?;
    println!(
        "{} {} pairs to {} ({} skipped)",
        "Exported".green(),
        stats.exported,
        output.display(),
        stats.skipped
    );

    if pages.iter().any(|p| p.job.is_failed()) {
        Ok(Outcome::PartialFailure)
    } else {
        Ok(Outcome::Done)
    }
}

fn cmd_fonts(input: &Path) -> Result<Outcome, Box<dyn std::error::Error>> {
    let doc = load_document(input)?;
    let mut registry = FontRegistry::new("en");
    registry.load_existing_fonts(&doc);

    println!("{}", "Fonts".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    for info in registry.fonts() {
        println!(
            "  {}  {:<32} {:?}  {}  {}",
            info.id,
            display_name(info),
            info.kind,
            info.encoding.as_deref().unwrap_or("-"),
            if info.has_to_unicode {
                "ToUnicode".green()
            } else {
                "no ToUnicode".yellow()
            }
        );
    }
    println!("\n{} fonts", registry.fonts().len());

    Ok(Outcome::Done)
}

fn cmd_version() {
    println!("{} {}", "transpdf".cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!("Layout-preserving PDF translation tool");
    println!();
    println!("Repository: {}", "https://github.com/iyulab/transpdf".dimmed());
    println!("License: MIT");
}
