use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use verrific_core::config_file::{ConfigFile, load_config};
use verrific_core::{EnrichEvent, GluttonClient, enrich_references};
use verrific_grobid::{BatchEvent, GrobidClient};
use verrific_reporting::{ExportFormat, SummaryStats, export_summary, summarize};

mod output;
mod settings;

use output::ColorMode;
use settings::{GluttonArgs, GrobidArgs, resolve_glutton, resolve_grobid};

/// Verify the bibliography of a paper against biblio-glutton
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract references from a TEI (or PDF) file and look them up
    Check(CheckArgs),

    /// Convert PDFs to TEI XML with a GROBID server
    Convert(ConvertArgs),
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// TEI XML produced by GROBID, or a PDF to convert first
    file_path: PathBuf,

    /// Dry run: extract and print references without looking them up
    #[arg(long)]
    dry_run: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Also write the summary to this file
    #[arg(long)]
    export: Option<PathBuf>,

    /// Export format (text, csv, json, markdown); guessed from the export
    /// file extension when omitted
    #[arg(long)]
    format: Option<ExportFormat>,

    #[command(flatten)]
    glutton: GluttonArgs,

    #[command(flatten)]
    grobid: GrobidArgs,
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// PDF files or directories containing PDFs
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Directory for the TEI files
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    #[command(flatten)]
    grobid: GrobidArgs,
}

fn init_logging(log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match log_file {
        Some(path) => {
            let file = std::fs::File::create(path)?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}

fn color_mode(no_color: bool, config: &ConfigFile) -> ColorMode {
    let configured = config
        .display
        .as_ref()
        .and_then(|d| d.color)
        .unwrap_or(true);
    ColorMode(!no_color && configured)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.log_file.as_deref())?;
    let config = load_config();

    match cli.command {
        Command::Check(args) => check(args, &config).await,
        Command::Convert(args) => convert(args, &config).await,
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

async fn check(args: CheckArgs, config: &ConfigFile) -> anyhow::Result<()> {
    let color = color_mode(args.no_color, config);
    let mut writer: Box<dyn Write> = Box::new(std::io::stdout());

    if !args.file_path.exists() {
        anyhow::bail!("File not found: {}", args.file_path.display());
    }
    let file_name = args
        .file_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| args.file_path.display().to_string());

    let is_pdf = args
        .file_path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));

    let mut refs = if is_pdf {
        let grobid = GrobidClient::new(resolve_grobid(&args.grobid, env_var, config))?;
        grobid.check_alive().await?;
        let tei = grobid.process_pdf(&args.file_path).await?;
        verrific_core::extract_references_from_bytes(&tei)
    } else {
        verrific_core::extract_references(&args.file_path)?
    };

    output::print_extraction_summary(&mut writer, &file_name, &refs, color)?;

    if args.dry_run {
        output::print_references(&mut writer, &refs, color)?;
        return Ok(());
    }
    if refs.is_empty() {
        writeln!(writer, "No references to look up.")?;
        return Ok(());
    }

    let (url, options) = resolve_glutton(&args.glutton, env_var, config);
    let lookup = GluttonClient::new(&url)?;
    writeln!(writer, "Looking up references at {}", url)?;

    let bar = ProgressBar::new(refs.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:40.green/dim}] {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );
    bar.enable_steady_tick(Duration::from_millis(120));

    let progress = |event: EnrichEvent| {
        if let EnrichEvent::Resolved { matched: false, .. } = event {
            bar.set_message("(some lookups failed)");
        }
        bar.inc(1);
    };

    let cancel = CancellationToken::new();

    // Set up Ctrl+C handler
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_clone.cancel();
        }
    });

    let run = enrich_references(&mut refs, &lookup, &options, progress, cancel).await?;
    bar.finish_and_clear();

    output::print_table(&mut writer, &summarize(&refs), &refs, color)?;
    output::print_summary(
        &mut writer,
        &SummaryStats::from_references(&refs),
        &run,
        color,
    )?;

    if let Some(path) = args.export {
        let format = args
            .format
            .or_else(|| {
                path.extension()
                    .and_then(|e| e.to_str())
                    .and_then(ExportFormat::from_extension)
            })
            .unwrap_or(ExportFormat::Text);
        export_summary(&refs, format, &path)?;
        writeln!(writer, "Summary written to {} ({})", path.display(), format)?;
    }

    Ok(())
}

async fn convert(args: ConvertArgs, config: &ConfigFile) -> anyhow::Result<()> {
    let color = color_mode(args.no_color, config);
    let mut writer: Box<dyn Write> = Box::new(std::io::stdout());
    let grobid = GrobidClient::new(resolve_grobid(&args.grobid, env_var, config))?;

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} Processing PDFs [{bar:40.green/dim}] {pos}/{len} {msg}",
        )?
        .progress_chars("=> "),
    );

    let report = grobid
        .convert_batch(&args.inputs, &args.output, |event| match event {
            BatchEvent::Started { total } => {
                bar.set_length(total as u64);
                bar.enable_steady_tick(Duration::from_millis(120));
            }
            BatchEvent::Converted { input, .. } => {
                bar.set_message(input.display().to_string());
                bar.inc(1);
            }
            BatchEvent::Failed { input, reason, .. } => {
                bar.println(format!("Error converting {}: {}", input.display(), reason));
                bar.inc(1);
            }
        })
        .await?;
    bar.finish_and_clear();

    output::print_batch_report(&mut writer, &report, color)?;

    if !report.is_complete() {
        anyhow::bail!(
            "{} of {} files did not convert",
            report.failed.len(),
            report.total()
        );
    }
    Ok(())
}
