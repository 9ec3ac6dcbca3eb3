//! CLI binary for syllabus2csv.
//!
//! A thin shim over the library crate: positional files act as a drop,
//! `--pick` acts as a file picker, and both end in the same pipeline.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use syllabus2csv::pipeline::input;
use syllabus2csv::trigger;
use syllabus2csv::{
    Credentials, ExtractionOutput, FenceStrategy, Pipeline, PipelineConfig,
    PipelineProgressCallback, ProgressCallback, Stage,
};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner that names the running stage and prints one line per finished
/// or failed stage, so failures are visible without reading logs.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

fn stage_label(stage: Stage) -> &'static str {
    match stage {
        Stage::Ingest => "Reading input",
        Stage::Upload => "Uploading",
        Stage::ResolveUrl => "Signing URL",
        Stage::Ocr => "Running OCR",
        Stage::Generate => "Extracting assignments",
        Stage::Deliver => "Writing CSV",
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage) {
        self.bar.set_prefix(stage_label(stage));
        self.bar.set_message("…");
    }

    fn on_stage_complete(&self, stage: Stage, elapsed_ms: u64) {
        self.bar.println(format!(
            "  {} {:<24} {}",
            green("✓"),
            stage_label(stage),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        if stage == Stage::Deliver {
            self.bar.finish_and_clear();
        }
    }

    fn on_stage_error(&self, stage: Stage, error: &str) {
        self.bar.println(format!(
            "  {} {:<24} {}",
            red("✗"),
            stage_label(stage),
            red(error.lines().next().unwrap_or(error)),
        ));
        self.bar.finish_and_clear();
    }

    fn on_artifact_ready(&self, filename: &str, bytes: usize) {
        self.bar.set_message(format!("{filename} ({bytes} bytes)"));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Drop a syllabus, get ./assignments.csv
  syllabus2csv syllabus.pdf

  # Pick the file interactively
  syllabus2csv --pick

  # Write somewhere else
  syllabus2csv syllabus.pdf -o ~/Downloads

  # Print the CSV instead of writing a file
  syllabus2csv --stdout https://uni.edu/cse260/syllabus.pdf

  # Full run report as JSON
  syllabus2csv --json syllabus.pdf > run.json

ENVIRONMENT VARIABLES:
  MISTRAL_API_KEY     Mistral API key (OCR)
  GEMINI_API_KEY      Google Gemini API key (CSV extraction)
  RUST_LOG            Override log filter (e.g. syllabus2csv=debug)
"#;

/// Turn a syllabus PDF into an assignments CSV.
#[derive(Parser, Debug)]
#[command(
    name = "syllabus2csv",
    version,
    about = "Turn a syllabus PDF into an assignments CSV using Mistral OCR and Gemini",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF files or HTTP/HTTPS URLs. Like a drop: only the first is processed.
    #[arg(required_unless_present = "pick")]
    files: Vec<String>,

    /// Choose the file interactively (reads a path from stdin).
    #[arg(long, conflicts_with = "files")]
    pick: bool,

    /// Directory the CSV is written to.
    #[arg(short, long, env = "SYLLABUS2CSV_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Name of the written CSV file.
    #[arg(long, env = "SYLLABUS2CSV_FILENAME", default_value = "assignments.csv")]
    filename: String,

    /// Mistral API key.
    #[arg(long, env = "MISTRAL_API_KEY", hide_env_values = true)]
    mistral_api_key: Option<String>,

    /// Gemini API key.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    gemini_api_key: Option<String>,

    /// Mistral OCR model.
    #[arg(long, env = "SYLLABUS2CSV_OCR_MODEL", default_value = "mistral-ocr-latest")]
    ocr_model: String,

    /// Gemini model used for extraction.
    #[arg(long, env = "SYLLABUS2CSV_MODEL", default_value = "gemini-2.0-flash")]
    model: String,

    /// Path to a text file replacing the built-in extraction prompt.
    #[arg(long, env = "SYLLABUS2CSV_PROMPT_FILE")]
    prompt_file: Option<PathBuf>,

    /// How the code fence is removed from the completion.
    #[arg(long, env = "SYLLABUS2CSV_FENCE", value_enum, default_value = "detect")]
    fence: FenceArg,

    /// Per-request API timeout in seconds (default: none).
    #[arg(long, env = "SYLLABUS2CSV_API_TIMEOUT")]
    api_timeout: Option<u64>,

    /// HTTP download timeout in seconds for URL inputs.
    #[arg(long, env = "SYLLABUS2CSV_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Print the CSV to stdout instead of writing a file.
    #[arg(long, conflicts_with = "json")]
    stdout: bool,

    /// Print the full run report (ExtractionOutput) as JSON instead of writing a file.
    #[arg(long)]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "SYLLABUS2CSV_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "SYLLABUS2CSV_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "SYLLABUS2CSV_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum FenceArg {
    Detect,
    Fixed,
}

impl From<FenceArg> for FenceStrategy {
    fn from(v: FenceArg) -> Self {
        match v {
            FenceArg::Detect => FenceStrategy::Detect,
            FenceArg::Fixed => FenceStrategy::FixedOffset,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner already reports each stage; keep library INFO logs out of
    // its way unless asked for.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.stdout;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Credentials + config ─────────────────────────────────────────────
    let credentials = Credentials::from_parts(cli.mistral_api_key.clone(), cli.gemini_api_key.clone())
        .context("API keys are required")?;

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn PipelineProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb).await?;
    let pipeline = Pipeline::from_config(&credentials, config).context("Failed to set up clients")?;

    // ── Pick the input ───────────────────────────────────────────────────
    let picked = if cli.pick { Some(prompt_for_path()?) } else { None };
    let selected: Option<String> = match &picked {
        Some(p) => p.clone(),
        None => cli.files.first().cloned(),
    };

    // ── Report-only modes: no file is written ────────────────────────────
    if cli.json || cli.stdout {
        let source = selected.context("No file selected")?;
        let file = input::resolve_input(&source, cli.download_timeout)
            .await
            .context("Failed to read input")?;
        let output = pipeline.run(&file).await.context("Extraction failed")?;
        return print_output(&cli, &output);
    }

    // ── Deliver ──────────────────────────────────────────────────────────
    let written = match selected.as_deref() {
        Some(source) if input::is_url(source) => {
            let file = input::resolve_input(source, cli.download_timeout)
                .await
                .context("Failed to download input")?;
            pipeline.deliver(&file, &cli.output_dir).await
        }
        _ if cli.pick => {
            let path = selected.as_deref().map(Path::new);
            trigger::on_file_selected(path, &pipeline, &cli.output_dir).await
        }
        _ => {
            let files: Vec<PathBuf> = cli.files.iter().map(PathBuf::from).collect();
            trigger::on_drop(&files, &pipeline, &cli.output_dir).await
        }
    }
    .context("Extraction failed")?;

    if !cli.quiet {
        eprintln!("{}  →  {}", green("✔"), bold(&written.display().to_string()));
    }

    Ok(())
}

/// Read one path from stdin; blank input means the picker was cancelled.
fn prompt_for_path() -> Result<Option<String>> {
    eprint!("Path to syllabus PDF: ");
    io::stderr().flush().ok();
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read path from stdin")?;
    let line = line.trim();
    Ok((!line.is_empty()).then(|| line.to_string()))
}

fn print_output(cli: &Cli, output: &ExtractionOutput) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if cli.json {
        let json = serde_json::to_string_pretty(output).context("Failed to serialise output")?;
        writeln!(handle, "{json}").context("Failed to write to stdout")?;
    } else {
        handle
            .write_all(output.artifact.content.as_bytes())
            .context("Failed to write to stdout")?;
    }

    if !cli.quiet && !cli.json {
        eprintln!(
            "{} rows from {} pages  —  {} tokens in / {} out  —  {}ms",
            output.stats.csv_rows,
            output.stats.pages,
            dim(&output.stats.prompt_tokens.to_string()),
            dim(&output.stats.completion_tokens.to_string()),
            output.stats.total_duration_ms,
        );
    }
    Ok(())
}

/// Map CLI args to `PipelineConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .ocr_model(&cli.ocr_model)
        .generation_model(&cli.model)
        .fence_strategy(cli.fence.clone().into())
        .output_filename(&cli.filename)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref path) = cli.prompt_file {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {:?}", path))?;
        builder = builder.prompt(prompt);
    }
    if let Some(secs) = cli.api_timeout {
        builder = builder.api_timeout_secs(secs);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
