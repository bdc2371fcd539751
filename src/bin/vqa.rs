//! CLI binary for edgequake-vqa.
//!
//! A thin shim over the library crate that maps CLI flags to `AskConfig`,
//! shows a spinner while the answer is pending, and prints the answer.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_vqa::{
    ask, prepare_input, write_prepared, AskConfig, PreparedImage, ResizeFilter, SessionObserver,
    TransportError, VqaError,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI observer using indicatif ─────────────────────────────────────────────

/// Terminal observer: a spinner stands in for the loading indicator and
/// preview/failure lines are printed above it.
struct CliObserver {
    bar: ProgressBar,
}

impl CliObserver {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading image…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl SessionObserver for CliObserver {
    fn on_image_prepared(&self, image: &PreparedImage, _preview: &str) {
        let resized = if image.was_resized() {
            format!(
                "{}x{} → {}x{}",
                image.original_width, image.original_height, image.width, image.height
            )
        } else {
            format!("{}x{} (within bounds)", image.width, image.height)
        };
        self.bar.println(format!(
            "  {} {}  {}  {}",
            green("✓"),
            image.file_name,
            resized,
            dim(&format!("{} bytes {}", image.bytes.len(), image.media_type)),
        ));
    }

    fn on_loading_changed(&self, loading: bool) {
        if loading {
            self.bar.set_prefix("Asking");
            self.bar.set_message("waiting for the answer…");
            self.bar.reset_elapsed();
        } else {
            self.bar.finish_and_clear();
        }
    }

    fn on_transport_error(&self, error: &TransportError) {
        let msg = error.to_string();
        let msg = if msg.chars().count() > 80 {
            format!("{}\u{2026}", msg.chars().take(79).collect::<String>())
        } else {
            msg
        };
        self.bar.println(format!("  {} {}", red("✗"), dim(&msg)));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Ask about a local photo
  vqa cat.jpg -q "What is the cat doing?"

  # Type the question when prompted (or pipe it in)
  vqa cat.jpg
  echo "How many people are there?" | vqa party.png

  # Several images: like a drop payload, only the first is used
  vqa first.jpg second.jpg -q "Describe the scene"

  # Image from a URL, custom endpoint
  vqa https://example.com/photo.webp -q "What colour is the car?" \
      --endpoint http://inference.local:8080/api/ask

  # Prepare only: write the downsized image, do not ask
  vqa --prepare-only --save-prepared small.jpg big.jpg

  # JSON output
  vqa --json cat.jpg -q "What breed?" > answer.json

PREPARATION:
  The image is bounded to --max-width × --max-height (default 800×800),
  keeping its aspect ratio and never upscaling, then re-encoded in its own
  format (PNG, JPEG, GIF, BMP, WebP).

ENVIRONMENT VARIABLES:
  VQA_ENDPOINT       Answering endpoint URL (default http://localhost:3000/api/ask)
  VQA_QUESTION       Question text
  VQA_MAX_WIDTH      Maximum prepared width
  VQA_MAX_HEIGHT     Maximum prepared height
  VQA_TIMEOUT        Request timeout in seconds (default: none)
  RUST_LOG           tracing filter, e.g. edgequake_vqa=debug
"#;

/// Ask a question about an image.
#[derive(Parser, Debug)]
#[command(
    name = "vqa",
    version,
    about = "Ask a question about an image via a visual question answering endpoint",
    long_about = "Downsizes an image on the client (aspect ratio kept, never upscaled), \
re-encodes it in its own format, and submits it with your question to a visual question \
answering endpoint as multipart form data. Prints the answer.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local image paths or HTTP/HTTPS URLs; only the first is used.
    #[arg(required = true)]
    images: Vec<String>,

    /// Question about the image. Read from stdin when omitted.
    #[arg(short, long, env = "VQA_QUESTION")]
    question: Option<String>,

    /// Answering endpoint URL.
    #[arg(short, long, env = "VQA_ENDPOINT", default_value = edgequake_vqa::config::DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Maximum prepared width in pixels.
    #[arg(long, env = "VQA_MAX_WIDTH", default_value_t = edgequake_vqa::config::DEFAULT_MAX_WIDTH,
          value_parser = clap::value_parser!(u32).range(1..))]
    max_width: u32,

    /// Maximum prepared height in pixels.
    #[arg(long, env = "VQA_MAX_HEIGHT", default_value_t = edgequake_vqa::config::DEFAULT_MAX_HEIGHT,
          value_parser = clap::value_parser!(u32).range(1..))]
    max_height: u32,

    /// Resampling filter.
    #[arg(long, env = "VQA_FILTER", value_enum, default_value = "triangle")]
    filter: FilterArg,

    /// Request timeout in seconds (default: wait indefinitely).
    #[arg(long, env = "VQA_TIMEOUT", value_parser = clap::value_parser!(u64).range(1..))]
    timeout: Option<u64>,

    /// HTTP download timeout for URL images, in seconds.
    #[arg(long, env = "VQA_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Answer text shown when the request fails.
    #[arg(long, env = "VQA_ERROR_ANSWER")]
    error_answer: Option<String>,

    /// Also write the prepared image to this path.
    #[arg(long)]
    save_prepared: Option<PathBuf>,

    /// Prepare the image (and optionally save it) without asking.
    #[arg(long)]
    prepare_only: bool,

    /// Output structured JSON instead of plain text.
    #[arg(long, env = "VQA_JSON")]
    json: bool,

    /// Disable the spinner.
    #[arg(long, env = "VQA_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "VQA_VERBOSE")]
    verbose: bool,

    /// Suppress all output except the answer and errors.
    #[arg(long, env = "VQA_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum FilterArg {
    Nearest,
    Triangle,
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl From<FilterArg> for ResizeFilter {
    fn from(v: FilterArg) -> Self {
        match v {
            FilterArg::Nearest => ResizeFilter::Nearest,
            FilterArg::Triangle => ResizeFilter::Triangle,
            FilterArg::CatmullRom => ResizeFilter::CatmullRom,
            FilterArg::Gaussian => ResizeFilter::Gaussian,
            FilterArg::Lanczos3 => ResizeFilter::Lanczos3,
        }
    }
}

/// Exit status for a rejected question or missing image.
const EXIT_VALIDATION: u8 = 2;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner gives all the feedback that matters; INFO logs would only
    // tear it, so they are shown only without it.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && io::stderr().is_terminal();
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

    let input = cli.images[0].as_str();
    if cli.images.len() > 1 && !cli.quiet {
        eprintln!(
            "{}",
            dim(&format!("Using {}; ignoring {} more", input, cli.images.len() - 1))
        );
    }

    // ── Prepare-only mode ────────────────────────────────────────────────
    if cli.prepare_only {
        let config = build_config(&cli, None)?;
        let prepared = prepare_input(input, &config)
            .await
            .context("Failed to prepare image")?;
        if let Some(ref path) = cli.save_prepared {
            write_prepared(&prepared, path)
                .await
                .context("Failed to save prepared image")?;
        }

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&prepared).context("Failed to serialise output")?
            );
        } else {
            println!("File:        {}", prepared.file_name);
            println!("Media type:  {}", prepared.media_type);
            println!(
                "Original:    {}x{}",
                prepared.original_width, prepared.original_height
            );
            println!("Prepared:    {}x{}", prepared.width, prepared.height);
            println!("Bytes:       {}", prepared.bytes.len());
            if let Some(ref path) = cli.save_prepared {
                println!("Saved to:    {}", path.display());
            }
        }
        return Ok(ExitCode::SUCCESS);
    }

    // ── Question ─────────────────────────────────────────────────────────
    let question = match cli.question {
        Some(ref q) => q.clone(),
        None => read_question()?,
    };

    // ── Ask ──────────────────────────────────────────────────────────────
    let observer = show_progress.then(CliObserver::new);
    let config = build_config(
        &cli,
        observer
            .clone()
            .map(|o| o as Arc<dyn SessionObserver>),
    )?;

    let result = ask(input, question, &config).await;
    if let Some(ref o) = observer {
        o.finish();
    }

    let output = match result {
        Ok(output) => output,
        Err(e) => match validation_status(&e) {
            Some(code) => {
                eprintln!("{} {}", red("✗"), e);
                return Ok(ExitCode::from(code));
            }
            None => return Err(e).context("Failed to ask"),
        },
    };

    if let Some(ref path) = cli.save_prepared {
        write_prepared(&output.image, path)
            .await
            .context("Failed to save prepared image")?;
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(output.answer.as_bytes())
            .context("Failed to write to stdout")?;
        if !output.answer.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
    }

    if !cli.quiet && !cli.json {
        eprintln!(
            "{}",
            dim(&format!(
                "{}x{} {}  {} bytes  prepare {}ms  request {}ms",
                output.image.width,
                output.image.height,
                output.image.media_type,
                output.stats.prepared_bytes,
                output.stats.prepare_duration_ms,
                output.stats.request_duration_ms,
            ))
        );
    }

    Ok(ExitCode::SUCCESS)
}

/// Exit status for errors reported as a message rather than a failure chain.
fn validation_status(e: &VqaError) -> Option<u8> {
    e.is_validation().then_some(EXIT_VALIDATION)
}

/// Map CLI args to `AskConfig`.
fn build_config(cli: &Cli, observer: Option<Arc<dyn SessionObserver>>) -> Result<AskConfig> {
    let mut builder = AskConfig::builder()
        .max_width(cli.max_width)
        .max_height(cli.max_height)
        .filter(cli.filter.clone().into())
        .endpoint(cli.endpoint.clone())
        .request_timeout_secs(cli.timeout)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref text) = cli.error_answer {
        builder = builder.error_answer(text.clone());
    }
    if let Some(obs) = observer {
        builder = builder.observer(obs);
    }

    builder.build().context("Invalid configuration")
}

/// Read one line from stdin, prompting when it is a terminal.
fn read_question() -> Result<String> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        eprint!("{} ", bold("Question:"));
        io::stderr().flush().ok();
    }

    let mut line = String::new();
    stdin
        .lock()
        .read_line(&mut line)
        .context("Failed to read question from stdin")?;

    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_exit_with_status_two() {
        assert_eq!(validation_status(&VqaError::EmptyQuestion), Some(2));
        assert_eq!(validation_status(&VqaError::MissingImage), Some(2));
        assert_eq!(validation_status(&VqaError::Internal("boom".into())), None);
    }

    #[test]
    fn question_short_flag_does_not_mean_quiet() {
        let cli = Cli::try_parse_from(["vqa", "cat.jpg", "-q", " "]).unwrap();
        assert_eq!(cli.question.as_deref(), Some(" "));
        assert!(!cli.quiet);
    }

    #[test]
    fn flags_map_onto_config() {
        let cli = Cli::try_parse_from([
            "vqa",
            "cat.jpg",
            "--max-width",
            "640",
            "--timeout",
            "5",
            "--endpoint",
            "http://127.0.0.1:8080/api/ask",
        ])
        .unwrap();
        let config = build_config(&cli, None).unwrap();
        assert_eq!(config.max_width, 640);
        assert_eq!(config.max_height, 800);
        assert_eq!(config.request_timeout_secs, Some(5));
        assert_eq!(config.endpoint, "http://127.0.0.1:8080/api/ask");
    }
}
