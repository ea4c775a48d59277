//! CLI binary for pdf-workbench.
//!
//! A thin shim over the library crate: maps flags to `ClientConfig` and
//! `Action`s, shows task progress, prints results and saves downloads.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use pdf_workbench::download::write_atomic;
use pdf_workbench::{
    event_stream, save_download, Action, ActionOutcome, ApiClient, ClientConfig, Orchestrator,
    PollPolicy, ProgressEvent, Rotation, SettingsPatch, UploadFile, DEFAULT_BASE_URL,
};
use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const SPINNER_TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── Progress bar fed by the orchestrator's event stream ──────────────────────

/// Render [`ProgressEvent`]s as a percentage bar until the action settles.
fn spawn_progress(orchestrator: &Orchestrator) -> (ProgressBar, JoinHandle<()>) {
    let bar = ProgressBar::new(100);
    let style = ProgressStyle::with_template(
        "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}%  {msg}  ⏱ {elapsed_precise}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("█▉▊▋▌▍▎▏  ")
    .tick_strings(SPINNER_TICKS);
    bar.set_style(style);
    bar.set_prefix("Submitting");
    bar.enable_steady_tick(Duration::from_millis(80));

    let mut events = event_stream(orchestrator.subscribe());
    let handle = tokio::spawn({
        let bar = bar.clone();
        async move {
            while let Some(event) = events.next().await {
                match &event {
                    ProgressEvent::Started { action } => bar.set_message(action.to_string()),
                    ProgressEvent::Submitted { task_id, .. } => {
                        bar.set_prefix("Running");
                        bar.set_message(dim(task_id));
                    }
                    ProgressEvent::Progress { percent, text, .. } => {
                        bar.set_position(u64::from(*percent));
                        bar.set_message(text.clone());
                    }
                    ProgressEvent::Completed { .. } => bar.set_position(100),
                    _ => {}
                }
                if event.is_terminal() {
                    break;
                }
            }
        }
    });
    (bar, handle)
}

// ── CLI definition ───────────────────────────────────────────────────────────

const AFTER_HELP: &str = r#"EXAMPLES:
  # Is the service up?
  pdfwb health

  # Page count and encryption flag
  pdfwb inspect report.pdf

  # Plain text of pages 1-3, or layout-preserving HTML
  pdfwb extract-text report.pdf --pages 1-3
  pdfwb extract-text report.pdf --enhanced -o report.html

  # Tables as JSON
  pdfwb --json extract-tables report.pdf

  # Rotate page 2 by 90° and page 5 by 180°, save next to the input
  pdfwb rotate report.pdf --rotate 2:90,5:180 -o .

  # Encrypt / decrypt
  pdfwb encrypt report.pdf --user-password secret -o locked.pdf
  pdfwb decrypt locked.pdf --password secret

  # Convert to Word
  pdfwb convert report.pdf -o report.docx

ENVIRONMENT VARIABLES:
  PDFWB_BASE_URL           API base URL (default http://127.0.0.1:5000/api)
  PDFWB_POLL_INTERVAL_MS   Base task-status poll interval
  PDFWB_POLL_TIMEOUT_SECS  Give up on a task after this long (0 = never)
  PDFWB_REQUEST_TIMEOUT    Per-request timeout in seconds
  RUST_LOG                 Override log filter (e.g. pdf_workbench=debug)
"#;

/// Drive a remote PDF processing service from the command line.
#[derive(Parser, Debug)]
#[command(
    name = "pdfwb",
    version,
    about = "Upload PDFs to a processing service and run extraction, editing and conversion tasks",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// API base URL of the PDF service.
    #[arg(long, global = true, env = "PDFWB_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Base task-status poll interval in milliseconds.
    #[arg(long, global = true, env = "PDFWB_POLL_INTERVAL_MS", default_value_t = 300)]
    poll_interval_ms: u64,

    /// Poll with a fixed interval instead of backing off while progress is flat.
    #[arg(long, global = true, env = "PDFWB_FIXED_INTERVAL")]
    fixed_interval: bool,

    /// Give up on a task after this many seconds (0 = never).
    #[arg(long, global = true, env = "PDFWB_POLL_TIMEOUT_SECS", default_value_t = 1800)]
    poll_timeout: u64,

    /// Per-request timeout in seconds.
    #[arg(long, global = true, env = "PDFWB_REQUEST_TIMEOUT", default_value_t = 60)]
    request_timeout: u64,

    /// Upload/download timeout in seconds.
    #[arg(long, global = true, env = "PDFWB_TRANSFER_TIMEOUT", default_value_t = 300)]
    transfer_timeout: u64,

    /// Print structured JSON instead of rendered text.
    #[arg(long, global = true, env = "PDFWB_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, global = true, env = "PDFWB_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDFWB_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and results.
    #[arg(short, long, global = true, env = "PDFWB_QUIET")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct FileArgs {
    /// Local PDF file.
    file: PathBuf,

    /// Where to write the result (file, or directory for downloads).
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct PageArgs {
    /// Page selection: all, 5, 3-15, 1,3,5 or 1-3,7.
    #[arg(long, default_value = "all")]
    pages: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show service health.
    Health,

    /// Show or change server-side settings.
    #[command(subcommand)]
    Settings(SettingsCommand),

    /// Upload a PDF and print what the service knows about it.
    Inspect {
        /// Local PDF file.
        file: PathBuf,
    },

    /// Save a rendered page image.
    Preview {
        #[command(flatten)]
        target: FileArgs,
        /// 1-indexed page number.
        #[arg(long, default_value_t = 1)]
        page: u32,
    },

    /// Extract text (plain, layout-preserving HTML, or cleaned).
    ExtractText {
        #[command(flatten)]
        target: FileArgs,
        #[command(flatten)]
        pages: PageArgs,
        /// Preserve layout; returns HTML.
        #[arg(long, conflicts_with = "clean")]
        enhanced: bool,
        /// Merge soft line breaks into paragraphs.
        #[arg(long)]
        clean: bool,
    },

    /// Extract tables.
    ExtractTables {
        #[command(flatten)]
        target: FileArgs,
        #[command(flatten)]
        pages: PageArgs,
    },

    /// Extract embedded images.
    ExtractImages {
        #[command(flatten)]
        target: FileArgs,
        #[command(flatten)]
        pages: PageArgs,
        /// Ask the service to save images under this server-side directory.
        #[arg(long)]
        export_path: Option<String>,
    },

    /// Rotate pages, e.g. --rotate 2:90,5:180.
    Rotate {
        #[command(flatten)]
        target: FileArgs,
        #[arg(long, required = true)]
        rotate: String,
    },

    /// Remove pages.
    DeletePages {
        #[command(flatten)]
        target: FileArgs,
        /// Pages to remove: 5, 3-15, 1,3,5.
        #[arg(long, required = true)]
        pages: String,
    },

    /// Password-protect the document.
    Encrypt {
        #[command(flatten)]
        target: FileArgs,
        #[arg(long, env = "PDFWB_USER_PASSWORD")]
        user_password: String,
        #[arg(long, env = "PDFWB_OWNER_PASSWORD")]
        owner_password: Option<String>,
    },

    /// Remove password protection.
    Decrypt {
        #[command(flatten)]
        target: FileArgs,
        #[arg(long, env = "PDFWB_PASSWORD")]
        password: String,
    },

    /// Convert to a Word document.
    Convert {
        #[command(flatten)]
        target: FileArgs,
        #[command(flatten)]
        pages: PageArgs,
        /// Ask the service to save the .docx under this server-side directory.
        #[arg(long)]
        export_path: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum SettingsCommand {
    /// Print current settings.
    Show,
    /// Change one or more settings.
    Set {
        #[arg(long)]
        layout_preservation: Option<bool>,
        #[arg(long)]
        ocr: Option<bool>,
        #[arg(long)]
        export_path: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar carries the feedback while a task runs, so library
    // INFO logs are muted unless --verbose is given.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    let config = build_config(&cli)?;
    let client = ApiClient::new(&config).context("Failed to create HTTP client")?;

    match &cli.command {
        Command::Health => {
            let report = client.health().await.context("Health check failed")?;
            if cli.json {
                print_json(&report)?;
            } else {
                println!("{} {}", green("●"), report.summary());
            }
            return Ok(());
        }
        Command::Settings(cmd) => return settings(&cli, &client, cmd).await,
        _ => {}
    }

    let orchestrator = Orchestrator::new(Arc::new(client.clone()), config);

    // ── Upload ───────────────────────────────────────────────────────────
    let path = command_file(&cli.command);
    let file = UploadFile::from_path(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let session = orchestrator
        .upload(file)
        .await
        .context("Upload failed")?;
    if !cli.quiet && !cli.json {
        eprintln!(
            "{} {}  {}",
            green("↑"),
            bold(&session.filename),
            dim(&format!(
                "{} pages · {:.1} KB{}",
                session.page_count,
                session.size_bytes as f64 / 1024.0,
                if session.is_encrypted { " · encrypted" } else { "" }
            ))
        );
    }

    let (action, output) = match &cli.command {
        Command::Inspect { .. } => {
            if cli.json {
                print_json(&session)?;
            } else {
                println!("File:       {}", session.filename);
                println!("File ID:    {}", session.file_id);
                println!("Pages:      {}", session.page_count);
                println!("Size:       {} bytes", session.size_bytes);
                println!("Encrypted:  {}", session.is_encrypted);
                println!("Preview:    {}", client.preview_url(&session.file_id, 1));
            }
            return Ok(());
        }
        Command::Preview { target, page } => {
            if !orchestrator.set_current_page(*page) {
                anyhow::bail!(
                    "Page {} is out of range (document has {} pages)",
                    page,
                    session.page_count
                );
            }
            let bytes = client
                .fetch_preview(&session.file_id, *page)
                .await
                .context("Failed to fetch preview")?;
            let dest = target
                .output
                .clone()
                .unwrap_or_else(|| PathBuf::from(format!("page-{page}.png")));
            write_atomic(&dest, &bytes)
                .await
                .context("Failed to save preview")?;
            if !cli.quiet {
                eprintln!("{} {}", green("✔"), bold(&dest.display().to_string()));
            }
            return Ok(());
        }
        other => build_action(other, session.page_count)?,
    };

    // ── Run ──────────────────────────────────────────────────────────────
    let progress = show_progress.then(|| spawn_progress(&orchestrator));
    let result = orchestrator.run(action).await;
    if let Some((bar, handle)) = progress {
        bar.finish_and_clear();
        handle.abort();
    }
    let outcome = result.context("Action failed")?;

    // ── Output ───────────────────────────────────────────────────────────
    if !cli.quiet && !cli.json {
        eprintln!("{} {}", green("✔"), outcome.headline());
    }

    if let Some(target) = outcome.download_target() {
        let dest = output.unwrap_or_else(|| PathBuf::from("."));
        let saved = save_download(&client, target, &dest)
            .await
            .context("Failed to download result")?;
        if cli.json {
            print_json(&serde_json::json!({ "outcome": &outcome, "saved_to": saved }))?;
        } else if !cli.quiet {
            eprintln!("{} {}", green("↓"), bold(&saved.display().to_string()));
        }
        return Ok(());
    }

    if cli.json {
        print_json(&outcome)?;
    } else if let Some(dest) = output {
        write_atomic(&dest, outcome.render().as_bytes())
            .await
            .context("Failed to write output")?;
        if !cli.quiet {
            eprintln!("{} {}", green("→"), bold(&dest.display().to_string()));
        }
    } else if !matches!(outcome, ActionOutcome::SavedOnServer { .. }) || cli.quiet {
        println!("{}", outcome.render());
    }

    Ok(())
}

/// Map CLI args to `ClientConfig`.
fn build_config(cli: &Cli) -> Result<ClientConfig> {
    let poll = if cli.fixed_interval {
        PollPolicy::fixed(cli.poll_interval_ms)
    } else {
        PollPolicy {
            interval_ms: cli.poll_interval_ms,
            ..PollPolicy::default()
        }
    };
    ClientConfig::builder()
        .base_url(cli.base_url.clone())
        .request_timeout_secs(cli.request_timeout)
        .transfer_timeout_secs(cli.transfer_timeout)
        .poll(poll)
        .poll_timeout_secs((cli.poll_timeout > 0).then_some(cli.poll_timeout))
        .build()
        .context("Invalid configuration")
}

fn command_file(command: &Command) -> &std::path::Path {
    match command {
        Command::Inspect { file } => file,
        Command::Preview { target, .. }
        | Command::ExtractText { target, .. }
        | Command::ExtractTables { target, .. }
        | Command::ExtractImages { target, .. }
        | Command::Rotate { target, .. }
        | Command::DeletePages { target, .. }
        | Command::Encrypt { target, .. }
        | Command::Decrypt { target, .. }
        | Command::Convert { target, .. } => &target.file,
        Command::Health | Command::Settings(_) => std::path::Path::new(""),
    }
}

/// Turn a file subcommand into the action it runs and its `-o` destination.
fn build_action(command: &Command, page_count: u32) -> Result<(Action, Option<PathBuf>)> {
    let action = match command {
        Command::ExtractText {
            pages,
            enhanced,
            clean,
            ..
        } => {
            let pages = parse_pages(&pages.pages, page_count)?;
            if *enhanced {
                Action::ExtractTextEnhanced { pages }
            } else if *clean {
                Action::ExtractTextClean { pages }
            } else {
                Action::ExtractText { pages }
            }
        }
        Command::ExtractTables { pages, .. } => Action::ExtractTables {
            pages: parse_pages(&pages.pages, page_count)?,
        },
        Command::ExtractImages {
            pages, export_path, ..
        } => Action::ExtractImages {
            pages: parse_pages(&pages.pages, page_count)?,
            export_path: export_path.clone(),
        },
        Command::Rotate { rotate, .. } => Action::RotatePages {
            rotations: parse_rotations(rotate)?,
        },
        Command::DeletePages { pages, .. } => Action::DeletePages {
            pages: parse_pages(pages, page_count)?,
        },
        Command::Encrypt {
            user_password,
            owner_password,
            ..
        } => Action::Encrypt {
            user_password: user_password.clone(),
            owner_password: owner_password.clone(),
        },
        Command::Decrypt { password, .. } => Action::Decrypt {
            password: password.clone(),
        },
        Command::Convert {
            pages, export_path, ..
        } => Action::ConvertToWord {
            pages: parse_pages(&pages.pages, page_count)?,
            export_path: export_path.clone(),
        },
        Command::Health | Command::Settings(_) | Command::Inspect { .. } | Command::Preview { .. } => {
            anyhow::bail!("not an action command")
        }
    };
    let output = match command {
        Command::ExtractText { target, .. }
        | Command::ExtractTables { target, .. }
        | Command::ExtractImages { target, .. }
        | Command::Rotate { target, .. }
        | Command::DeletePages { target, .. }
        | Command::Encrypt { target, .. }
        | Command::Decrypt { target, .. }
        | Command::Convert { target, .. }
        | Command::Preview { target, .. } => target.output.clone(),
        Command::Health | Command::Settings(_) | Command::Inspect { .. } => None,
    };
    Ok((action, output))
}

async fn settings(cli: &Cli, client: &ApiClient, cmd: &SettingsCommand) -> Result<()> {
    let current = match cmd {
        SettingsCommand::Show => client.settings().await.context("Failed to read settings")?,
        SettingsCommand::Set {
            layout_preservation,
            ocr,
            export_path,
        } => {
            let patch = SettingsPatch {
                enable_layout_preservation: *layout_preservation,
                enable_ocr: *ocr,
                export_path: export_path.clone(),
            };
            if patch.is_empty() {
                anyhow::bail!("Nothing to change: pass --layout-preservation, --ocr or --export-path");
            }
            client
                .update_settings(&patch)
                .await
                .context("Failed to update settings")?
        }
    };
    if cli.json {
        print_json(&current)?;
    } else {
        println!("Layout preservation:  {}", current.enable_layout_preservation);
        println!("OCR:                  {}", current.enable_ocr);
        println!(
            "Export path:          {}",
            current.export_path.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialise output")?
    );
    Ok(())
}

/// Parse a page selection into an explicit list; `all` is the empty list.
fn parse_pages(s: &str, page_count: u32) -> Result<Vec<u32>> {
    let s = s.trim().to_lowercase();
    if s == "all" || s.is_empty() {
        return Ok(Vec::new());
    }

    let mut pages = Vec::new();
    for part in s.split(',') {
        let part = part.trim();
        if let Some((start, end)) = part.split_once('-') {
            let start: u32 = start
                .trim()
                .parse()
                .with_context(|| format!("Invalid start page in range '{part}'"))?;
            let end: u32 = end
                .trim()
                .parse()
                .with_context(|| format!("Invalid end page in range '{part}'"))?;
            if start < 1 {
                anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", start);
            }
            if start > end {
                anyhow::bail!("Invalid page range '{}': start must be <= end", part);
            }
            if end > page_count {
                anyhow::bail!(
                    "Page range '{}' is out of range (document has {} pages)",
                    part,
                    page_count
                );
            }
            pages.extend(start..=end);
        } else {
            let page: u32 = part
                .parse()
                .with_context(|| format!("Invalid page number: '{part}'"))?;
            if page < 1 {
                anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", page);
            }
            if page > page_count {
                anyhow::bail!(
                    "Page {} is out of range (document has {} pages)",
                    page,
                    page_count
                );
            }
            pages.push(page);
        }
    }
    pages.sort_unstable();
    pages.dedup();
    Ok(pages)
}

/// Parse `page:angle` pairs, e.g. `2:90,5:180`.
fn parse_rotations(s: &str) -> Result<BTreeMap<u32, Rotation>> {
    s.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|pair| {
            let (page, angle) = pair
                .split_once(':')
                .with_context(|| format!("Expected page:angle, got '{pair}'"))?;
            let page: u32 = page
                .trim()
                .parse()
                .with_context(|| format!("Invalid page number: '{page}'"))?;
            let angle: i64 = angle
                .trim()
                .parse()
                .with_context(|| format!("Invalid angle: '{angle}'"))?;
            Ok((page, Rotation::try_from(angle)?))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_all_is_empty() {
        assert!(parse_pages("all", 3).unwrap().is_empty());
        assert!(parse_pages(" ALL ", 3).unwrap().is_empty());
    }

    #[test]
    fn pages_mixed_ranges_and_singles() {
        assert_eq!(parse_pages("5,1-3,3", 5).unwrap(), vec![1, 2, 3, 5]);
        assert!(parse_pages("0", 5).is_err());
        assert!(parse_pages("4-2", 5).is_err());
        assert!(parse_pages("x", 5).is_err());
    }

    #[test]
    fn pages_beyond_document_are_rejected_before_expansion() {
        let err = parse_pages("1-4000000000", 12).unwrap_err();
        assert!(err.to_string().contains("12 pages"), "got: {err}");
        assert!(parse_pages("13", 12).is_err());
        assert_eq!(parse_pages("11-12", 12).unwrap(), vec![11, 12]);
    }

    #[test]
    fn rotations_parse_pairs() {
        let r = parse_rotations("2:90, 5:180").unwrap();
        assert_eq!(r.get(&2), Some(&Rotation::Deg90));
        assert_eq!(r.get(&5), Some(&Rotation::Deg180));
        assert!(parse_rotations("2:45").is_err());
        assert!(parse_rotations("2").is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
