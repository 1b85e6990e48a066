//! The `inkread recognize` command.
//!
//! Feeds images through a [`QueueRunner`] one at a time and waits for each to
//! settle. A quota failure shows a countdown spinner while the runner holds
//! the image, then the same image is retried automatically.

use clap::{Args, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use inkread_core::{
    Config, ImageDiscovery, ImageLoader, LoadedImage, OutputFormat as CoreOutputFormat,
    PredictionRecord, QueueCommand, QueueEvent, QueueRunner, Recognizer, RecordWriter,
};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Arguments for the `recognize` command.
#[derive(Args, Debug)]
pub struct RecognizeArgs {
    /// Image file or directory of images
    #[arg(required = true)]
    pub input: PathBuf,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output format (defaults to `output.format` from config)
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Primary model name
    #[arg(long)]
    pub model: Option<String>,

    /// Model used after repeated quota failures
    #[arg(long)]
    pub fallback_model: Option<String>,
}

/// Supported output formats.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    /// JSON array of records
    Json,
    /// One record per line
    Jsonl,
}

impl From<OutputFormat> for CoreOutputFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => CoreOutputFormat::Json,
            OutputFormat::Jsonl => CoreOutputFormat::JsonLines,
        }
    }
}

/// How one image ended up.
enum Settled {
    Recognized(PredictionRecord),
    Failed(String),
    Interrupted,
}

#[derive(Default)]
struct Summary {
    succeeded: u64,
    failed: u64,
    cooldowns: u64,
}

/// Execute the recognize command.
pub async fn execute(args: RecognizeArgs, mut config: Config) -> anyhow::Result<()> {
    apply_overrides(&args, &mut config)?;

    let images = ImageDiscovery::new().discover(&args.input);
    if images.is_empty() {
        tracing::warn!("No supported image files found at {:?}", args.input);
        return Ok(());
    }
    tracing::info!("Found {} image(s) to recognize", images.len());

    let format = match args.format {
        Some(format) => format.into(),
        None => CoreOutputFormat::parse(&config.output.format).unwrap_or(CoreOutputFormat::Json),
    };
    let sink: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(std::io::stdout().lock()),
    };
    let mut writer = RecordWriter::new(sink, format, args.pretty || config.output.pretty);

    let recognizer = Recognizer::from_config(&config)?;
    tracing::debug!(
        primary = %config.recognition.primary_model,
        fallback = %config.recognition.fallback_model,
        "Recognizer ready"
    );
    let runner = QueueRunner::new(recognizer, &config.cooldown);
    let (commands, mut events, handle) = runner.spawn(16);

    let loader = ImageLoader::new(config.limits.clone());
    let start = Instant::now();
    let mut summary = Summary::default();

    for discovered in &images {
        let image = match loader.load(&discovered.path) {
            Ok(image) => image,
            Err(e) => {
                tracing::warn!("Skipping: {e}");
                summary.failed += 1;
                continue;
            }
        };

        commands
            .send(QueueCommand::Capture(image.data_url.clone()))
            .await?;

        match wait_for_settle(&image, &mut events, &commands, &mut summary).await? {
            Settled::Recognized(record) => {
                tracing::info!(
                    "{}: \"{}\" ({:.0}%)",
                    discovered.path.display(),
                    record.predicted_text,
                    record.confidence * 100.0
                );
                writer.push(record)?;
                summary.succeeded += 1;
            }
            Settled::Failed(message) => {
                tracing::error!("{}: {message}", discovered.path.display());
                summary.failed += 1;
            }
            Settled::Interrupted => {
                tracing::warn!("Interrupted, stopping after {} image(s)", writer.len());
                break;
            }
        }
    }

    drop(commands);
    handle.await?;
    writer.finish()?;

    if let Some(path) = &args.output {
        tracing::info!("Output written to {:?}", path);
    }
    print_summary(&summary, start.elapsed());
    Ok(())
}

fn apply_overrides(args: &RecognizeArgs, config: &mut Config) -> anyhow::Result<()> {
    if let Some(model) = &args.model {
        config.recognition.primary_model = model.clone();
    }
    if let Some(model) = &args.fallback_model {
        config.recognition.fallback_model = model.clone();
    }
    config.validate()?;
    Ok(())
}

/// Drain queue events until the submitted image is recognized or fails.
///
/// Ctrl-C cancels any pending cooldown.
async fn wait_for_settle(
    image: &LoadedImage,
    events: &mut mpsc::Receiver<QueueEvent>,
    commands: &mpsc::Sender<QueueCommand>,
    summary: &mut Summary,
) -> anyhow::Result<Settled> {
    let mut spinner: Option<ProgressBar> = None;

    let settled = loop {
        let event = tokio::select! {
            event = events.recv() => event,
            _ = tokio::signal::ctrl_c() => {
                commands.send(QueueCommand::Cancel).await?;
                break Settled::Interrupted;
            }
        };

        let Some(event) = event else {
            anyhow::bail!("Recognition queue stopped unexpectedly");
        };

        match event {
            QueueEvent::Submitted { resubmission } => {
                if resubmission {
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                    }
                    tracing::info!("Retrying {}", image.path.display());
                }
            }
            QueueEvent::Recognized { result, .. } => {
                let record = PredictionRecord::from_result(
                    image.path.display().to_string(),
                    image.fingerprint().as_str(),
                    &result,
                );
                break Settled::Recognized(record);
            }
            QueueEvent::CoolingDown { seconds, message } => {
                summary.cooldowns += 1;
                tracing::debug!("Quota error: {message}");
                let pb = cooldown_spinner()?;
                pb.set_message(countdown_message(seconds));
                spinner = Some(pb);
            }
            QueueEvent::Countdown { seconds_remaining } => {
                if let Some(pb) = &spinner {
                    pb.set_message(countdown_message(seconds_remaining));
                }
            }
            QueueEvent::ServiceUnavailable { error, .. } => {
                break Settled::Failed(error.to_string());
            }
            QueueEvent::CooldownExpired | QueueEvent::Cancelled => {
                break Settled::Failed("Cooldown ended without a retry".to_string());
            }
            // Only one image is in the queue at a time
            QueueEvent::Queued | QueueEvent::Busy => {}
        }
    };

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    Ok(settled)
}

fn countdown_message(seconds: u32) -> String {
    format!("Free tier limit reached. Auto-retrying in {seconds}s (Ctrl-C to cancel)")
}

fn cooldown_spinner() -> anyhow::Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.yellow} {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(120));
    Ok(pb)
}

/// Print a summary after recognition.
fn print_summary(summary: &Summary, elapsed: Duration) {
    eprintln!();
    eprintln!("  Recognition complete");
    eprintln!("  ────────────────────────────────");
    eprintln!("  Succeeded    {:>8}", summary.succeeded);
    if summary.failed > 0 {
        eprintln!("  Failed       {:>8}", summary.failed);
    }
    if summary.cooldowns > 0 {
        eprintln!("  Cooldowns    {:>8}", summary.cooldowns);
    }
    eprintln!("  Duration     {:>7.1}s", elapsed.as_secs_f64());
    eprintln!();
}
