use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use swarf_post::{Job, PostArgs, PostConfig, PostProcessor};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "swarf-post")]
#[command(about = "Post-process CAM operations into G-code", long_about = None)]
struct Cli {
    /// Job file (JSON list of operations)
    job: PathBuf,

    /// Output file, stdout when omitted or "-"
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Read post options from a JSON file instead of the flags below
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(flatten)]
    post: PostArgs,
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn load_config(cli: &Cli) -> Result<PostConfig> {
    match &cli.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            Ok(PostConfig::from_json(&text)
                .with_context(|| format!("loading config {}", path.display()))?)
        }
        None => Ok(cli.post.clone().into_config()?),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let config = load_config(&cli)?;

    let source = fs::read_to_string(&cli.job)
        .with_context(|| format!("reading job {}", cli.job.display()))?;
    let job: Job = serde_json::from_str(&source)
        .with_context(|| format!("parsing job {}", cli.job.display()))?;

    let gcode = PostProcessor::new(config)?.process(&job)?;

    match cli.output.as_deref() {
        Some(path) if path.as_os_str() != "-" => {
            fs::write(path, &gcode).with_context(|| format!("writing {}", path.display()))?;
            tracing::info!(output = %path.display(), "program written");
        }
        _ => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(gcode.as_bytes())?;
            stdout.flush()?;
        }
    }

    Ok(())
}
