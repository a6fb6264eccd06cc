mod document;
mod filter;
mod keys;
mod pipeline;
mod sampler;
mod selector;
mod source;
mod storage;

use pipeline::{DeckNames, Outcome};
use slide_deck_common::config::Config;
use std::path::PathBuf;
use tracing::{error, info, warn};

const USAGE: &str = "usage: slide-deck [--config <path>] <input>...";

#[derive(Debug, PartialEq)]
struct Args {
    config: PathBuf,
    inputs: Vec<PathBuf>,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args, String> {
    let mut config = PathBuf::from("config.toml");
    let mut inputs = Vec::new();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-c" | "--config" => {
                let path = args
                    .next()
                    .ok_or_else(|| format!("{arg} needs a path"))?;
                config = PathBuf::from(path);
            }
            "-h" | "--help" => return Err(String::new()),
            _ => inputs.push(PathBuf::from(arg)),
        }
    }

    if inputs.is_empty() {
        return Err("no inputs given".into());
    }
    Ok(Args { config, inputs })
}

#[tokio::main]
async fn main() {
    let args = match parse_args(std::env::args().skip(1)) {
        Ok(a) => a,
        Err(msg) => {
            if !msg.is_empty() {
                eprintln!("{msg}");
            }
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    };

    let config = match Config::load_or_default(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {e}", args.config.display());
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .init();

    info!(
        config = %args.config.display(),
        inputs = args.inputs.len(),
        threshold = config.selection.threshold,
        compare_width = config.selection.compare_width,
        compare_height = config.selection.compare_height,
        interval_secs = config.sampling.interval_secs,
        output_dir = %config.output.output_dir.display(),
        "starting slide-deck"
    );

    // Only video inputs need ffmpeg; frame directories are read directly.
    if args.inputs.iter().any(|p| !p.is_dir()) {
        sampler::check_ffmpeg_available(&config.sampling.ffmpeg).await;
    }

    let total = args.inputs.len();
    let mut failed = 0;
    let mut names = DeckNames::default();
    for (n, input) in args.inputs.iter().enumerate() {
        info!(input = %input.display(), n = n + 1, total, "processing input");

        let base = pipeline::input_title(input);
        let title = names.claim(&base);
        if title != base {
            warn!(input = %input.display(), base, title, "name already used in this run, renaming deck");
        }

        match pipeline::process_input(input, &title, &config).await {
            Ok(Outcome::Created { path, pages, stats }) => info!(
                input = %input.display(),
                path = %path.display(),
                pages,
                frames = stats.frames,
                kept = stats.kept,
                unencoded = stats.unencoded,
                duplicates = stats.duplicates,
                skipped = stats.skipped,
                "document created"
            ),
            Ok(Outcome::NoSlides { stats }) => warn!(
                input = %input.display(),
                frames = stats.frames,
                skipped = stats.skipped,
                "no slides produced, no document created"
            ),
            Err(e) => {
                error!(input = %input.display(), error = %e, "failed to process input");
                failed += 1;
            }
        }
    }

    info!(total, failed, "all inputs processed");
    if failed == total {
        std::process::exit(1);
    }
}
