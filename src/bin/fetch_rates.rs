// One-shot extraction: `fetch_rates [--xlsx out.xlsx] [ID ...]`
//
// Prints one JSON line per source. Exits non-zero if any source failed.

use anyhow::{bail, Context, Result};
use ratescraper::{config::Settings, export, Extractor, HttpFetcher};
use serde_json::json;
use std::{env, fs, path::PathBuf, process::ExitCode};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

struct Args {
    xlsx: Option<PathBuf>,
    ids: Vec<String>,
}

fn parse_args() -> Result<Args> {
    let mut xlsx = None;
    let mut ids = Vec::new();
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--xlsx" => match args.next() {
                Some(path) => xlsx = Some(PathBuf::from(path)),
                None => bail!("--xlsx needs a path"),
            },
            "-h" | "--help" => {
                println!("usage: fetch_rates [--xlsx PATH] [SOURCE_ID ...]");
                std::process::exit(0);
            }
            _ => ids.push(arg),
        }
    }
    Ok(Args { xlsx, ids })
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args()?;
    let settings = Settings::from_env()?;
    let registry = settings.registry()?;
    let ids = if args.ids.is_empty() {
        registry.ids().map(str::to_string).collect()
    } else {
        args.ids
    };

    let fetcher = HttpFetcher::new(&settings.fetch_config())?;
    let extractor = Extractor::new(registry, fetcher).with_concurrency(settings.concurrency);

    let mut ok = Vec::new();
    let mut failures = 0usize;
    for (id, outcome) in extractor.extract_batch(ids).await {
        match outcome {
            Ok(result) => {
                println!("{}", serde_json::to_string(&result)?);
                ok.push(result);
            }
            Err(e) => {
                error!(source = %id, error = %e, "extraction failed");
                println!(
                    "{}",
                    json!({
                        "source_id": id,
                        "stage": e.stage,
                        "error": e.kind.to_string(),
                        "retryable": e.is_retryable(),
                    })
                );
                failures += 1;
            }
        }
    }

    if let Some(path) = args.xlsx {
        let bytes = export::write_workbook(&ok).context("building workbook")?;
        fs::write(&path, bytes).with_context(|| format!("writing {:?}", path))?;
        info!(path = %path.display(), sheets = ok.len(), "wrote workbook");
    }

    Ok(if failures == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
