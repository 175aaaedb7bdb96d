//! Score one prospectus text file and print the JSON report.
//!
//! Usage: `score_demo <stock_code> <text_file>`
//! Reference data and config come from the environment (`.env` is honoured).

use anyhow::Context;
use hk_ipo_scorer::{ScoreError, ScoringEngine, SponsorReference};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("scoring=info,sponsors=info,warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let (Some(code), Some(path)) = (args.next(), args.next()) else {
        anyhow::bail!("usage: score_demo <stock_code> <text_file>");
    };

    let text = std::fs::read_to_string(&path).with_context(|| format!("failed to read {path}"))?;
    let engine = ScoringEngine::from_env()?;
    let reference = SponsorReference::from_env();

    match engine.score(&text, &code, &reference) {
        Ok(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Err(e @ ScoreError::DocumentTooShort { .. }) => {
            tracing::warn!(error = %e, "not scored");
            Err(e.into())
        }
    }
}
