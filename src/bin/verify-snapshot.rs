//! Snapshots one IBM Security Verify environment into per-kind JSONL files.
//!
//! Credentials are read from `IBM_VERIFY_<ENV>_*` variables, optionally through a `.env` file in
//! the working directory. Log verbosity follows `RUST_LOG` (default `info`).

// std
use std::{process::ExitCode, sync::Arc};
// crates.io
use clap::Parser;
use color_eyre::Result;
use tracing_subscriber::EnvFilter;
// self
use verify_snapshot::{
	catalog::ObjectKind, client::ApiClient, config::Settings, error::Error, extract::Extractor,
};

#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
	/// Environment to snapshot (bidevt, widevt, biqat, wiqat, biprt, wiprt).
	#[arg(long, env = "VERIFY_ENV")]
	env: String,
	/// Restrict the run to these object kinds; repeat the flag for several.
	#[arg(long = "only", value_name = "KIND")]
	only: Vec<ObjectKind>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
	color_eyre::install()?;

	let dotenv = dotenvy::dotenv();

	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
		)
		.init();

	if let Ok(path) = dotenv {
		tracing::debug!(path = %path.display(), "Loaded environment file.");
	}

	let cli = Cli::parse();
	let settings = Settings::from_env(&cli.env)?;
	let client = Arc::new(ApiClient::with_reqwest(&settings)?);
	let extractor = Extractor::new(&settings, client);
	let mut kinds = if cli.only.is_empty() { ObjectKind::ALL.to_vec() } else { cli.only };

	kinds.sort_unstable();
	kinds.dedup();

	tracing::info!(
		env = %settings.environment,
		output_dir = %settings.output_dir.display(),
		jobs = kinds.len(),
		"Starting snapshot."
	);

	let summary = extractor.run_all(&kinds).await?;

	for report in &summary.reports {
		println!("{report}");
	}
	for (kind, err) in &summary.failures {
		match err {
			Error::Entitlement { .. } => eprintln!("{kind}: skipped. {err}"),
			_ => eprintln!("{kind}: failed. {err}"),
		}
	}

	Ok(if summary.is_success() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
