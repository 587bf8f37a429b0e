// library desk

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use libdesk::config::Config;
use libdesk::console::Console;
use libdesk::{sql, Library};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
	dotenvy::dotenv().ok();
	let config = Config::parse();

	// stderr, so log lines never interleave with the menus on stdout
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_new(&config.log).unwrap_or_else(|_| EnvFilter::new("warn")))
		.with_writer(std::io::stderr)
		.init();

	let loan_period = config.loan_period()?;
	let db = sql::open_with(&config.database_url, config.pool_settings()).await
		.with_context(|| format!("cannot connect to database {}", config.database_url))?;
	db.ping().await.context("database is not answering")?;
	db.schema().await.context("cannot create tables")?;
	info!(url = %config.database_url, loan_days = loan_period.num_days(), "database ready");

	let library = Library::new(db.clone(), loan_period, config.admin_username.clone());
	let mut console = Console::stdio();
	console.run(&library).await.context("console i/o failed")?;

	db.close().await;
	Ok(())
}
