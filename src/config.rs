use std::time::Duration;

use clap::Parser;

use crate::error::Result;
use crate::sql::PoolSettings;
use crate::time::{LoanPeriod, DEFAULT_LOAN_DAYS};

/// Console library desk.
#[derive(Debug, Clone, Parser)]
#[command(name = "libdesk", version, about)]
pub struct Config {
	/// SQLite database, created if missing
	#[arg(long, env = "DATABASE_URL", default_value = "sqlite://library.db")]
	pub database_url: String,

	#[arg(long, default_value_t = 5)]
	pub max_connections: u32,

	#[arg(long, default_value_t = 3)]
	pub acquire_timeout_secs: u64,

	/// Days a borrowed book may stay out
	#[arg(long, default_value_t = DEFAULT_LOAN_DAYS)]
	pub loan_days: i64,

	/// Name of the bootstrap superadmin account
	#[arg(long, default_value = "admin")]
	pub admin_username: String,

	/// tracing filter, e.g. `info` or `libdesk=debug`
	#[arg(long, env = "LIBDESK_LOG", default_value = "warn")]
	pub log: String,
}

impl Config {
	pub fn pool_settings(&self) -> PoolSettings {
		PoolSettings {
			max_connections: self.max_connections.max(1),
			acquire_timeout: Duration::from_secs(self.acquire_timeout_secs),
		}
	}

	pub fn loan_period(&self) -> Result<LoanPeriod> {
		LoanPeriod::days(self.loan_days)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn flags_override_defaults() {
		let config = Config::try_parse_from([
			"libdesk",
			"--database-url", "sqlite://test.db",
			"--loan-days", "21",
			"--admin-username", "root",
		]).unwrap();
		assert_eq!(config.database_url, "sqlite://test.db");
		assert_eq!(config.loan_period().unwrap().num_days(), 21);
		assert_eq!(config.admin_username, "root");
		assert_eq!(config.pool_settings().acquire_timeout, Duration::from_secs(3));
	}

	#[rstest]
	#[case("0")]
	#[case("3651")]
	#[case("9223372036854775807")]
	fn out_of_range_loan_days_are_rejected(#[case] days: &str) {
		let config = Config::try_parse_from(["libdesk", "--database-url", "x", "--loan-days", days]).unwrap();
		assert!(config.loan_period().is_err());
	}
}
