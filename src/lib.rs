//! libdesk: a console library desk.
//!
//! Readers borrow and return books; admins manage the catalog and readers
//! within the permissions granted to them; superadmins manage everything,
//! including roles. Every operation takes the acting [`Session`] explicitly.

pub mod auth;
pub mod catalog;
pub mod config;
pub mod console;
pub mod error;
pub mod loans;
pub mod permission;
pub mod reports;
pub mod session;
pub mod sql;
pub mod time;
pub mod types;
pub mod users;

pub use error::{LibraryError, Result};
pub use permission::{Capabilities, Capability, Gate, Role};
pub use session::Session;
pub use sql::Db;
pub use time::LoanPeriod;

/// Shared state behind every operation.
#[derive(Debug, Clone)]
pub struct Library {
	db: Db,
	loan_period: LoanPeriod,
	admin_username: String,
}

impl Library {
	pub fn new(db: Db, loan_period: LoanPeriod, admin_username: impl Into<String>) -> Self {
		Library {
			db,
			loan_period,
			admin_username: admin_username.into(),
		}
	}

	pub fn db(&self) -> &Db {
		&self.db
	}

	pub fn loan_period(&self) -> LoanPeriod {
		self.loan_period
	}

	pub fn admin_username(&self) -> &str {
		&self.admin_username
	}
}
