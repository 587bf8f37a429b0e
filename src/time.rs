use chrono::{Duration, Local, NaiveDate, NaiveDateTime};

use crate::error::{LibraryError, Result};

pub const DEFAULT_LOAN_DAYS: i64 = 14;
pub const MAX_LOAN_DAYS: i64 = 3650;

/// How long a borrowed book may stay out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoanPeriod(Duration);

impl LoanPeriod {
	pub fn days(days: i64) -> Result<Self> {
		if !(1..=MAX_LOAN_DAYS).contains(&days) {
			return Err(LibraryError::invalid(format!(
				"loan period must be between 1 and {MAX_LOAN_DAYS} days, got {days}"
			)));
		}
		Duration::try_days(days)
			.map(LoanPeriod)
			.ok_or_else(|| LibraryError::invalid(format!("loan period of {days} days is out of range")))
	}

	pub fn due_date(self, loan_date: NaiveDate) -> Result<NaiveDate> {
		loan_date
			.checked_add_signed(self.0)
			.ok_or_else(|| LibraryError::InvalidState(format!("due date for a loan made on {loan_date} is out of range")))
	}

	pub fn num_days(self) -> i64 {
		self.0.num_days()
	}
}

impl Default for LoanPeriod {
	fn default() -> Self {
		LoanPeriod(Duration::days(DEFAULT_LOAN_DAYS))
	}
}

pub fn today() -> NaiveDate {
	Local::now().date_naive()
}

pub fn fmt_date(date: NaiveDate) -> String {
	date.format("%Y-%m-%d").to_string()
}

pub fn fmt_timestamp(ts: NaiveDateTime) -> String {
	ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

pub fn fmt_return(date: Option<NaiveDate>) -> String {
	match date {
		Some(date) => fmt_date(date),
		None => "Not Returned".to_string(),
	}
}
