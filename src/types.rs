use chrono::{NaiveDate, NaiveDateTime};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};

use crate::permission::{Capabilities, Role};

pub type Uid = i64;
pub type Bid = i64;
pub type Lid = i64;

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Book {
	pub book_id: Bid,
	pub title: String,
	pub author: String,
	pub isbn: Option<String>,
	pub quantity: i64,
	pub available_quantity: i64,
}

impl Book {
	pub fn loaned(&self) -> i64 {
		self.quantity - self.available_quantity
	}
}

#[derive(Debug, Clone)]
pub struct NewBook {
	pub title: String,
	pub author: String,
	pub isbn: Option<String>,
	pub quantity: i64,
}

/// Fields left as `None` keep their current value.
#[derive(Debug, Clone, Default)]
pub struct BookChanges {
	pub title: Option<String>,
	pub author: Option<String>,
	pub isbn: Option<String>,
	pub quantity: Option<i64>,
}

/// Search fragments; blank fragments are ignored.
#[derive(Debug, Clone, Default)]
pub struct BookQuery {
	pub title: Option<String>,
	pub author: Option<String>,
	pub isbn: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Loan {
	pub loan_id: Lid,
	pub user_id: Option<Uid>,
	pub book_id: Option<Bid>,
	pub loan_date: NaiveDate,
	pub due_date: NaiveDate,
	pub return_date: Option<NaiveDate>,
}

impl Loan {
	pub fn is_active(&self) -> bool {
		self.return_date.is_none()
	}
}

/// A loan joined with the names a listing shows.
#[derive(Debug, Clone, FromRow)]
pub struct LoanRecord {
	pub loan_id: Lid,
	pub username: Option<String>,
	pub title: Option<String>,
	pub author: Option<String>,
	pub loan_date: NaiveDate,
	pub due_date: NaiveDate,
	pub return_date: Option<NaiveDate>,
}

impl LoanRecord {
	pub fn is_active(&self) -> bool {
		self.return_date.is_none()
	}

	pub fn is_overdue(&self, today: NaiveDate) -> bool {
		self.is_active() && self.due_date < today
	}
}

#[derive(Debug, Clone)]
pub struct User {
	pub user_id: Uid,
	pub username: String,
	pub role: Role,
	pub phone: Option<String>,
	pub permissions: Capabilities,
	pub created_at: NaiveDateTime,
}

// role and permissions are TEXT columns, parsed here once
impl<'r> FromRow<'r, SqliteRow> for User {
	fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
		let role: String = row.try_get("role")?;
		let role = role.parse::<Role>().map_err(|e| sqlx::Error::ColumnDecode {
			index: "role".into(),
			source: Box::new(e),
		})?;
		let permissions: Option<String> = row.try_get("permissions")?;
		Ok(User {
			user_id: row.try_get("user_id")?,
			username: row.try_get("username")?,
			role,
			phone: row.try_get("phone")?,
			permissions: Capabilities::parse_lenient(permissions.as_deref().unwrap_or("")),
			created_at: row.try_get("created_at")?,
		})
	}
}

#[derive(Debug, Clone)]
pub struct NewUser {
	pub username: String,
	pub password: String,
	pub role: Role,
	pub phone: Option<String>,
}

/// Phone: outer `None` keeps it, `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
	pub username: Option<String>,
	pub role: Option<Role>,
	pub phone: Option<Option<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registered {
	pub user_id: Uid,
	pub phone_warning: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromRow)]
pub struct Statistics {
	pub titles: i64,
	pub copies: i64,
	pub active_loans: i64,
	pub overdue_loans: i64,
	pub users: i64,
}

/// Result of an operation that asks for confirmation first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
	Done(T),
	Cancelled,
}

impl<T> Outcome<T> {
	pub fn is_done(&self) -> bool {
		matches!(self, Outcome::Done(_))
	}

	pub fn done(self) -> Option<T> {
		match self {
			Outcome::Done(v) => Some(v),
			Outcome::Cancelled => None,
		}
	}
}

pub trait Confirm {
	fn confirm(&mut self, question: &str) -> bool;
}

impl<F: FnMut(&str) -> bool> Confirm for F {
	fn confirm(&mut self, question: &str) -> bool {
		self(question)
	}
}
