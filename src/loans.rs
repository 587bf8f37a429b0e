//! Borrowing and returning.
//!
//! A loan is active from `borrow` until `return_loan` stamps its return
//! date; a closed loan is never reopened. Both transitions touch the loan
//! row and the book's available count inside one transaction.

use tracing::info;

use crate::error::{unique_or, LibraryError, Result};
use crate::permission::{Capability, Gate};
use crate::session::Session;
use crate::time;
use crate::types::{Bid, Lid, Loan, LoanRecord};
use crate::Library;

const LOAN_COLUMNS: &str = "loan_id, user_id, book_id, loan_date, due_date, return_date";

impl Library {
	pub async fn borrow(&self, session: &Session, book_id: Bid) -> Result<Loan> {
		let user_id = session.user_id();
		let mut tx = self.db.begin().await?;

		let available: Option<i64> = sqlx::query_scalar("SELECT available_quantity FROM books WHERE book_id = ?")
			.bind(book_id)
			.fetch_optional(&mut *tx)
			.await?;
		match available {
			None => return Err(LibraryError::not_found("book", book_id)),
			Some(n) if n <= 0 => return Err(LibraryError::Unavailable(book_id)),
			Some(_) => {},
		}

		let active: Option<Lid> = sqlx::query_scalar(
			"SELECT loan_id FROM loans WHERE user_id = ? AND book_id = ? AND return_date IS NULL",
		)
			.bind(user_id)
			.bind(book_id)
			.fetch_optional(&mut *tx)
			.await?;
		if let Some(loan_id) = active {
			return Err(LibraryError::conflict(format!("you already have this book borrowed (loan ID {loan_id})")));
		}

		// guarded so a concurrent borrow of the last copy cannot go negative
		let taken = sqlx::query(
			"UPDATE books SET available_quantity = available_quantity - 1 WHERE book_id = ? AND available_quantity > 0",
		)
			.bind(book_id)
			.execute(&mut *tx)
			.await?;
		if taken.rows_affected() == 0 {
			return Err(LibraryError::Unavailable(book_id));
		}

		let loan_date = time::today();
		let due_date = self.loan_period.due_date(loan_date)?;
		let loan = sqlx::query_as::<_, Loan>(&format!(
			"INSERT INTO loans (user_id, book_id, loan_date, due_date) VALUES (?, ?, ?, ?) RETURNING {LOAN_COLUMNS}"
		))
			.bind(user_id)
			.bind(book_id)
			.bind(loan_date)
			.bind(due_date)
			.fetch_one(&mut *tx)
			.await
			.map_err(|e| unique_or(e, || "you already have this book borrowed".to_string()))?;
		tx.commit().await?;

		info!(loan_id = loan.loan_id, book_id, user = %session.username(), due = %due_date, "book borrowed");
		Ok(loan)
	}

	pub async fn return_loan(&self, session: &Session, loan_id: Lid) -> Result<Loan> {
		let mut tx = self.db.begin().await?;
		let book_id: Option<Option<Bid>> = sqlx::query_scalar(
			"SELECT book_id FROM loans WHERE loan_id = ? AND user_id = ? AND return_date IS NULL",
		)
			.bind(loan_id)
			.bind(session.user_id())
			.fetch_optional(&mut *tx)
			.await?;
		let Some(book_id) = book_id else {
			return Err(LibraryError::NotFound { entity: "active loan", id: loan_id });
		};

		let loan = sqlx::query_as::<_, Loan>(&format!(
			"UPDATE loans SET return_date = ? WHERE loan_id = ? AND return_date IS NULL RETURNING {LOAN_COLUMNS}"
		))
			.bind(time::today())
			.bind(loan_id)
			.fetch_one(&mut *tx)
			.await?;
		if let Some(book_id) = book_id {
			sqlx::query(
				"UPDATE books SET available_quantity = available_quantity + 1 WHERE book_id = ? AND available_quantity < quantity",
			)
				.bind(book_id)
				.execute(&mut *tx)
				.await?;
		}
		tx.commit().await?;

		info!(loan_id, book_id = ?book_id, user = %session.username(), "book returned");
		Ok(loan)
	}

	/// The session user's own loans, newest first.
	pub async fn my_loans(&self, session: &Session, only_active: bool) -> Result<Vec<LoanRecord>> {
		let filter = if only_active { " AND l.return_date IS NULL" } else { "" };
		let sql = format!(
			"SELECT l.loan_id, u.username, b.title, b.author, l.loan_date, l.due_date, l.return_date \
			FROM loans l \
			LEFT JOIN users u ON l.user_id = u.user_id \
			LEFT JOIN books b ON l.book_id = b.book_id \
			WHERE l.user_id = ?{filter} \
			ORDER BY l.loan_date DESC, l.loan_id DESC"
		);
		let loans = sqlx::query_as::<_, LoanRecord>(&sql)
			.bind(session.user_id())
			.fetch_all(self.db.pool())
			.await?;
		Ok(loans)
	}

	/// Everybody's loans; needs `view_reports`.
	pub async fn all_loans(&self, session: &Session, only_active: bool) -> Result<Vec<LoanRecord>> {
		session.require(Gate::Capability(Capability::ViewReports))?;
		let filter = if only_active { "WHERE l.return_date IS NULL " } else { "" };
		let sql = format!(
			"SELECT l.loan_id, u.username, b.title, b.author, l.loan_date, l.due_date, l.return_date \
			FROM loans l \
			LEFT JOIN users u ON l.user_id = u.user_id \
			LEFT JOIN books b ON l.book_id = b.book_id \
			{filter}\
			ORDER BY l.loan_date DESC, l.loan_id DESC"
		);
		let loans = sqlx::query_as::<_, LoanRecord>(&sql)
			.fetch_all(self.db.pool())
			.await?;
		Ok(loans)
	}
}
