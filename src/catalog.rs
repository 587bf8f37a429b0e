use tracing::{debug, info};

use crate::error::{unique_or, LibraryError, Result};
use crate::permission::{Capability, Gate};
use crate::session::Session;
use crate::sql::Tx;
use crate::types::{Bid, Book, BookChanges, BookQuery, Confirm, NewBook, Outcome};
use crate::Library;

const BOOK_COLUMNS: &str = "book_id, title, author, isbn, quantity, available_quantity";

/// Applies a change of total copies to the available count.
///
/// Loaned copies stay loaned, so the available count moves by the same
/// delta as the total and may never fall below zero.
pub fn rebalance(old_total: i64, old_available: i64, new_total: i64) -> Result<i64> {
	if new_total < 0 {
		return Err(LibraryError::invalid("quantity cannot be negative"));
	}
	let available = old_available + (new_total - old_total);
	if available < 0 {
		return Err(LibraryError::InvalidState(format!(
			"cannot reduce total quantity to {new_total}: {} copies are on loan",
			old_total - old_available,
		)));
	}
	Ok(available.min(new_total))
}

/// Lowercased search fragments; matching is a Unicode-aware "contains".
#[derive(Debug, Default)]
struct Needles {
	title: Option<String>,
	author: Option<String>,
	isbn: Option<String>,
}

impl Needles {
	fn from_query(query: BookQuery) -> Self {
		let lower = |fragment: Option<String>| blank_to_none(fragment).map(|f| f.to_lowercase());
		Needles {
			title: lower(query.title),
			author: lower(query.author),
			isbn: lower(query.isbn),
		}
	}

	fn is_empty(&self) -> bool {
		self.title.is_none() && self.author.is_none() && self.isbn.is_none()
	}

	fn matches(&self, book: &Book) -> bool {
		fn contains(haystack: Option<&str>, needle: &Option<String>) -> bool {
			match needle {
				None => true,
				Some(needle) => haystack.is_some_and(|h| h.to_lowercase().contains(needle.as_str())),
			}
		}
		contains(Some(book.title.as_str()), &self.title)
			&& contains(Some(book.author.as_str()), &self.author)
			&& contains(book.isbn.as_deref(), &self.isbn)
	}
}

fn blank_to_none(value: Option<String>) -> Option<String> {
	value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

async fn fetch_book(tx: &mut Tx, book_id: Bid) -> Result<Book> {
	sqlx::query_as::<_, Book>(&format!("SELECT {BOOK_COLUMNS} FROM books WHERE book_id = ?"))
		.bind(book_id)
		.fetch_optional(&mut **tx)
		.await?
		.ok_or(LibraryError::not_found("book", book_id))
}

impl Library {
	pub async fn add_book(&self, session: &Session, new: NewBook) -> Result<Book> {
		session.require(Gate::Capability(Capability::AddBook))?;
		let title = new.title.trim().to_string();
		let author = new.author.trim().to_string();
		if title.is_empty() || author.is_empty() {
			return Err(LibraryError::invalid("title and author are required"));
		}
		if new.quantity <= 0 {
			return Err(LibraryError::invalid("quantity must be a positive integer"));
		}
		let isbn = blank_to_none(new.isbn);

		let mut tx = self.db.begin().await?;
		let existing: Option<Bid> = sqlx::query_scalar("SELECT book_id FROM books WHERE title = ? AND author = ?")
			.bind(&title)
			.bind(&author)
			.fetch_optional(&mut *tx)
			.await?;
		if let Some(id) = existing {
			return Err(LibraryError::conflict(format!(
				"a book with title '{title}' by '{author}' already exists (ID: {id}); use update instead"
			)));
		}
		let res = sqlx::query(
			"INSERT INTO books (title, author, isbn, quantity, available_quantity) VALUES (?, ?, ?, ?, ?)",
		)
			.bind(&title)
			.bind(&author)
			.bind(isbn.as_deref())
			.bind(new.quantity)
			.bind(new.quantity)
			.execute(&mut *tx)
			.await
			.map_err(|e| unique_or(e, || format!("'{title}' by '{author}' already exists")))?;
		let book = fetch_book(&mut tx, res.last_insert_rowid()).await?;
		tx.commit().await?;

		info!(book_id = book.book_id, title = %book.title, quantity = book.quantity, by = %session.username(), "book added");
		Ok(book)
	}

	pub async fn update_book(
		&self,
		session: &Session,
		book_id: Bid,
		changes: BookChanges,
		confirm: &mut impl Confirm,
	) -> Result<Outcome<Book>> {
		session.require(Gate::Capability(Capability::UpdateBook))?;
		let current = self.get_book(book_id).await?;
		if let Some(quantity) = changes.quantity {
			rebalance(current.quantity, current.available_quantity, quantity)?;
		}
		if !confirm.confirm(&format!("Update book ID {book_id}?")) {
			return Ok(Outcome::Cancelled);
		}

		// re-read under the transaction; a borrow may have happened meanwhile
		let mut tx = self.db.begin().await?;
		let current = fetch_book(&mut tx, book_id).await?;
		let title = blank_to_none(changes.title).unwrap_or(current.title);
		let author = blank_to_none(changes.author).unwrap_or(current.author);
		let isbn = blank_to_none(changes.isbn).or(current.isbn);
		let quantity = changes.quantity.unwrap_or(current.quantity);
		let available = rebalance(current.quantity, current.available_quantity, quantity)?;

		sqlx::query(
			"UPDATE books SET title = ?, author = ?, isbn = ?, quantity = ?, available_quantity = ? WHERE book_id = ?",
		)
			.bind(&title)
			.bind(&author)
			.bind(isbn.as_deref())
			.bind(quantity)
			.bind(available)
			.bind(book_id)
			.execute(&mut *tx)
			.await
			.map_err(|e| unique_or(e, || format!("'{title}' by '{author}' already exists")))?;
		let book = fetch_book(&mut tx, book_id).await?;
		tx.commit().await?;

		info!(book_id, quantity, available, by = %session.username(), "book updated");
		Ok(Outcome::Done(book))
	}

	pub async fn delete_book(&self, session: &Session, book_id: Bid, confirm: &mut impl Confirm) -> Result<Outcome<Book>> {
		session.require(Gate::Capability(Capability::DeleteBook))?;
		let book = self.get_book(book_id).await?;
		let outstanding = || LibraryError::conflict(format!("cannot delete book '{}' as it has active loans", book.title));
		if book.available_quantity < book.quantity {
			return Err(outstanding());
		}
		let question = format!("Delete book '{}' by {} (ID: {book_id})? This is irreversible.", book.title, book.author);
		if !confirm.confirm(&question) {
			return Ok(Outcome::Cancelled);
		}

		let res = sqlx::query("DELETE FROM books WHERE book_id = ? AND available_quantity = quantity")
			.bind(book_id)
			.execute(self.db.pool())
			.await?;
		if res.rows_affected() == 0 {
			return Err(outstanding());
		}
		info!(book_id, title = %book.title, by = %session.username(), "book deleted");
		Ok(Outcome::Done(book))
	}

	pub async fn get_book(&self, book_id: Bid) -> Result<Book> {
		sqlx::query_as::<_, Book>(&format!("SELECT {BOOK_COLUMNS} FROM books WHERE book_id = ?"))
			.bind(book_id)
			.fetch_optional(self.db.pool())
			.await?
			.ok_or(LibraryError::not_found("book", book_id))
	}

	pub async fn list_books(&self) -> Result<Vec<Book>> {
		let books = sqlx::query_as::<_, Book>(&format!("SELECT {BOOK_COLUMNS} FROM books ORDER BY title, book_id"))
			.fetch_all(self.db.pool())
			.await?;
		Ok(books)
	}

	/// Every given fragment must match; no fragments lists the whole catalog.
	///
	/// SQLite's `LIKE` only folds ASCII case, so the comparison runs here.
	pub async fn search_books(&self, query: BookQuery) -> Result<Vec<Book>> {
		let needles = Needles::from_query(query);
		let books = self.list_books().await?;
		if needles.is_empty() {
			return Ok(books);
		}
		let books: Vec<Book> = books.into_iter().filter(|b| needles.matches(b)).collect();
		debug!(matches = books.len(), "book search");
		Ok(books)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case(5, 5, 8, 8)]
	#[case(5, 3, 8, 6)]
	#[case(5, 3, 2, 0)]
	#[case(5, 5, 0, 0)]
	fn rebalance_moves_by_delta(#[case] total: i64, #[case] available: i64, #[case] new_total: i64, #[case] expected: i64) {
		assert_eq!(rebalance(total, available, new_total).unwrap(), expected);
	}

	#[rstest]
	fn rebalance_refuses_to_drop_loaned_copies() {
		let err = rebalance(5, 1, 3).unwrap_err();
		assert!(matches!(err, LibraryError::InvalidState(_)), "{err:?}");
		assert!(matches!(rebalance(5, 5, -1), Err(LibraryError::InvalidInput(_))));
	}

	fn book(title: &str, author: &str, isbn: Option<&str>) -> Book {
		Book {
			book_id: 1,
			title: title.to_string(),
			author: author.to_string(),
			isbn: isbn.map(str::to_string),
			quantity: 1,
			available_quantity: 1,
		}
	}

	fn query(title: Option<&str>, author: Option<&str>, isbn: Option<&str>) -> Needles {
		Needles::from_query(BookQuery {
			title: title.map(str::to_string),
			author: author.map(str::to_string),
			isbn: isbn.map(str::to_string),
		})
	}

	#[rstest]
	#[case(query(Some("ÉMILE"), None, None), true)]
	#[case(query(None, Some("ödön"), None), true)]
	#[case(query(Some("émile"), Some("rousseau"), None), false)]
	#[case(query(Some("100%"), None, None), false)]
	#[case(query(None, None, Some("978")), false)]
	fn needles_fold_unicode_case(#[case] needles: Needles, #[case] expected: bool) {
		assert_eq!(needles.matches(&book("Émile", "Ödön von Horváth", None)), expected);
	}

	#[rstest]
	fn blank_needles_are_ignored() {
		let needles = query(Some("  "), Some(""), None);
		assert!(needles.is_empty());
		assert!(needles.matches(&book("Anything", "Anyone", Some("1"))));
	}
}
