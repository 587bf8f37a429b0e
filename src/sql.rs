use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};
use tracing::debug;

pub type Tx = Transaction<'static, Sqlite>;

#[derive(Debug, Clone, Copy)]
pub struct PoolSettings {
	pub max_connections: u32,
	pub acquire_timeout: Duration,
}

impl Default for PoolSettings {
	fn default() -> Self {
		PoolSettings {
			max_connections: 5,
			acquire_timeout: Duration::from_secs(3),
		}
	}
}

/// Handle to the library database. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Db(SqlitePool);

pub async fn open(url: &str) -> Result<Db, sqlx::Error> {
	open_with(url, PoolSettings::default()).await
}

pub async fn open_with(url: &str, settings: PoolSettings) -> Result<Db, sqlx::Error> {
	let pool = if url == ":memory:" || url == "sqlite::memory:" {
		// every connection to :memory: is its own database, so keep exactly one alive
		SqlitePoolOptions::new()
			.max_connections(1)
			.min_connections(1)
			.idle_timeout(None)
			.max_lifetime(None)
			.acquire_timeout(settings.acquire_timeout)
			.connect_with(SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true))
			.await?
	} else {
		let options = SqliteConnectOptions::from_str(url)?
			.create_if_missing(true)
			.foreign_keys(true);
		SqlitePoolOptions::new()
			.max_connections(settings.max_connections)
			.acquire_timeout(settings.acquire_timeout)
			.connect_with(options)
			.await?
	};
	debug!(url, "database opened");
	Ok(Db(pool))
}

impl Db {
	pub fn pool(&self) -> &SqlitePool {
		&self.0
	}

	/// Writes spanning several rows go through one of these; dropping it
	/// without `commit` rolls everything back.
	pub async fn begin(&self) -> Result<Tx, sqlx::Error> {
		self.0.begin().await
	}

	pub async fn schema(&self) -> Result<(), sqlx::Error> {
		let mut tx = self.begin().await?;
		for stmt in TABLE_SCHEMA {
			sqlx::query(stmt).execute(&mut *tx).await?;
		}
		tx.commit().await
	}

	pub async fn ping(&self) -> Result<(), sqlx::Error> {
		sqlx::query("SELECT 1").execute(&self.0).await.map(|_| ())
	}

	pub async fn close(self) {
		self.0.close().await
	}
}

pub const TABLE_SCHEMA: &[&str] = &[
r#"
CREATE TABLE IF NOT EXISTS users (
	user_id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
	username TEXT NOT NULL UNIQUE,
	password_hash TEXT NOT NULL,
	role TEXT NOT NULL DEFAULT 'reader',
	phone TEXT DEFAULT NULL,
	permissions TEXT NOT NULL DEFAULT '',
	created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
	CHECK(role IN ('reader', 'admin', 'superadmin'))
)"#,
r#"
CREATE TABLE IF NOT EXISTS books (
	book_id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
	title TEXT NOT NULL,
	author TEXT NOT NULL,
	isbn TEXT DEFAULT NULL,
	quantity INTEGER NOT NULL,
	available_quantity INTEGER NOT NULL,
	UNIQUE(title, author),
	CHECK(available_quantity >= 0),
	CHECK(available_quantity <= quantity)
)"#,
r#"
CREATE TABLE IF NOT EXISTS loans (
	loan_id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
	user_id INTEGER DEFAULT NULL,
	book_id INTEGER DEFAULT NULL,
	loan_date DATE NOT NULL,
	due_date DATE NOT NULL,
	return_date DATE DEFAULT NULL,
	CHECK(due_date >= loan_date),
	FOREIGN KEY(user_id) REFERENCES users(user_id) ON DELETE SET NULL,
	FOREIGN KEY(book_id) REFERENCES books(book_id) ON DELETE SET NULL
)"#,
// one active loan per (user, book)
r#"
CREATE UNIQUE INDEX IF NOT EXISTS loans_active
	ON loans(user_id, book_id) WHERE return_date IS NULL
"#,
r#"
CREATE INDEX IF NOT EXISTS loans_by_user ON loans(user_id)
"#,
];
