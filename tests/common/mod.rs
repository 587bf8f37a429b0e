#![allow(dead_code)]

use libdesk::types::{Book, NewBook, NewUser};
use libdesk::{sql, Capabilities, Library, LoanPeriod, Role, Session};

pub async fn library() -> Library {
	let db = sql::open(":memory:").await.expect("open in-memory db");
	db.schema().await.expect("create schema");
	Library::new(db, LoanPeriod::default(), "admin")
}

/// Registers a user and hands back a session for it without a login round trip.
pub async fn user(lib: &Library, username: &str, role: Role, perms: &str) -> Session {
	let registered = lib.register_user(NewUser {
		username: username.to_string(),
		password: format!("{username}-pw"),
		role,
		phone: None,
	}).await.expect("register user");
	let caps = Capabilities::parse_strict(perms).expect("valid permissions");
	sqlx::query("UPDATE users SET permissions = ? WHERE user_id = ?")
		.bind(caps.to_column())
		.bind(registered.user_id)
		.execute(lib.db().pool())
		.await
		.expect("set permissions");
	Session::new(registered.user_id, username, role, caps)
}

pub async fn superadmin(lib: &Library) -> Session {
	user(lib, "root", Role::Superadmin, "").await
}

pub async fn reader(lib: &Library, name: &str) -> Session {
	user(lib, name, Role::Reader, "").await
}

pub async fn book(lib: &Library, by: &Session, title: &str, author: &str, quantity: i64) -> Book {
	lib.add_book(by, NewBook {
		title: title.to_string(),
		author: author.to_string(),
		isbn: None,
		quantity,
	}).await.expect("add book")
}

pub fn yes() -> impl FnMut(&str) -> bool {
	|_: &str| true
}

pub fn no() -> impl FnMut(&str) -> bool {
	|_: &str| false
}

pub fn assert_bounded(book: &Book) {
	assert!(
		0 <= book.available_quantity && book.available_quantity <= book.quantity,
		"availability out of range: {book:?}",
	);
}
