//! Menus, prompts and tables. Holds no library logic of its own.

use std::io::{self, BufRead, IsTerminal, Write};

use comfy_table::Table;
use dialoguer::Password;
use tracing::{info_span, Instrument};

use crate::error::LibraryError;
use crate::permission::{Capabilities, Role};
use crate::session::Session;
use crate::time;
use crate::types::{Book, BookChanges, BookQuery, Confirm, LoanRecord, NewBook, NewUser, Outcome, Statistics, User, UserChanges};
use crate::Library;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
	Search,
	ListBooks,
	Borrow,
	Return,
	MyLoans,
	AddBook,
	UpdateBook,
	DeleteBook,
	LoanHistory,
	ActiveLoans,
	ListUsers,
	AddUser,
	UpdateUser,
	DeleteUser,
	Statistics,
	ManageRoles,
}

const READER_MENU: &[Action] = &[
	Action::Search, Action::ListBooks, Action::Borrow, Action::Return, Action::MyLoans,
];

const ADMIN_MENU: &[Action] = &[
	Action::Search, Action::ListBooks, Action::AddBook, Action::UpdateBook, Action::DeleteBook,
	Action::LoanHistory, Action::ActiveLoans,
	Action::ListUsers, Action::AddUser, Action::UpdateUser, Action::DeleteUser,
	Action::Statistics,
];

const SUPERADMIN_MENU: &[Action] = &[
	Action::Search, Action::ListBooks, Action::AddBook, Action::UpdateBook, Action::DeleteBook,
	Action::LoanHistory, Action::ActiveLoans,
	Action::ListUsers, Action::AddUser, Action::UpdateUser, Action::DeleteUser,
	Action::Statistics, Action::ManageRoles,
];

impl Action {
	fn label(self) -> &'static str {
		match self {
			Action::Search => "Search Books",
			Action::ListBooks => "List All Books",
			Action::Borrow => "Borrow Book",
			Action::Return => "Return Book",
			Action::MyLoans => "View My Loans",
			Action::AddBook => "Add New Book",
			Action::UpdateBook => "Update Book Details",
			Action::DeleteBook => "Delete Book",
			Action::LoanHistory => "List All Loans (History)",
			Action::ActiveLoans => "List Active Loans",
			Action::ListUsers => "List Users",
			Action::AddUser => "Add New User",
			Action::UpdateUser => "Update User",
			Action::DeleteUser => "Delete User",
			Action::Statistics => "View Statistics",
			Action::ManageRoles => "Manage User Roles & Permissions",
		}
	}
}

fn menu_for(role: Role) -> &'static [Action] {
	match role {
		Role::Reader => READER_MENU,
		Role::Admin => ADMIN_MENU,
		Role::Superadmin => SUPERADMIN_MENU,
	}
}

fn capitalize(s: &str) -> String {
	let mut chars = s.chars();
	match chars.next() {
		Some(first) => first.to_uppercase().chain(chars).collect(),
		None => String::new(),
	}
}

enum Level { Info, Success, Warning, Error }

pub struct Console<R, W> {
	input: R,
	out: W,
	closed: bool,
	// passwords go through the terminal with echo off
	masked: bool,
}

impl Console<io::StdinLock<'static>, io::Stdout> {
	pub fn stdio() -> Self {
		let stdin = io::stdin();
		let masked = stdin.is_terminal();
		Console { masked, ..Console::new(stdin.lock(), io::stdout()) }
	}
}

impl<R: BufRead, W: Write> Confirm for Console<R, W> {
	fn confirm(&mut self, question: &str) -> bool {
		match self.ask(&format!("{question} (yes/no)")) {
			Ok(Some(answer)) => matches!(answer.to_lowercase().as_str(), "y" | "yes"),
			_ => false,
		}
	}
}

impl<R: BufRead, W: Write> Console<R, W> {
	pub fn new(input: R, out: W) -> Self {
		Console { input, out, closed: false, masked: false }
	}

	pub fn into_output(self) -> W {
		self.out
	}

	// None once input is exhausted
	fn ask(&mut self, prompt: &str) -> io::Result<Option<String>> {
		if self.closed {
			return Ok(None);
		}
		write!(self.out, "{prompt}: ")?;
		self.out.flush()?;
		let mut line = String::new();
		if self.input.read_line(&mut line)? == 0 {
			writeln!(self.out)?;
			self.closed = true;
			return Ok(None);
		}
		Ok(Some(line.trim().to_string()))
	}

	fn ask_required(&mut self, prompt: &str) -> io::Result<Option<String>> {
		loop {
			match self.ask(prompt)? {
				Some(v) if v.is_empty() => writeln!(self.out, "This field is required.")?,
				other => return Ok(other),
			}
		}
	}

	fn ask_number(&mut self, prompt: &str) -> io::Result<Option<i64>> {
		loop {
			let Some(v) = self.ask_required(prompt)? else { return Ok(None) };
			match v.parse() {
				Ok(n) => return Ok(Some(n)),
				Err(_) => writeln!(self.out, "Invalid input. Please enter a whole number.")?,
			}
		}
	}

	fn ask_password(&mut self, prompt: &str) -> io::Result<Option<String>> {
		if !self.masked {
			return self.ask(prompt);
		}
		Password::new()
			.with_prompt(prompt)
			.allow_empty_password(true)
			.interact()
			.map(Some)
			.map_err(io::Error::other)
	}

	fn ask_new_password(&mut self, prompt: &str, confirm: bool) -> io::Result<Option<String>> {
		if self.masked {
			let mut password = Password::new();
			password = password.with_prompt(prompt);
			if confirm {
				password = password.with_confirmation("Confirm password", "Passwords do not match. Please try again.");
			}
			return password.interact().map(Some).map_err(io::Error::other);
		}
		loop {
			let Some(password) = self.ask_required(prompt)? else { return Ok(None) };
			if !confirm {
				return Ok(Some(password));
			}
			let Some(again) = self.ask("Confirm password")? else { return Ok(None) };
			if password == again {
				return Ok(Some(password));
			}
			self.say(Level::Warning, "Passwords do not match. Please try again.")?;
		}
	}

	// blank keeps the current value
	fn ask_optional(&mut self, prompt: &str) -> io::Result<Option<Option<String>>> {
		Ok(self.ask(prompt)?.map(|v| if v.is_empty() { None } else { Some(v) }))
	}

	fn say(&mut self, level: Level, msg: impl std::fmt::Display) -> io::Result<()> {
		let tag = match level {
			Level::Info => "[INFO]",
			Level::Success => "[SUCCESS]",
			Level::Warning => "[WARNING]",
			Level::Error => "[ERROR]",
		};
		writeln!(self.out, "{tag} {msg}")
	}

	fn fail(&mut self, err: LibraryError) -> io::Result<()> {
		self.say(Level::Error, err)
	}

	fn heading(&mut self, title: &str) -> io::Result<()> {
		writeln!(self.out, "\n--- {title} ---")
	}

	fn table(&mut self, title: &str, header: &[&str], rows: Vec<Vec<String>>) -> io::Result<()> {
		if rows.is_empty() {
			return writeln!(self.out, "No data to display.");
		}
		let mut table = Table::new();
		table.set_header(header.to_vec());
		for row in rows {
			table.add_row(row);
		}
		self.heading(title)?;
		writeln!(self.out, "{table}")
	}

	fn books(&mut self, title: &str, books: &[Book]) -> io::Result<()> {
		let rows = books.iter().map(|b| vec![
			b.book_id.to_string(),
			b.title.clone(),
			b.author.clone(),
			b.isbn.clone().unwrap_or_default(),
			b.quantity.to_string(),
			b.available_quantity.to_string(),
		]).collect();
		self.table(title, &["ID", "Title", "Author", "ISBN", "Quantity", "Available"], rows)
	}

	fn loans(&mut self, title: &str, loans: &[LoanRecord], with_user: bool) -> io::Result<()> {
		let today = time::today();
		let rows = loans.iter().map(|l| {
			let mut row = vec![l.loan_id.to_string()];
			if with_user {
				row.push(l.username.clone().unwrap_or_else(|| "(deleted)".to_string()));
			}
			row.push(l.title.clone().unwrap_or_else(|| "(deleted)".to_string()));
			row.push(time::fmt_date(l.loan_date));
			row.push(time::fmt_date(l.due_date));
			row.push(if l.is_overdue(today) { "OVERDUE".to_string() } else { time::fmt_return(l.return_date) });
			row
		}).collect();
		let header: &[&str] = if with_user {
			&["Loan ID", "User", "Title", "Loan Date", "Due Date", "Returned"]
		} else {
			&["Loan ID", "Title", "Loan Date", "Due Date", "Returned"]
		};
		self.table(title, header, rows)
	}

	fn users(&mut self, users: &[User]) -> io::Result<()> {
		let rows = users.iter().map(|u| vec![
			u.user_id.to_string(),
			u.username.clone(),
			u.role.to_string(),
			u.phone.clone().unwrap_or_else(|| "N/A".to_string()),
			u.permissions.to_string(),
			time::fmt_timestamp(u.created_at),
		]).collect();
		self.table("User Accounts", &["ID", "Username", "Role", "Phone", "Permissions", "Created"], rows)
	}

	fn statistics(&mut self, stats: Statistics) -> io::Result<()> {
		self.table("Library Statistics", &["Titles", "Copies", "Active Loans", "Overdue", "Users"], vec![vec![
			stats.titles.to_string(),
			stats.copies.to_string(),
			stats.active_loans.to_string(),
			stats.overdue_loans.to_string(),
			stats.users.to_string(),
		]])
	}

	fn outcome<T>(&mut self, res: crate::Result<Outcome<T>>, done: &str) -> io::Result<Option<T>> {
		match res {
			Ok(Outcome::Done(v)) => {
				self.say(Level::Success, done)?;
				Ok(Some(v))
			},
			Ok(Outcome::Cancelled) => {
				self.say(Level::Info, "Cancelled.")?;
				Ok(None)
			},
			Err(e) => {
				self.fail(e)?;
				Ok(None)
			},
		}
	}

	/// Login loop until the operator exits or input ends.
	pub async fn run(&mut self, library: &Library) -> io::Result<()> {
		writeln!(self.out, "Welcome to the Library Management System!")?;
		loop {
			self.heading("Main Menu")?;
			writeln!(self.out, "1. Login\n0. Exit System")?;
			match self.ask("Enter your choice")?.as_deref() {
				None | Some("0") => break,
				Some("1") => {
					if !self.login(library).await? {
						break;
					}
				},
				Some(_) => self.say(Level::Warning, "Invalid choice, please try again.")?,
			}
		}
		writeln!(self.out, "\nThank you for using the Library Management System. Goodbye!")
	}

	// false ends the program
	async fn login(&mut self, library: &Library) -> io::Result<bool> {
		let Some(username) = self.ask_required("Enter username")? else { return Ok(false) };
		let Some(password) = self.ask_password("Enter password")? else { return Ok(false) };

		match library.login(&username, &password).await {
			Ok(session) => {
				self.greet(&session)?;
				// everything done in this session is logged under its token
				let span = info_span!("session", user = %session.username(), token = %session.token());
				self.session_menu(library, &session).instrument(span).await?;
				Ok(!self.closed)
			},
			Err(LibraryError::InvalidCredentials) => self.after_failed_login(library).await,
			Err(e) => {
				self.fail(e)?;
				Ok(true)
			},
		}
	}

	async fn after_failed_login(&mut self, library: &Library) -> io::Result<bool> {
		let admin_exists = match library.admin_exists().await {
			Ok(exists) => exists,
			Err(e) => {
				self.fail(e)?;
				return Ok(true);
			},
		};
		if admin_exists {
			self.say(Level::Error, "Invalid username or password.")?;
			return Ok(self.confirm("Try again?"));
		}
		if !self.confirm("Login failed. Initial admin user not found. Create it now?") {
			self.say(Level::Info, "Cannot proceed without admin account. Exiting.")?;
			return Ok(false);
		}
		self.heading("Create Initial Superadmin Account")?;
		let prompt = format!("Enter password for '{}'", library.admin_username());
		let Some(password) = self.ask_new_password(&prompt, true)? else { return Ok(false) };
		match library.create_initial_admin(&password).await {
			Ok(_) => {
				self.say(Level::Success, format!("Initial superadmin user '{}' created. Please login again.", library.admin_username()))?;
				Ok(true)
			},
			Err(e) => {
				self.fail(e)?;
				Ok(false)
			},
		}
	}

	fn greet(&mut self, session: &Session) -> io::Result<()> {
		writeln!(self.out, "\nLogin successful. Welcome, {}!", session.username())?;
		writeln!(self.out, "Your role: {}", capitalize(session.role().as_str()))?;
		if session.role() == Role::Admin && !session.permissions().is_empty() {
			writeln!(self.out, "You have the following specific permissions:")?;
			for cap in session.permissions().iter() {
				writeln!(self.out, "- {cap}")?;
			}
		}
		Ok(())
	}

	async fn session_menu(&mut self, library: &Library, session: &Session) -> io::Result<()> {
		let actions = menu_for(session.role());
		let title = format!("{} Menu (User: {})", capitalize(session.role().as_str()), session.username());
		loop {
			self.heading(&title)?;
			for (i, action) in actions.iter().enumerate() {
				writeln!(self.out, "{}. {}", i + 1, action.label())?;
			}
			writeln!(self.out, "0. Logout")?;
			let Some(choice) = self.ask("Enter your choice")? else { return Ok(()) };
			if choice == "0" {
				return self.say(Level::Info, "Logging out.");
			}
			match choice.parse::<usize>().ok().and_then(|n| n.checked_sub(1)).and_then(|i| actions.get(i)) {
				Some(&action) => self.dispatch(library, session, action).await?,
				None => self.say(Level::Warning, "Invalid choice, please try again.")?,
			}
			if self.closed {
				return Ok(());
			}
		}
	}

	async fn dispatch(&mut self, library: &Library, session: &Session, action: Action) -> io::Result<()> {
		match action {
			Action::Search => self.search(library).await,
			Action::ListBooks => match library.list_books().await {
				Ok(books) => self.books("Library Catalog", &books),
				Err(e) => self.fail(e),
			},
			Action::Borrow => self.borrow(library, session).await,
			Action::Return => self.return_loan(library, session).await,
			Action::MyLoans => match library.my_loans(session, false).await {
				Ok(loans) => self.loans("Your Loan History", &loans, false),
				Err(e) => self.fail(e),
			},
			Action::AddBook => self.add_book(library, session).await,
			Action::UpdateBook => self.update_book(library, session).await,
			Action::DeleteBook => self.delete_book(library, session).await,
			Action::LoanHistory | Action::ActiveLoans => {
				let active = action == Action::ActiveLoans;
				match library.all_loans(session, active).await {
					Ok(loans) => self.loans(if active { "All Active Loans" } else { "All Loan History" }, &loans, true),
					Err(e) => self.fail(e),
				}
			},
			Action::ListUsers => match library.list_users(session).await {
				Ok(users) => self.users(&users),
				Err(e) => self.fail(e),
			},
			Action::AddUser => self.add_user(library, session).await,
			Action::UpdateUser => self.update_user(library, session).await,
			Action::DeleteUser => self.delete_user(library, session).await,
			Action::Statistics => match library.statistics(session).await {
				Ok(stats) => self.statistics(stats),
				Err(e) => self.fail(e),
			},
			Action::ManageRoles => self.manage_roles(library, session).await,
		}
	}

	async fn search(&mut self, library: &Library) -> io::Result<()> {
		self.heading("Search Books")?;
		let Some(title) = self.ask_optional("Title fragment (blank to skip)")? else { return Ok(()) };
		let Some(author) = self.ask_optional("Author fragment (blank to skip)")? else { return Ok(()) };
		let Some(isbn) = self.ask_optional("ISBN fragment (blank to skip)")? else { return Ok(()) };
		if title.is_none() && author.is_none() && isbn.is_none() {
			self.say(Level::Warning, "No search criteria given, listing all books.")?;
		}
		match library.search_books(BookQuery { title, author, isbn }).await {
			Ok(books) if books.is_empty() => self.say(Level::Info, "No books found matching your criteria."),
			Ok(books) => self.books("Search Results", &books),
			Err(e) => self.fail(e),
		}
	}

	async fn borrow(&mut self, library: &Library, session: &Session) -> io::Result<()> {
		self.heading("Borrow Book")?;
		let Some(book_id) = self.ask_number("Enter the ID of the book to borrow")? else { return Ok(()) };
		match library.borrow(session, book_id).await {
			Ok(loan) => self.say(Level::Success, format!(
				"Book ID {book_id} borrowed successfully. Due date: {}", time::fmt_date(loan.due_date),
			)),
			Err(e) => self.fail(e),
		}
	}

	async fn return_loan(&mut self, library: &Library, session: &Session) -> io::Result<()> {
		self.heading("Return Book")?;
		match library.my_loans(session, true).await {
			Ok(loans) if loans.is_empty() => return self.say(Level::Info, "You have no active loans."),
			Ok(loans) => self.loans("Your Active Loans", &loans, false)?,
			Err(e) => return self.fail(e),
		}
		let Some(loan_id) = self.ask_number("Enter the ID of the loan to return")? else { return Ok(()) };
		match library.return_loan(session, loan_id).await {
			Ok(_) => self.say(Level::Success, format!("Book (from loan ID {loan_id}) returned successfully.")),
			Err(e) => self.fail(e),
		}
	}

	async fn add_book(&mut self, library: &Library, session: &Session) -> io::Result<()> {
		// check before prompting so a refused admin is not asked for a whole book
		if let Err(e) = session.require(crate::Gate::Capability(crate::Capability::AddBook)) {
			return self.fail(e);
		}
		self.heading("Add New Book")?;
		let Some(title) = self.ask_required("Enter title")? else { return Ok(()) };
		let Some(author) = self.ask_required("Enter author")? else { return Ok(()) };
		let Some(isbn) = self.ask_optional("Enter ISBN (optional)")? else { return Ok(()) };
		let Some(quantity) = self.ask_number("Enter quantity")? else { return Ok(()) };
		match library.add_book(session, NewBook { title, author, isbn, quantity }).await {
			Ok(book) => self.say(Level::Success, format!("Book '{}' added successfully with ID: {}", book.title, book.book_id)),
			Err(e) => self.fail(e),
		}
	}

	async fn update_book(&mut self, library: &Library, session: &Session) -> io::Result<()> {
		if let Err(e) = session.require(crate::Gate::Capability(crate::Capability::UpdateBook)) {
			return self.fail(e);
		}
		self.heading("Update Book")?;
		let Some(book_id) = self.ask_number("Enter the ID of the book to update")? else { return Ok(()) };
		let current = match library.get_book(book_id).await {
			Ok(book) => book,
			Err(e) => return self.fail(e),
		};
		self.books("Current details", std::slice::from_ref(&current))?;

		let Some(title) = self.ask_optional(&format!("New title (blank keeps '{}')", current.title))? else { return Ok(()) };
		let Some(author) = self.ask_optional(&format!("New author (blank keeps '{}')", current.author))? else { return Ok(()) };
		let Some(isbn) = self.ask_optional("New ISBN (blank keeps current)")? else { return Ok(()) };
		let Some(quantity) = self.ask_optional(&format!("New total quantity (blank keeps {})", current.quantity))? else { return Ok(()) };
		let quantity = match quantity.map(|q| q.parse::<i64>()) {
			None => None,
			Some(Ok(q)) => Some(q),
			Some(Err(_)) => {
				self.say(Level::Warning, "Invalid quantity entered. Keeping original.")?;
				None
			},
		};

		let res = library.update_book(session, book_id, BookChanges { title, author, isbn, quantity }, self).await;
		if let Some(book) = self.outcome(res, &format!("Book ID {book_id} updated successfully."))? {
			self.books("Updated details", &[book])?;
		}
		Ok(())
	}

	async fn delete_book(&mut self, library: &Library, session: &Session) -> io::Result<()> {
		self.heading("Delete Book")?;
		let Some(book_id) = self.ask_number("Enter the ID of the book to delete")? else { return Ok(()) };
		let res = library.delete_book(session, book_id, self).await;
		self.outcome(res, &format!("Book ID {book_id} deleted successfully."))?;
		Ok(())
	}

	async fn add_user(&mut self, library: &Library, session: &Session) -> io::Result<()> {
		if let Err(e) = session.require(crate::Gate::Capability(crate::Capability::AddUser)) {
			return self.fail(e);
		}
		self.heading("Add New User")?;
		let Some(username) = self.ask_required("Enter username for new user")? else { return Ok(()) };
		let Some(password) = self.ask_new_password("Enter password for new user", false)? else { return Ok(()) };
		let roles = if session.is_superadmin() { "'reader', 'admin' or 'superadmin'" } else { "'reader'" };
		let Some(role) = self.ask_required(&format!("Enter role ({roles})"))? else { return Ok(()) };
		let role = match role.parse::<Role>() {
			Ok(role) => role,
			Err(e) => return self.fail(e),
		};
		let Some(phone) = self.ask_optional("Enter phone number (optional)")? else { return Ok(()) };
		match library.add_user(session, NewUser { username: username.clone(), password, role, phone }).await {
			Ok(registered) => {
				if let Some(warning) = registered.phone_warning {
					self.say(Level::Warning, warning)?;
				}
				self.say(Level::Success, format!("User '{username}' registered successfully with ID: {}", registered.user_id))
			},
			Err(e) => self.fail(e),
		}
	}

	async fn update_user(&mut self, library: &Library, session: &Session) -> io::Result<()> {
		if let Err(e) = session.require(crate::Gate::Capability(crate::Capability::UpdateUser)) {
			return self.fail(e);
		}
		self.heading("Update User")?;
		let Some(user_id) = self.ask_number("Enter the ID of the user to update")? else { return Ok(()) };
		let target = match library.get_user(user_id).await {
			Ok(user) => user,
			Err(e) => return self.fail(e),
		};
		self.users(std::slice::from_ref(&target))?;

		let Some(username) = self.ask_optional(&format!("New username (blank keeps '{}')", target.username))? else { return Ok(()) };
		let mut role = None;
		if session.is_superadmin() {
			let Some(input) = self.ask_optional(&format!("New role 'reader' or 'admin' (blank keeps '{}')", target.role))? else { return Ok(()) };
			if let Some(input) = input {
				match input.parse::<Role>() {
					Ok(r) => role = Some(r),
					Err(e) => return self.fail(e),
				}
			}
		}
		let Some(phone) = self.ask_optional("New phone (blank keeps current, '-' clears)")? else { return Ok(()) };
		let phone = match phone {
			None => None,
			Some(p) if p == "-" => Some(None),
			Some(p) => Some(Some(p)),
		};

		let res = library.update_user(session, user_id, UserChanges { username, role, phone }, self).await;
		if let Some(user) = self.outcome(res, &format!("User ID {user_id} updated successfully."))? {
			self.users(&[user])?;
		}
		Ok(())
	}

	async fn delete_user(&mut self, library: &Library, session: &Session) -> io::Result<()> {
		self.heading("Delete User")?;
		let Some(user_id) = self.ask_number("Enter the ID of the user to delete")? else { return Ok(()) };
		let res = library.delete_user(session, user_id, self).await;
		self.outcome(res, &format!("User ID {user_id} deleted successfully."))?;
		Ok(())
	}

	async fn manage_roles(&mut self, library: &Library, session: &Session) -> io::Result<()> {
		self.heading("Manage User Roles & Permissions")?;
		writeln!(self.out, "1. Change role (clears permissions)\n2. Set admin permissions\n3. Set role and permissions\n0. Back")?;
		let Some(choice) = self.ask("Enter your choice")? else { return Ok(()) };
		if !matches!(choice.as_str(), "1" | "2" | "3") {
			return Ok(());
		}
		let Some(user_id) = self.ask_number("Enter the ID of the user to modify")? else { return Ok(()) };

		let role = if choice == "2" {
			Role::Admin
		} else {
			let Some(input) = self.ask_required("Enter new role ('reader' or 'admin')")? else { return Ok(()) };
			match input.parse::<Role>() {
				Ok(role) => role,
				Err(e) => return self.fail(e),
			}
		};
		let mut permissions = Capabilities::empty();
		if choice != "1" && role == Role::Admin {
			let all = crate::Capability::ALL.iter().map(|c| c.as_str()).collect::<Vec<_>>().join(", ");
			self.say(Level::Info, format!("Available permissions: {all}"))?;
			let Some(input) = self.ask("Permissions to assign (comma-separated, blank for none)")? else { return Ok(()) };
			permissions = match Capabilities::parse_strict(&input) {
				Ok(caps) => caps,
				Err(e) => return self.fail(e),
			};
		}

		let res = match choice.as_str() {
			"1" => library.assign_role(session, user_id, role, self).await,
			"2" => library.assign_permissions(session, user_id, permissions, self).await,
			_ => library.assign_role_permissions(session, user_id, role, permissions, self).await,
		};
		if let Some(user) = self.outcome(res, &format!("User ID {user_id} updated."))? {
			self.users(&[user])?;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Cursor;
	use std::sync::{Arc, Mutex};

	use tracing::{Event, Subscriber};
	use tracing_subscriber::layer::{Context, SubscriberExt};
	use tracing_subscriber::registry::LookupSpan;
	use tracing_subscriber::Layer;

	#[test]
	fn menus_follow_the_role_hierarchy() {
		assert!(!READER_MENU.contains(&Action::AddBook));
		assert!(ADMIN_MENU.contains(&Action::DeleteUser));
		assert!(!ADMIN_MENU.contains(&Action::ManageRoles));
		assert!(SUPERADMIN_MENU.contains(&Action::ManageRoles));
	}

	#[test]
	fn confirm_accepts_yes_only() {
		let mut console = Console::new(Cursor::new("yes\nno\nY\n"), Vec::new());
		assert!(console.confirm("a?"));
		assert!(!console.confirm("b?"));
		assert!(console.confirm("c?"));
		assert!(!console.confirm("eof?"));
	}

	#[test]
	fn required_prompt_repeats_on_blank() {
		let mut console = Console::new(Cursor::new("\n  \nDune\n"), Vec::new());
		assert_eq!(console.ask_required("Title").unwrap().as_deref(), Some("Dune"));
		let out = String::from_utf8(console.into_output()).unwrap();
		assert_eq!(out.matches("This field is required.").count(), 2);
	}

	#[test]
	fn scripted_input_is_never_masked() {
		let console = Console::new(Cursor::new(""), Vec::new());
		assert!(!console.masked);
	}

	#[tokio::test]
	async fn bootstraps_superadmin_after_failed_login() {
		let db = crate::sql::open(":memory:").await.unwrap();
		db.schema().await.unwrap();
		let library = Library::new(db, crate::LoanPeriod::default(), "admin");

		// failed login, create admin with one mistyped confirmation, log in, out, exit
		let script = "1\nadmin\nnope\nyes\ns3cret\ntypo\ns3cret\ns3cret\n1\nadmin\ns3cret\n0\n0\n";
		let mut console = Console::new(Cursor::new(script), Vec::new());
		console.run(&library).await.unwrap();
		let out = String::from_utf8(console.into_output()).unwrap();
		assert_eq!(out.matches("Passwords do not match.").count(), 1, "{out}");
		assert!(out.contains("Initial superadmin user 'admin' created."));
		assert!(out.contains("Welcome, admin!"));
		assert!(out.contains("Superadmin Menu (User: admin)"));
		assert!(!out.contains("s3cret"));
		assert!(library.admin_exists().await.unwrap());
	}

	// records, for every event, the names of the spans it was emitted in
	#[derive(Clone, Default)]
	struct Scopes(Arc<Mutex<Vec<Vec<&'static str>>>>);

	impl<S> Layer<S> for Scopes
	where
		S: Subscriber + for<'a> LookupSpan<'a>,
	{
		fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
			let names = ctx.event_scope(event)
				.map(|scope| scope.map(|span| span.name()).collect())
				.unwrap_or_default();
			self.0.lock().unwrap().push(names);
		}
	}

	#[tokio::test]
	async fn session_actions_are_logged_under_the_session_span() {
		let scopes = Scopes::default();
		let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(scopes.clone()));

		let db = crate::sql::open(":memory:").await.unwrap();
		db.schema().await.unwrap();
		let library = Library::new(db, crate::LoanPeriod::default(), "admin");
		let root = Session::new(0, "root", Role::Superadmin, Capabilities::empty());
		library.add_book(&root, NewBook {
			title: "Dune".into(),
			author: "Herbert".into(),
			isbn: None,
			quantity: 1,
		}).await.unwrap();
		library.register_user(NewUser {
			username: "rita".into(),
			password: "pw".into(),
			role: Role::Reader,
			phone: None,
		}).await.unwrap();
		let before = scopes.0.lock().unwrap().len();

		// login, borrow book 1, logout, exit
		let mut console = Console::new(Cursor::new("1\nrita\npw\n3\n1\n0\n0\n"), Vec::new());
		console.run(&library).await.unwrap();
		let out = String::from_utf8(console.into_output()).unwrap();
		assert!(out.contains("borrowed successfully"), "{out}");

		let recorded = scopes.0.lock().unwrap();
		let in_session = recorded[before..].iter().filter(|names| names.contains(&"session")).count();
		assert!(in_session >= 1, "{recorded:?}");
	}

	#[tokio::test]
	async fn scripted_reader_session() {
		let db = crate::sql::open(":memory:").await.unwrap();
		db.schema().await.unwrap();
		let library = Library::new(db, crate::LoanPeriod::default(), "admin");
		library.register_user(NewUser {
			username: "rita".into(),
			password: "pw".into(),
			role: Role::Reader,
			phone: None,
		}).await.unwrap();

		// login, list books, logout, exit
		let script = "1\nrita\npw\n2\n0\n0\n";
		let mut console = Console::new(Cursor::new(script), Vec::new());
		console.run(&library).await.unwrap();
		let out = String::from_utf8(console.into_output()).unwrap();
		assert!(out.contains("Welcome, rita!"), "{out}");
		assert!(out.contains("Reader Menu (User: rita)"));
		assert!(out.contains("No data to display."));
		assert!(out.contains("Goodbye!"));
	}
}
