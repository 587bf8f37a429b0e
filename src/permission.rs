//! Roles, capabilities and the gate every administrative operation passes.
//!
//! Superadmins hold every capability implicitly, admins hold exactly the
//! capabilities granted to them and readers hold none.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use tracing::warn;

use crate::error::{LibraryError, Result};
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
	Reader,
	Admin,
	Superadmin,
}

impl Role {
	pub fn as_str(self) -> &'static str {
		match self {
			Role::Reader => "reader",
			Role::Admin => "admin",
			Role::Superadmin => "superadmin",
		}
	}

	/// Admins and superadmins can only be touched by a superadmin.
	pub fn is_staff(self) -> bool {
		self >= Role::Admin
	}
}

impl fmt::Display for Role {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Role {
	type Err = LibraryError;
	fn from_str(s: &str) -> Result<Self> {
		match s.trim().to_lowercase().as_str() {
			"reader" => Ok(Role::Reader),
			"admin" => Ok(Role::Admin),
			"superadmin" => Ok(Role::Superadmin),
			other => Err(LibraryError::invalid(format!("unknown role '{other}'"))),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Capability {
	AddBook,
	UpdateBook,
	DeleteBook,
	AddUser,
	UpdateUser,
	DeleteUser,
	ViewReports,
}

impl Capability {
	pub const ALL: [Capability; 7] = [
		Capability::AddBook,
		Capability::UpdateBook,
		Capability::DeleteBook,
		Capability::AddUser,
		Capability::UpdateUser,
		Capability::DeleteUser,
		Capability::ViewReports,
	];

	pub fn as_str(self) -> &'static str {
		match self {
			Capability::AddBook => "add_book",
			Capability::UpdateBook => "update_book",
			Capability::DeleteBook => "delete_book",
			Capability::AddUser => "add_user",
			Capability::UpdateUser => "update_user",
			Capability::DeleteUser => "delete_user",
			Capability::ViewReports => "view_reports",
		}
	}

	fn from_token(token: &str) -> Option<Self> {
		Capability::ALL.into_iter().find(|cap| cap.as_str() == token)
	}
}

impl fmt::Display for Capability {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A set of capabilities, stored as a comma separated list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities(BTreeSet<Capability>);

impl Capabilities {
	pub fn empty() -> Self {
		Capabilities::default()
	}

	/// Parses operator input. Every unknown token is reported in one error.
	pub fn parse_strict(input: &str) -> Result<Self> {
		let mut set = BTreeSet::new();
		let mut unknown = Vec::new();
		for token in tokens(input) {
			match Capability::from_token(token) {
				Some(cap) => { set.insert(cap); },
				None => unknown.push(token),
			}
		}
		if unknown.is_empty() {
			Ok(Capabilities(set))
		} else {
			Err(LibraryError::invalid(format!("invalid permissions: {}", unknown.join(", "))))
		}
	}

	/// Parses a stored column; tokens that no longer exist are dropped.
	pub fn parse_lenient(stored: &str) -> Self {
		let mut set = BTreeSet::new();
		for token in tokens(stored) {
			match Capability::from_token(token) {
				Some(cap) => { set.insert(cap); },
				None => warn!(token, "ignoring unknown stored permission"),
			}
		}
		Capabilities(set)
	}

	pub fn contains(&self, cap: Capability) -> bool {
		self.0.contains(&cap)
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
		self.0.iter().copied()
	}

	/// Canonical stored form: `add_book,view_reports`.
	pub fn to_column(&self) -> String {
		self.iter().map(Capability::as_str).collect::<Vec<_>>().join(",")
	}
}

impl FromIterator<Capability> for Capabilities {
	fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
		Capabilities(iter.into_iter().collect())
	}
}

impl fmt::Display for Capabilities {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		if self.is_empty() {
			return f.write_str("none");
		}
		f.write_str(&self.iter().map(Capability::as_str).collect::<Vec<_>>().join(", "))
	}
}

fn tokens(input: &str) -> impl Iterator<Item = &str> {
	input.split(',').map(str::trim).filter(|t| !t.is_empty())
}

/// What an operation demands of the acting session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
	Capability(Capability),
	Superadmin,
}

impl fmt::Display for Gate {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Gate::Capability(cap) => write!(f, "requires '{cap}' permission"),
			Gate::Superadmin => f.write_str("only superadmin may do this"),
		}
	}
}

pub fn has_capability(session: &Session, cap: Capability) -> bool {
	match session.role() {
		Role::Superadmin => true,
		Role::Admin => session.permissions().contains(cap),
		Role::Reader => false,
	}
}

pub fn passes(session: &Session, gate: Gate) -> bool {
	match gate {
		Gate::Capability(cap) => has_capability(session, cap),
		Gate::Superadmin => session.role() == Role::Superadmin,
	}
}
