use tracing::warn;
use uuid::Uuid;

use crate::error::{LibraryError, Result};
use crate::permission::{self, Capabilities, Capability, Gate, Role};
use crate::types::Uid;

/// The logged in actor. Handed to every operation, never mutated.
#[derive(Debug, Clone)]
pub struct Session {
	user_id: Uid,
	username: String,
	role: Role,
	permissions: Capabilities,
	token: Uuid,
}

impl Session {
	pub fn new(user_id: Uid, username: impl Into<String>, role: Role, permissions: Capabilities) -> Self {
		Session {
			user_id,
			username: username.into(),
			role,
			permissions,
			token: Uuid::new_v4(),
		}
	}

	pub fn user_id(&self) -> Uid {
		self.user_id
	}

	pub fn username(&self) -> &str {
		&self.username
	}

	pub fn role(&self) -> Role {
		self.role
	}

	pub fn permissions(&self) -> &Capabilities {
		&self.permissions
	}

	// only used to correlate log lines of one login
	pub fn token(&self) -> Uuid {
		self.token
	}

	pub fn is_superadmin(&self) -> bool {
		self.role == Role::Superadmin
	}

	pub fn can(&self, cap: Capability) -> bool {
		permission::has_capability(self, cap)
	}

	pub fn require(&self, gate: Gate) -> Result<()> {
		if permission::passes(self, gate) {
			Ok(())
		} else {
			warn!(user = %self.username, session = %self.token, %gate, "gate refused");
			Err(LibraryError::PermissionDenied(gate.to_string()))
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn require_reports_the_gate() {
		let admin = Session::new(7, "ana", Role::Admin, Capabilities::parse_lenient("add_book"));
		assert!(admin.require(Gate::Capability(Capability::AddBook)).is_ok());
		let err = admin.require(Gate::Capability(Capability::UpdateBook)).unwrap_err();
		assert_eq!(err.to_string(), "permission denied: requires 'update_book' permission");
		assert!(admin.require(Gate::Superadmin).is_err());
	}

	#[rstest]
	fn sessions_get_distinct_tokens() {
		let a = Session::new(1, "a", Role::Reader, Capabilities::empty());
		let b = Session::new(1, "a", Role::Reader, Capabilities::empty());
		assert_ne!(a.token(), b.token());
		assert!(!a.can(Capability::ViewReports));
	}
}
