use tracing::{info, warn};

use crate::auth::phone_warning;
use crate::error::{unique_or, LibraryError, Result};
use crate::permission::{Capabilities, Capability, Gate, Role};
use crate::session::Session;
use crate::types::{Confirm, NewUser, Outcome, Registered, Uid, User, UserChanges};
use crate::Library;

const USER_COLUMNS: &str = "user_id, username, role, phone, permissions, created_at";

// admins and superadmins are only ever touched by a superadmin
fn check_hierarchy(session: &Session, target: &User, action: &str) -> Result<()> {
	if target.role.is_staff() && !session.is_superadmin() {
		return Err(LibraryError::denied(format!("only superadmin can {action} admin or superadmin users")));
	}
	Ok(())
}

fn assignable(role: Role) -> Result<Role> {
	match role {
		Role::Reader | Role::Admin => Ok(role),
		Role::Superadmin => Err(LibraryError::invalid("role must be 'reader' or 'admin'")),
	}
}

impl Library {
	pub async fn add_user(&self, session: &Session, new: NewUser) -> Result<Registered> {
		session.require(Gate::Capability(Capability::AddUser))?;
		match new.role {
			Role::Superadmin if !session.is_superadmin() => {
				return Err(LibraryError::denied("only superadmin can create other superadmins"));
			},
			Role::Admin if !session.is_superadmin() => {
				return Err(LibraryError::denied("only superadmin can create admin users"));
			},
			_ => {},
		}
		self.register_user(new).await
	}

	pub async fn get_user(&self, user_id: Uid) -> Result<User> {
		sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ?"))
			.bind(user_id)
			.fetch_optional(self.db.pool())
			.await?
			.ok_or(LibraryError::not_found("user", user_id))
	}

	pub async fn list_users(&self, session: &Session) -> Result<Vec<User>> {
		session.require(Gate::Capability(Capability::ViewReports))?;
		let users = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY username"))
			.fetch_all(self.db.pool())
			.await?;
		Ok(users)
	}

	pub async fn update_user(
		&self,
		session: &Session,
		user_id: Uid,
		changes: UserChanges,
		confirm: &mut impl Confirm,
	) -> Result<Outcome<User>> {
		session.require(Gate::Capability(Capability::UpdateUser))?;
		let target = self.get_user(user_id).await?;
		check_hierarchy(session, &target, "modify")?;
		if target.user_id == session.user_id() && !session.is_superadmin() {
			return Err(LibraryError::denied("admins cannot modify their own account, contact a superadmin"));
		}

		let role = match changes.role {
			Some(role) if role != target.role => {
				if !session.is_superadmin() {
					return Err(LibraryError::denied("only superadmin can change roles"));
				}
				if role == Role::Superadmin {
					return Err(LibraryError::invalid("cannot assign 'superadmin' role via update"));
				}
				// keeps at least the acting superadmin in place
				if target.user_id == session.user_id() {
					return Err(LibraryError::denied("cannot change your own role"));
				}
				role
			},
			_ => target.role,
		};
		let permissions = if role == Role::Reader && target.role != Role::Reader {
			Capabilities::empty()
		} else {
			target.permissions.clone()
		};
		let username = changes.username
			.map(|u| u.trim().to_string())
			.filter(|u| !u.is_empty())
			.unwrap_or_else(|| target.username.clone());
		let phone = match changes.phone {
			None => target.phone.clone(),
			Some(phone) => phone.map(|p| p.trim().to_string()).filter(|p| !p.is_empty()),
		};
		if let Some(warning) = phone.as_deref().and_then(phone_warning) {
			warn!(user_id, "{warning}");
		}

		if !confirm.confirm(&format!("Update user ID {user_id}?")) {
			return Ok(Outcome::Cancelled);
		}
		sqlx::query("UPDATE users SET username = ?, role = ?, phone = ?, permissions = ? WHERE user_id = ?")
			.bind(&username)
			.bind(role.as_str())
			.bind(phone.as_deref())
			.bind(permissions.to_column())
			.bind(user_id)
			.execute(self.db.pool())
			.await
			.map_err(|e| unique_or(e, || format!("username '{username}' already exists")))?;

		info!(user_id, %username, %role, by = %session.username(), "user updated");
		self.get_user(user_id).await.map(Outcome::Done)
	}

	pub async fn delete_user(&self, session: &Session, user_id: Uid, confirm: &mut impl Confirm) -> Result<Outcome<User>> {
		session.require(Gate::Capability(Capability::DeleteUser))?;
		let target = self.get_user(user_id).await?;
		check_hierarchy(session, &target, "delete")?;
		if target.user_id == session.user_id() {
			return Err(LibraryError::denied("cannot delete your own account"));
		}
		let active = || LibraryError::conflict(format!("cannot delete user '{}' with active loans", target.username));
		if self.has_active_loans(user_id).await? {
			return Err(active());
		}
		let question = format!("Delete user '{}' (ID: {user_id})? This is irreversible.", target.username);
		if !confirm.confirm(&question) {
			return Ok(Outcome::Cancelled);
		}

		let res = sqlx::query(
			"DELETE FROM users WHERE user_id = ? \
			AND NOT EXISTS (SELECT 1 FROM loans WHERE user_id = ? AND return_date IS NULL)",
		)
			.bind(user_id)
			.bind(user_id)
			.execute(self.db.pool())
			.await?;
		if res.rows_affected() == 0 {
			return Err(active());
		}
		info!(user_id, username = %target.username, by = %session.username(), "user deleted");
		Ok(Outcome::Done(target))
	}

	/// Changes a role and always clears the permission list.
	pub async fn assign_role(
		&self,
		session: &Session,
		user_id: Uid,
		role: Role,
		confirm: &mut impl Confirm,
	) -> Result<Outcome<User>> {
		session.require(Gate::Superadmin)?;
		let target = self.superadmin_target(user_id).await?;
		let role = assignable(role)?;
		if !confirm.confirm(&format!("Change role for '{}' to '{role}'?", target.username)) {
			return Ok(Outcome::Cancelled);
		}
		self.set_role_permissions(session, user_id, role, &Capabilities::empty()).await.map(Outcome::Done)
	}

	/// Replaces the permission list of an admin.
	pub async fn assign_permissions(
		&self,
		session: &Session,
		user_id: Uid,
		permissions: Capabilities,
		confirm: &mut impl Confirm,
	) -> Result<Outcome<User>> {
		session.require(Gate::Superadmin)?;
		let target = self.get_user(user_id).await?;
		if target.role != Role::Admin {
			return Err(LibraryError::conflict("permissions can only be managed for admin users"));
		}
		let question = format!("Set permissions for '{}' to '{permissions}'?", target.username);
		if !confirm.confirm(&question) {
			return Ok(Outcome::Cancelled);
		}
		self.set_role_permissions(session, user_id, Role::Admin, &permissions).await.map(Outcome::Done)
	}

	/// Role and permissions in one step; readers never keep permissions.
	pub async fn assign_role_permissions(
		&self,
		session: &Session,
		user_id: Uid,
		role: Role,
		permissions: Capabilities,
		confirm: &mut impl Confirm,
	) -> Result<Outcome<User>> {
		session.require(Gate::Superadmin)?;
		let target = self.superadmin_target(user_id).await?;
		let role = assignable(role)?;
		let permissions = if role == Role::Admin { permissions } else { Capabilities::empty() };
		let question = format!("Set role to '{role}' and permissions to '{permissions}' for '{}'?", target.username);
		if !confirm.confirm(&question) {
			return Ok(Outcome::Cancelled);
		}
		self.set_role_permissions(session, user_id, role, &permissions).await.map(Outcome::Done)
	}

	async fn superadmin_target(&self, user_id: Uid) -> Result<User> {
		let target = self.get_user(user_id).await?;
		if target.role == Role::Superadmin {
			return Err(LibraryError::denied("cannot modify superadmin"));
		}
		Ok(target)
	}

	async fn set_role_permissions(&self, session: &Session, user_id: Uid, role: Role, permissions: &Capabilities) -> Result<User> {
		let res = sqlx::query("UPDATE users SET role = ?, permissions = ? WHERE user_id = ?")
			.bind(role.as_str())
			.bind(permissions.to_column())
			.bind(user_id)
			.execute(self.db.pool())
			.await?;
		if res.rows_affected() == 0 {
			return Err(LibraryError::not_found("user", user_id));
		}
		info!(user_id, %role, %permissions, by = %session.username(), "role and permissions set");
		self.get_user(user_id).await
	}

	async fn has_active_loans(&self, user_id: Uid) -> Result<bool> {
		let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM loans WHERE user_id = ? AND return_date IS NULL LIMIT 1")
			.bind(user_id)
			.fetch_optional(self.db.pool())
			.await?;
		Ok(found.is_some())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::NaiveDate;
	use rstest::rstest;

	fn user(user_id: Uid, role: Role) -> User {
		User {
			user_id,
			username: format!("u{user_id}"),
			role,
			phone: None,
			permissions: Capabilities::empty(),
			created_at: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap().and_hms_opt(9, 0, 0).unwrap(),
		}
	}

	#[rstest]
	#[case(Role::Admin, Role::Reader, true)]
	#[case(Role::Admin, Role::Admin, false)]
	#[case(Role::Admin, Role::Superadmin, false)]
	#[case(Role::Superadmin, Role::Admin, true)]
	#[case(Role::Superadmin, Role::Superadmin, true)]
	fn hierarchy(#[case] actor: Role, #[case] target: Role, #[case] allowed: bool) {
		let session = Session::new(1, "actor", actor, Capabilities::empty());
		assert_eq!(check_hierarchy(&session, &user(2, target), "modify").is_ok(), allowed);
	}

	#[rstest]
	fn superadmin_is_never_assignable() {
		assert!(assignable(Role::Superadmin).is_err());
		assert_eq!(assignable(Role::Admin).unwrap(), Role::Admin);
	}
}
