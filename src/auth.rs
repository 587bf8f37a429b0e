//! Credential store: password hashing, registration and login.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use tracing::{info, warn};

use crate::error::{unique_or, LibraryError, Result};
use crate::permission::{Capabilities, Role};
use crate::session::Session;
use crate::types::{NewUser, Registered, Uid};
use crate::Library;

pub fn hash_password(password: &str) -> Result<String> {
	let salt = SaltString::generate(&mut OsRng);
	Argon2::default()
		.hash_password(password.as_bytes(), &salt)
		.map(|hash| hash.to_string())
		.map_err(|e| LibraryError::PasswordHash(e.to_string()))
}

pub fn verify_password(stored: &str, provided: &str) -> bool {
	let parsed = match PasswordHash::new(stored) {
		Ok(parsed) => parsed,
		Err(e) => {
			warn!(error = %e, "stored password hash is unreadable");
			return false;
		},
	};
	Argon2::default().verify_password(provided.as_bytes(), &parsed).is_ok()
}

/// Phones are free text; anything but digits only earns a warning.
pub fn phone_warning(phone: &str) -> Option<String> {
	if phone.chars().all(|c| c.is_ascii_digit()) {
		None
	} else {
		Some(format!("phone number '{phone}' should ideally contain only digits"))
	}
}

fn non_blank(value: &str, what: &str) -> Result<()> {
	if value.trim().is_empty() {
		Err(LibraryError::invalid(format!("{what} cannot be empty")))
	} else {
		Ok(())
	}
}

#[derive(sqlx::FromRow)]
struct Credentials {
	user_id: Uid,
	username: String,
	password_hash: String,
	role: String,
	permissions: Option<String>,
}

impl Library {
	/// Inserts a user without any gate; callers decide who may do this.
	pub async fn register_user(&self, new: NewUser) -> Result<Registered> {
		non_blank(&new.username, "username")?;
		non_blank(&new.password, "password")?;
		let username = new.username.trim().to_string();
		let phone = new.phone.map(|p| p.trim().to_string()).filter(|p| !p.is_empty());
		let phone_warning = phone.as_deref().and_then(phone_warning);
		if let Some(warning) = &phone_warning {
			warn!(%username, "{warning}");
		}

		let hash = hash_password(&new.password)?;
		let res = sqlx::query(
			"INSERT INTO users (username, password_hash, role, phone, permissions) VALUES (?, ?, ?, ?, '')",
		)
			.bind(&username)
			.bind(&hash)
			.bind(new.role.as_str())
			.bind(phone.as_deref())
			.execute(self.db.pool())
			.await
			.map_err(|e| unique_or(e, || format!("username '{username}' already exists")))?;

		let user_id = res.last_insert_rowid();
		info!(user_id, %username, role = %new.role, "user registered");
		Ok(Registered { user_id, phone_warning })
	}

	pub async fn login(&self, username: &str, password: &str) -> Result<Session> {
		let row = sqlx::query_as::<_, Credentials>(
			"SELECT user_id, username, password_hash, role, permissions FROM users WHERE username = ?",
		)
			.bind(username.trim())
			.fetch_optional(self.db.pool())
			.await?;

		let Some(row) = row else {
			info!(username, "login for unknown user");
			return Err(LibraryError::InvalidCredentials);
		};
		if !verify_password(&row.password_hash, password) {
			info!(username, "login with wrong password");
			return Err(LibraryError::InvalidCredentials);
		}

		let role: Role = row.role.parse()?;
		let permissions = Capabilities::parse_lenient(row.permissions.as_deref().unwrap_or(""));
		let session = Session::new(row.user_id, row.username, role, permissions);
		info!(user = %session.username(), session = %session.token(), role = %session.role(), "logged in");
		Ok(session)
	}

	pub async fn admin_exists(&self) -> Result<bool> {
		let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM users WHERE username = ?")
			.bind(&self.admin_username)
			.fetch_optional(self.db.pool())
			.await?;
		Ok(found.is_some())
	}

	/// Bootstraps the superadmin account named in the configuration.
	pub async fn create_initial_admin(&self, password: &str) -> Result<Registered> {
		if self.admin_exists().await? {
			return Err(LibraryError::conflict(format!("user '{}' already exists", self.admin_username)));
		}
		self.register_user(NewUser {
			username: self.admin_username.clone(),
			password: password.to_string(),
			role: Role::Superadmin,
			phone: None,
		}).await
	}
}
