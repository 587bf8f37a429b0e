use thiserror::Error;

pub type Result<T> = std::result::Result<T, LibraryError>;

#[derive(Debug, Error)]
pub enum LibraryError {
	#[error("{entity} with ID {id} not found")]
	NotFound { entity: &'static str, id: i64 },

	#[error("permission denied: {0}")]
	PermissionDenied(String),

	#[error("{0}")]
	Conflict(String),

	#[error("book {0} is currently unavailable (all copies loaned out)")]
	Unavailable(i64),

	#[error("invalid input: {0}")]
	InvalidInput(String),

	#[error("{0}")]
	InvalidState(String),

	#[error("invalid username or password")]
	InvalidCredentials,

	#[error("password hashing failed: {0}")]
	PasswordHash(String),

	#[error("database error: {0}")]
	Database(#[from] sqlx::Error),
}

impl LibraryError {
	pub fn not_found(entity: &'static str, id: i64) -> Self {
		LibraryError::NotFound { entity, id }
	}

	pub fn denied(why: impl Into<String>) -> Self {
		LibraryError::PermissionDenied(why.into())
	}

	pub fn conflict(why: impl Into<String>) -> Self {
		LibraryError::Conflict(why.into())
	}

	pub fn invalid(why: impl Into<String>) -> Self {
		LibraryError::InvalidInput(why.into())
	}
}

// unique index hits become Conflict, anything else stays infrastructure
pub(crate) fn unique_or(err: sqlx::Error, conflict: impl FnOnce() -> String) -> LibraryError {
	match &err {
		sqlx::Error::Database(db) if db.is_unique_violation() => LibraryError::Conflict(conflict()),
		_ => LibraryError::Database(err),
	}
}
