use thiserror::Error;

/// Outcome taxonomy for every store operation. Nothing is swallowed: a
/// caller always sees one of these kinds.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("resource already exists")]
    Conflict,
    #[error("a user with that email already exists")]
    DuplicateEmail,
    #[error("a user with that username already exists")]
    DuplicateUsername,
    #[error("storage fault: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("storage fault: {0}")]
    Internal(String),
}

/// The constraint text of a SQLite constraint violation, if that is what
/// this error is.
pub(crate) fn constraint_message(err: &rusqlite::Error) -> Option<&str> {
    match err {
        rusqlite::Error::SqliteFailure(e, Some(msg))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Some(msg.as_str())
        }
        _ => None,
    }
}

/// Generic constraint mapping for inserts: a pair/key collision is a
/// conflict, a dangling reference is a missing row.
pub(crate) fn map_constraint(err: rusqlite::Error) -> StoreError {
    match constraint_message(&err) {
        Some(msg) if msg.contains("FOREIGN KEY") => StoreError::NotFound,
        Some(_) => StoreError::Conflict,
        None => StoreError::Storage(err),
    }
}

pub(crate) fn not_found_on_no_rows(err: rusqlite::Error) -> StoreError {
    match err {
        rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
        other => StoreError::Storage(other),
    }
}
