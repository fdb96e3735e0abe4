pub mod beneficiary;
pub mod cerfa;
pub mod companies;
pub mod donations;
pub mod individuals;
pub mod structures;

use rusqlite::ErrorCode;

/// True when the database refused a write because of a UNIQUE, FOREIGN KEY or
/// CHECK constraint.
pub(crate) fn is_constraint_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<rusqlite::Error>(),
            Some(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation
        )
    })
}
