use shared_types::AppError;

/// Convert a sqlx::Error into an AppError.
pub fn sqlx_to_app_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::RowNotFound => AppError::not_found("Resource not found"),
        sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
            // unique_violation
            Some("23505") => {
                let constraint = db_err.constraint().unwrap_or_default();
                AppError::conflict(unique_violation_message(constraint, db_err.message()))
            }
            // foreign_key_violation
            Some("23503") => AppError::bad_request("Referenced record does not exist"),
            // check_violation
            Some("23514") => AppError::bad_request("Value violates a data constraint"),
            _ => AppError::database(err.to_string()),
        },
        _ => AppError::database(err.to_string()),
    }
}

/// Friendly message for a unique violation, keyed on the constraint name
/// (or the raw message when the driver did not report one).
fn unique_violation_message(constraint: &str, detail: &str) -> &'static str {
    let haystack = if constraint.is_empty() { detail } else { constraint };
    if haystack.contains("username") {
        "This username is already taken"
    } else if haystack.contains("email") {
        "An account with this email already exists"
    } else if haystack.contains("entities_name") {
        "An entity with this name already exists"
    } else if haystack.contains("achievements_code") {
        "A badge with this code already exists"
    } else {
        "A record with this value already exists"
    }
}

/// Extension trait providing `.into_app_error()` on sqlx::Error.
pub trait SqlxErrorExt {
    fn into_app_error(self) -> AppError;
}

impl SqlxErrorExt for sqlx::Error {
    fn into_app_error(self) -> AppError {
        sqlx_to_app_error(self)
    }
}

/// Trait for validating request DTOs before processing.
pub trait ValidateRequest {
    fn validate_request(&self) -> Result<(), AppError>;
}

impl<T: validator::Validate> ValidateRequest for T {
    fn validate_request(&self) -> Result<(), AppError> {
        self.validate().map_err(AppError::from)
    }
}
