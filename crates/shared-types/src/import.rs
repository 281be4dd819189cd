use serde::{Deserialize, Serialize};

/// A rejected CSV row. `line` is 1-based and counts the header.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Credentials of an account created by an import. Passwords are only ever
/// returned here, once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct GeneratedCredential {
    pub username: String,
    pub password: String,
    pub display_name: String,
    pub entity_id: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ImportReport {
    pub created: usize,
    pub skipped: usize,
    pub errors: Vec<RowError>,
    pub credentials: Vec<GeneratedCredential>,
}

impl ImportReport {
    pub fn push_error(&mut self, line: usize, message: impl Into<String>) {
        self.errors.push(RowError {
            line,
            message: message.into(),
        });
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
pub struct EntityImportParams {
    #[serde(default)]
    pub create_heads: bool,
}
