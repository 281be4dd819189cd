use axum::Json;

use shared_types::FeatureFlags;

// ---------------------------------------------------------------------------
// GET /api/config/features
// ---------------------------------------------------------------------------

/// Optional integrations enabled in `config.toml`. Public so the dashboard
/// can hide unavailable channels before login.
#[utoipa::path(
    get,
    path = "/api/config/features",
    responses(
        (status = 200, description = "Feature flags", body = FeatureFlags)
    ),
    tag = "config"
)]
pub async fn get_features() -> Json<FeatureFlags> {
    Json(crate::config::feature_flags().clone())
}
