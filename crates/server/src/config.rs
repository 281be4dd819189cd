use shared_types::{AppConfig, FeatureFlags};
use std::sync::OnceLock;

static FLAGS: OnceLock<FeatureFlags> = OnceLock::new();

/// Default for `MAX_UPLOAD_BYTES`.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Path to the config file, relative to the working directory.
const CONFIG_PATH: &str = "config.toml";

/// Read `config.toml`, parse feature flags, and store them in the global
/// `OnceLock`. Only the first call has effect.
///
/// If the file is missing or unparseable, all flags default to `false`.
pub fn load_feature_flags() {
    FLAGS.get_or_init(|| match std::fs::read_to_string(CONFIG_PATH) {
        Ok(contents) => {
            let flags = parse_feature_flags(&contents);
            tracing::info!(?flags, "Feature flags loaded from {CONFIG_PATH}");
            flags
        }
        Err(e) => {
            tracing::warn!(error = %e, "{CONFIG_PATH} not found, all optional integrations disabled");
            FeatureFlags::default()
        }
    });
}

/// Parse the `[features]` table. Invalid TOML disables everything.
pub fn parse_feature_flags(contents: &str) -> FeatureFlags {
    match toml::from_str::<AppConfig>(contents) {
        Ok(config) => config.features,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to parse {CONFIG_PATH}, all optional integrations disabled");
            FeatureFlags::default()
        }
    }
}

/// Get the loaded feature flags. Returns all-false defaults if
/// `load_feature_flags()` hasn't been called yet.
pub fn feature_flags() -> &'static FeatureFlags {
    static DEFAULT: FeatureFlags = FeatureFlags {
        mailgun: false,
        whatsapp: false,
        telegram: false,
        s3: false,
        telemetry: false,
    };
    FLAGS.get().unwrap_or(&DEFAULT)
}

/// Parse a numeric env var, falling back to `default` when unset or invalid.
pub fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

pub fn app_name() -> String {
    std::env::var("APP_NAME").unwrap_or_else(|_| "ComuniGov".to_string())
}

pub fn app_base_url() -> String {
    std::env::var("APP_BASE_URL").unwrap_or_else(|_| "http://localhost:8080".to_string())
}
