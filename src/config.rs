/// Application configuration, parsed from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Base URL of the climate API (no trailing slash).
    pub api_base_url: String,
    /// Map provider access token. `None` disables map rendering.
    pub map_token: Option<String>,
    pub port: u16,
    /// Interval between animation ticks.
    pub playback_interval_ms: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            api_base_url: std::env::var("CLIMATE_API_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string())
                .trim_end_matches('/')
                .to_string(),
            map_token: std::env::var("MAPBOX_TOKEN")
                .ok()
                .filter(|t| !t.trim().is_empty()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .expect("PORT must be a valid u16"),
            playback_interval_ms: parse_interval_ms(
                &std::env::var("PLAYBACK_INTERVAL_MS").unwrap_or_else(|_| "800".to_string()),
            )
            .expect("PLAYBACK_INTERVAL_MS must be a positive number of milliseconds"),
        }
    }
}

/// A tick interval must be at least one millisecond.
fn parse_interval_ms(raw: &str) -> Option<u64> {
    raw.trim().parse().ok().filter(|ms| *ms > 0)
}
