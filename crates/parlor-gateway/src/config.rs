//! Gateway client configuration.

/// Default gateway address (the local development gateway).
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8010";

/// Environment variable overriding the gateway base URL.
pub const BASE_URL_ENV: &str = "PARLOR_GATEWAY_URL";

/// Where and how to reach the gateway.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Base URL, without a trailing slash.
    pub base_url: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl GatewayConfig {
    /// Configure an explicit base URL. A trailing slash is normalized away.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            let _ = base_url.pop();
        }
        Self { base_url }
    }

    /// Compiled default overridden by `PARLOR_GATEWAY_URL` when set.
    #[must_use]
    pub fn from_env() -> Self {
        match std::env::var(BASE_URL_ENV) {
            Ok(url) if !url.trim().is_empty() => Self::new(url),
            _ => Self::default(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_normalized() {
        assert_eq!(
            GatewayConfig::new("http://gw:8010/").base_url,
            "http://gw:8010"
        );
        assert_eq!(
            GatewayConfig::new("http://gw:8010///").base_url,
            "http://gw:8010"
        );
    }

    #[test]
    fn default_points_at_local_gateway() {
        assert_eq!(GatewayConfig::default().base_url, DEFAULT_BASE_URL);
    }
}
