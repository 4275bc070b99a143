//! Runtime configuration for the auth boundary.

use serde::Deserialize;

/// Top-level configuration.
///
/// Loaded by the server binary from a JSON file (`GATEKEEPER_CONFIG`); every
/// field has a default matching the shipped behavior, so an empty object is
/// a valid config.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatekeeperConfig {
    pub url_resolution: UrlResolutionConfig,
    pub cache: CacheConfig,
    /// Fail-open policy for accounts whose identity record exposes no
    /// permission capability at all (`permission_set() == None`). The
    /// upstream behavior is `true` ("landlord can do anything by default");
    /// set to `false` to make every such site fail closed instead.
    pub permissive_fallback: bool,
    /// Optional pepper prepended to passwords before Argon2id verification.
    pub pepper: Option<String>,
    /// Route non-JSON requests are redirected to on auth failure.
    pub login_route: String,
}

impl Default for GatekeeperConfig {
    fn default() -> Self {
        Self {
            url_resolution: UrlResolutionConfig::default(),
            cache: CacheConfig::default(),
            permissive_fallback: true,
            pepper: None,
            login_route: "/login".to_string(),
        }
    }
}

/// Host/path tenant resolution settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UrlResolutionConfig {
    pub enabled: bool,
    pub subdomain_detection: bool,
    pub path_detection: bool,
    /// Host labels that mark a landlord host (resolution stops, no tenant).
    pub landlord_domains: Vec<String>,
    /// Host labels explicitly known to be tenant slugs.
    pub tenant_domains: Vec<String>,
    /// Query parameter consulted as the last resolution step.
    pub tenant_parameter: String,
}

impl Default for UrlResolutionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            subdomain_detection: true,
            path_detection: true,
            landlord_domains: vec!["admin".to_string(), "landlord".to_string()],
            tenant_domains: Vec::new(),
            tenant_parameter: "tenant_slug".to_string(),
        }
    }
}

/// Guard statistics / slug lookup cache settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 300,
        }
    }
}
