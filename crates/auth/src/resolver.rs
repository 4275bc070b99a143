//! Tenant resolution from the request's host, path, and parameters.
//!
//! Deterministic order, first match wins: subdomain, then path, then the
//! explicit parameter. A landlord host stops resolution outright. The
//! candidate extraction is a pure function; only the slug lookup touches
//! the store.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;

use gatekeeper_core::{Tenant, TenantStore};

use crate::cache::StatsCache;
use crate::config::UrlResolutionConfig;

/// Host labels never treated as tenant slugs.
pub const RESERVED_SUBDOMAINS: &[&str] = &["www", "api"];

/// First path segments that are system routes, never tenant slugs.
pub const RESERVED_PATH_SEGMENTS: &[&str] = &[
    "api",
    "admin",
    "landlord",
    "auth",
    "login",
    "register",
    "dashboard",
];

/// Where a slug candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateSource {
    Subdomain,
    Path,
    Parameter,
}

/// Outcome of the pure extraction step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    /// The host is a landlord host; resolution stops with no tenant.
    LandlordHost,
    Slug { slug: String, source: CandidateSource },
    None,
}

/// Outcome of full resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Landlord host; never carries a tenant.
    Landlord,
    Tenant(Tenant),
    /// Nothing identified a tenant; the request is unscoped.
    None,
    /// A slug was identified but no active tenant carries it.
    NotFound { slug: String },
}

fn host_without_port(host: &str) -> &str {
    host.rsplit_once(':').map_or(host, |(name, _)| name)
}

/// Extract the winning slug candidate. Pure; no store access.
pub fn extract_candidate(
    host: Option<&str>,
    path: &str,
    params: &BTreeMap<String, String>,
    config: &UrlResolutionConfig,
) -> Candidate {
    if !config.enabled {
        return Candidate::None;
    }

    // 1. Subdomain.
    if config.subdomain_detection {
        if let Some(host) = host.map(host_without_port).filter(|h| !h.is_empty()) {
            let labels: Vec<&str> = host.split('.').collect();
            let first = labels[0];
            if config.landlord_domains.iter().any(|d| d == first) {
                return Candidate::LandlordHost;
            }
            let explicit = config.tenant_domains.iter().any(|d| d == first);
            if explicit || (labels.len() >= 3 && !RESERVED_SUBDOMAINS.contains(&first)) {
                return Candidate::Slug {
                    slug: first.to_string(),
                    source: CandidateSource::Subdomain,
                };
            }
        }
    }

    // 2. Path: `tenant/{slug}`, else a non-reserved first segment.
    if config.path_detection {
        let mut segments = path.trim_start_matches('/').split('/');
        if let Some(first) = segments.next().filter(|s| !s.is_empty()) {
            if first == "tenant" {
                if let Some(slug) = segments.next().filter(|s| !s.is_empty()) {
                    return Candidate::Slug {
                        slug: slug.to_string(),
                        source: CandidateSource::Path,
                    };
                }
            } else if !RESERVED_PATH_SEGMENTS.contains(&first) {
                return Candidate::Slug {
                    slug: first.to_string(),
                    source: CandidateSource::Path,
                };
            }
        }
    }

    // 3. Explicit parameter.
    if let Some(slug) = params
        .get(&config.tenant_parameter)
        .filter(|s| !s.is_empty())
    {
        return Candidate::Slug {
            slug: slug.clone(),
            source: CandidateSource::Parameter,
        };
    }

    Candidate::None
}

/// Resolves tenants for incoming requests.
pub struct TenantResolver {
    tenants: Arc<dyn TenantStore>,
    config: UrlResolutionConfig,
    cache: Arc<StatsCache>,
}

impl TenantResolver {
    pub fn new(
        tenants: Arc<dyn TenantStore>,
        config: UrlResolutionConfig,
        cache: Arc<StatsCache>,
    ) -> Self {
        Self {
            tenants,
            config,
            cache,
        }
    }

    pub async fn resolve(
        &self,
        host: Option<&str>,
        path: &str,
        params: &BTreeMap<String, String>,
    ) -> Resolution {
        match extract_candidate(host, path, params, &self.config) {
            Candidate::LandlordHost => Resolution::Landlord,
            Candidate::None => {
                // A dedicated tenant domain is an exact-host match, tried
                // only once no label/path/parameter claimed the request.
                if let Some(host) = host.map(host_without_port).filter(|h| !h.is_empty()) {
                    if let Ok(tenant) = self.tenants.get_by_domain(host).await {
                        if tenant.is_selectable(Utc::now()) {
                            tracing::debug!(host, tenant = %tenant.slug,
                                "tenant resolved by dedicated domain");
                            return Resolution::Tenant(tenant);
                        }
                    }
                }
                Resolution::None
            }
            Candidate::Slug { slug, source } => self.lookup(&slug, source).await,
        }
    }

    async fn lookup(&self, slug: &str, source: CandidateSource) -> Resolution {
        let cache_key = format!("tenant.slug.{slug}");
        if let Some(cached) = self.cache.get(&cache_key) {
            if let Ok(tenant) = serde_json::from_value::<Tenant>(cached) {
                return Resolution::Tenant(tenant);
            }
        }

        match self.tenants.get_by_slug(slug).await {
            Ok(tenant) if tenant.is_selectable(Utc::now()) => {
                tracing::debug!(slug, source = ?source, tenant_id = %tenant.id,
                    "tenant resolved");
                if let Ok(value) = serde_json::to_value(&tenant) {
                    self.cache.put(cache_key, value);
                }
                Resolution::Tenant(tenant)
            }
            Ok(tenant) => {
                tracing::warn!(slug, status = %tenant.status,
                    "tenant slug matched an inactive tenant");
                Resolution::NotFound {
                    slug: slug.to_string(),
                }
            }
            Err(gatekeeper_core::DomainError::NotFound) => Resolution::NotFound {
                slug: slug.to_string(),
            },
            Err(e) => {
                tracing::warn!(slug, error = %e, "tenant lookup degraded to not-found");
                Resolution::NotFound {
                    slug: slug.to_string(),
                }
            }
        }
    }
}
