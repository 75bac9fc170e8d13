use std::sync::Arc;
use std::time::Duration;

use http::Method;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::endpoint::CapabilityEndpoint;
use crate::errors::ProxyError;
use crate::registry::{CapabilityRegistry, RegisteredCapability};

/// Per-capability overrides. Unset fields fall back to the built-in
/// defaults below, so a bare environment override of one key (say
/// `CAPABILITIES__CHAT__BASE_URL`) leaves the rest of that capability
/// intact.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct CapabilityConfig {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub route: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub upstream_path: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct CapabilitiesConfig {
    #[serde(default)]
    pub chat: CapabilityConfig,
    #[serde(default)]
    pub ocr: CapabilityConfig,
    #[serde(default)]
    pub browser_title: CapabilityConfig,
    #[serde(default)]
    pub browser_html: CapabilityConfig,
}

struct BuiltinSpec {
    name: &'static str,
    route: &'static str,
    base_url: &'static str,
    upstream_path: &'static str,
    method: Method,
    timeout_ms: u64,
}

fn builtins() -> [BuiltinSpec; 4] {
    [
        BuiltinSpec {
            name: "chat",
            route: "/v1/chat/completions",
            base_url: "http://portico-inference:8000",
            upstream_path: "/v1/chat/completions",
            method: Method::POST,
            timeout_ms: 120_000,
        },
        BuiltinSpec {
            name: "ocr",
            route: "/v1/ocr",
            base_url: "http://portico-ocr:8100",
            upstream_path: "/ocr",
            method: Method::POST,
            timeout_ms: 60_000,
        },
        BuiltinSpec {
            name: "browser_title",
            route: "/v1/browser/title",
            base_url: "http://portico-browser:8200",
            upstream_path: "/title",
            method: Method::GET,
            timeout_ms: 60_000,
        },
        BuiltinSpec {
            name: "browser_html",
            route: "/v1/browser/html",
            base_url: "http://portico-browser-html:8300",
            upstream_path: "/html",
            method: Method::GET,
            timeout_ms: 60_000,
        },
    ]
}

impl CapabilitiesConfig {
    /// Merge overrides onto the built-in capability table and index the
    /// result. Disabled capabilities are dropped here and never routable.
    pub fn build_registry(&self) -> Result<CapabilityRegistry, ProxyError> {
        let overrides_by_capability = [
            &self.chat,
            &self.ocr,
            &self.browser_title,
            &self.browser_html,
        ];
        let mut entries = Vec::new();
        for (spec, overrides) in builtins().iter().zip(overrides_by_capability) {
            if !overrides.enabled.unwrap_or(true) {
                continue;
            }

            let base_url = overrides.base_url.as_deref().unwrap_or(spec.base_url);
            let base_url = Url::parse(base_url).map_err(|err| {
                ProxyError::invalid_request(&format!(
                    "capability {}: invalid base_url {base_url}: {err}",
                    spec.name
                ))
            })?;

            let method = match overrides.method.as_deref() {
                None => spec.method.clone(),
                Some(raw) => Method::from_bytes(raw.to_ascii_uppercase().as_bytes()).map_err(
                    |err| {
                        ProxyError::invalid_request(&format!(
                            "capability {}: invalid method {raw}: {err}",
                            spec.name
                        ))
                    },
                )?,
            };

            let endpoint = CapabilityEndpoint {
                name: spec.name.to_string(),
                base_url,
                upstream_path: overrides
                    .upstream_path
                    .clone()
                    .unwrap_or_else(|| spec.upstream_path.to_string()),
                method,
                timeout: Duration::from_millis(
                    overrides.timeout_ms.unwrap_or(spec.timeout_ms),
                ),
            };

            entries.push(RegisteredCapability {
                route: overrides
                    .route
                    .clone()
                    .unwrap_or_else(|| spec.route.to_string()),
                endpoint: Arc::new(endpoint),
            });
        }
        Ok(CapabilityRegistry::new(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_register_all_four_capabilities() {
        let registry = CapabilitiesConfig::default().build_registry().unwrap();
        assert_eq!(registry.entries().len(), 4);

        let chat = registry.lookup_route("/v1/chat/completions").unwrap();
        assert_eq!(chat.name, "chat");
        assert_eq!(chat.timeout, Duration::from_secs(120));
        assert_eq!(chat.method, Method::POST);

        let title = registry.endpoint("browser_title").unwrap();
        assert_eq!(title.upstream_path, "/title");
        assert_eq!(title.method, Method::GET);
    }

    #[test]
    fn overrides_replace_only_set_fields() {
        let config = CapabilitiesConfig {
            chat: CapabilityConfig {
                base_url: Some("http://10.0.0.7:9000".into()),
                timeout_ms: Some(5_000),
                ..CapabilityConfig::default()
            },
            ..CapabilitiesConfig::default()
        };
        let registry = config.build_registry().unwrap();
        let chat = registry.lookup_route("/v1/chat/completions").unwrap();
        assert_eq!(chat.base_url.as_str(), "http://10.0.0.7:9000/");
        assert_eq!(chat.timeout, Duration::from_secs(5));
        assert_eq!(chat.upstream_path, "/v1/chat/completions");
    }

    #[test]
    fn disabled_capability_is_not_routable() {
        let config = CapabilitiesConfig {
            ocr: CapabilityConfig {
                enabled: Some(false),
                ..CapabilityConfig::default()
            },
            ..CapabilitiesConfig::default()
        };
        let registry = config.build_registry().unwrap();
        assert!(registry.lookup_route("/v1/ocr").is_none());
        assert!(registry.endpoint("ocr").is_none());
        assert_eq!(registry.entries().len(), 3);
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let config = CapabilitiesConfig {
            chat: CapabilityConfig {
                base_url: Some("not a url".into()),
                ..CapabilityConfig::default()
            },
            ..CapabilitiesConfig::default()
        };
        assert!(matches!(
            config.build_registry(),
            Err(ProxyError::InvalidRequest { .. })
        ));
    }
}
