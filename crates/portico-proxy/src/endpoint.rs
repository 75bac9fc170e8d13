use std::time::Duration;

use http::Method;
use url::Url;

use crate::errors::ProxyError;

/// One configured downstream capability: where it lives and how long a
/// call to it may take. Immutable after process start.
#[derive(Clone, Debug)]
pub struct CapabilityEndpoint {
    pub name: String,
    pub base_url: Url,
    pub upstream_path: String,
    pub method: Method,
    pub timeout: Duration,
}

impl CapabilityEndpoint {
    pub fn url_for(&self, path: Option<&str>, query: Option<&str>) -> Result<Url, ProxyError> {
        let path = path.unwrap_or(&self.upstream_path);
        let mut url = self.base_url.join(path).map_err(|err| {
            ProxyError::invalid_request(&format!(
                "capability {}: cannot join path {path}: {err}",
                self.name
            ))
        })?;
        if let Some(query) = query {
            url.set_query(Some(query));
        }
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> CapabilityEndpoint {
        CapabilityEndpoint {
            name: "browser_title".into(),
            base_url: Url::parse("http://127.0.0.1:8200").unwrap(),
            upstream_path: "/title".into(),
            method: Method::GET,
            timeout: Duration::from_secs(60),
        }
    }

    #[test]
    fn url_joins_default_path_and_query() {
        let url = endpoint()
            .url_for(None, Some("url=https%3A%2F%2Fexample.com"))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:8200/title?url=https%3A%2F%2Fexample.com"
        );
    }

    #[test]
    fn url_honors_path_override() {
        let url = endpoint().url_for(Some("/html"), None).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8200/html");
    }
}
