//! URL reachability for `url_reference` claims.

use std::sync::{Mutex, OnceLock};
use std::time::Duration;

use moka::sync::Cache;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use rustc_hash::FxHashMap;
use tracing::debug;

use docdrift_core::config::UrlCheckConfig;

/// Outcome of probing one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlStatus {
    /// 2xx or 3xx.
    Reachable(u16),
    /// 404 or 410.
    Gone(u16),
    /// Any other status, a timeout, or a transport error.
    Inconclusive(String),
    /// The per-domain budget for this run is spent.
    Skipped,
}

pub trait UrlProbe: Send + Sync {
    fn probe(&self, url: &str) -> UrlStatus;
}

pub fn classify(status: u16) -> UrlStatus {
    match status {
        200..=399 => UrlStatus::Reachable(status),
        404 | 410 => UrlStatus::Gone(status),
        other => UrlStatus::Inconclusive(format!("HTTP {other}")),
    }
}

/// Blocking HTTP probe: HEAD, falling back to GET when HEAD is refused.
/// Results are cached per URL; each domain gets `max_per_domain` live
/// requests per probe instance.
pub struct HttpUrlProbe {
    client: OnceLock<Option<Client>>,
    timeout: Duration,
    max_per_domain: usize,
    cache: Cache<String, UrlStatus>,
    per_domain: Mutex<FxHashMap<String, usize>>,
}

impl HttpUrlProbe {
    pub fn new(config: &UrlCheckConfig) -> Self {
        Self {
            client: OnceLock::new(),
            timeout: config.effective_timeout(),
            max_per_domain: config.effective_max_per_domain(),
            cache: Cache::builder()
                .max_capacity(4_096)
                .time_to_live(Duration::from_secs(3_600))
                .build(),
            per_domain: Mutex::new(FxHashMap::default()),
        }
    }

    fn client(&self) -> Option<&Client> {
        self.client
            .get_or_init(|| {
                Client::builder()
                    .timeout(self.timeout)
                    .redirect(reqwest::redirect::Policy::limited(5))
                    .user_agent(concat!("docdrift/", env!("CARGO_PKG_VERSION")))
                    .build()
                    .ok()
            })
            .as_ref()
    }

    /// Reserve one request against the domain budget.
    fn take_budget(&self, domain: &str) -> bool {
        let Ok(mut counts) = self.per_domain.lock() else {
            return false;
        };
        let used = counts.entry(domain.to_string()).or_insert(0);
        if *used >= self.max_per_domain {
            return false;
        }
        *used += 1;
        true
    }

    fn fetch(&self, url: &str) -> UrlStatus {
        let Some(client) = self.client() else {
            return UrlStatus::Inconclusive("http client unavailable".to_string());
        };
        let status = match client.head(url).send() {
            Ok(resp)
                if resp.status() == StatusCode::METHOD_NOT_ALLOWED
                    || resp.status() == StatusCode::NOT_IMPLEMENTED =>
            {
                client.get(url).send().map(|r| r.status())
            }
            other => other.map(|r| r.status()),
        };
        match status {
            Ok(s) => classify(s.as_u16()),
            Err(e) if e.is_timeout() => UrlStatus::Inconclusive("timed out".to_string()),
            Err(e) => UrlStatus::Inconclusive(e.to_string()),
        }
    }
}

impl UrlProbe for HttpUrlProbe {
    fn probe(&self, url: &str) -> UrlStatus {
        if let Some(hit) = self.cache.get(url) {
            return hit;
        }
        let domain = match reqwest::Url::parse(url) {
            Ok(u) => match u.host_str() {
                Some(h) => h.to_ascii_lowercase(),
                None => return UrlStatus::Inconclusive("url has no host".to_string()),
            },
            Err(e) => return UrlStatus::Inconclusive(format!("invalid url: {e}")),
        };
        if !self.take_budget(&domain) {
            debug!(domain = %domain, "url probe budget spent");
            return UrlStatus::Skipped;
        }
        let status = self.fetch(url);
        self.cache.insert(url.to_string(), status.clone());
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_statuses() {
        assert_eq!(classify(200), UrlStatus::Reachable(200));
        assert_eq!(classify(301), UrlStatus::Reachable(301));
        assert_eq!(classify(404), UrlStatus::Gone(404));
        assert_eq!(classify(410), UrlStatus::Gone(410));
        assert!(matches!(classify(500), UrlStatus::Inconclusive(_)));
        assert!(matches!(classify(403), UrlStatus::Inconclusive(_)));
    }

    #[test]
    fn domain_budget_is_enforced() {
        let probe = HttpUrlProbe::new(&UrlCheckConfig {
            max_per_domain: Some(2),
            ..Default::default()
        });
        assert!(probe.take_budget("example.com"));
        assert!(probe.take_budget("example.com"));
        assert!(!probe.take_budget("example.com"));
        assert!(probe.take_budget("other.org"));
    }

    #[test]
    fn malformed_url_is_inconclusive() {
        let probe = HttpUrlProbe::new(&UrlCheckConfig::default());
        assert!(matches!(probe.probe("not a url"), UrlStatus::Inconclusive(_)));
    }
}
