//! Service configuration from environment variables.

use std::time::Duration;

use tracing::warn;

use reclaim_infra::blob::ListOptions;
use reclaim_infra::continuation::SoftDeadline;
use reclaim_infra::jobs::DEFAULT_BUCKET;

const DEV_JWT_SECRET: &str = "dev-secret";

/// Runtime configuration.
#[derive(Clone)]
pub struct Config {
    pub bind_addr: String,
    /// Postgres URL; the in-memory job store is used when absent.
    pub database_url: Option<String>,
    /// Storage REST API base URL; the in-memory namespace is used when absent.
    pub storage_url: Option<String>,
    pub storage_key: Option<String>,
    pub service_role_key: Option<String>,
    pub jwt_secret: String,
    /// Where continuations are posted (this service's trigger endpoint).
    pub self_url: String,
    pub soft_deadline: Duration,
    pub page_size: usize,
    pub default_bucket: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_addr = get("RECLAIM_BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string());

        let jwt_secret = get("RECLAIM_JWT_SECRET").unwrap_or_else(|| {
            warn!("RECLAIM_JWT_SECRET not set; using insecure dev default");
            DEV_JWT_SECRET.to_string()
        });

        let self_url = get("RECLAIM_SELF_URL").unwrap_or_else(|| {
            format!("http://{}/process", bind_addr.replace("0.0.0.0", "127.0.0.1"))
        });

        let soft_deadline = parse_or("RECLAIM_SOFT_DEADLINE_MS", get("RECLAIM_SOFT_DEADLINE_MS"))
            .map(Duration::from_millis)
            .unwrap_or(SoftDeadline::DEFAULT_BUDGET);

        let page_size = parse_or::<usize>("RECLAIM_PAGE_SIZE", get("RECLAIM_PAGE_SIZE"))
            .filter(|n| *n > 0)
            .unwrap_or(ListOptions::DEFAULT_PAGE_SIZE);

        Self {
            database_url: get("DATABASE_URL"),
            storage_url: get("RECLAIM_STORAGE_URL"),
            storage_key: get("RECLAIM_STORAGE_KEY"),
            service_role_key: get("RECLAIM_SERVICE_ROLE_KEY"),
            default_bucket: get("RECLAIM_DEFAULT_BUCKET").unwrap_or_else(|| DEFAULT_BUCKET.to_string()),
            bind_addr,
            jwt_secret,
            self_url,
            soft_deadline,
            page_size,
        }
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, value: Option<String>) -> Option<T> {
    let value = value?;
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!(key, value = %value, "unparseable value; using default");
            None
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("Config")
            .field("bind_addr", &self.bind_addr)
            .field("database_url", &redact(&self.database_url))
            .field("storage_url", &self.storage_url)
            .field("storage_key", &redact(&self.storage_key))
            .field("service_role_key", &redact(&self.service_role_key))
            .field("self_url", &self.self_url)
            .field("soft_deadline", &self.soft_deadline)
            .field("page_size", &self.page_size)
            .field("default_bucket", &self.default_bucket)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let c = config(&[]);
        assert_eq!(c.bind_addr, "0.0.0.0:8080");
        assert_eq!(c.self_url, "http://127.0.0.1:8080/process");
        assert_eq!(c.soft_deadline, Duration::from_secs(50));
        assert_eq!(c.page_size, 100);
        assert_eq!(c.default_bucket, "review_images");
        assert!(c.database_url.is_none());
        assert!(c.service_role_key.is_none());
    }

    #[test]
    fn overrides_and_bad_numbers() {
        let c = config(&[
            ("RECLAIM_BIND_ADDR", "127.0.0.1:9000"),
            ("RECLAIM_SOFT_DEADLINE_MS", "1500"),
            ("RECLAIM_PAGE_SIZE", "many"),
            ("RECLAIM_SERVICE_ROLE_KEY", "  "),
            ("RECLAIM_DEFAULT_BUCKET", "avatars"),
        ]);
        assert_eq!(c.self_url, "http://127.0.0.1:9000/process");
        assert_eq!(c.soft_deadline, Duration::from_millis(1500));
        assert_eq!(c.page_size, 100);
        assert!(c.service_role_key.is_none());
        assert_eq!(c.default_bucket, "avatars");
    }

    #[test]
    fn debug_redacts_secrets() {
        let c = config(&[("RECLAIM_SERVICE_ROLE_KEY", "super-secret")]);
        assert!(!format!("{c:?}").contains("super-secret"));
    }
}
