use crate::options::{Config, HeaderMapExt};
use anyhow::{Context, Result};
use capped_lib::{CapConfig, CappedClient};
use http::HeaderMap;
use std::time::Duration;

/// The library configuration described by the command-line config
pub(crate) fn cap_config(cfg: &Config) -> Result<CapConfig> {
    Ok(CapConfig {
        max_concurrency: Some(cfg.max_concurrency),
        timeout: (cfg.timeout > 0).then(|| Duration::from_secs(cfg.timeout)),
        admission_timeout: cfg.admission_timeout,
        user_agent: Some(cfg.user_agent.clone()),
        insecure: cfg.insecure,
        headers: HeaderMap::from_header_pairs(&cfg.header)?,
    })
}

/// Creates a client according to the command-line config
pub(crate) fn create(cfg: &Config) -> Result<CappedClient> {
    cap_config(cfg)?
        .client()
        .context("Failed to create HTTP client")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::CappedOptions;
    use clap::Parser;
    use pretty_assertions::assert_eq;

    fn config(args: &[&str]) -> Config {
        let args = std::iter::once("capped").chain(args.iter().copied()).chain(["url"]);
        CappedOptions::parse_from(args).config
    }

    #[test]
    fn test_cap_config() {
        let cap = cap_config(&config(&["-c", "3", "-t", "5", "-H", "X-Token: secret"])).unwrap();
        assert_eq!(cap.effective_limit(), Some(3));
        assert_eq!(cap.timeout, Some(Duration::from_secs(5)));
        assert_eq!(cap.headers.get("x-token").unwrap(), "secret");
    }

    #[test]
    fn test_zero_disables_limit_and_timeout() {
        let cap = cap_config(&config(&["-c", "0", "-t", "0"])).unwrap();
        assert_eq!(cap.effective_limit(), None);
        assert_eq!(cap.timeout, None);
    }

    #[test]
    fn test_create() {
        let client = create(&config(&[])).unwrap();
        assert_eq!(client.limit(), Some(128));
        assert_eq!(client.in_flight(), 0);
    }

    #[test]
    fn test_invalid_user_agent() {
        let mut cfg = config(&[]);
        cfg.user_agent = "bad\nagent".to_string();
        assert!(create(&cfg).is_err());
    }
}
