use serde::Deserialize;
use std::{net::IpAddr, num::NonZeroUsize, time::Duration};
use yatube_common::{
    paginator::DEFAULT_PAGE_SIZE,
    snowflake::{ProcessId, WorkerId},
};

/// Process configuration, read from the environment and an optional `.env`.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
pub struct Env {
    pub server_address: IpAddr,
    pub server_port: u16,
    /// Without a database url posts live in memory and vanish on restart.
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default = "default_count_post_page")]
    pub count_post_page: NonZeroUsize,
    #[serde(default = "default_index_cache_seconds")]
    pub index_cache_seconds: u64,
    #[serde(default)]
    pub worker_id: WorkerId,
    #[serde(default)]
    pub process_id: ProcessId,
}

impl Env {
    #[must_use]
    pub fn index_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.index_cache_seconds)
    }
}

fn default_count_post_page() -> NonZeroUsize {
    DEFAULT_PAGE_SIZE
}

fn default_index_cache_seconds() -> u64 {
    20
}

#[cfg(test)]
mod tests {
    use crate::config::Env;
    use std::{net::Ipv4Addr, time::Duration};

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<Env, envy::Error> {
        envy::from_iter(
            pairs
                .iter()
                .map(|(key, value)| ((*key).to_owned(), (*value).to_owned())),
        )
    }

    #[test]
    fn defaults_apply() {
        let env = from_pairs(&[("SERVER_ADDRESS", "127.0.0.1"), ("SERVER_PORT", "8000")]).unwrap();

        assert_eq!(env.server_address, Ipv4Addr::LOCALHOST);
        assert_eq!(env.server_port, 8000);
        assert_eq!(env.database_url, None);
        assert_eq!(env.count_post_page.get(), 10);
        assert_eq!(env.index_cache_ttl(), Duration::from_secs(20));
        assert_eq!(env.worker_id.get(), 0);
    }

    #[test]
    fn overrides_are_read() {
        let env = from_pairs(&[
            ("SERVER_ADDRESS", "0.0.0.0"),
            ("SERVER_PORT", "80"),
            ("COUNT_POST_PAGE", "3"),
            ("INDEX_CACHE_SECONDS", "0"),
            ("WORKER_ID", "7"),
            ("PROCESS_ID", "2"),
        ])
        .unwrap();

        assert_eq!(env.count_post_page.get(), 3);
        assert_eq!(env.index_cache_ttl(), Duration::ZERO);
        assert_eq!(env.worker_id.get(), 7);
        assert_eq!(env.process_id.get(), 2);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(
            from_pairs(&[
                ("SERVER_ADDRESS", "127.0.0.1"),
                ("SERVER_PORT", "8000"),
                ("COUNT_POST_PAGE", "0"),
            ])
            .is_err()
        );
        assert!(
            from_pairs(&[
                ("SERVER_ADDRESS", "127.0.0.1"),
                ("SERVER_PORT", "8000"),
                ("WORKER_ID", "32"),
            ])
            .is_err()
        );
    }
}
