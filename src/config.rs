use clap::Parser;
use std::time::Duration;

use crate::photos::PhotoOptions;

/// Server configuration; every flag can also be set through the environment
#[derive(Debug, Clone, Parser)]
#[command(name = "website", about = "Quotation and sales activity service")]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "QUOTATION_BIND", default_value = "127.0.0.1:3000")]
    pub bind: String,

    /// Timeout for fetching one reference photo, in seconds
    #[arg(long, env = "QUOTATION_PHOTO_TIMEOUT_SECS", default_value_t = 10)]
    pub photo_timeout_secs: u64,

    /// Reference photos fetched in parallel per quotation
    #[arg(long, env = "QUOTATION_PHOTO_CONCURRENCY", default_value_t = 4)]
    pub photo_concurrency: usize,

    /// Do not fetch reference photos at all
    #[arg(long, env = "QUOTATION_SKIP_PHOTOS")]
    pub skip_photos: bool,

    /// Lifetime of cached activity responses, in seconds
    #[arg(long, env = "QUOTATION_CACHE_TTL_SECS", default_value_t = 300)]
    pub cache_ttl_secs: u64,

    /// Buffered change events per feed before slow subscribers start losing events
    #[arg(long, env = "QUOTATION_FEED_CAPACITY", default_value_t = 256)]
    pub feed_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
            photo_timeout_secs: 10,
            photo_concurrency: 4,
            skip_photos: false,
            cache_ttl_secs: 300,
            feed_capacity: 256,
        }
    }
}

impl Config {
    pub fn photo_timeout(&self) -> Duration {
        Duration::from_secs(self.photo_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn photo_options(&self) -> PhotoOptions {
        PhotoOptions {
            timeout: self.photo_timeout(),
            concurrency: self.photo_concurrency.max(1),
            ..PhotoOptions::default()
        }
    }
}
