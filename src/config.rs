use std::env;

use log::warn;

use crate::{error::SmallError, types::SmallResult};

pub const DEFAULT_PAGE_SIZE: usize = 4096;
pub const DEFAULT_POOL_PAGES: usize = 50;

pub const PAGE_SIZE_ENV: &str = "SMALL_HEAP_PAGE_SIZE";
pub const POOL_PAGES_ENV: &str = "SMALL_HEAP_POOL_PAGES";

/// Process-wide storage parameters. They are fixed once the `Database`
/// is built, changing them after pages have been cached is not
/// supported.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Size of every page in bytes, on disk and in memory.
    pub page_size: usize,

    /// Maximum number of pages resident in the buffer pool.
    pub pool_pages: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            pool_pages: DEFAULT_POOL_PAGES,
        }
    }
}

impl Config {
    pub fn new(page_size: usize, pool_pages: usize) -> Self {
        Self {
            page_size,
            pool_pages,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_pool_pages(mut self, pool_pages: usize) -> Self {
        self.pool_pages = pool_pages;
        self
    }

    /// Read the config from `SMALL_HEAP_PAGE_SIZE` and
    /// `SMALL_HEAP_POOL_PAGES`, missing or unparsable values fall back to
    /// the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str, default: usize| -> usize {
            match lookup(key) {
                None => default,
                Some(raw) => match raw.trim().parse::<usize>() {
                    Ok(v) => v,
                    Err(_) => {
                        warn!("invalid value {:?} for {}, use {} instead", raw, key, default);
                        default
                    }
                },
            }
        };

        Self {
            page_size: read(PAGE_SIZE_ENV, DEFAULT_PAGE_SIZE),
            pool_pages: read(POOL_PAGES_ENV, DEFAULT_POOL_PAGES),
        }
    }

    pub fn validate(&self) -> SmallResult {
        if self.page_size == 0 {
            return Err(SmallError::InvalidConfig(
                "page size must be positive".to_string(),
            ));
        }
        if self.pool_pages == 0 {
            return Err(SmallError::InvalidConfig(
                "buffer pool must hold at least one page".to_string(),
            ));
        }
        Ok(())
    }
}
