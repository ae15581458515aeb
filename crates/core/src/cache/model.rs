//! Cache domain models: stamps, cached entities, responses and pagination.

use std::cmp::Ordering;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

/// When a cached entry was fetched and until when it is fresh.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStamp {
    pub fetched_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheStamp {
    pub fn new(fetched_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            fetched_at,
            expires_at: fetched_at + ttl,
        }
    }

    /// Fresh iff `now < expires_at`.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// Remaining lifetime, zero once expired.
    pub fn ttl_remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).max(Duration::zero())
    }

    pub fn ttl_remaining_secs(&self, now: DateTime<Utc>) -> u64 {
        u64::try_from(self.ttl_remaining(now).num_seconds()).unwrap_or(0)
    }
}

/// A cached payload with its fetch time.
#[derive(Clone, Debug, PartialEq)]
pub struct CachedEntity<T> {
    pub payload: T,
    pub fetched_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl<T> CachedEntity<T> {
    pub fn new(payload: T, stamp: CacheStamp) -> Self {
        Self {
            payload,
            fetched_at: stamp.fetched_at,
            expires_at: stamp.expires_at,
        }
    }

    pub fn stamp(&self) -> CacheStamp {
        CacheStamp {
            fetched_at: self.fetched_at,
            expires_at: self.expires_at,
        }
    }

    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.stamp().is_fresh(now)
    }
}

/// Where a response was served from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheSource {
    Cache,
    Provider,
}

/// Result of a read-through query.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedResponse<T> {
    pub data: T,
    pub source: CacheSource,
    #[serde(rename = "ttlRemainingSeconds")]
    pub ttl_remaining_secs: u64,
}

impl<T> CachedResponse<T> {
    pub fn from_cache(data: T, stamp: &CacheStamp, now: DateTime<Utc>) -> Self {
        Self {
            data,
            source: CacheSource::Cache,
            ttl_remaining_secs: stamp.ttl_remaining_secs(now),
        }
    }

    pub fn from_provider(data: T, stamp: &CacheStamp) -> Self {
        Self {
            data,
            source: CacheSource::Provider,
            ttl_remaining_secs: stamp.ttl_remaining_secs(stamp.fetched_at),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Pagination, filter and sort for list reads.
///
/// Lists are ordered by their natural key (exchange code, ticker). The filter is a
/// case-insensitive substring match on the key and the name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageParams {
    /// 1-based page number.
    pub page: usize,
    pub page_size: usize,
    pub filter: Option<String>,
    pub sort: SortOrder,
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            filter: None,
            sort: SortOrder::Asc,
        }
    }
}

impl PageParams {
    /// Clamp page and size into range and drop a blank filter.
    pub fn normalized(&self) -> Self {
        Self {
            page: self.page.max(1),
            page_size: self.page_size.clamp(1, MAX_PAGE_SIZE),
            filter: self
                .filter
                .as_deref()
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(str::to_string),
            sort: self.sort,
        }
    }

    /// Rows to skip before this page.
    pub fn offset(&self) -> usize {
        self.page.saturating_sub(1).saturating_mul(self.page_size)
    }

    /// Apply the same filter, sort and window the storage layer applies, in memory.
    ///
    /// `key` returns the natural sort key, `name` the secondary filter field.
    pub fn apply<T>(
        &self,
        items: Vec<T>,
        key: impl Fn(&T) -> &str,
        name: impl Fn(&T) -> &str,
    ) -> Page<T> {
        let params = self.normalized();
        let needle = params.filter.as_deref().map(str::to_ascii_lowercase);

        let mut items: Vec<T> = match needle {
            Some(needle) => items
                .into_iter()
                .filter(|item| {
                    key(item).to_ascii_lowercase().contains(&needle)
                        || name(item).to_ascii_lowercase().contains(&needle)
                })
                .collect(),
            None => items,
        };

        items.sort_by(|a, b| {
            let ordering: Ordering = key(a).cmp(key(b));
            match params.sort {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });

        let total = items.len();
        let items = items
            .into_iter()
            .skip(params.offset())
            .take(params.page_size)
            .collect();

        Page {
            items,
            total,
            page: params.page,
            page_size: params.page_size,
        }
    }
}

/// One page of a list read.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Matching rows across all pages.
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
}

/// What [`MarketCacheStore::delete_all`](super::MarketCacheStore::delete_all) removes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CacheScope {
    Exchanges,
    /// Symbols of one exchange.
    Symbols(String),
    Quotes,
    History,
    Fundamentals,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_freshness_boundary() {
        let stamp = CacheStamp::new(t0(), Duration::hours(24));

        assert!(stamp.is_fresh(t0()));
        assert!(stamp.is_fresh(t0() + Duration::hours(24) - Duration::milliseconds(1)));
        assert!(!stamp.is_fresh(t0() + Duration::hours(24)));
        assert!(!stamp.is_fresh(t0() + Duration::hours(25)));
    }

    #[test]
    fn test_ttl_remaining_saturates() {
        let stamp = CacheStamp::new(t0(), Duration::hours(1));
        assert_eq!(stamp.ttl_remaining_secs(t0()), 3600);
        assert_eq!(stamp.ttl_remaining_secs(t0() + Duration::minutes(59)), 60);
        assert_eq!(stamp.ttl_remaining_secs(t0() + Duration::hours(2)), 0);
    }

    #[test]
    fn test_apply_filters_sorts_and_windows() {
        let items = vec![
            ("VOD", "Vodafone Group"),
            ("BP", "BP plc"),
            ("AZN", "AstraZeneca"),
            ("BARC", "Barclays"),
        ];
        let params = PageParams {
            page: 1,
            page_size: 2,
            filter: None,
            sort: SortOrder::Asc,
        };

        let page = params.apply(items.clone(), |i| i.0, |i| i.1);
        assert_eq!(page.total, 4);
        assert_eq!(page.items, vec![("AZN", "AstraZeneca"), ("BARC", "Barclays")]);

        let params = PageParams {
            page: 1,
            page_size: 10,
            filter: Some(" bar ".to_string()),
            sort: SortOrder::Desc,
        };
        let page = params.apply(items.clone(), |i| i.0, |i| i.1);
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].0, "BARC");

        let params = PageParams {
            page: 3,
            page_size: 2,
            ..Default::default()
        };
        let page = params.apply(items, |i| i.0, |i| i.1);
        assert_eq!(page.total, 4);
        assert!(page.items.is_empty());
    }

    #[test]
    fn test_normalized_clamps() {
        let params = PageParams {
            page: 0,
            page_size: 0,
            filter: Some("   ".to_string()),
            sort: SortOrder::Asc,
        }
        .normalized();
        assert_eq!(params.page, 1);
        assert_eq!(params.page_size, 1);
        assert_eq!(params.filter, None);
        assert_eq!(params.offset(), 0);
    }
}
