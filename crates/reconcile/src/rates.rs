use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

use settle_core::CurrencyCode;

pub const DEFAULT_CAPACITY: usize = 20_000;

/// Cache key for one historical rate: calendar day plus currency code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateKey {
    pub date: NaiveDate,
    pub currency: CurrencyCode,
}

impl RateKey {
    pub fn new(date: NaiveDate, currency: CurrencyCode) -> Self {
        RateKey { date, currency }
    }

    /// Persisted form, e.g. `2024-03-09:EUR`.
    pub fn cache_key(&self) -> String {
        format!("{}:{}", self.date, self.currency)
    }

    /// Inverse of [`RateKey::cache_key`]; `None` for a malformed stored key.
    pub fn parse(key: &str) -> Option<Self> {
        let (date, code) = key.split_once(':')?;
        if code.is_empty() {
            return None;
        }
        let date = date.parse().ok()?;
        Some(RateKey {
            date,
            currency: CurrencyCode::new(code),
        })
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RateError {
    /// The matching engine asked for a rate the pre-warm pass never supplied.
    /// A caller sequencing bug; never silently defaulted.
    #[error("rate for {currency} on {date} was not pre-warmed")]
    NotCached {
        date: NaiveDate,
        currency: CurrencyCode,
    },
    /// The upstream has no rate for this (date, currency) pair.
    #[error("no historical rate available for {currency} on {date}")]
    Unavailable {
        date: NaiveDate,
        currency: CurrencyCode,
    },
}

struct CacheSlot {
    rate: Decimal,
    last_used: u64,
}

/// In-memory historical-rate store with a least-recently-used bound.
///
/// The matching engine only reads through [`RateCache::resolve`], which
/// fails on a miss instead of fetching; callers pre-warm every distinct
/// (day, currency) pair beforehand so the match pass performs no I/O.
pub struct RateCache {
    slots: HashMap<RateKey, CacheSlot>,
    clock: u64,
    capacity: usize,
}

impl RateCache {
    pub fn new(capacity: usize) -> Self {
        RateCache {
            slots: HashMap::new(),
            clock: 0,
            capacity: capacity.max(1),
        }
    }

    /// Rebuilds a cache from a persisted snapshot, least-recently-used
    /// first, so a reloaded cache evicts in the same order it would have.
    pub fn with_entries(
        capacity: usize,
        entries: impl IntoIterator<Item = (RateKey, Decimal)>,
    ) -> Self {
        let mut cache = RateCache::new(capacity);
        for (key, rate) in entries {
            cache.insert(key, rate);
        }
        cache
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, key: &RateKey) -> bool {
        self.slots.contains_key(key)
    }

    /// Inserts or refreshes a rate, evicting the least-recently-used entry
    /// when the cache is full.
    pub fn insert(&mut self, key: RateKey, rate: Decimal) {
        let tick = self.tick();
        if !self.slots.contains_key(&key) && self.slots.len() >= self.capacity {
            self.evict_one();
        }
        self.slots.insert(key, CacheSlot { rate, last_used: tick });
    }

    /// Cached-only resolution: the rate for `currency` on `date`, or
    /// [`RateError::NotCached`]. Refreshes the entry's recency.
    pub fn resolve(
        &mut self,
        date: NaiveDate,
        currency: &CurrencyCode,
    ) -> Result<Decimal, RateError> {
        let tick = self.tick();
        let key = RateKey::new(date, currency.clone());
        match self.slots.get_mut(&key) {
            Some(slot) => {
                slot.last_used = tick;
                Ok(slot.rate)
            }
            None => Err(RateError::NotCached {
                date,
                currency: currency.clone(),
            }),
        }
    }

    /// The cache contents, least-recently-used first, for persistence.
    pub fn snapshot(&self) -> Vec<(RateKey, Decimal)> {
        let mut entries: Vec<(&RateKey, &CacheSlot)> = self.slots.iter().collect();
        entries.sort_by_key(|(_, slot)| slot.last_used);
        entries
            .into_iter()
            .map(|(key, slot)| (key.clone(), slot.rate))
            .collect()
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn evict_one(&mut self) {
        let oldest = self
            .slots
            .iter()
            .min_by_key(|(_, slot)| slot.last_used)
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            self.slots.remove(&key);
        }
    }
}
