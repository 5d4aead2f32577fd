use crate::geocoding::{Coordinates, GeocodeError, Geocoder};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Retry schedule for geocoding requests that time out
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per query, including the first one
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub factor: u32,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(500),
            factor: 2,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let multiplier = self.factor.saturating_pow(retry.saturating_sub(1));
        self.initial_delay
            .saturating_mul(multiplier)
            .min(self.max_delay)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnresolvedReason {
    TimedOut { attempts: u32 },
    /// Every comma-separated suffix of the address was tried
    Exhausted,
}

impl fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnresolvedReason::TimedOut { attempts } => {
                write!(f, "timed out after {} attempts", attempts)
            }
            UnresolvedReason::Exhausted => write!(f, "no match for any part of the address"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("unresolvable address {address:?}: {reason}")]
    Unresolvable {
        address: String,
        reason: UnresolvedReason,
    },
    #[error("geocoding {address:?} failed: {source}")]
    Provider {
        address: String,
        #[source]
        source: GeocodeError,
    },
}

/// Turns free-text addresses into coordinates, falling back to
/// progressively shorter addresses when the provider finds nothing
pub struct Resolver<G> {
    geocoder: G,
    retry: RetryPolicy,
    memo: HashMap<String, Option<Coordinates>>,
}

impl<G: Geocoder> Resolver<G> {
    pub fn new(geocoder: G, retry: RetryPolicy) -> Self {
        Self {
            geocoder,
            retry,
            memo: HashMap::new(),
        }
    }

    pub fn geocoder(&self) -> &G {
        &self.geocoder
    }

    /// Resolves an address, dropping everything up to and including the
    /// first comma after each miss ("Stage 4, Pinewood, UK" -> "Pinewood, UK")
    pub fn resolve(&mut self, address: &str) -> Result<Coordinates, ResolveError> {
        let mut query = address.trim();

        loop {
            if query.is_empty() {
                break;
            }
            if let Some(coords) = self.lookup(query)? {
                return Ok(coords);
            }
            match query.split_once(',') {
                Some((_, rest)) => {
                    let rest = rest.trim_start();
                    log::debug!("No match for {:?}, retrying with {:?}", query, rest);
                    query = rest;
                }
                None => break,
            }
        }

        Err(ResolveError::Unresolvable {
            address: address.to_string(),
            reason: UnresolvedReason::Exhausted,
        })
    }

    fn lookup(&mut self, query: &str) -> Result<Option<Coordinates>, ResolveError> {
        if let Some(cached) = self.memo.get(query) {
            log::debug!("Geocode cache hit for {:?}", query);
            return Ok(*cached);
        }

        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;
        let found = loop {
            match self.geocoder.geocode(query) {
                Ok(found) => break found,
                Err(GeocodeError::Timeout) if attempt < max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    log::warn!(
                        "Geocoding {:?} timed out (attempt {}/{}), retrying in {:?}",
                        query,
                        attempt,
                        max_attempts,
                        delay
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(GeocodeError::Timeout) => {
                    return Err(ResolveError::Unresolvable {
                        address: query.to_string(),
                        reason: UnresolvedReason::TimedOut { attempts: attempt },
                    })
                }
                Err(source) => {
                    return Err(ResolveError::Provider {
                        address: query.to_string(),
                        source,
                    })
                }
            }
        };

        self.memo.insert(query.to_string(), found);
        Ok(found)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Geocoder that answers from a table and records every query
    #[derive(Default)]
    pub(crate) struct ScriptedGeocoder {
        pub known: HashMap<String, Coordinates>,
        /// Errors returned (in order) before answering from the table
        pub failures: VecDeque<GeocodeError>,
        pub queries: Vec<String>,
    }

    impl ScriptedGeocoder {
        pub fn with(places: &[(&str, f64, f64)]) -> Self {
            Self {
                known: places
                    .iter()
                    .map(|(name, lat, lon)| (name.to_string(), Coordinates::new(*lat, *lon)))
                    .collect(),
                ..Default::default()
            }
        }
    }

    impl Geocoder for ScriptedGeocoder {
        fn geocode(&mut self, address: &str) -> Result<Option<Coordinates>, GeocodeError> {
            self.queries.push(address.to_string());
            if let Some(err) = self.failures.pop_front() {
                return Err(err);
            }
            Ok(self.known.get(address).copied())
        }
    }

    fn instant_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_delay: Duration::ZERO,
            factor: 2,
            max_delay: Duration::ZERO,
        }
    }

    #[test]
    fn test_resolve_direct_hit() {
        let geocoder = ScriptedGeocoder::with(&[("Lviv, Ukraine", 49.839683, 24.029717)]);
        let mut resolver = Resolver::new(geocoder, instant_retry(3));

        let coords = resolver.resolve("Lviv, Ukraine").unwrap();
        assert_eq!(coords, Coordinates::new(49.839683, 24.029717));
        assert_eq!(resolver.geocoder().queries, vec!["Lviv, Ukraine"]);
    }

    #[test]
    fn test_resolve_truncates_on_miss() {
        let geocoder = ScriptedGeocoder::with(&[("Toronto, Ontario, Canada", 43.65, -79.38)]);
        let mut resolver = Resolver::new(geocoder, instant_retry(3));

        let coords = resolver
            .resolve("Russell Winkelaar's flat, Toronto, Ontario, Canada")
            .unwrap();
        assert_eq!(coords, Coordinates::new(43.65, -79.38));
        assert_eq!(
            resolver.geocoder().queries,
            vec![
                "Russell Winkelaar's flat, Toronto, Ontario, Canada",
                "Toronto, Ontario, Canada"
            ]
        );
    }

    #[test]
    fn test_resolve_exhausted() {
        let mut resolver = Resolver::new(ScriptedGeocoder::default(), instant_retry(3));

        match resolver.resolve("Nowhere, Atlantis") {
            Err(ResolveError::Unresolvable { address, reason }) => {
                assert_eq!(address, "Nowhere, Atlantis");
                assert_eq!(reason, UnresolvedReason::Exhausted);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(resolver.geocoder().queries, vec!["Nowhere, Atlantis", "Atlantis"]);
    }

    #[test]
    fn test_resolve_empty_address_makes_no_request() {
        let mut resolver = Resolver::new(ScriptedGeocoder::default(), instant_retry(3));
        assert!(resolver.resolve("   ").is_err());
        assert!(resolver.geocoder().queries.is_empty());
    }

    #[test]
    fn test_timeout_retried_then_succeeds() {
        let mut geocoder = ScriptedGeocoder::with(&[("Paris", 48.85, 2.35)]);
        geocoder.failures.push_back(GeocodeError::Timeout);
        geocoder.failures.push_back(GeocodeError::Timeout);
        let mut resolver = Resolver::new(geocoder, instant_retry(3));

        assert_eq!(resolver.resolve("Paris").unwrap(), Coordinates::new(48.85, 2.35));
        assert_eq!(resolver.geocoder().queries.len(), 3);
    }

    #[test]
    fn test_timeout_retries_are_bounded() {
        let mut geocoder = ScriptedGeocoder::with(&[("Paris", 48.85, 2.35)]);
        for _ in 0..10 {
            geocoder.failures.push_back(GeocodeError::Timeout);
        }
        let mut resolver = Resolver::new(geocoder, instant_retry(4));

        match resolver.resolve("Paris") {
            Err(ResolveError::Unresolvable { reason, .. }) => {
                assert_eq!(reason, UnresolvedReason::TimedOut { attempts: 4 });
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(resolver.geocoder().queries.len(), 4);
    }

    #[test]
    fn test_provider_error_is_not_retried() {
        let mut geocoder = ScriptedGeocoder::with(&[("Paris", 48.85, 2.35)]);
        geocoder
            .failures
            .push_back(GeocodeError::Response("bad body".to_string()));
        let mut resolver = Resolver::new(geocoder, instant_retry(4));

        assert!(matches!(
            resolver.resolve("Paris"),
            Err(ResolveError::Provider { .. })
        ));
        assert_eq!(resolver.geocoder().queries.len(), 1);
    }

    #[test]
    fn test_repeated_address_is_memoized() {
        let geocoder = ScriptedGeocoder::with(&[("Rome, Italy", 41.9, 12.5)]);
        let mut resolver = Resolver::new(geocoder, instant_retry(3));

        resolver.resolve("Stage 5, Rome, Italy").unwrap();
        resolver.resolve("Stage 5, Rome, Italy").unwrap();
        resolver.resolve("Rome, Italy").unwrap();
        assert_eq!(
            resolver.geocoder().queries,
            vec!["Stage 5, Rome, Italy", "Rome, Italy"]
        );
    }

    #[test]
    fn test_backoff_schedule() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_delay: Duration::from_millis(500),
            factor: 2,
            max_delay: Duration::from_secs(3),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for(2), Duration::from_secs(1));
        assert_eq!(policy.delay_for(3), Duration::from_secs(2));
        assert_eq!(policy.delay_for(4), Duration::from_secs(3));
        assert_eq!(policy.delay_for(40), Duration::from_secs(3));
    }
}
