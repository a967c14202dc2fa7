use std::sync::LazyLock;

use dashmap::DashMap;
use tracing::debug;

use crate::ast::ParsedExpression;

static DEFAULT_CACHE: LazyLock<ParseCache> = LazyLock::new(ParseCache::new);

/// A concurrent map from source text to parsed expression.
///
/// Two threads parsing the same source at the same time may both parse it, in
/// which case the last one to finish wins. Both results are equivalent.
#[derive(Debug, Default)]
pub struct ParseCache {
    entries: DashMap<String, ParsedExpression>,
}

impl ParseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide cache used by [`crate::parse`].
    pub fn global() -> &'static ParseCache {
        &DEFAULT_CACHE
    }

    /// Returns the cached expression for `source`, parsing and caching it on a miss.
    pub fn parse(&self, source: &str) -> ParsedExpression {
        if let Some(parsed) = self.entries.get(source) {
            debug!(source, "Parse cache hit");
            return parsed.clone();
        }

        debug!(source, "Parse cache miss");
        let parsed = ParsedExpression::parse(source);
        self.entries.insert(source.to_string(), parsed.clone());
        parsed
    }

    /// Removes the entry for `source`, or every entry if `source` is `None`.
    pub fn clear(&self, source: Option<&str>) {
        match source {
            Some(source) => {
                debug!(source, "Clearing parse cache entry");
                self.entries.remove(source);
            }
            None => {
                debug!(entries = self.entries.len(), "Clearing parse cache");
                self.entries.clear();
            }
        }
    }

    pub fn contains(&self, source: &str) -> bool {
        self.entries.contains_key(source)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn test_parse_is_cached() {
        let cache = ParseCache::new();
        let first = cache.parse("x+1");
        let second = cache.parse("x+1");

        assert_eq!(first, second);
        assert_eq!(first.to_string(), "x + 1");
        assert_eq!(cache.len(), 1);
        assert!(cache.contains("x+1"));
    }

    #[test]
    fn test_errors_are_cached() {
        let cache = ParseCache::new();
        assert!(cache.parse("(1").error().is_some());
        assert!(cache.contains("(1"));
    }

    #[test]
    fn test_clear_one() {
        let cache = ParseCache::new();
        cache.parse("a");
        cache.parse("b");
        cache.clear(Some("a"));

        assert!(!cache.contains("a"));
        assert!(cache.contains("b"));
    }

    #[test]
    fn test_clear_all() {
        let cache = ParseCache::new();
        let before = cache.parse("x+1");
        cache.parse("y");
        cache.clear(None);
        assert!(cache.is_empty());

        let after = cache.parse("x+1");
        assert_eq!(before.to_string(), after.to_string());
        assert_eq!(before.symbols(), after.symbols());
    }

    #[test]
    fn test_concurrent_parse() {
        let cache = Arc::new(ParseCache::new());
        let handles = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for j in 0..50 {
                        cache.parse(&format!("a + {}", (i + j) % 10));
                    }
                })
            })
            .collect::<Vec<_>>();

        for handle in handles {
            handle.join().expect("thread panicked");
        }
        assert_eq!(cache.len(), 10);
    }
}
