//! Shard Selection Protocol
//!
//! Inside a scheduler array job every shard receives a 1-based index through
//! an environment variable and processes exactly element `index - 1` of each
//! list-valued input. Without the variable (local run, dry-run preview) the
//! shard processes every element in one process.

use std::env;
use std::fmt;
use std::num::NonZeroUsize;

use log::{debug, info};

use crate::error::ShardError;

/// Value the scheduler sets for the shard variable in non-array jobs.
const UNDEFINED: &str = "undefined";

/// 1-based index of one shard in an array job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ShardIndex(NonZeroUsize);

impl ShardIndex {
    /// Returns `None` for zero.
    pub fn new(index: usize) -> Option<Self> {
        NonZeroUsize::new(index).map(Self)
    }

    pub fn get(self) -> usize {
        self.0.get()
    }

    /// Parses the raw variable content. `undefined` (non-array job) and an
    /// empty string mean "no shard".
    pub fn parse(raw: &str) -> Result<Option<Self>, ShardError> {
        let raw = raw.trim();
        if raw.is_empty() || raw == UNDEFINED {
            return Ok(None);
        }
        raw.parse::<usize>()
            .ok()
            .and_then(Self::new)
            .map(Some)
            .ok_or_else(|| ShardError::Invalid(raw.to_string()))
    }

    /// Reads the shard index from the environment variable `var`.
    pub fn from_env(var: &str) -> Result<Option<Self>, ShardError> {
        match env::var(var) {
            Ok(raw) => Self::parse(&raw),
            Err(_) => {
                info!("{} is not set; running every shard in this process", var);
                Ok(None)
            }
        }
    }

    /// Selects element `index - 1`. Indices past the end fail, never wrap.
    pub fn select<'a, T>(self, items: &'a [T]) -> Result<&'a T, ShardError> {
        items.get(self.get() - 1).ok_or(ShardError::OutOfRange {
            index: self.get(),
            len: items.len(),
        })
    }
}

impl fmt::Display for ShardIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Returns the elements this process is responsible for: the selected one
/// under a shard, all of them otherwise.
pub fn scatter<T: Clone>(items: &[T], shard: Option<ShardIndex>) -> Result<Vec<T>, ShardError> {
    match shard {
        Some(index) => {
            debug!("Shard {} of {}", index, items.len());
            Ok(vec![index.select(items)?.clone()])
        }
        None => Ok(items.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples() -> Vec<&'static str> {
        vec!["s1", "s2", "s3", "s4", "s5"]
    }

    #[test]
    fn test_select_is_one_based() {
        let items = samples();
        assert_eq!(ShardIndex::new(3).unwrap().select(&items), Ok(&"s3"));
        assert_eq!(ShardIndex::new(1).unwrap().select(&items), Ok(&"s1"));
    }

    #[test]
    fn test_select_out_of_range_does_not_wrap() {
        let items = samples();
        assert_eq!(
            ShardIndex::new(6).unwrap().select(&items),
            Err(ShardError::OutOfRange { index: 6, len: 5 })
        );
    }

    #[test]
    fn test_zero_is_not_an_index() {
        assert!(ShardIndex::new(0).is_none());
        assert_eq!(ShardIndex::parse("0"), Err(ShardError::Invalid("0".to_string())));
    }

    #[test]
    fn test_parse_variants() {
        assert_eq!(ShardIndex::parse("2"), Ok(ShardIndex::new(2)));
        assert_eq!(ShardIndex::parse(" 4\n"), Ok(ShardIndex::new(4)));
        assert_eq!(ShardIndex::parse("undefined"), Ok(None));
        assert_eq!(ShardIndex::parse(""), Ok(None));
        assert!(ShardIndex::parse("two").is_err());
    }

    #[test]
    fn test_scatter_without_shard_returns_all() {
        let items = samples();
        assert_eq!(scatter(&items, None).unwrap(), items);
    }

    #[test]
    fn test_scatter_with_shard_returns_one() {
        let items = samples();
        assert_eq!(scatter(&items, ShardIndex::new(5)).unwrap(), vec!["s5"]);
        assert!(scatter(&items, ShardIndex::new(9)).is_err());
    }

    #[test]
    fn test_from_env_unset_variable() {
        let result = ShardIndex::from_env("RNASEQDE_TEST_SHARD_VAR_THAT_IS_NEVER_SET");
        assert_eq!(result, Ok(None));
    }
}
