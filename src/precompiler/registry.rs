//! Allocation registry shared across one precompilation run

use std::collections::HashSet;

/// Deduplicating set of claimed logical allocation names
///
/// Builtins compiled in isolation cannot see the shared static memory
/// layout of the final program, so each heap-typed local's page is claimed
/// here at most once for the whole run; later matches on the same logical
/// name reuse the already-reserved page. Constructed once per run and
/// threaded by `&mut` through module-then-function-then-instruction order,
/// which keeps the claim order (observable in the artifact) deterministic
/// and the run reentrant.
#[derive(Debug, Default)]
pub struct AllocationRegistry {
    claimed: HashSet<String>,
}

impl AllocationRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a logical name; returns `false` if it was already claimed
    pub fn claim(&mut self, name: &str) -> bool {
        self.claimed.insert(name.to_owned())
    }

    /// Whether a logical name has been claimed this run
    pub fn is_claimed(&self, name: &str) -> bool {
        self.claimed.contains(name)
    }

    /// Number of claimed names
    pub fn len(&self) -> usize {
        self.claimed.len()
    }

    /// Whether no names have been claimed yet
    pub fn is_empty(&self) -> bool {
        self.claimed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_is_once_only() {
        let mut registry = AllocationRegistry::new();
        assert!(registry.claim("array/at/arr_out"));
        assert!(!registry.claim("array/at/arr_out"));
        assert!(registry.is_claimed("array/at/arr_out"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_distinct_names_are_independent() {
        let mut registry = AllocationRegistry::new();
        assert!(registry.claim("a"));
        assert!(registry.claim("b"));
        assert_eq!(registry.len(), 2);
        assert!(!registry.is_claimed("c"));
    }
}
