//! Name-based lookup

use std::ops::ControlFlow;
use std::sync::Arc;

use super::{CacheValue, CacheView};

/// Entity to display-name function. `None` matches as the empty string.
pub type NameFn<T> = Arc<dyn Fn(&T) -> Option<String> + Send + Sync>;

/// How a name query is compared against an entity's name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameMatch {
    Exact,
    Contains,
    StartsWith,
    EndsWith,
}

impl NameMatch {
    /// Compare `candidate` against `query`
    pub fn matches(self, candidate: &str, query: &str, ignore_case: bool) -> bool {
        if ignore_case {
            let candidate = candidate.to_lowercase();
            let query = query.to_lowercase();
            self.matches_exact_case(&candidate, &query)
        } else {
            self.matches_exact_case(candidate, query)
        }
    }

    fn matches_exact_case(self, candidate: &str, query: &str) -> bool {
        match self {
            NameMatch::Exact => candidate == query,
            NameMatch::Contains => candidate.contains(query),
            NameMatch::StartsWith => candidate.starts_with(query),
            NameMatch::EndsWith => candidate.ends_with(query),
        }
    }
}

/// A view whose entities carry a name
pub trait NamedCacheView<T: CacheValue>: CacheView<T> {
    /// Name of `value`, if it has one
    fn name_of(&self, value: &T) -> Option<String>;
}

/// Name queries available on every [`NamedCacheView`]
pub trait NamedCacheViewExt<T: CacheValue>: NamedCacheView<T> {
    /// Entities whose name equals `name`
    fn find_by_name(&self, name: &str, ignore_case: bool) -> Vec<T> {
        self.find_by_name_into(NameMatch::Exact, name, ignore_case, Vec::new())
    }

    /// Entities whose name contains `name`
    fn find_by_name_contains(&self, name: &str, ignore_case: bool) -> Vec<T> {
        self.find_by_name_into(NameMatch::Contains, name, ignore_case, Vec::new())
    }

    /// Entities whose name starts with `prefix`
    fn find_by_name_starts_with(&self, prefix: &str, ignore_case: bool) -> Vec<T> {
        self.find_by_name_into(NameMatch::StartsWith, prefix, ignore_case, Vec::new())
    }

    /// Entities whose name ends with `suffix`
    fn find_by_name_ends_with(&self, suffix: &str, ignore_case: bool) -> Vec<T> {
        self.find_by_name_into(NameMatch::EndsWith, suffix, ignore_case, Vec::new())
    }

    /// Matching entities appended to a caller-supplied collection
    fn find_by_name_into<C>(
        &self,
        mode: NameMatch,
        name: &str,
        ignore_case: bool,
        mut collection: C,
    ) -> C
    where
        C: Extend<T>,
    {
        let query = if ignore_case {
            name.to_lowercase()
        } else {
            name.to_string()
        };
        let _ = self.visit(&mut |_, v| {
            let candidate = self.name_of(v).unwrap_or_default();
            let hit = if ignore_case {
                mode.matches_exact_case(&candidate.to_lowercase(), &query)
            } else {
                mode.matches_exact_case(&candidate, &query)
            };
            if hit {
                collection.extend(std::iter::once(v.clone()));
            }
            ControlFlow::Continue(())
        });
        collection
    }
}

impl<T: CacheValue, V: NamedCacheView<T> + ?Sized> NamedCacheViewExt<T> for V {}

// =============================================================================
// Tests
// =============================================================================
