use std::fmt;

use serde::{Deserialize, Serialize};

/// Undirected edge identity: the two endpoint keys stored as `(min, max)`.
///
/// Two faces that traverse the same edge in opposite directions produce the
/// same key, which is what makes shared-edge (diagonal) detection work.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeKey<K> {
    lo: K,
    hi: K,
}

impl<K: Ord> EdgeKey<K> {
    pub fn new(a: K, b: K) -> Self {
        if a <= b {
            Self { lo: a, hi: b }
        } else {
            Self { lo: b, hi: a }
        }
    }
}

impl<K> EdgeKey<K> {
    pub fn lo(&self) -> &K {
        &self.lo
    }

    pub fn hi(&self) -> &K {
        &self.hi
    }

    pub fn endpoints(&self) -> (&K, &K) {
        (&self.lo, &self.hi)
    }

    pub fn contains(&self, key: &K) -> bool
    where
        K: PartialEq,
    {
        self.lo == *key || self.hi == *key
    }
}

impl<K: fmt::Display> fmt::Display for EdgeKey<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.lo, self.hi)
    }
}
