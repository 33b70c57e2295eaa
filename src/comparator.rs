use crate::key::InternalKey;
use std::{cmp::Ordering, sync::Arc};

/// Total order on user keys, supplied by the engine
///
/// All key comparisons inside the picker, including range overlap and
/// expansion boundary tests, go through the active comparator.
pub trait Comparator {
    /// Compares two user keys
    fn cmp(&self, a: &[u8], b: &[u8]) -> Ordering;
}

/// Byte-lexicographic ordering, the default comparator
#[derive(Copy, Clone, Debug, Default)]
pub struct BytewiseComparator;

impl Comparator for BytewiseComparator {
    fn cmp(&self, a: &[u8], b: &[u8]) -> Ordering {
        a.cmp(b)
    }
}

/// Orders internal keys by user key (ascending), then by sequence number
/// (descending)
///
/// Newer versions of a key sort before older versions, so a forward scan
/// sees the freshest value first.
#[derive(Clone)]
pub struct InternalKeyComparator {
    user: Arc<dyn Comparator + Send + Sync>,
}

impl Default for InternalKeyComparator {
    fn default() -> Self {
        Self::bytewise()
    }
}

impl InternalKeyComparator {
    /// Creates an internal key comparator on top of a user comparator
    pub fn new(user: Arc<dyn Comparator + Send + Sync>) -> Self {
        Self { user }
    }

    /// Creates an internal key comparator over byte-lexicographic user keys
    #[must_use]
    pub fn bytewise() -> Self {
        Self {
            user: Arc::new(BytewiseComparator),
        }
    }

    /// Compares two internal keys
    #[must_use]
    pub fn cmp(&self, a: &InternalKey, b: &InternalKey) -> Ordering {
        self.user
            .cmp(&a.user_key, &b.user_key)
            .then_with(|| b.seqno.cmp(&a.seqno))
    }

    /// Compares two user keys
    #[must_use]
    pub fn user_cmp(&self, a: &[u8], b: &[u8]) -> Ordering {
        self.user.cmp(a, b)
    }

    /// Whether two user keys are equal under the user comparator
    #[must_use]
    pub fn user_key_eq(&self, a: &[u8], b: &[u8]) -> bool {
        self.user.cmp(a, b) == Ordering::Equal
    }
}
