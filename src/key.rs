use std::sync::Arc;

/// User defined key
pub type UserKey = Arc<[u8]>;

/// Sequence number, a monotonically increasing counter
///
/// A value with a higher sequence number shadows an item with the
/// same key and lower sequence number.
pub type SeqNo = u64;

/// Value type (regular value or tombstone)
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[allow(clippy::module_name_repetitions)]
pub enum ValueType {
    /// Existing value
    Value,

    /// Deleted value
    Tombstone,
}

impl From<u8> for ValueType {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Value,
            _ => Self::Tombstone,
        }
    }
}

impl From<ValueType> for u8 {
    fn from(value: ValueType) -> Self {
        match value {
            ValueType::Value => 0,
            ValueType::Tombstone => 1,
        }
    }
}

/// Internal key, consisting of a user key, a sequence number and a value type
///
/// Every key comparison inside the picker goes through
/// [`InternalKeyComparator`](crate::comparator::InternalKeyComparator);
/// internal keys deliberately do not implement `Ord` themselves.
#[derive(Clone, Eq, PartialEq)]
pub struct InternalKey {
    /// User-defined key - an arbitrary byte array
    pub user_key: UserKey,

    /// Sequence number
    pub seqno: SeqNo,

    /// Tombstone marker
    pub value_type: ValueType,
}

impl std::fmt::Debug for InternalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            String::from_utf8_lossy(&self.user_key),
            self.seqno,
            u8::from(self.value_type)
        )
    }
}

impl InternalKey {
    /// Creates a new internal key
    pub fn new<K: Into<UserKey>>(user_key: K, seqno: SeqNo, value_type: ValueType) -> Self {
        Self {
            user_key: user_key.into(),
            seqno,
            value_type,
        }
    }

    /// Returns the smallest internal key that sorts strictly after `self`
    ///
    /// Because keys with the same user key are ordered by *descending* seqno,
    /// the successor of a key with a non-zero seqno shares its user key.
    /// At seqno 0 the user key is extended by a zero byte instead; this
    /// assumes the user comparator orders a key before its extensions, like
    /// the bytewise default does.
    #[must_use]
    pub fn successor(&self) -> Self {
        if self.seqno > 0 {
            Self {
                user_key: self.user_key.clone(),
                seqno: self.seqno - 1,
                value_type: self.value_type,
            }
        } else {
            let mut extended = self.user_key.to_vec();
            extended.push(0);

            Self {
                user_key: extended.into(),
                seqno: SeqNo::MAX,
                value_type: self.value_type,
            }
        }
    }
}
