//! Exact-duplicate grouping by content hash.
//!
//! Entries are bucketed by size first; an entry with a unique size cannot
//! have a byte-identical twin and never needs hashing.

use std::collections::BTreeMap;

/// Entries sharing one content digest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestGroup<T> {
    /// Hex digest shared by every member
    pub hash: String,
    /// Size of each member in bytes
    pub size: u64,
    /// Members in the order they were supplied
    pub members: Vec<T>,
}

impl<T> DigestGroup<T> {
    /// Bytes that could be reclaimed by keeping a single copy
    pub fn wasted_bytes(&self) -> u64 {
        self.size * (self.members.len().saturating_sub(1) as u64)
    }
}

/// Bucket `(size, entry)` pairs by size, keeping only sizes shared by at
/// least two entries
pub fn size_buckets<T, I>(entries: I) -> BTreeMap<u64, Vec<T>>
where
    I: IntoIterator<Item = (u64, T)>,
{
    let mut by_size: BTreeMap<u64, Vec<T>> = BTreeMap::new();
    for (size, entry) in entries {
        by_size.entry(size).or_default().push(entry);
    }
    by_size.retain(|_, group| group.len() > 1);
    by_size
}

/// Group `(digest, size, entry)` triples into duplicate groups.
///
/// Groups with a single member are dropped. Groups are ordered by digest.
pub fn group_by_digest<T, I>(hashed: I) -> Vec<DigestGroup<T>>
where
    I: IntoIterator<Item = (String, u64, T)>,
{
    let mut groups: BTreeMap<(String, u64), Vec<T>> = BTreeMap::new();
    for (hash, size, entry) in hashed {
        groups.entry((hash, size)).or_default().push(entry);
    }

    groups
        .into_iter()
        .filter(|(_, members)| members.len() > 1)
        .map(|((hash, size), members)| DigestGroup {
            hash,
            size,
            members,
        })
        .collect()
}
