use crate::{
    comparator::InternalKeyComparator,
    key::{InternalKey, UserKey},
    metadata::FileMetadata,
};
use std::{cmp::Ordering, sync::Arc};

/// Read-only snapshot of the on-disk organization of files across levels
///
/// Files at level 0 may overlap each other and are ordered newest first
/// (descending file number). Files at deeper levels are pairwise
/// key-disjoint and sorted by key.
///
/// The picker only ever reads a version; the construction helpers exist
/// for the engine (and tests) that assemble snapshots.
pub struct Version {
    icmp: InternalKeyComparator,
    levels: Vec<Vec<Arc<FileMetadata>>>,
}

impl Version {
    /// Creates an empty version with the given amount of levels
    ///
    /// # Panics
    ///
    /// Panics if `num_levels` is 0.
    #[must_use]
    pub fn new(num_levels: usize, icmp: InternalKeyComparator) -> Self {
        assert!(num_levels > 0, "num_levels should be >= 1");

        Self {
            icmp,
            levels: (0..num_levels).map(|_| Vec::new()).collect(),
        }
    }

    /// Returns the amount of levels
    #[must_use]
    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// Returns the files at the given level
    ///
    /// # Panics
    ///
    /// Panics if the level does not exist.
    #[must_use]
    pub fn files(&self, level: usize) -> &[Arc<FileMetadata>] {
        self.levels.get(level).expect("level should exist")
    }

    /// Returns the summed file size of the given level in bytes
    #[must_use]
    pub fn level_size(&self, level: usize) -> u64 {
        self.files(level).iter().map(|f| f.size_bytes).sum()
    }

    /// Inserts a file at the level recorded in its metadata
    pub fn add(&mut self, file: Arc<FileMetadata>) {
        self.insert_into_level(file.level, file);
    }

    /// Inserts a file into the given level, keeping the level's ordering
    ///
    /// # Panics
    ///
    /// Panics if the level does not exist, or if inserting into a level
    /// >= 1 would break key-disjointness.
    pub fn insert_into_level(&mut self, level: usize, file: Arc<FileMetadata>) {
        let icmp = self.icmp.clone();

        let files = self.levels.get_mut(level).expect("level should exist");
        files.push(file);

        if level == 0 {
            files.sort_by(|a, b| b.number.cmp(&a.number));
        } else {
            files.sort_by(|a, b| icmp.cmp(&a.smallest, &b.smallest));

            for pair in files.windows(2) {
                assert!(
                    icmp.cmp(&pair[0].largest, &pair[1].smallest) == Ordering::Less,
                    "files {} and {} overlap at L{level}",
                    pair[0].number,
                    pair[1].number
                );
            }
        }
    }

    /// Collects the files at `level` whose key range overlaps
    /// `[smallest, largest]`, where `None` means open-ended
    ///
    /// Overlap is decided on user keys, bounds inclusive, so two files
    /// that merely share a boundary user key count as overlapping.
    ///
    /// At level 0, where files are not key-disjoint, the search range is
    /// re-expanded until it covers every transitively overlapping file.
    ///
    /// Returns the position of the first overlapping file alongside the
    /// files themselves.
    #[must_use]
    pub fn overlapping_files(
        &self,
        level: usize,
        smallest: Option<&InternalKey>,
        largest: Option<&InternalKey>,
    ) -> (usize, Vec<Arc<FileMetadata>>) {
        let mut begin: Option<UserKey> = smallest.map(|k| k.user_key.clone());
        let mut end: Option<UserKey> = largest.map(|k| k.user_key.clone());

        let files = self.files(level);

        'restart: loop {
            let mut output = Vec::new();
            let mut first_index = 0;

            for (index, file) in files.iter().enumerate() {
                let starts_after_end = end
                    .as_ref()
                    .is_some_and(|e| self.icmp.user_cmp(&file.smallest.user_key, e) == Ordering::Greater);
                let ends_before_begin = begin
                    .as_ref()
                    .is_some_and(|b| self.icmp.user_cmp(&file.largest.user_key, b) == Ordering::Less);

                if starts_after_end || ends_before_begin {
                    continue;
                }

                if output.is_empty() {
                    first_index = index;
                }
                output.push(file.clone());

                if level == 0 {
                    // Level 0 files may overlap each other, so a hit may widen
                    // the range and pull in files that were already skipped
                    if let Some(b) = &begin {
                        if self.icmp.user_cmp(&file.smallest.user_key, b) == Ordering::Less {
                            begin = Some(file.smallest.user_key.clone());
                            continue 'restart;
                        }
                    }
                    if let Some(e) = &end {
                        if self.icmp.user_cmp(&file.largest.user_key, e) == Ordering::Greater {
                            end = Some(file.largest.user_key.clone());
                            continue 'restart;
                        }
                    }
                }
            }

            return (first_index, output);
        }
    }
}
