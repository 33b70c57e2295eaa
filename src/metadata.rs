use crate::key::InternalKey;

/// Immutable per-file descriptor, as exposed by the version
///
/// Whether a file is currently part of an in-flight compaction is *not*
/// tracked here; the picker keeps that in a side table keyed by file
/// number, so metadata can be shared freely between version snapshots.
#[derive(Clone)]
pub struct FileMetadata {
    /// File number; monotonically increasing, so a larger number means a
    /// more recently flushed or written file
    pub number: u64,

    /// Level the file lives on
    pub level: usize,

    /// Smallest internal key in the file
    pub smallest: InternalKey,

    /// Largest internal key in the file
    pub largest: InternalKey,

    /// File size in bytes
    pub size_bytes: u64,

    /// Index into the configured data paths where the file is stored
    pub path_id: u32,
}

impl std::fmt::Debug for FileMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "f{}@L{}[{:?}..{:?}]:{}",
            self.number, self.level, self.smallest, self.largest, self.size_bytes
        )
    }
}

impl FileMetadata {
    /// Creates a new file descriptor on the default data path
    pub fn new(
        number: u64,
        level: usize,
        smallest: InternalKey,
        largest: InternalKey,
        size_bytes: u64,
    ) -> Self {
        Self {
            number,
            level,
            smallest,
            largest,
            size_bytes,
            path_id: 0,
        }
    }
}

/// Sums the sizes of the given files
#[must_use]
pub(crate) fn total_file_size(files: &[std::sync::Arc<FileMetadata>]) -> u64 {
    files.iter().map(|f| f.size_bytes).sum()
}
