use std::path::PathBuf;

/// Which compaction policy drives the picker
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CompactionStyle {
    /// Size-driven compaction targeting a per-level capacity pyramid
    Leveled,

    /// Size-tiered merges of level 0 runs, bounded by read and space
    /// amplification
    Universal,

    /// Drop the oldest files once a total size budget is exceeded
    Fifo,
}

/// How a universal merge run stops growing
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StopStyle {
    /// The next file is compared against the previous file's size
    SimilarSize,

    /// The next file is compared against the accumulated run size
    TotalSize,
}

/// A data directory with a soft size target
///
/// Output files are placed into the lowest-indexed path that can absorb
/// them; the last path takes the overflow.
#[derive(Clone, Debug)]
pub struct DbPath {
    /// Directory path
    pub path: PathBuf,

    /// Soft size target in bytes
    pub target_bytes: u64,
}

/// Tunables for the universal (size-tiered) policy
#[derive(Clone, Debug)]
pub struct UniversalOptions {
    /// Allowed size slack, in percent, when deciding whether the next run
    /// still belongs to the current merge
    ///
    /// Default = 1
    pub size_ratio: u64,

    /// Minimum amount of runs in a single merge
    ///
    /// Default = 2
    pub min_merge_width: usize,

    /// Maximum amount of runs in a single merge
    ///
    /// Default = unlimited
    pub max_merge_width: usize,

    /// Once all-but-the-newest data exceeds this percentage of the newest
    /// run, everything is merged into the last level
    ///
    /// Default = 200
    pub max_size_amplification_percent: u64,

    /// If the merged run sits within the newest N percent of the data,
    /// its output is left uncompressed; negative disables the heuristic
    ///
    /// Default = -1 (always compress)
    pub compression_size_percent: i64,

    /// How a merge run stops growing
    ///
    /// Default = [`StopStyle::TotalSize`]
    pub stop_style: StopStyle,
}

impl Default for UniversalOptions {
    fn default() -> Self {
        Self {
            size_ratio: 1,
            min_merge_width: 2,
            max_merge_width: usize::MAX,
            max_size_amplification_percent: 200,
            compression_size_percent: -1,
            stop_style: StopStyle::TotalSize,
        }
    }
}

/// Tunables for the FIFO policy
#[derive(Clone, Debug)]
pub struct FifoOptions {
    /// Total file size budget in bytes
    ///
    /// Default = 1 GiB
    pub max_table_files_size: u64,
}

impl Default for FifoOptions {
    fn default() -> Self {
        Self {
            max_table_files_size: 1024 * 1024 * 1024,
        }
    }
}

/// Picker configuration
#[derive(Clone)]
pub struct Options {
    /// Active compaction policy
    ///
    /// Default = [`CompactionStyle::Leveled`]
    pub compaction_style: CompactionStyle,

    /// Amount of levels of the LSM tree (depth of tree)
    ///
    /// Default = 7, like `LevelDB` and `RocksDB`
    pub num_levels: usize,

    /// Amount of level 0 files that triggers compaction
    ///
    /// Default = 4
    pub level0_file_num_compaction_trigger: usize,

    /// Size of a single memtable flush, used to derive the level 0
    /// byte capacity
    ///
    /// Default = 64 MiB
    pub write_buffer_size: u64,

    /// Byte capacity of level 1
    ///
    /// Default = 256 MiB
    pub max_bytes_for_level_base: u64,

    /// Capacity growth factor from one level to the next
    ///
    /// Default = 10
    pub max_bytes_for_level_multiplier: u64,

    /// Optional per-level multiplier overrides; entry `i` scales the
    /// multiplier applied between level `i` and level `i + 1`
    ///
    /// Default = empty (no overrides)
    pub max_bytes_for_level_multiplier_additional: Vec<u64>,

    /// Target size of files written to level 1
    ///
    /// Default = 64 MiB
    pub target_file_size_base: u64,

    /// Target file size growth factor from one level to the next
    ///
    /// Default = 1 (same size on every level)
    pub target_file_size_multiplier: u64,

    /// Bounds, in units of the level's target file size, how much
    /// grandparent data a single output file may overlap
    ///
    /// Default = 10
    pub max_grandparent_overlap_factor: u64,

    /// Bounds, in units of the level's target file size, how large an
    /// expanded input set may grow
    ///
    /// Default = 25
    pub expanded_compaction_factor: u64,

    /// Bounds, in units of the level's target file size, how much data a
    /// manual compaction picks up in one call
    ///
    /// Default = 1
    pub source_compaction_factor: u64,

    /// Universal policy tunables
    pub universal: UniversalOptions,

    /// FIFO policy tunables
    pub fifo: FifoOptions,

    /// Data directories, each with a soft size target; empty means a
    /// single unbounded path
    pub db_paths: Vec<DbPath>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            compaction_style: CompactionStyle::Leveled,
            num_levels: 7,
            level0_file_num_compaction_trigger: 4,
            write_buffer_size: 64 * 1024 * 1024,
            max_bytes_for_level_base: 256 * 1024 * 1024,
            max_bytes_for_level_multiplier: 10,
            max_bytes_for_level_multiplier_additional: Vec::new(),
            target_file_size_base: 64 * 1024 * 1024,
            target_file_size_multiplier: 1,
            max_grandparent_overlap_factor: 10,
            expanded_compaction_factor: 25,
            source_compaction_factor: 1,
            universal: UniversalOptions::default(),
            fifo: FifoOptions::default(),
            db_paths: Vec::new(),
        }
    }
}

impl Options {
    /// Initializes a new options record
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the compaction policy
    #[must_use]
    pub fn compaction_style(mut self, style: CompactionStyle) -> Self {
        self.compaction_style = style;
        self
    }

    /// Sets the amount of levels of the LSM tree (depth of tree)
    ///
    /// # Panics
    ///
    /// Panics if `n` is 0.
    #[must_use]
    pub fn num_levels(mut self, n: usize) -> Self {
        assert!(n > 0);

        self.num_levels = n;
        self
    }

    /// Sets the amount of level 0 files that triggers compaction
    ///
    /// # Panics
    ///
    /// Panics if `n` is 0.
    #[must_use]
    pub fn level0_file_num_compaction_trigger(mut self, n: usize) -> Self {
        assert!(n > 0);

        self.level0_file_num_compaction_trigger = n;
        self
    }

    /// Sets the memtable flush size used to derive the level 0 capacity
    #[must_use]
    pub fn write_buffer_size(mut self, bytes: u64) -> Self {
        self.write_buffer_size = bytes;
        self
    }

    /// Sets the byte capacity of level 1
    #[must_use]
    pub fn max_bytes_for_level_base(mut self, bytes: u64) -> Self {
        self.max_bytes_for_level_base = bytes;
        self
    }

    /// Sets the capacity growth factor between levels
    ///
    /// # Panics
    ///
    /// Panics if `n` is 0.
    #[must_use]
    pub fn max_bytes_for_level_multiplier(mut self, n: u64) -> Self {
        assert!(n > 0);

        self.max_bytes_for_level_multiplier = n;
        self
    }

    /// Sets the target size of files written to level 1
    #[must_use]
    pub fn target_file_size_base(mut self, bytes: u64) -> Self {
        self.target_file_size_base = bytes;
        self
    }

    /// Sets the target file size growth factor between levels
    ///
    /// # Panics
    ///
    /// Panics if `n` is 0.
    #[must_use]
    pub fn target_file_size_multiplier(mut self, n: u64) -> Self {
        assert!(n > 0);

        self.target_file_size_multiplier = n;
        self
    }

    /// Sets the universal policy tunables
    #[must_use]
    pub fn universal(mut self, opts: UniversalOptions) -> Self {
        self.universal = opts;
        self
    }

    /// Sets the FIFO policy tunables
    #[must_use]
    pub fn fifo(mut self, opts: FifoOptions) -> Self {
        self.fifo = opts;
        self
    }

    /// Sets the data directories
    #[must_use]
    pub fn db_paths(mut self, paths: Vec<DbPath>) -> Self {
        self.db_paths = paths;
        self
    }

    /// Returns the byte capacity of the given level
    ///
    /// Level 0 is capped by file count, so its byte capacity is derived
    /// from the trigger and the flush size.
    #[must_use]
    pub fn max_bytes_for_level(&self, level: usize) -> u64 {
        if level == 0 {
            return (self.level0_file_num_compaction_trigger as u64)
                .saturating_mul(self.write_buffer_size);
        }

        let mut bytes = self.max_bytes_for_level_base;

        for step in 1..level {
            let extra = self
                .max_bytes_for_level_multiplier_additional
                .get(step - 1)
                .copied()
                .unwrap_or(1);

            bytes = bytes
                .saturating_mul(self.max_bytes_for_level_multiplier)
                .saturating_mul(extra);
        }

        bytes
    }

    /// Returns the target output file size for the given level
    #[must_use]
    pub fn max_file_size_for_level(&self, level: usize) -> u64 {
        let mut size = self.target_file_size_base;

        for _ in 0..level {
            size = size.saturating_mul(self.target_file_size_multiplier);
        }

        size
    }

    /// Returns how much grandparent data an output file at the given level
    /// may overlap before the executor starts a new file
    #[must_use]
    pub fn max_grandparent_overlap_bytes(&self, level: usize) -> u64 {
        self.max_file_size_for_level(level)
            .saturating_mul(self.max_grandparent_overlap_factor)
    }

    /// Returns the size limit for an expanded input set at the given level
    #[must_use]
    pub fn expanded_compaction_byte_size_limit(&self, level: usize) -> u64 {
        self.max_file_size_for_level(level)
            .saturating_mul(self.expanded_compaction_factor)
    }
}
