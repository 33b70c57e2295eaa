//! Compaction descriptors and the pickers that produce them

pub(crate) mod fifo;
pub(crate) mod leveled;
pub(crate) mod picker;
pub(crate) mod universal;

use crate::metadata::FileMetadata;
use std::sync::Arc;

/// Identifier of a live (in-flight) compaction
pub type CompactionId = u64;

/// How a compaction ended
///
/// The picker releases files identically for both outcomes; discarding
/// half-written outputs after an abort is the executor's concern.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CompactionStatus {
    /// The compaction ran to completion
    Finished,

    /// The executor abandoned the compaction
    Aborted,
}

/// Describes one unit of compaction work for the executor
///
/// Produced by [`CompactionPicker`](crate::CompactionPicker); all input
/// files are marked as being compacted until the executor hands the
/// descriptor back via
/// [`release_compaction_files`](crate::CompactionPicker::release_compaction_files).
pub struct Compaction {
    pub(crate) id: CompactionId,

    pub(crate) input_level: usize,
    pub(crate) output_level: usize,

    /// `inputs[0]` are the files taken from the input level,
    /// `inputs[1]` the overlapping files from the output level
    pub(crate) inputs: [Vec<Arc<FileMetadata>>; 2],

    /// Files at `output_level + 1` overlapping the combined input range;
    /// the executor caps output file size against these
    pub(crate) grandparents: Vec<Arc<FileMetadata>>,

    pub(crate) max_output_file_size: u64,
    pub(crate) max_grandparent_overlap_bytes: u64,

    pub(crate) score: f64,
    pub(crate) output_path_id: u32,
    pub(crate) enable_compression: bool,

    pub(crate) is_manual: bool,
    pub(crate) is_full_compaction: bool,
    pub(crate) is_bottommost_level: bool,
    pub(crate) is_deletion_compaction: bool,
}

impl std::fmt::Debug for Compaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Compaction#{} L{}->L{} ({}+{} files, {} grandparents)",
            self.id,
            self.input_level,
            self.output_level,
            self.inputs[0].len(),
            self.inputs[1].len(),
            self.grandparents.len(),
        )
    }
}

impl Compaction {
    /// Identifier of this compaction
    #[must_use]
    pub fn id(&self) -> CompactionId {
        self.id
    }

    /// Level the input files are taken from
    #[must_use]
    pub fn input_level(&self) -> usize {
        self.input_level
    }

    /// Level the merged output is written to
    #[must_use]
    pub fn output_level(&self) -> usize {
        self.output_level
    }

    /// Input files from the input level (`which = 0`) or the overlapping
    /// files from the output level (`which = 1`)
    ///
    /// # Panics
    ///
    /// Panics if `which` is greater than 1.
    #[must_use]
    pub fn inputs(&self, which: usize) -> &[Arc<FileMetadata>] {
        &self.inputs[which]
    }

    /// Files at `output_level + 1` overlapping the combined input range
    #[must_use]
    pub fn grandparents(&self) -> &[Arc<FileMetadata>] {
        &self.grandparents
    }

    /// Iterates over all input files of both levels
    pub fn all_inputs(&self) -> impl Iterator<Item = &Arc<FileMetadata>> {
        self.inputs[0].iter().chain(self.inputs[1].iter())
    }

    /// Summed size of the input files taken from the input level
    #[must_use]
    pub fn input_size(&self) -> u64 {
        crate::metadata::total_file_size(&self.inputs[0])
    }

    /// Target size of a single output file
    #[must_use]
    pub fn max_output_file_size(&self) -> u64 {
        self.max_output_file_size
    }

    /// Grandparent overlap budget for a single output file
    #[must_use]
    pub fn max_grandparent_overlap_bytes(&self) -> u64 {
        self.max_grandparent_overlap_bytes
    }

    /// Policy-specific priority of this compaction
    #[must_use]
    pub fn score(&self) -> f64 {
        self.score
    }

    /// Index into the configured data paths for the output files
    #[must_use]
    pub fn output_path_id(&self) -> u32 {
        self.output_path_id
    }

    /// Whether the output should be compressed
    #[must_use]
    pub fn enable_compression(&self) -> bool {
        self.enable_compression
    }

    /// Whether this compaction was requested by the user
    #[must_use]
    pub fn is_manual(&self) -> bool {
        self.is_manual
    }

    /// Whether this compaction covers all live files
    #[must_use]
    pub fn is_full_compaction(&self) -> bool {
        self.is_full_compaction
    }

    /// Whether the output lands on the deepest level that holds data,
    /// allowing the executor to drop tombstones
    #[must_use]
    pub fn is_bottommost_level(&self) -> bool {
        self.is_bottommost_level
    }

    /// Whether the input files are simply deleted instead of merged
    #[must_use]
    pub fn is_deletion_compaction(&self) -> bool {
        self.is_deletion_compaction
    }
}
