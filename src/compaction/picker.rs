use crate::{
    compaction::{Compaction, CompactionId, CompactionStatus},
    comparator::InternalKeyComparator,
    config::{CompactionStyle, Options},
    key::InternalKey,
    metadata::{total_file_size, FileMetadata},
    version::Version,
};
use std::{cmp::Ordering, collections::HashMap, sync::Arc};

/// Picks which files to merge next
///
/// One picker exists per database. The caller is expected to hold the
/// engine's version mutex across [`pick_compaction`](Self::pick_compaction),
/// [`compact_range`](Self::compact_range) and
/// [`release_compaction_files`](Self::release_compaction_files); none of
/// these methods suspend, sleep or perform I/O.
///
/// All picker state is rebuilt from the live [`Version`] plus an empty
/// in-progress set on startup; nothing is persisted.
pub struct CompactionPicker {
    pub(crate) opts: Options,
    pub(crate) icmp: InternalKeyComparator,

    /// Live compactions, per input level
    in_progress: Vec<HashMap<CompactionId, Arc<Compaction>>>,

    /// Which file numbers are input to which live compaction
    ///
    /// Files cannot carry this flag themselves because versions are
    /// shared immutable snapshots.
    pub(crate) busy_files: HashMap<u64, CompactionId>,

    /// Round-robin cursor per level for the leveled policy: the next pick
    /// starts after the previous compaction's end key
    pub(crate) compact_pointer: Vec<Option<InternalKey>>,

    next_id: CompactionId,
}

impl CompactionPicker {
    /// Creates a picker for a database with the given options and comparator
    #[must_use]
    pub fn new(opts: Options, icmp: InternalKeyComparator) -> Self {
        let num_levels = opts.num_levels;

        Self {
            opts,
            icmp,
            in_progress: (0..num_levels).map(|_| HashMap::new()).collect(),
            busy_files: HashMap::new(),
            compact_pointer: (0..num_levels).map(|_| None).collect(),
            next_id: 0,
        }
    }

    /// Returns the active options
    #[must_use]
    pub fn options(&self) -> &Options {
        &self.opts
    }

    /// Returns the active internal key comparator
    #[must_use]
    pub fn comparator(&self) -> &InternalKeyComparator {
        &self.icmp
    }

    /// Returns the deepest level that may serve as a compaction input
    /// under the active policy
    #[must_use]
    pub fn max_input_level(&self) -> usize {
        match self.opts.compaction_style {
            CompactionStyle::Leveled => self.opts.num_levels.saturating_sub(2),
            CompactionStyle::Universal | CompactionStyle::Fifo => 0,
        }
    }

    /// Picks the next compaction, if any work is warranted
    ///
    /// On a successful pick, all input files are marked as being
    /// compacted and the compaction is registered until released.
    ///
    /// # Panics
    ///
    /// Panics if the version's level count does not match the options.
    pub fn pick_compaction(&mut self, version: &Version) -> Option<Arc<Compaction>> {
        assert_eq!(
            version.num_levels(),
            self.opts.num_levels,
            "version level count does not match options"
        );

        match self.opts.compaction_style {
            CompactionStyle::Leveled => self.pick_leveled(version),
            CompactionStyle::Universal => self.pick_universal(version),
            CompactionStyle::Fifo => self.pick_fifo(version),
        }
    }

    /// Builds a compaction for the key range `[begin, end]` at
    /// `input_level`, where `None` means open-ended
    ///
    /// The produced compaction may not cover the whole requested range:
    /// large requests are truncated to bound latency, and key-recency
    /// expansion may widen the inputs past the requested `end`. The
    /// second return value is the resume point for a follow-up call, or
    /// `None` if the request was covered entirely.
    ///
    /// Under the FIFO policy this degenerates to a regular pick,
    /// regardless of the requested range and levels.
    ///
    /// # Errors
    ///
    /// Returns an error if the range is inverted or the levels are out
    /// of bounds.
    pub fn compact_range(
        &mut self,
        version: &Version,
        input_level: usize,
        output_level: usize,
        begin: Option<&InternalKey>,
        end: Option<&InternalKey>,
    ) -> crate::Result<(Option<Arc<Compaction>>, Option<InternalKey>)> {
        if self.opts.compaction_style == CompactionStyle::Fifo {
            return Ok((self.pick_fifo(version), None));
        }

        let num_levels = version.num_levels();

        if input_level >= num_levels {
            return Err(crate::Error::InvalidInputLevel {
                requested: input_level,
                num_levels,
            });
        }
        if output_level >= num_levels || output_level < input_level {
            return Err(crate::Error::InvalidOutputLevel {
                requested: output_level,
                num_levels,
            });
        }
        if let (Some(b), Some(e)) = (begin, end) {
            if self.icmp.cmp(b, e) == Ordering::Greater {
                return Err(crate::Error::InvertedManualRange);
            }
        }

        if input_level == 0 && !self.in_progress[0].is_empty() {
            log::debug!("manual compaction at L0 deferred: L0 is already being compacted");
            return Ok((None, None));
        }

        let (_, mut inputs) = version.overlapping_files(input_level, begin, end);
        if inputs.is_empty() {
            return Ok((None, None));
        }

        // Truncate overly large requests; level 0 files overlap each other,
        // so there the input set cannot be cut without losing key recency
        let mut compaction_end: Option<InternalKey> = None;

        if input_level > 0 {
            let limit = self.opts.expanded_compaction_byte_size_limit(input_level);
            let mut total = 0;
            let mut cut = None;

            for (i, file) in inputs.iter().enumerate() {
                total += file.size_bytes;

                if total > limit && i > 0 {
                    cut = Some(i);
                    break;
                }
            }

            if let Some(i) = cut {
                compaction_end = Some(inputs[i].smallest.clone());
                inputs.truncate(i);
            }
        }

        let Some(expanded) = self.expand_while_overlapping(version, input_level, inputs) else {
            log::debug!("manual compaction at L{input_level} aborted: inputs cannot be expanded");
            return Ok((None, None));
        };

        // Expansion takes precedence over the requested range; if it moved
        // past the range (or the truncation point), the caller resumes
        // after the expanded set instead
        let (_, expanded_largest) = self.get_range(&expanded);

        let reached_cut = compaction_end
            .as_ref()
            .is_some_and(|cut| self.icmp.cmp(&expanded_largest, cut) != Ordering::Less);

        if reached_cut {
            compaction_end = Some(expanded_largest.successor());
        } else if compaction_end.is_none() {
            if let Some(e) = end {
                if self.icmp.cmp(&expanded_largest, e) == Ordering::Greater {
                    compaction_end = Some(expanded_largest.successor());
                }
            }
        }

        let (inputs, sibling_inputs, grandparents) = if output_level > input_level {
            self.setup_other_inputs(version, input_level, output_level, expanded)
        } else {
            (expanded, Vec::new(), Vec::new())
        };

        if self.files_in_compaction(&sibling_inputs) {
            log::debug!("manual compaction at L{input_level} aborted: L{output_level} files are busy");
            return Ok((None, None));
        }

        let input_count = inputs.len() + sibling_inputs.len();
        let live_count = (0..num_levels).map(|l| version.files(l).len()).sum::<usize>();

        let compaction = self.register(Compaction {
            id: 0,
            input_level,
            output_level,
            inputs: [inputs, sibling_inputs],
            grandparents,
            max_output_file_size: self.opts.max_file_size_for_level(output_level),
            max_grandparent_overlap_bytes: self.opts.max_grandparent_overlap_bytes(input_level),
            score: 0.0,
            output_path_id: 0,
            enable_compression: true,
            is_manual: true,
            is_full_compaction: input_count == live_count,
            is_bottommost_level: Self::output_is_bottommost(version, output_level),
            is_deletion_compaction: false,
        });

        log::debug!(
            "picked manual {compaction:?}, resuming at {:?}",
            compaction_end
        );

        Ok((Some(compaction), compaction_end))
    }

    /// Releases the input files of a finished or aborted compaction and
    /// drops it from the in-progress registry
    ///
    /// Idempotent; success and abort release identically.
    pub fn release_compaction_files(&mut self, compaction: &Compaction, status: CompactionStatus) {
        log::trace!("releasing {compaction:?} ({status:?})");

        for file in compaction.all_inputs() {
            if self.busy_files.get(&file.number) == Some(&compaction.id) {
                self.busy_files.remove(&file.number);
            }
        }

        self.in_progress
            .get_mut(compaction.input_level)
            .expect("level should exist")
            .remove(&compaction.id);
    }

    /// Returns the total input bytes of compactions currently running
    /// with the given input level
    #[must_use]
    pub fn size_being_compacted(&self, level: usize) -> u64 {
        self.in_progress
            .get(level)
            .map(|m| m.values().map(|c| c.input_size()).sum())
            .unwrap_or_default()
    }

    /// Amount of live compactions with the given input level
    #[must_use]
    pub fn num_in_flight(&self, level: usize) -> usize {
        self.in_progress.get(level).map(HashMap::len).unwrap_or_default()
    }

    /// Whether the given file is input to a live compaction
    #[must_use]
    pub fn file_in_compaction(&self, file_number: u64) -> bool {
        self.busy_files.contains_key(&file_number)
    }

    // ------------------------------------------------------------------
    // Shared helpers used by all policies

    /// Minimal internal key range covering all entries in `files`
    ///
    /// # Panics
    ///
    /// Panics if `files` is empty.
    pub(crate) fn get_range(&self, files: &[Arc<FileMetadata>]) -> (InternalKey, InternalKey) {
        assert!(!files.is_empty(), "cannot get range of zero files");
        self.fold_range(files.iter())
    }

    /// Minimal internal key range covering all entries in both file lists
    ///
    /// # Panics
    ///
    /// Panics if both lists are empty.
    pub(crate) fn get_range2(
        &self,
        files1: &[Arc<FileMetadata>],
        files2: &[Arc<FileMetadata>],
    ) -> (InternalKey, InternalKey) {
        assert!(
            !(files1.is_empty() && files2.is_empty()),
            "cannot get range of zero files"
        );
        self.fold_range(files1.iter().chain(files2.iter()))
    }

    fn fold_range<'a, I: Iterator<Item = &'a Arc<FileMetadata>>>(
        &self,
        mut files: I,
    ) -> (InternalKey, InternalKey) {
        let first = files.next().expect("files should not be empty");

        let mut smallest = first.smallest.clone();
        let mut largest = first.largest.clone();

        for file in files {
            if self.icmp.cmp(&file.smallest, &smallest) == Ordering::Less {
                smallest = file.smallest.clone();
            }
            if self.icmp.cmp(&file.largest, &largest) == Ordering::Greater {
                largest = file.largest.clone();
            }
        }

        (smallest, largest)
    }

    /// Whether any of the given files is input to a live compaction
    pub(crate) fn files_in_compaction(&self, files: &[Arc<FileMetadata>]) -> bool {
        files.iter().any(|f| self.busy_files.contains_key(&f.number))
    }

    /// Whether any file at `level` overlapping `[smallest, largest]` is
    /// input to a live compaction; also returns the position of the first
    /// overlapping file for the caller's reuse
    pub(crate) fn parent_range_in_compaction(
        &self,
        version: &Version,
        smallest: &InternalKey,
        largest: &InternalKey,
        level: usize,
    ) -> (bool, usize) {
        let (index, files) = version.overlapping_files(level, Some(smallest), Some(largest));
        (self.files_in_compaction(&files), index)
    }

    /// Expands a candidate input set at `level` until no file outside of
    /// it shares a user key with any included file
    ///
    /// If a user key appeared in two files and only one were compacted
    /// down, a later read would find the older copy first and return
    /// stale data.
    ///
    /// Returns `None` if the expanded set would include a file that is
    /// already being compacted, or would exceed the expanded size limit.
    pub(crate) fn expand_while_overlapping(
        &self,
        version: &Version,
        level: usize,
        mut inputs: Vec<Arc<FileMetadata>>,
    ) -> Option<Vec<Arc<FileMetadata>>> {
        if inputs.is_empty() {
            return None;
        }

        loop {
            let old_len = inputs.len();
            let (smallest, largest) = self.get_range(&inputs);

            let (_, expanded) =
                version.overlapping_files(level, Some(&smallest), Some(&largest));

            debug_assert!(expanded.len() >= old_len);

            inputs = expanded;

            if inputs.len() == old_len {
                break;
            }
        }

        if self.files_in_compaction(&inputs) {
            log::trace!("cannot expand inputs at L{level}: file is already being compacted");
            return None;
        }

        let limit = self.opts.expanded_compaction_byte_size_limit(level);
        let total = total_file_size(&inputs);

        if total > limit {
            log::trace!("cannot expand inputs at L{level}: {total} bytes exceed limit of {limit}");
            return None;
        }

        Some(inputs)
    }

    /// Completes a compaction's input sets once `inputs[0]` is fixed
    ///
    /// Collects the overlapping files at the output level, then tries to
    /// grow the input-level set within the combined key range as long as
    /// that does not pull in more output-level files, busy files, or blow
    /// the expanded size limit. Finally collects the grandparent files
    /// the executor needs for output sizing.
    pub(crate) fn setup_other_inputs(
        &self,
        version: &Version,
        input_level: usize,
        output_level: usize,
        inputs: Vec<Arc<FileMetadata>>,
    ) -> (
        Vec<Arc<FileMetadata>>,
        Vec<Arc<FileMetadata>>,
        Vec<Arc<FileMetadata>>,
    ) {
        debug_assert!(output_level > input_level);

        let mut inputs = inputs;

        let (smallest, largest) = self.get_range(&inputs);
        let (_, mut sibling_inputs) =
            version.overlapping_files(output_level, Some(&smallest), Some(&largest));

        if !sibling_inputs.is_empty() {
            let (all_start, all_limit) = self.get_range2(&inputs, &sibling_inputs);

            // Input-level files whose whole range lies inside the combined
            // range cost nothing extra at the output level
            let (_, candidates) =
                version.overlapping_files(input_level, Some(&all_start), Some(&all_limit));

            let grown: Vec<Arc<FileMetadata>> = candidates
                .into_iter()
                .filter(|f| {
                    self.icmp.cmp(&f.smallest, &all_start) != Ordering::Less
                        && self.icmp.cmp(&f.largest, &all_limit) != Ordering::Greater
                })
                .collect();

            let grown_len = grown.len();
            let limit = self.opts.expanded_compaction_byte_size_limit(input_level);

            if grown_len > inputs.len()
                && total_file_size(&grown) + total_file_size(&sibling_inputs) < limit
            {
                // The wider set still has to be closed under user key
                // sharing, and must not touch busy files; a set that needs
                // further expansion would grow the output level after all
                if let Some(closed) = self.expand_while_overlapping(version, input_level, grown) {
                    let (new_start, new_limit) = self.get_range(&closed);
                    let (_, new_siblings) =
                        version.overlapping_files(output_level, Some(&new_start), Some(&new_limit));

                    if closed.len() == grown_len
                        && new_siblings.len() == sibling_inputs.len()
                        && !self.files_in_compaction(&new_siblings)
                    {
                        log::debug!(
                            "growing L{input_level} inputs from {} to {grown_len} files without growing L{output_level}",
                            inputs.len(),
                        );

                        inputs = closed;
                        sibling_inputs = new_siblings;
                    }
                }
            }
        }

        let grandparents = if output_level + 1 < version.num_levels() {
            let (all_start, all_limit) = self.get_range2(&inputs, &sibling_inputs);
            version
                .overlapping_files(output_level + 1, Some(&all_start), Some(&all_limit))
                .1
        } else {
            Vec::new()
        };

        (inputs, sibling_inputs, grandparents)
    }

    /// Whether no level deeper than `output_level` holds any files, so
    /// the compaction output becomes the deepest data in the tree
    pub(crate) fn output_is_bottommost(version: &Version, output_level: usize) -> bool {
        ((output_level + 1)..version.num_levels()).all(|level| version.files(level).is_empty())
    }

    /// Marks all input files as being compacted and registers the
    /// compaction, atomically from the caller's point of view
    ///
    /// # Panics
    ///
    /// Panics if an input file is already part of a live compaction;
    /// policies check for conflicts before registering, so this
    /// indicates registry corruption.
    pub(crate) fn register(&mut self, mut compaction: Compaction) -> Arc<Compaction> {
        compaction.id = self.next_id;
        self.next_id += 1;

        let compaction = Arc::new(compaction);

        for file in compaction.all_inputs() {
            let previous = self.busy_files.insert(file.number, compaction.id);

            assert!(
                previous.is_none(),
                "file {} is already input to compaction {:?}",
                file.number,
                previous
            );
        }

        self.in_progress
            .get_mut(compaction.input_level)
            .expect("level should exist")
            .insert(compaction.id, compaction.clone());

        compaction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::ValueType;
    use test_log::test;

    fn key(user_key: &[u8], seqno: u64) -> InternalKey {
        InternalKey::new(user_key.to_vec(), seqno, ValueType::Value)
    }

    fn fixture_file(
        number: u64,
        level: usize,
        lo: InternalKey,
        hi: InternalKey,
        size_bytes: u64,
    ) -> Arc<FileMetadata> {
        Arc::new(FileMetadata::new(number, level, lo, hi, size_bytes))
    }

    fn fixture_picker() -> CompactionPicker {
        CompactionPicker::new(Options::default(), InternalKeyComparator::bytewise())
    }

    #[test]
    fn range_covers_all_inputs() {
        let picker = fixture_picker();

        let files = vec![
            fixture_file(1, 1, key(b"d", 9), key(b"f", 9), 1),
            fixture_file(2, 1, key(b"a", 9), key(b"c", 9), 1),
            fixture_file(3, 1, key(b"g", 9), key(b"k", 9), 1),
        ];

        let (smallest, largest) = picker.get_range(&files);
        assert_eq!(&*smallest.user_key, b"a");
        assert_eq!(&*largest.user_key, b"k");
    }

    #[test]
    fn expansion_pulls_in_boundary_user_key() {
        let picker = fixture_picker();
        let mut version = Version::new(7, InternalKeyComparator::bytewise());

        // Both files contain versions of user key "m"
        let f1 = fixture_file(1, 1, key(b"a", 9), key(b"m", 5), 4);
        let f2 = fixture_file(2, 1, key(b"m", 4), key(b"q", 9), 4);
        version.add(f1.clone());
        version.add(f2);

        let expanded = picker
            .expand_while_overlapping(&version, 1, vec![f1])
            .expect("should expand");

        assert_eq!(
            vec![1, 2],
            expanded.iter().map(|f| f.number).collect::<Vec<_>>()
        );
    }

    #[test]
    fn expansion_leaves_disjoint_inputs_alone() {
        let picker = fixture_picker();
        let mut version = Version::new(7, InternalKeyComparator::bytewise());

        let f1 = fixture_file(1, 1, key(b"a", 9), key(b"c", 9), 4);
        version.add(f1.clone());
        version.add(fixture_file(2, 1, key(b"d", 9), key(b"f", 9), 4));

        let expanded = picker
            .expand_while_overlapping(&version, 1, vec![f1])
            .expect("should expand");

        assert_eq!(vec![1], expanded.iter().map(|f| f.number).collect::<Vec<_>>());
    }

    #[test]
    fn expansion_aborts_on_busy_file() {
        let mut picker = fixture_picker();
        let mut version = Version::new(7, InternalKeyComparator::bytewise());

        let f1 = fixture_file(1, 1, key(b"a", 9), key(b"m", 5), 4);
        let f2 = fixture_file(2, 1, key(b"m", 4), key(b"q", 9), 4);
        version.add(f1.clone());
        version.add(f2);

        picker.busy_files.insert(2, 42);

        assert!(picker.expand_while_overlapping(&version, 1, vec![f1]).is_none());
    }

    #[test]
    fn expansion_aborts_past_size_limit() {
        let opts = Options::new()
            .target_file_size_base(1)
            .target_file_size_multiplier(1);
        // expanded limit at L1 = 1 * 25
        let picker = CompactionPicker::new(opts, InternalKeyComparator::bytewise());

        let mut version = Version::new(7, InternalKeyComparator::bytewise());
        let f1 = fixture_file(1, 1, key(b"a", 9), key(b"m", 5), 20);
        let f2 = fixture_file(2, 1, key(b"m", 4), key(b"q", 9), 20);
        version.add(f1.clone());
        version.add(f2);

        assert!(picker.expand_while_overlapping(&version, 1, vec![f1]).is_none());
    }

    #[test]
    fn sibling_inputs_grow_without_growing_output() {
        let picker = fixture_picker();
        let mut version = Version::new(7, InternalKeyComparator::bytewise());

        let f1 = fixture_file(1, 1, key(b"a", 9), key(b"c", 9), 4);
        let f2 = fixture_file(2, 1, key(b"f", 9), key(b"i", 9), 4);
        version.add(f1.clone());
        version.add(f2);
        version.add(fixture_file(3, 2, key(b"a", 9), key(b"j", 8), 20));

        let (inputs, siblings, _) = picker.setup_other_inputs(&version, 1, 2, vec![f1]);

        // f2 lies inside the combined range [a..j] and costs nothing extra
        assert_eq!(vec![1, 2], inputs.iter().map(|f| f.number).collect::<Vec<_>>());
        assert_eq!(vec![3], siblings.iter().map(|f| f.number).collect::<Vec<_>>());
    }

    #[test]
    fn grandparents_cover_combined_range() {
        let picker = fixture_picker();
        let mut version = Version::new(7, InternalKeyComparator::bytewise());

        let f1 = fixture_file(1, 1, key(b"a", 9), key(b"c", 9), 4);
        version.add(f1.clone());
        version.add(fixture_file(2, 2, key(b"b", 9), key(b"e", 9), 20));
        version.add(fixture_file(3, 3, key(b"d", 9), key(b"g", 9), 20));
        version.add(fixture_file(4, 3, key(b"x", 9), key(b"z", 9), 20));

        let (_, siblings, grandparents) = picker.setup_other_inputs(&version, 1, 2, vec![f1]);

        assert_eq!(vec![2], siblings.iter().map(|f| f.number).collect::<Vec<_>>());
        // combined range [a..e] overlaps f3 at L3 but not f4
        assert_eq!(
            vec![3],
            grandparents.iter().map(|f| f.number).collect::<Vec<_>>()
        );
    }

    #[test]
    fn release_is_idempotent() {
        let mut picker = fixture_picker();

        let compaction = picker.register(Compaction {
            id: 0,
            input_level: 1,
            output_level: 2,
            inputs: [
                vec![fixture_file(1, 1, key(b"a", 9), key(b"c", 9), 4)],
                vec![fixture_file(2, 2, key(b"a", 9), key(b"e", 9), 20)],
            ],
            grandparents: Vec::new(),
            max_output_file_size: 0,
            max_grandparent_overlap_bytes: 0,
            score: 0.0,
            output_path_id: 0,
            enable_compression: true,
            is_manual: false,
            is_full_compaction: false,
            is_bottommost_level: false,
            is_deletion_compaction: false,
        });

        assert!(picker.file_in_compaction(1));
        assert!(picker.file_in_compaction(2));
        assert_eq!(1, picker.num_in_flight(1));
        assert_eq!(4, picker.size_being_compacted(1));

        picker.release_compaction_files(&compaction, CompactionStatus::Finished);
        assert!(!picker.file_in_compaction(1));
        assert!(!picker.file_in_compaction(2));
        assert_eq!(0, picker.num_in_flight(1));

        // Releasing again is a no-op
        picker.release_compaction_files(&compaction, CompactionStatus::Aborted);
        assert_eq!(0, picker.num_in_flight(1));
    }

    #[test]
    #[should_panic(expected = "already input")]
    fn double_marking_a_file_is_fatal() {
        let mut picker = fixture_picker();

        let file = fixture_file(1, 1, key(b"a", 9), key(b"c", 9), 4);

        let fixture_compaction = |file: Arc<FileMetadata>| Compaction {
            id: 0,
            input_level: 1,
            output_level: 2,
            inputs: [vec![file], Vec::new()],
            grandparents: Vec::new(),
            max_output_file_size: 0,
            max_grandparent_overlap_bytes: 0,
            score: 0.0,
            output_path_id: 0,
            enable_compression: true,
            is_manual: false,
            is_full_compaction: false,
            is_bottommost_level: false,
            is_deletion_compaction: false,
        };

        picker.register(fixture_compaction(file.clone()));
        picker.register(fixture_compaction(file));
    }
}
