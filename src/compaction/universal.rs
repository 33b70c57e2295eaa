use super::{picker::CompactionPicker, Compaction};
use crate::{
    config::{DbPath, StopStyle},
    metadata::total_file_size,
    version::Version,
};
use std::sync::Arc;

/// Universal (size-tiered) compaction of level 0 runs
///
/// All inputs come from level 0, where runs are ordered newest first.
/// Merged runs usually stay on level 0; only a full compaction sinks
/// everything into the last level. Decent write amplification, at the
/// cost of read and temporary space amplification.
impl CompactionPicker {
    pub(crate) fn pick_universal(&mut self, version: &Version) -> Option<Arc<Compaction>> {
        let num_runs = version.files(0).len();
        let trigger = self.opts.level0_file_num_compaction_trigger;

        if num_runs < trigger {
            log::trace!("universal: {num_runs} runs, trigger is {trigger}");
            return None;
        }

        if self.num_in_flight(0) > 0 {
            log::trace!("universal: L0 is already being compacted");
            return None;
        }

        let score = num_runs as f64 / trigger as f64;

        let compaction = self
            .pick_universal_read_amp(version, score)
            .or_else(|| self.pick_universal_size_amp(version, score))?;

        let compaction = self.register(compaction);
        log::debug!("picked universal {compaction:?}");
        Some(compaction)
    }

    /// Merges a run of similarly sized neighbors to keep the number of
    /// runs a read has to consult in check
    ///
    /// Scans runs newest to oldest and accepts the longest window of at
    /// least `min_merge_width` runs in which every next run still fits
    /// the size bound; earlier windows win ties.
    fn pick_universal_read_amp(&self, version: &Version, score: f64) -> Option<Compaction> {
        let opts = &self.opts.universal;
        let files = version.files(0);

        let min_width = opts.min_merge_width.max(2);
        let max_width = opts.max_merge_width;

        let mut best: Option<(usize, usize)> = None;

        for start in 0..files.len() {
            let mut run_size = u128::from(files[start].size_bytes);
            let mut previous = run_size;
            let mut count = 1;

            while count < max_width && start + count < files.len() {
                let candidate = u128::from(files[start + count].size_bytes);

                let base = match opts.stop_style {
                    StopStyle::TotalSize => run_size,
                    StopStyle::SimilarSize => previous,
                };

                if candidate > base * (100 + u128::from(opts.size_ratio)) / 100 {
                    break;
                }

                run_size += candidate;
                previous = candidate;
                count += 1;
            }

            let longest = match best {
                Some((_, best_count)) => count > best_count,
                None => true,
            };

            if count >= min_width && longest {
                best = Some((start, count));
            }
        }

        let Some((start, count)) = best else {
            log::trace!("universal: no read-amp run qualifies");
            return None;
        };

        let run: Vec<_> = files[start..start + count].to_vec();
        let is_full = count == files.len();

        // Only a full compaction may sink below L0; a partial merge has
        // older runs beneath it
        let output_level = if is_full { version.num_levels() - 1 } else { 0 };

        let estimated_size = total_file_size(&run);

        Some(Compaction {
            id: 0,
            input_level: 0,
            output_level,
            inputs: [run, Vec::new()],
            grandparents: Vec::new(),
            // Tiered merges emit a single run, not size-capped files
            max_output_file_size: u64::MAX,
            max_grandparent_overlap_bytes: u64::MAX,
            score,
            output_path_id: output_path_id(&self.opts.db_paths, estimated_size),
            enable_compression: self.compression_worthwhile(version, start + count),
            is_manual: false,
            is_full_compaction: is_full,
            is_bottommost_level: is_full,
            is_deletion_compaction: false,
        })
    }

    /// Compacts everything once the older runs outweigh the newest run
    /// by more than `max_size_amplification_percent`
    fn pick_universal_size_amp(&self, version: &Version, score: f64) -> Option<Compaction> {
        let files = version.files(0);

        let newest = files.first()?;
        if files.len() < 2 {
            return None;
        }

        let older: u64 = files[1..].iter().map(|f| f.size_bytes).sum();
        let percent = self.opts.universal.max_size_amplification_percent;

        if u128::from(older) * 100 <= u128::from(percent) * u128::from(newest.size_bytes) {
            log::trace!("universal: space amplification within {percent}%");
            return None;
        }

        log::debug!("universal: space amplification exceeds {percent}%, compacting all runs");

        let run: Vec<_> = files.to_vec();
        let estimated_size = total_file_size(&run);

        Some(Compaction {
            id: 0,
            input_level: 0,
            output_level: version.num_levels() - 1,
            inputs: [run, Vec::new()],
            grandparents: Vec::new(),
            max_output_file_size: u64::MAX,
            max_grandparent_overlap_bytes: u64::MAX,
            score,
            output_path_id: output_path_id(&self.opts.db_paths, estimated_size),
            enable_compression: true,
            is_manual: false,
            is_full_compaction: true,
            is_bottommost_level: true,
            is_deletion_compaction: false,
        })
    }

    /// Compressing a merge of fresh data is wasted work if it will be
    /// merged again soon: output stays uncompressed while the runs older
    /// than the merged window already hold `compression_size_percent` of
    /// the level's bytes
    fn compression_worthwhile(&self, version: &Version, first_index_after: usize) -> bool {
        let percent = self.opts.universal.compression_size_percent;

        let Ok(percent) = u128::try_from(percent) else {
            // Negative disables the heuristic
            return true;
        };

        let total = u128::from(version.level_size(0));
        let older: u128 = version
            .files(0)
            .iter()
            .skip(first_index_after)
            .map(|f| u128::from(f.size_bytes))
            .sum();

        older * 100 < total * percent
    }
}

/// Assigns the lowest-indexed data path whose size target can absorb the
/// estimated output; the last path takes the overflow
fn output_path_id(db_paths: &[DbPath], estimated_size: u64) -> u32 {
    if db_paths.is_empty() {
        return 0;
    }

    for (index, path) in db_paths.iter().enumerate().take(db_paths.len() - 1) {
        if estimated_size <= path.target_bytes {
            return index as u32;
        }
    }

    (db_paths.len() - 1) as u32
}
