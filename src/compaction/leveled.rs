use super::{picker::CompactionPicker, Compaction};
use crate::version::Version;
use std::{cmp::Ordering, sync::Arc};

/// Size-driven compaction targeting a per-level capacity pyramid
///
/// If a level outgrows its byte capacity (or level 0 its file count),
/// part of it is merged into the overlapping files of the next level.
/// Suffers from high write amplification, but decent read and space
/// amplification.
impl CompactionPicker {
    pub(crate) fn pick_leveled(&mut self, version: &Version) -> Option<Arc<Compaction>> {
        let (level, score) = self.leveled_candidate_level(version)?;

        // A second level 0 compaction would race the first over the same
        // overlapping files
        if level == 0 && self.num_in_flight(0) > 0 {
            log::trace!("L0 is already being compacted");
            return None;
        }

        let files = version.files(level);

        // Round-robin: resume after the previous compaction's end key,
        // wrapping around; level 0 starts at the oldest file instead
        let start = if level == 0 {
            0
        } else {
            match &self.compact_pointer[level] {
                Some(cursor) => files
                    .iter()
                    .position(|f| self.icmp.cmp(&f.largest, cursor) == Ordering::Greater)
                    .unwrap_or(0),
                None => 0,
            }
        };

        let candidates: Vec<usize> = if level == 0 {
            (0..files.len()).rev().collect()
        } else {
            (start..files.len()).chain(0..start).collect()
        };

        for index in candidates {
            let file = &files[index];

            if self.file_in_compaction(file.number) {
                continue;
            }

            let Some(inputs) = self.expand_while_overlapping(version, level, vec![file.clone()])
            else {
                log::trace!("skipping file {} at L{level}: expansion failed", file.number);
                continue;
            };

            let (smallest, largest) = self.get_range(&inputs);

            let (parent_busy, _) =
                self.parent_range_in_compaction(version, &smallest, &largest, level + 1);

            if parent_busy {
                log::debug!(
                    "no compaction at L{level}: overlapping L{} range is being compacted",
                    level + 1
                );
                return None;
            }

            let (inputs, sibling_inputs, grandparents) =
                self.setup_other_inputs(version, level, level + 1, inputs);

            // The grow step may have widened the range past `largest`
            let (_, end_key) = self.get_range(&inputs);
            self.compact_pointer[level] = Some(end_key);

            let compaction = self.register(Compaction {
                id: 0,
                input_level: level,
                output_level: level + 1,
                inputs: [inputs, sibling_inputs],
                grandparents,
                max_output_file_size: self.opts.max_file_size_for_level(level + 1),
                max_grandparent_overlap_bytes: self.opts.max_grandparent_overlap_bytes(level),
                score,
                output_path_id: 0,
                enable_compression: true,
                is_manual: false,
                is_full_compaction: false,
                is_bottommost_level: Self::output_is_bottommost(version, level + 1),
                is_deletion_compaction: false,
            });

            log::debug!("picked {compaction:?} (score {score:.2})");
            return Some(compaction);
        }

        log::trace!("no compactable file at L{level}");
        None
    }

    /// Returns the level most in need of compaction: the one with the
    /// highest score >= 1.0, with the lower level winning ties
    ///
    /// The last level never compacts upward, so it is not scored.
    fn leveled_candidate_level(&self, version: &Version) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64)> = None;

        for level in 0..version.num_levels().saturating_sub(1) {
            let score = if level == 0 {
                let count_score = version.files(0).len() as f64
                    / self.opts.level0_file_num_compaction_trigger as f64;
                let size_score =
                    version.level_size(0) as f64 / self.opts.max_bytes_for_level(0) as f64;

                count_score.max(size_score)
            } else {
                version.level_size(level) as f64 / self.opts.max_bytes_for_level(level) as f64
            };

            let better = match best {
                Some((_, best_score)) => score > best_score,
                None => true,
            };

            if score >= 1.0 && better {
                best = Some((level, score));
            }
        }

        best
    }
}
