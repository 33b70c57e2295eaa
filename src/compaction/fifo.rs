use super::{picker::CompactionPicker, Compaction};
use crate::version::Version;
use std::sync::Arc;

/// FIFO-style compaction
///
/// Limits the tree size to roughly `max_table_files_size` bytes by
/// deleting the oldest level 0 files once the budget is exceeded; nothing
/// is ever merged or rewritten.
///
/// Only useful for workloads that insert recent data and never update,
/// like logs or time series.
impl CompactionPicker {
    pub(crate) fn pick_fifo(&mut self, version: &Version) -> Option<Arc<Compaction>> {
        let files = version.files(0);
        let limit = self.opts.fifo.max_table_files_size;
        let total = version.level_size(0);

        if files.is_empty() || total <= limit {
            log::trace!("fifo: {total} bytes within budget of {limit}");
            return None;
        }

        if self.num_in_flight(0) > 0 {
            log::trace!("fifo: a deletion compaction is already running");
            return None;
        }

        // L0 is ordered newest first, so walk it from the back; the
        // retained files are always the newest suffix
        let mut remaining = total;
        let mut doomed = Vec::new();

        for file in files.iter().rev() {
            if remaining <= limit {
                break;
            }

            remaining = remaining.saturating_sub(file.size_bytes);
            doomed.push(file.clone());
        }

        let compaction = self.register(Compaction {
            id: 0,
            input_level: 0,
            output_level: 0,
            inputs: [doomed, Vec::new()],
            grandparents: Vec::new(),
            max_output_file_size: 0,
            max_grandparent_overlap_bytes: 0,
            score: total as f64 / limit as f64,
            output_path_id: 0,
            enable_compression: true,
            is_manual: false,
            is_full_compaction: false,
            is_bottommost_level: false,
            is_deletion_compaction: true,
        });

        log::debug!(
            "picked fifo deletion {compaction:?}, freeing {} bytes",
            total - remaining
        );

        Some(compaction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        compaction::CompactionStatus,
        comparator::InternalKeyComparator,
        config::{CompactionStyle, FifoOptions, Options},
        key::{InternalKey, ValueType},
        metadata::FileMetadata,
    };
    use test_log::test;

    fn fixture_file(number: u64, size_bytes: u64) -> Arc<FileMetadata> {
        Arc::new(FileMetadata::new(
            number,
            0,
            InternalKey::new(b"a".to_vec(), number, ValueType::Value),
            InternalKey::new(b"z".to_vec(), number, ValueType::Value),
            size_bytes,
        ))
    }

    fn fixture_picker(max_table_files_size: u64) -> CompactionPicker {
        let opts = Options::new()
            .compaction_style(CompactionStyle::Fifo)
            .num_levels(1)
            .fifo(FifoOptions {
                max_table_files_size,
            });

        CompactionPicker::new(opts, InternalKeyComparator::bytewise())
    }

    fn numbers(files: &[Arc<FileMetadata>]) -> Vec<u64> {
        files.iter().map(|f| f.number).collect()
    }

    #[test]
    fn empty_level() {
        let mut picker = fixture_picker(1);
        let version = Version::new(1, InternalKeyComparator::bytewise());

        assert!(picker.pick_compaction(&version).is_none());
    }

    #[test]
    fn below_budget_does_nothing() {
        let mut picker = fixture_picker(200);

        let mut version = Version::new(1, InternalKeyComparator::bytewise());
        for number in 1..=4 {
            version.add(fixture_file(number, 50));
        }

        assert!(picker.pick_compaction(&version).is_none());
    }

    #[test]
    fn drops_oldest_files_until_budget_fits() {
        let mut picker = fixture_picker(120);

        // f1 is the oldest
        let mut version = Version::new(1, InternalKeyComparator::bytewise());
        for number in 1..=4 {
            version.add(fixture_file(number, 50));
        }

        let compaction = picker.pick_compaction(&version).expect("over budget");

        // 200 - 50 - 50 = 100 <= 120; the newest files survive
        assert_eq!(vec![1, 2], numbers(compaction.inputs(0)));
        assert!(compaction.inputs(1).is_empty());
        assert!(compaction.is_deletion_compaction());
        assert_eq!(0, compaction.output_level());
    }

    #[test]
    fn total_size_strictly_decreases() {
        let mut picker = fixture_picker(75);

        let mut version = Version::new(1, InternalKeyComparator::bytewise());
        for number in 1..=4 {
            version.add(fixture_file(number, 50));
        }

        let compaction = picker.pick_compaction(&version).expect("over budget");

        let dropped: u64 = compaction.inputs(0).iter().map(|f| f.size_bytes).sum();
        assert!(dropped > 0);
        assert!(version.level_size(0) - dropped <= 75);
    }

    #[test]
    fn only_one_deletion_compaction_at_a_time() {
        let mut picker = fixture_picker(10);

        let mut version = Version::new(1, InternalKeyComparator::bytewise());
        for number in 1..=4 {
            version.add(fixture_file(number, 50));
        }

        let first = picker.pick_compaction(&version).expect("over budget");
        assert!(picker.pick_compaction(&version).is_none());

        picker.release_compaction_files(&first, CompactionStatus::Finished);
        assert!(picker.pick_compaction(&version).is_some());
    }

    #[test]
    fn compact_range_degenerates_to_a_regular_pick() {
        let mut picker = fixture_picker(120);

        let mut version = Version::new(1, InternalKeyComparator::bytewise());
        for number in 1..=4 {
            version.add(fixture_file(number, 50));
        }

        let begin = InternalKey::new(b"x".to_vec(), 9, ValueType::Value);
        let end = InternalKey::new(b"y".to_vec(), 9, ValueType::Value);

        // The requested range and levels are ignored entirely
        let (compaction, compaction_end) = picker
            .compact_range(&version, 0, 0, Some(&begin), Some(&end))
            .expect("fifo ignores arguments");

        let compaction = compaction.expect("over budget");
        assert!(compaction_end.is_none());
        assert!(compaction.is_deletion_compaction());
        assert_eq!(vec![1, 2], numbers(compaction.inputs(0)));
    }
}
