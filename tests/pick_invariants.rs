use lsm_compaction::{
    Compaction, CompactionPicker, CompactionStatus, FileMetadata, InternalKey,
    InternalKeyComparator, Options, ValueType, Version,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::{cmp::Ordering, collections::HashSet, sync::Arc};

fn key(n: u32, seqno: u64) -> InternalKey {
    InternalKey::new(format!("{n:05}").into_bytes(), seqno, ValueType::Value)
}

/// Random level 0 files plus random disjoint runs on L1 and L2
fn fixture_version(rng: &mut StdRng, icmp: &InternalKeyComparator) -> Version {
    let mut version = Version::new(4, icmp.clone());
    let mut number = 0;

    for _ in 0..6 {
        number += 1;
        let lo = rng.gen_range(0..90_000);
        let hi = lo + rng.gen_range(0..5_000);
        version.add(Arc::new(FileMetadata::new(
            number,
            0,
            key(lo, 9),
            key(hi, 9),
            rng.gen_range(1..100),
        )));
    }

    for level in 1..=2 {
        let mut cuts: Vec<u32> = (0..24).map(|_| rng.gen_range(0..100_000)).collect();
        cuts.sort_unstable();
        cuts.dedup();

        for pair in cuts.chunks_exact(2) {
            number += 1;
            version.add(Arc::new(FileMetadata::new(
                number,
                level,
                key(pair[0], 9),
                key(pair[1], 9),
                rng.gen_range(1..100),
            )));
        }
    }

    version
}

fn assert_invariants(picker: &CompactionPicker, version: &Version, live: &[Arc<Compaction>]) {
    let icmp = picker.comparator();

    // No two live compactions share a file
    for (i, a) in live.iter().enumerate() {
        for b in live.iter().skip(i + 1) {
            let a_files: HashSet<u64> = a.all_inputs().map(|f| f.number).collect();
            let b_files: HashSet<u64> = b.all_inputs().map(|f| f.number).collect();
            assert!(a_files.is_disjoint(&b_files), "{a:?} and {b:?} share files");
        }
    }

    // At most one compaction reads from L0
    assert!(live.iter().filter(|c| c.input_level() == 0).count() <= 1);

    for compaction in live {
        let level = compaction.input_level();
        let picked: HashSet<u64> = compaction.inputs(0).iter().map(|f| f.number).collect();

        let smallest = compaction
            .inputs(0)
            .iter()
            .map(|f| &f.smallest)
            .min_by(|a, b| icmp.cmp(a, b))
            .expect("inputs are never empty");
        let largest = compaction
            .inputs(0)
            .iter()
            .map(|f| &f.largest)
            .max_by(|a, b| icmp.cmp(a, b))
            .expect("inputs are never empty");

        // Key-recency closure: nothing left behind on the input level
        // holds a user key inside the picked range
        for file in version.files(level) {
            if picked.contains(&file.number) {
                continue;
            }

            let outside = icmp.user_cmp(&file.largest.user_key, &smallest.user_key)
                == Ordering::Less
                || icmp.user_cmp(&file.smallest.user_key, &largest.user_key) == Ordering::Greater;

            assert!(outside, "{file:?} overlaps picked range of {compaction:?}");
        }

        // Sibling completeness: inputs[1] is exactly the overlap at the
        // output level
        if compaction.output_level() > level {
            let (_, expected) = version.overlapping_files(
                compaction.output_level(),
                Some(smallest),
                Some(largest),
            );

            let expected: HashSet<u64> = expected.iter().map(|f| f.number).collect();
            let actual: HashSet<u64> = compaction.inputs(1).iter().map(|f| f.number).collect();
            assert_eq!(expected, actual, "sibling mismatch in {compaction:?}");
        }
    }
}

#[test]
fn random_versions_uphold_picker_invariants() {
    let mut rng = StdRng::seed_from_u64(0xCA5CADE);
    let icmp = InternalKeyComparator::bytewise();

    for round in 0..100 {
        // Tight capacities so most rounds have work to do
        let opts = Options::new()
            .num_levels(4)
            .level0_file_num_compaction_trigger(4)
            .max_bytes_for_level_base(100)
            .max_bytes_for_level_multiplier(4);

        let mut picker = CompactionPicker::new(opts, icmp.clone());
        let version = fixture_version(&mut rng, &icmp);

        let mut live = Vec::new();

        while let Some(compaction) = picker.pick_compaction(&version) {
            live.push(compaction);
            assert_invariants(&picker, &version, &live);

            assert!(live.len() <= 64, "picker never ran dry in round {round}");
        }

        // Releasing everything clears every lock
        for compaction in &live {
            picker.release_compaction_files(compaction, CompactionStatus::Finished);
        }

        for level in 0..version.num_levels() {
            assert_eq!(0, picker.num_in_flight(level));

            for file in version.files(level) {
                assert!(!picker.file_in_compaction(file.number));
            }
        }
    }
}
