//! Compaction picking primitives for log-structured merge trees (LSM-trees/LSMTs).
//!
//! ##### NOTE
//!
//! > This crate only decides *which* files to merge next, into which level,
//! > and under which policy. Actually reading, merging and writing tables
//! > is the job of the surrounding storage engine.
//!
//! ##### About
//!
//! An LSM-tree accumulates immutable sorted tables ("files") across a set
//! of levels. Left alone, the pile degrades read performance and wastes
//! disk space, so files are periodically merged in a process called
//! "Compaction". *Which* files get merged encodes the engine's
//! write/space/read amplification trade-off, so the decision is pluggable:
//!
//! - [`CompactionStyle::Leveled`] targets a per-level capacity pyramid
//! - [`CompactionStyle::Universal`] merges similarly sized level 0 runs
//! - [`CompactionStyle::Fifo`] simply deletes the oldest files over budget
//!
//! The picker consumes a read-only [`Version`] snapshot of the file
//! layout, tracks which files are locked by in-flight compactions, and
//! hands [`Compaction`] descriptors to the executor. The caller is
//! expected to serialize all picker calls under its version mutex; the
//! picker itself never blocks, sleeps or touches disk.
//!
//! # Example usage
//!
//! ```
//! use lsm_compaction::{
//!     CompactionPicker, CompactionStatus, FileMetadata, InternalKey,
//!     InternalKeyComparator, Options, ValueType, Version,
//! };
//! use std::sync::Arc;
//!
//! let opts = Options::new()
//!     .num_levels(4)
//!     .max_bytes_for_level_base(10)
//!     .max_bytes_for_level_multiplier(10);
//!
//! let icmp = InternalKeyComparator::bytewise();
//! let mut picker = CompactionPicker::new(opts, icmp.clone());
//!
//! let key = |k: &str, seqno| InternalKey::new(k.as_bytes().to_vec(), seqno, ValueType::Value);
//!
//! // Assemble a snapshot of the current file layout; L1 holds more
//! // than its 10 byte capacity
//! let mut version = Version::new(4, icmp);
//! version.add(Arc::new(FileMetadata::new(1, 1, key("a", 9), key("c", 9), 6)));
//! version.add(Arc::new(FileMetadata::new(2, 1, key("d", 9), key("f", 9), 6)));
//! version.add(Arc::new(FileMetadata::new(3, 2, key("b", 9), key("e", 9), 20)));
//!
//! let compaction = picker.pick_compaction(&version).expect("L1 is over capacity");
//! assert_eq!(1, compaction.input_level());
//! assert_eq!(2, compaction.output_level());
//!
//! // Input files stay locked until the executor reports back
//! picker.release_compaction_files(&compaction, CompactionStatus::Finished);
//! ```

#![forbid(unsafe_code)]
#![deny(clippy::all, missing_docs, clippy::cargo)]
#![deny(clippy::unwrap_used)]
#![warn(clippy::pedantic, clippy::nursery)]
#![warn(clippy::expect_used)]
#![allow(clippy::missing_const_for_fn)]

pub mod compaction;
mod comparator;
mod config;
mod error;
mod key;
mod metadata;
mod version;

pub use {
    compaction::{picker::CompactionPicker, Compaction, CompactionId, CompactionStatus},
    comparator::{BytewiseComparator, Comparator, InternalKeyComparator},
    config::{CompactionStyle, DbPath, FifoOptions, Options, StopStyle, UniversalOptions},
    error::{Error, Result},
    key::{InternalKey, SeqNo, UserKey, ValueType},
    metadata::FileMetadata,
    version::Version,
};
