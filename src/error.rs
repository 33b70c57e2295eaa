/// Represents errors that can occur when requesting compactions
#[derive(Debug, Eq, PartialEq)]
pub enum Error {
    /// The manual compaction range is inverted: `begin` sorts after `end`
    /// under the active comparator
    InvertedManualRange,

    /// The requested input level does not exist in the version
    InvalidInputLevel {
        /// Level that was requested
        requested: usize,

        /// Amount of levels in the version
        num_levels: usize,
    },

    /// The requested output level does not exist, or lies above the input level
    InvalidOutputLevel {
        /// Level that was requested
        requested: usize,

        /// Amount of levels in the version
        num_levels: usize,
    },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CompactionError: {self:?}")
    }
}

impl std::error::Error for Error {}

/// Picker result
pub type Result<T> = std::result::Result<T, Error>;
