//! Training data: CSV discovery, numeric table loading and the holdout split.

pub mod discovery;
pub mod split;
pub mod table;

pub use discovery::find_latest_csv;
pub use split::{train_test_split, SplitIndices};
pub use table::{Table, TargetSplit};
