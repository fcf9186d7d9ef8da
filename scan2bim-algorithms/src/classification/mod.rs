//! Random forest classification of feature tables, with stratified k-fold cross-validation for evaluation.

mod dataset;
pub use self::dataset::*;

mod folds;
pub use self::folds::*;

mod forest;
pub use self::forest::*;

mod model;
pub use self::model::*;

mod report;
pub use self::report::*;

mod trainer;
pub use self::trainer::*;

mod tree;
pub use self::tree::*;
