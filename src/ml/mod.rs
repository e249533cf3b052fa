pub mod classifier;
pub mod recommend;

pub use classifier::{Analysis, Classifier, OodThresholds, CLASS_NAMES, NUM_CLASSES};
pub use recommend::synthesize;
