pub mod correlation;
pub mod feature_match;

pub use correlation::{CorrelationAligner, RowSignatures};
pub use feature_match::FeatureAligner;
