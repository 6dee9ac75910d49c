pub mod audit;
pub mod bonus;
pub mod decision;
pub mod flags;
pub mod pipeline;
pub mod reclassify;
pub mod score;
pub mod validator;

pub use decision::{DecisionInput, DecisionOutcome, decide};
pub use pipeline::{Classification, DeviceRecord, ReviewContext, ReviewReport, Reviewer};
pub use validator::ValidatorOutcome;
