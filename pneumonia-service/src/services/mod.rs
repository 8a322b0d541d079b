pub mod decision;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod preprocess;
pub mod prompt;
pub mod providers;
pub mod report;

pub use model::{ModelError, ModelRegistry};
pub use pipeline::{DiagnosisPipeline, PipelineError, PredictionOutcome, PredictionUpload};
pub use report::ReportClient;
