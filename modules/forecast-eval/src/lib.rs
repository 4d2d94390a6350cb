pub mod aggregate;
pub mod config;
pub mod error;
pub mod extraction;
pub mod file_config;
pub mod geo;
pub mod io;
pub mod pipeline;
pub mod prompts;
pub mod runner;
pub mod scoring;
pub mod template;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod types;

pub use aggregate::{summarize, EvaluationSummary};
pub use config::AppConfig;
pub use error::{AttemptError, EvalError, EvalResult};
pub use extraction::Extractor;
pub use file_config::{load_config, FileConfig};
pub use geo::{GeoReference, GeoStandardizer};
pub use pipeline::{EvaluationPipeline, PipelineOutput};
pub use runner::{TaskFailure, TaskOutcome, TaskRunner};
pub use scoring::{LabelIndex, SampleScorer};
pub use types::{EvalRecord, ExtractedInfo, LabelRecord, ScoringResult, StructuredForecast};
