pub mod application;
pub mod domain;
pub mod expression;
pub mod infrastructure;
pub mod presentation;

pub use application::driver::{LineStreamDriver, RunSummary};
pub use application::services::{HttpClient, ProcessorConfig, RecordProcessor};
pub use domain::context::EnvSnapshot;
pub use domain::errors::{PipeError, ProcessError};
pub use expression::{EvalError, Evaluator, ExprEvaluator};
pub use infrastructure::http_client::HyperHttpClient;
pub use presentation::cli::Cli;
