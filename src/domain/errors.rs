use crate::domain::entities::Response;
use crate::expression::EvalError;
use thiserror::Error;

/// Failure of a single record. Never fatal to the stream.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("parsing JSON: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("evaluating URL expression: {0}")]
    UrlEval(#[source] EvalError),

    #[error("evaluating transform expression: {0}")]
    TransformEval(#[source] EvalError),

    #[error("marshaling body: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("evaluating header expression: {0}")]
    HeaderEval(#[source] EvalError),

    #[error("invalid header format: {0}")]
    HeaderFormat(String),

    #[error("creating request: {0}")]
    Request(String),

    #[error("sending request: {0:#}")]
    Send(anyhow::Error),

    #[error("HTTP error: {}", .0.status_text())]
    HttpStatus(Response),
}

impl ProcessError {
    /// Short name of the pipeline step that failed.
    pub fn phase(&self) -> &'static str {
        match self {
            ProcessError::Decode(_) => "decode",
            ProcessError::UrlEval(_) => "url",
            ProcessError::TransformEval(_) => "transform",
            ProcessError::Encode(_) => "encode",
            ProcessError::HeaderEval(_) => "header",
            ProcessError::HeaderFormat(_) => "header-format",
            ProcessError::Request(_) => "request",
            ProcessError::Send(_) => "send",
            ProcessError::HttpStatus(_) => "http-status",
        }
    }
}

/// Failure of the input stream itself. The only fatal kind.
#[derive(Error, Debug)]
pub enum PipeError {
    #[error("reading stdin: {0}")]
    StreamRead(#[from] std::io::Error),
}
