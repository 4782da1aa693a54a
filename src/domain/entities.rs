use crate::domain::value_objects::{HeaderList, JsonBody, Url};
use http::{Method, StatusCode};

/// Represents an assembled outgoing HTTP request
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderList,
    pub body: JsonBody,
}

/// Represents an HTTP response read in full
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub body: String,
}

impl Response {
    /// Status as `"<code> <reason>"`, e.g. `404 Not Found`.
    pub fn status_text(&self) -> String {
        match self.status.canonical_reason() {
            Some(reason) => format!("{} {}", self.status.as_u16(), reason),
            None => self.status.as_u16().to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.status.as_u16() >= 400
    }
}

/// What a successfully processed record produced.
#[derive(Debug, Clone)]
pub enum StatusReport {
    /// The request was sent and a response read.
    Delivered(Response),
    /// Dry-run mode: the request was assembled but never transmitted.
    DryRun(Request),
}
