use crate::domain::entities::{Request, Response, StatusReport};
use crate::domain::errors::ProcessError;
use colored::Colorize;
use std::io::Write;

/// `Status: <status text>, Response: <body>`
pub fn status_line(response: &Response) -> String {
    format!(
        "Status: {}, Response: {}",
        response.status_text(),
        response.body
    )
}

pub fn dry_run_line(request: &Request) -> String {
    let headers = request
        .headers
        .iter()
        .map(|(name, value)| format!("{name}: {value}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "Dry run: {} {}, Headers: [{}], Body: {}",
        request.method,
        request.url,
        headers,
        request.body.as_str()
    )
}

pub fn report_line(report: &StatusReport) -> String {
    match report {
        StatusReport::Delivered(response) => status_line(response),
        StatusReport::DryRun(request) => dry_run_line(request),
    }
}

pub fn error_line(line_no: usize, err: &ProcessError) -> String {
    format!(
        "{} {}",
        format!("Error processing line {line_no}:").red().bold(),
        err
    )
}

/// Writes one line and flushes. A failed write is logged, not propagated.
pub fn emit(sink: &mut impl Write, text: &str) {
    if let Err(err) = writeln!(sink, "{text}").and_then(|()| sink.flush()) {
        tracing::warn!("failed to write output: {err}");
    }
}
