use crate::application::services::RecordProcessor;
use crate::domain::errors::{PipeError, ProcessError};
use crate::expression::Evaluator;
use crate::infrastructure::output;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Counters for one run over the input stream.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub lines: usize,
    pub skipped: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Feeds input lines to a [`RecordProcessor`] one at a time, in order.
pub struct LineStreamDriver<'p, E: Evaluator> {
    processor: &'p RecordProcessor<E>,
}

impl<'p, E: Evaluator> LineStreamDriver<'p, E> {
    pub fn new(processor: &'p RecordProcessor<E>) -> Self {
        Self { processor }
    }

    /// Runs until end of input.
    ///
    /// Reports go to `out`, per-line failures to `errors`. Only a failure to
    /// read `input` ends the run early. Lines end at `\n` with an optional
    /// `\r`; invalid UTF-8 is replaced with U+FFFD and left to the decoder.
    pub async fn run<R, O, W>(
        &self,
        input: R,
        out: &mut O,
        errors: &mut W,
    ) -> Result<RunSummary, PipeError>
    where
        R: AsyncBufRead + Unpin,
        O: Write,
        W: Write,
    {
        let mut segments = input.split(b'\n');
        let mut summary = RunSummary::default();

        while let Some(mut raw) = segments.next_segment().await? {
            if raw.last() == Some(&b'\r') {
                raw.pop();
            }
            let line = String::from_utf8_lossy(&raw);
            summary.lines += 1;
            let line_no = summary.lines;
            if line.trim().is_empty() {
                summary.skipped += 1;
                continue;
            }

            match self.processor.process(&line).await {
                Ok(report) => {
                    summary.succeeded += 1;
                    output::emit(out, &output::report_line(&report));
                }
                Err(err) => {
                    summary.failed += 1;
                    if let ProcessError::HttpStatus(response) = &err {
                        output::emit(out, &output::status_line(response));
                    }
                    tracing::debug!(line = line_no, phase = err.phase(), "record failed: {err}");
                    output::emit(errors, &output::error_line(line_no, &err));
                }
            }
        }

        tracing::debug!(
            lines = summary.lines,
            skipped = summary.skipped,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "input exhausted"
        );
        Ok(summary)
    }
}
