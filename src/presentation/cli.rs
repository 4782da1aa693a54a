use crate::application::driver::{LineStreamDriver, RunSummary};
use crate::application::services::{ProcessorConfig, RecordProcessor};
use crate::domain::context::EnvSnapshot;
use crate::expression::ExprEvaluator;
use crate::infrastructure::http_client::HyperHttpClient;
use anyhow::{anyhow, Result};
use clap::Parser;
use http::Method;
use std::time::Duration;
use tokio::io::BufReader;

/// CLI configuration for pub
#[derive(Parser, Debug)]
#[command(name = "pub", version)]
#[command(about = "Read JSON from stdin, transform it, and send HTTP requests")]
#[command(long_about = "pub reads JSON lines from stdin, evaluates expressions against each \
line and sends one HTTP request per line.

Expressions see the decoded line as `input` and the environment as `env`.

Example:
  tail -f events.ndjson | pub --transform '{data: input}' \\
    --header '\"Authorization: Bearer \" + env.EVENTS_PUBLISH_TOKEN' \\
    '\"http://localhost:8080/publish?queue=\" + input.queue'")]
pub struct Cli {
    /// Expression evaluating to the target URL
    #[arg(value_name = "URL_EXPR")]
    pub url: String,

    /// Add header (can be used multiple times)
    #[arg(long = "header", value_name = "EXPR")]
    pub headers: Vec<String>,

    /// Transform expression to apply to input
    #[arg(long, value_name = "EXPR", default_value = "")]
    pub transform: String,

    /// HTTP request method
    #[arg(short = 'X', long = "request", default_value = "POST")]
    pub method: String,

    /// Print the assembled requests instead of sending them
    #[arg(long)]
    pub dry_run: bool,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn processor_config(&self) -> Result<ProcessorConfig> {
        let method = Method::from_bytes(self.method.to_uppercase().as_bytes())
            .map_err(|_| anyhow!("Unsupported HTTP method: '{}'", self.method))?;

        Ok(ProcessorConfig {
            url: self.url.clone(),
            transform: Some(self.transform.clone()).filter(|transform| !transform.is_empty()),
            headers: self.headers.clone(),
            method,
            dry_run: self.dry_run,
        })
    }

    pub async fn run(&self, env: EnvSnapshot) -> Result<RunSummary> {
        let config = self.processor_config()?;
        let http_client = HyperHttpClient::new(self.timeout.map(Duration::from_secs))?;
        let processor = RecordProcessor::new(ExprEvaluator, config, env, Box::new(http_client));

        tracing::debug!(dry_run = processor.is_dry_run(), "reading records from stdin");
        let summary = LineStreamDriver::new(&processor)
            .run(
                BufReader::new(tokio::io::stdin()),
                &mut std::io::stdout(),
                &mut std::io::stderr(),
            )
            .await?;
        Ok(summary)
    }
}
