use crate::application::binder::EnvironmentBinder;
use crate::application::builders::request_builder::RequestBuilder;
use crate::domain::context::{Context, EnvSnapshot};
use crate::domain::entities::{Request, Response, StatusReport};
use crate::domain::errors::ProcessError;
use crate::expression::{EvalError, Evaluator, ExprEvaluator};
use anyhow::Result;
use async_trait::async_trait;
use http::Method;
use serde_json::Value;
use std::borrow::Cow;

/// Trait for HTTP clients to enable mocking and dependency inversion
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn send(&self, request: Request) -> Result<Response>;
}

/// Expressions and flags fixed for the lifetime of a run.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    pub url: String,
    /// `None` sends the decoded record unchanged.
    pub transform: Option<String>,
    pub headers: Vec<String>,
    pub method: Method,
    pub dry_run: bool,
}

impl ProcessorConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            transform: None,
            headers: Vec::new(),
            method: Method::POST,
            dry_run: false,
        }
    }
}

type Compiled<P> = std::result::Result<P, EvalError>;

/// Turns one input line into one HTTP request.
///
/// Expressions are compiled once up front. A compile failure is kept and
/// reported for every record, so a bad expression never stops the stream.
pub struct RecordProcessor<E: Evaluator = ExprEvaluator> {
    evaluator: E,
    binder: EnvironmentBinder,
    url: Compiled<E::Program>,
    transform: Option<Compiled<E::Program>>,
    headers: Vec<Compiled<E::Program>>,
    method: Method,
    dry_run: bool,
    http_client: Box<dyn HttpClient>,
}

impl<E: Evaluator> RecordProcessor<E> {
    pub fn new(
        evaluator: E,
        config: ProcessorConfig,
        env: EnvSnapshot,
        http_client: Box<dyn HttpClient>,
    ) -> Self {
        let compile = |kind: &str, source: &str| {
            let program = evaluator.compile(source);
            if let Err(err) = &program {
                tracing::warn!("{kind} expression {source:?} does not compile: {err}");
            }
            program
        };

        let url = compile("URL", &config.url);
        let transform = config
            .transform
            .as_deref()
            .map(|source| compile("transform", source));
        let headers = config
            .headers
            .iter()
            .map(|source| compile("header", source))
            .collect();

        Self {
            evaluator,
            binder: EnvironmentBinder::new(env),
            url,
            transform,
            headers,
            method: config.method,
            dry_run: config.dry_run,
            http_client,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Processes one non-blank input line.
    ///
    /// A response with status >= 400 comes back as
    /// [`ProcessError::HttpStatus`] carrying the full response, so the caller
    /// can still report it.
    pub async fn process(&self, line: &str) -> Result<StatusReport, ProcessError> {
        let record: Value = serde_json::from_str(line).map_err(ProcessError::Decode)?;
        let ctx = self.binder.bind(record);

        let url = self.run(&self.url, &ctx).map_err(ProcessError::UrlEval)?;

        let body = match &self.transform {
            Some(program) => Cow::Owned(
                self.run(program, &ctx)
                    .map_err(ProcessError::TransformEval)?,
            ),
            None => Cow::Borrowed(ctx.input()),
        };

        let mut builder = RequestBuilder::new(self.method.clone(), &url)?.body(&body)?;
        for program in &self.headers {
            let evaluated = self.run(program, &ctx).map_err(ProcessError::HeaderEval)?;
            builder = builder.header(&evaluated)?;
        }

        if self.dry_run {
            return Ok(builder.preview());
        }

        let request = builder.build();
        tracing::debug!(method = %request.method, url = %request.url, "sending request");
        let response = self
            .http_client
            .send(request)
            .await
            .map_err(ProcessError::Send)?;
        tracing::debug!(status = response.status.as_u16(), "response received");

        if response.is_error() {
            return Err(ProcessError::HttpStatus(response));
        }
        Ok(StatusReport::Delivered(response))
    }

    fn run(&self, program: &Compiled<E::Program>, ctx: &Context) -> Result<Value, EvalError> {
        match program {
            Ok(program) => self.evaluator.run(program, ctx),
            Err(err) => Err(err.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use http::StatusCode;

    fn response(status: StatusCode, body: &str) -> Response {
        Response {
            status,
            body: body.to_string(),
        }
    }

    fn processor(config: ProcessorConfig, client: MockHttpClient) -> RecordProcessor {
        let env = EnvSnapshot::from_vars([("TOKEN", "abc123")]);
        RecordProcessor::new(ExprEvaluator, config, env, Box::new(client))
    }

    fn never_called() -> MockHttpClient {
        let mut client = MockHttpClient::new();
        client.expect_send().times(0);
        client
    }

    #[tokio::test]
    async fn sends_record_unchanged_without_transform() {
        let mut client = MockHttpClient::new();
        client
            .expect_send()
            .times(1)
            .withf(|request| {
                request.method == Method::POST
                    && request.url.as_str() == "http://x/y"
                    && request.body.as_str() == r#"{"message":"hello"}"#
                    && request.headers.get("Content-Type") == Some("application/json")
            })
            .returning(|_| Ok(response(StatusCode::OK, "ok")));

        let processor = processor(ProcessorConfig::new(r#""http://x/y""#), client);
        let report = processor.process(r#"{"message": "hello"}"#).await.unwrap();

        match report {
            StatusReport::Delivered(response) => assert_eq!(response.body, "ok"),
            other => panic!("unexpected report {other:?}"),
        }
    }

    #[tokio::test]
    async fn transform_replaces_body() {
        let mut client = MockHttpClient::new();
        client
            .expect_send()
            .withf(|request| request.body.as_str() == r#"{"data":{"id":123}}"#)
            .returning(|_| Ok(response(StatusCode::ACCEPTED, "")));

        let mut config = ProcessorConfig::new(r#""http://x/y""#);
        config.transform = Some("{data: input}".to_string());
        let processor = processor(config, client);

        assert!(processor.process(r#"{"id": 123}"#).await.is_ok());
    }

    #[tokio::test]
    async fn url_is_built_from_record_fields() {
        let mut client = MockHttpClient::new();
        client
            .expect_send()
            .withf(|request| request.url.as_str() == "http://h/p?queue=urgent")
            .returning(|_| Ok(response(StatusCode::OK, "")));

        let processor = processor(
            ProcessorConfig::new(r#""http://h/p?queue=" + input.queue"#),
            client,
        );

        assert!(processor.process(r#"{"queue":"urgent","id":123}"#).await.is_ok());
    }

    #[tokio::test]
    async fn url_field_with_spaces_and_accents_is_escaped() {
        let mut client = MockHttpClient::new();
        client
            .expect_send()
            .times(2)
            .withf(|request| request.url.uri().path().starts_with("/items/"))
            .returning(|request| {
                Ok(response(StatusCode::OK, request.url.uri().path()))
            });

        let processor = processor(
            ProcessorConfig::new(r#""http://h/items/" + input.name"#),
            client,
        );

        for (line, path) in [
            (r#"{"name":"a b"}"#, "/items/a%20b"),
            (r#"{"name":"café"}"#, "/items/caf%C3%A9"),
        ] {
            match processor.process(line).await {
                Ok(StatusReport::Delivered(response)) => assert_eq!(response.body, path),
                other => panic!("unexpected result {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn header_reads_environment() {
        let mut client = MockHttpClient::new();
        client
            .expect_send()
            .withf(|request| request.headers.get("Authorization") == Some("Bearer abc123"))
            .returning(|_| Ok(response(StatusCode::OK, "")));

        let mut config = ProcessorConfig::new(r#""http://x/y""#);
        config.headers = vec![r#""Authorization: Bearer " + env.TOKEN"#.to_string()];
        let processor = processor(config, client);

        assert!(processor.process("{}").await.is_ok());
    }

    #[tokio::test]
    async fn later_header_flags_win() {
        let mut client = MockHttpClient::new();
        client
            .expect_send()
            .withf(|request| {
                request.headers.get("X-Source") == Some("second") && request.headers.iter().count() == 2
            })
            .returning(|_| Ok(response(StatusCode::OK, "")));

        let mut config = ProcessorConfig::new(r#""http://x/y""#);
        config.headers = vec!["'X-Source: first'".to_string(), "'x-source: second'".to_string()];
        let processor = processor(config, client);

        assert!(processor.process("{}").await.is_ok());
    }

    #[tokio::test]
    async fn header_without_colon_fails_before_sending() {
        let mut config = ProcessorConfig::new(r#""http://x/y""#);
        config.headers = vec!["'Authorization Bearer x'".to_string()];
        let processor = processor(config, never_called());

        assert!(matches!(
            processor.process("{}").await,
            Err(ProcessError::HeaderFormat(_))
        ));
    }

    #[tokio::test]
    async fn each_phase_reports_its_own_error() {
        let processor = processor(ProcessorConfig::new("input.url"), never_called());
        assert!(matches!(
            processor.process("{bad").await,
            Err(ProcessError::Decode(_))
        ));
        assert!(matches!(
            processor.process("null").await,
            Err(ProcessError::UrlEval(EvalError::CannotFetch { .. }))
        ));
        assert!(matches!(
            processor.process(r#"{"url": "ftp://x"}"#).await,
            Err(ProcessError::Request(_))
        ));

        let mut config = ProcessorConfig::new(r#""http://x/y""#);
        config.transform = Some("input.a.b".to_string());
        let processor = self::processor(config, never_called());
        assert!(matches!(
            processor.process("{}").await,
            Err(ProcessError::TransformEval(_))
        ));

        let mut config = ProcessorConfig::new(r#""http://x/y""#);
        config.headers = vec!["nope".to_string()];
        let processor = self::processor(config, never_called());
        assert!(matches!(
            processor.process("{}").await,
            Err(ProcessError::HeaderEval(EvalError::UnknownName { .. }))
        ));
    }

    #[tokio::test]
    async fn compile_error_repeats_for_every_record() {
        let processor = processor(ProcessorConfig::new("\"http://x/\" +"), never_called());
        for line in ["{}", "[1]"] {
            match processor.process(line).await {
                Err(ProcessError::UrlEval(err)) => assert!(err.is_compile_error()),
                other => panic!("expected UrlEval, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn dry_run_never_touches_the_client() {
        let mut config = ProcessorConfig::new(r#""http://x/" + input.path"#);
        config.dry_run = true;
        config.method = Method::DELETE;
        let processor = processor(config, never_called());
        assert!(processor.is_dry_run());

        match processor.process(r#"{"path": "items/7"}"#).await.unwrap() {
            StatusReport::DryRun(request) => {
                assert_eq!(request.method, Method::DELETE);
                assert_eq!(request.url.as_str(), "http://x/items/7");
                assert_eq!(request.body.as_str(), r#"{"path":"items/7"}"#);
            }
            other => panic!("unexpected report {other:?}"),
        }
    }

    #[tokio::test]
    async fn error_status_carries_the_response() {
        let mut client = MockHttpClient::new();
        client
            .expect_send()
            .returning(|_| Ok(response(StatusCode::NOT_FOUND, "missing")));
        let processor = processor(ProcessorConfig::new(r#""http://x/y""#), client);

        match processor.process("{}").await {
            Err(ProcessError::HttpStatus(response)) => {
                assert_eq!(response.status, StatusCode::NOT_FOUND);
                assert_eq!(response.body, "missing");
            }
            other => panic!("expected HttpStatus, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn transport_failure_is_a_send_error() {
        let mut client = MockHttpClient::new();
        client
            .expect_send()
            .returning(|_| Err(anyhow!("connection refused")));
        let processor = processor(ProcessorConfig::new(r#""http://x/y""#), client);

        let err = processor.process("{}").await.unwrap_err();
        assert_eq!(err.phase(), "send");
        assert!(err.to_string().contains("connection refused"));
    }
}
