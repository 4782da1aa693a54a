use crate::application::builders::header::parse_header;
use crate::domain::entities::{Request, StatusReport};
use crate::domain::errors::ProcessError;
use crate::domain::value_objects::{HeaderList, JsonBody, Url};
use crate::expression::to_display_string;
use http::Method;
use serde_json::Value;

/// Assembles a [`Request`] from evaluated expression results.
///
/// Starts with `Content-Type: application/json`, plus `Authorization: Basic`
/// when the URL carries userinfo. Evaluated headers are set on top, so a
/// later header of the same name replaces an earlier one.
pub struct RequestBuilder {
    method: Method,
    url: Url,
    headers: HeaderList,
    body: Option<JsonBody>,
}

impl RequestBuilder {
    /// Coerces an evaluated URL to text and validates it.
    pub fn new(method: Method, evaluated_url: &Value) -> Result<Self, ProcessError> {
        let url = Url::parse(&to_display_string(evaluated_url))?;
        let mut headers = HeaderList::new();
        headers.set("Content-Type", "application/json");
        if let Some(credentials) = url.credentials() {
            headers.set("Authorization", credentials.basic_auth());
        }
        Ok(Self {
            method,
            url,
            headers,
            body: None,
        })
    }

    pub fn body(mut self, value: &Value) -> Result<Self, ProcessError> {
        self.body = Some(JsonBody::encode(value)?);
        Ok(self)
    }

    pub fn header(mut self, evaluated: &Value) -> Result<Self, ProcessError> {
        let (name, value) = parse_header(evaluated)?;
        self.headers.set(name, value);
        Ok(self)
    }

    pub fn build(self) -> Request {
        Request {
            method: self.method,
            url: self.url,
            headers: self.headers,
            body: self.body.unwrap_or_else(|| JsonBody("null".to_string())),
        }
    }

    /// Builds the request for dry-run reporting instead of sending it.
    pub fn preview(self) -> StatusReport {
        StatusReport::DryRun(self.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_to_json_content_type() {
        let request = RequestBuilder::new(Method::POST, &json!("http://x/y"))
            .unwrap()
            .body(&json!({"message": "hello"}))
            .unwrap()
            .build();

        assert_eq!(request.method, Method::POST);
        assert_eq!(request.url.as_str(), "http://x/y");
        assert_eq!(request.headers.get("content-type"), Some("application/json"));
        assert_eq!(request.headers.get("Authorization"), None);
        assert_eq!(request.body.as_str(), r#"{"message":"hello"}"#);
    }

    #[test]
    fn later_headers_override_earlier_ones() {
        let request = RequestBuilder::new(Method::PUT, &json!("http://x/y"))
            .unwrap()
            .header(&json!("X-Token: first"))
            .unwrap()
            .header(&json!("x-token: second"))
            .unwrap()
            .header(&json!("Content-Type: text/plain"))
            .unwrap()
            .build();

        assert_eq!(request.headers.iter().count(), 2);
        assert_eq!(request.headers.get("X-Token"), Some("second"));
        assert_eq!(request.headers.get("Content-Type"), Some("text/plain"));
    }

    #[test]
    fn userinfo_turns_into_basic_auth() {
        let request = RequestBuilder::new(Method::POST, &json!("http://user:p%40ss@h/p"))
            .unwrap()
            .build();

        assert_eq!(request.url.as_str(), "http://h/p");
        assert_eq!(request.headers.get("Authorization"), Some("Basic dXNlcjpwQHNz"));
    }

    #[test]
    fn explicit_authorization_header_wins_over_userinfo() {
        let request = RequestBuilder::new(Method::POST, &json!("http://user:pw@h/p"))
            .unwrap()
            .header(&json!("Authorization: Bearer abc123"))
            .unwrap()
            .build();

        assert_eq!(request.headers.get("Authorization"), Some("Bearer abc123"));
    }

    #[test]
    fn non_url_result_fails_request_creation() {
        assert!(matches!(
            RequestBuilder::new(Method::POST, &json!(42)),
            Err(ProcessError::Request(_))
        ));
    }

    #[test]
    fn missing_body_encodes_null() {
        let request = RequestBuilder::new(Method::DELETE, &json!("http://x/y"))
            .unwrap()
            .build();
        assert_eq!(request.body.as_str(), "null");
    }
}
