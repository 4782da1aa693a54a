use crate::domain::errors::ProcessError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hyper::http::Uri;
use percent_encoding::percent_decode_str;
use serde_json::Value;
use std::fmt;

/// Represents a validated absolute `http`/`https` URL
///
/// Path and query are percent-encoded, so `http://h/items/a b` is sent as
/// `/items/a%20b`. Userinfo is split off into [`Credentials`] and never
/// reaches the wire as part of the URL.
#[derive(Debug, Clone, PartialEq)]
pub struct Url {
    uri: Uri,
    credentials: Option<Credentials>,
}

impl Url {
    /// Parses an evaluated URL string.
    ///
    /// # Arguments
    /// * `url` - The URL string to parse
    ///
    /// # Returns
    /// * `Ok(Url)` - Normalized URL
    /// * `Err(ProcessError::Request)` - If the URL is malformed, relative,
    ///   or uses a scheme other than `http`/`https`
    pub fn parse(url: &str) -> Result<Self, ProcessError> {
        let mut parsed = url::Url::parse(url)
            .map_err(|e| ProcessError::Request(format!("invalid URL {url:?}: {e}")))?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ProcessError::Request(format!(
                "unsupported protocol scheme {:?} in {url:?}",
                parsed.scheme()
            )));
        }
        if parsed.host_str().is_none_or(str::is_empty) {
            return Err(ProcessError::Request(format!("URL {url:?} has no host")));
        }

        let credentials = Credentials::from_url(&parsed);
        if credentials.is_some() {
            parsed
                .set_username("")
                .and_then(|()| parsed.set_password(None))
                .map_err(|()| ProcessError::Request(format!("cannot strip userinfo from {url:?}")))?;
        }
        parsed.set_fragment(None);

        let uri = parsed
            .as_str()
            .parse::<Uri>()
            .map_err(|e| ProcessError::Request(format!("invalid URL {url:?}: {e}")))?;
        Ok(Url { uri, credentials })
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Userinfo given in the URL, if any.
    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// Returns the URL as a string
    pub fn as_str(&self) -> String {
        self.uri.to_string()
    }
}

impl fmt::Display for Url {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uri)
    }
}

/// `user:password` taken from a URL, percent-decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub username: String,
    pub password: Option<String>,
}

impl Credentials {
    fn from_url(url: &url::Url) -> Option<Self> {
        if url.username().is_empty() && url.password().is_none() {
            return None;
        }
        let decode = |text: &str| percent_decode_str(text).decode_utf8_lossy().into_owned();
        Some(Credentials {
            username: decode(url.username()),
            password: url.password().map(decode),
        })
    }

    /// `Authorization` header value for HTTP Basic authentication.
    pub fn basic_auth(&self) -> String {
        let pair = format!(
            "{}:{}",
            self.username,
            self.password.as_deref().unwrap_or_default()
        );
        format!("Basic {}", STANDARD.encode(pair))
    }
}

/// Represents an encoded JSON request body
#[derive(Debug, Clone, PartialEq)]
pub struct JsonBody(pub String);

impl JsonBody {
    /// Encodes a dynamic value as compact JSON.
    pub fn encode(value: &Value) -> Result<Self, ProcessError> {
        serde_json::to_string(value)
            .map(JsonBody)
            .map_err(ProcessError::Encode)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Ordered header list with set-by-name semantics.
///
/// Names compare case-insensitively. Setting an existing name replaces its
/// value in place, so the position of the first occurrence is kept and the
/// spelling of the latest one wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderList(Vec<(String, String)>);

impl HeaderList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .0
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            Some(entry) => *entry = (name, value),
            None => self.0.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value.as_str()))
    }
}
