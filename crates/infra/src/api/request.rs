//! Per-operation request description and rendering
//!
//! Generated glue describes an operation call as an [`OperationRequest`]:
//! a method, a path template such as `/pets/{petId}`, and the values placed
//! into the path, the query string, the headers and the body. The executor
//! renders it against the client's base URL once per call.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Method;
use serde::Serialize;
use thiserror::Error;
use url::Url;

const JSON: &str = "application/json";

/// A request that cannot be sent as described; raised before any network
/// activity.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("path parameter '{name}' must not be empty")]
    EmptyPathParameter { name: String },

    #[error("path parameter '{name}' must not be a dot segment")]
    DotSegmentPathParameter { name: String },

    #[error("path parameter '{name}' is not set")]
    MissingPathParameter { name: String },

    #[error("invalid header '{name}'")]
    InvalidHeader { name: String },

    #[error("failed to serialize request body: {0}")]
    Body(#[from] serde_json::Error),

    #[error("invalid request URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// Everything the executor needs to perform one logical operation call.
#[derive(Debug, Clone)]
pub struct OperationRequest {
    operation: &'static str,
    method: Method,
    path_template: &'static str,
    path_params: Vec<(&'static str, String)>,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body: Option<Vec<u8>>,
}

impl OperationRequest {
    pub fn new(operation: &'static str, method: Method, path_template: &'static str) -> Self {
        Self {
            operation,
            method,
            path_template,
            path_params: Vec::new(),
            query: Vec::new(),
            headers: vec![(ACCEPT.as_str().to_string(), JSON.to_string())],
            body: None,
        }
    }

    pub fn path_param(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.path_params.push((name, value.into()));
        self
    }

    /// Append one query parameter; repeated names are kept in order.
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn query_pairs<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.query.extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Set a header, replacing an earlier value of the same name.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    /// Serialize `body` as the JSON request body.
    pub fn json<T: Serialize + ?Sized>(self, body: &T) -> Result<Self, RequestError> {
        let bytes = serde_json::to_vec(body)?;
        let mut request = self.header(CONTENT_TYPE.as_str(), JSON);
        request.body = Some(bytes);
        Ok(request)
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path_template(&self) -> &'static str {
        self.path_template
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Trace span name: `"<METHOD> <path-template>"`
    pub fn span_name(&self) -> String {
        format!("{} {}", self.method, self.path_template)
    }

    /// Substitute path parameters into the template, percent-encoding each
    /// value.
    pub fn render_path(&self) -> Result<String, RequestError> {
        let mut rendered = String::with_capacity(self.path_template.len());
        let mut rest = self.path_template;

        while let Some(open) = rest.find('{') {
            let Some(len) = rest[open..].find('}') else {
                break;
            };
            let name = &rest[open + 1..open + len];
            let value = self
                .path_params
                .iter()
                .rev()
                .find(|(param, _)| *param == name)
                .map(|(_, value)| value)
                .ok_or_else(|| RequestError::MissingPathParameter { name: name.to_string() })?;
            if value.is_empty() {
                return Err(RequestError::EmptyPathParameter { name: name.to_string() });
            }
            // URL resolution would collapse these instead of sending them
            if value == "." || value == ".." {
                return Err(RequestError::DotSegmentPathParameter { name: name.to_string() });
            }

            rendered.push_str(&rest[..open]);
            rendered.push_str(&urlencoding::encode(value));
            rest = &rest[open + len + 1..];
        }
        rendered.push_str(rest);

        Ok(rendered)
    }

    /// Full request URL below `base`, keeping any path prefix of `base`.
    pub fn render(&self, base: &Url) -> Result<Url, RequestError> {
        let path = self.render_path()?;
        let joined = format!("{}{}", base.as_str().trim_end_matches('/'), path);
        let mut url = Url::parse(&joined)
            .map_err(|source| RequestError::InvalidUrl { url: joined.clone(), source })?;

        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(self.query.iter());
        }

        Ok(url)
    }

    pub fn header_map(&self) -> Result<HeaderMap, RequestError> {
        let mut headers = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            let invalid = || RequestError::InvalidHeader { name: name.clone() };
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
            let header_value = HeaderValue::from_str(value).map_err(|_| invalid())?;
            headers.insert(header_name, header_value);
        }
        Ok(headers)
    }
}
