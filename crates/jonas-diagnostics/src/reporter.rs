//! Remote reporting to a GitHub gist

use crate::error::DiagnosticsError;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

/// Description given to created gists
pub const GIST_DESCRIPTION: &str = "JOnAS instance diagnostics";

/// Options passed with every gist call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GistOptions {
    pub access_token: Option<String>,
    pub public: bool,
    pub filename: String,
    /// Log response bodies at debug level
    pub verbose: bool,
}

/// Handle to a created gist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GistReference {
    /// API URL used for updates
    pub url: String,
    /// Browser URL
    pub html_url: String,
}

/// Creates and updates the remote diagnostics record
#[async_trait]
pub trait GistReporter: Send + Sync {
    async fn create(&self, content: &str, options: &GistOptions) -> Result<GistReference>;

    async fn update(
        &self,
        reference: &GistReference,
        content: &str,
        options: &GistOptions,
    ) -> Result<()>;
}

/// Gist client for the GitHub REST API
#[derive(Debug, Clone)]
pub struct GithubGistClient {
    api_url: String,
    http_client: reqwest::Client,
}

impl GithubGistClient {
    /// Create a client for the API rooted at `api_url`
    pub fn new(api_url: &str) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("jonas-diagnostics/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(GithubGistClient {
            api_url: api_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        options: &GistOptions,
    ) -> Result<String> {
        let request = match &options.access_token {
            Some(token) => request.header(reqwest::header::AUTHORIZATION, format!("token {token}")),
            None => request,
        };

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if options.verbose {
            debug!(status = status.as_u16(), body = %body, "Gist API response");
        }
        if !status.is_success() {
            return Err(DiagnosticsError::GistApi {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl GistReporter for GithubGistClient {
    async fn create(&self, content: &str, options: &GistOptions) -> Result<GistReference> {
        let url = format!("{}/gists", self.api_url);
        let request = self
            .http_client
            .post(&url)
            .json(&gist_payload(content, options, true));
        let body = self.send(request, options).await?;
        parse_reference(&body)
    }

    async fn update(
        &self,
        reference: &GistReference,
        content: &str,
        options: &GistOptions,
    ) -> Result<()> {
        let request = self
            .http_client
            .patch(&reference.url)
            .json(&gist_payload(content, options, false));
        self.send(request, options).await?;
        Ok(())
    }
}

/// Request body for creating (`create = true`) or updating a gist.
pub fn gist_payload(content: &str, options: &GistOptions, create: bool) -> Value {
    let mut files = serde_json::Map::new();
    files.insert(options.filename.clone(), json!({ "content": content }));

    let mut payload = json!({
        "description": GIST_DESCRIPTION,
        "files": files,
    });
    if create {
        payload["public"] = Value::Bool(options.public);
    }
    payload
}

/// Extract the gist reference from an API response body.
pub fn parse_reference(body: &str) -> Result<GistReference> {
    Ok(serde_json::from_str(body)?)
}
