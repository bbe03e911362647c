use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, COOKIE, SET_COOKIE};
use serde::Deserialize;

use crate::auth::SESSION_COOKIE;
use crate::db::NewQueuedPost;
use crate::providers::NormalizedPost;

/// Server-side operations a moderation session depends on.
#[async_trait]
pub trait CurationBackend: Send + Sync + 'static {
    /// Client token for the current login, or `None` if not logged in.
    async fn verify(&self) -> Result<Option<String>>;

    /// One shuffled batch of candidates.
    async fn fetch_posts(&self, token: &str) -> Result<Vec<NormalizedPost>>;

    /// Queue an approved candidate.
    async fn submit(&self, post: &NewQueuedPost) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    token: Option<String>,
}

/// [`CurationBackend`] talking to a running web service with a session cookie.
#[derive(Clone)]
pub struct HttpCurationClient {
    client: reqwest::Client,
    base_url: String,
    cookie: String,
}

impl HttpCurationClient {
    /// Wrap an existing session cookie value.
    #[must_use]
    pub fn with_cookie(client: reqwest::Client, base_url: &str, cookie: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            cookie: cookie.to_string(),
        }
    }

    /// Log in with email and password and keep the issued session cookie.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or no session cookie is issued.
    pub async fn login(base_url: &str, email: &str, password: &str) -> Result<Self> {
        // The login answer is a redirect carrying Set-Cookie; it must not be followed.
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("Failed to build HTTP client")?;
        let base_url = base_url.trim_end_matches('/');

        let response = client
            .post(format!("{base_url}/login"))
            .form(&[("email", email), ("password", password)])
            .send()
            .await
            .context("Login request failed")?;

        let prefix = format!("{SESSION_COOKIE}=");
        let cookie = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(|v| {
                v.split(';')
                    .next()
                    .and_then(|pair| pair.trim().strip_prefix(prefix.as_str()))
                    .filter(|value| !value.is_empty())
                    .map(String::from)
            })
            .ok_or_else(|| anyhow!("Login rejected (HTTP {})", response.status()))?;

        Ok(Self::with_cookie(client, base_url, &cookie))
    }

    fn cookie_header(&self) -> String {
        format!("{SESSION_COOKIE}={}", self.cookie)
    }
}

#[async_trait]
impl CurationBackend for HttpCurationClient {
    async fn verify(&self) -> Result<Option<String>> {
        let response: VerifyResponse = self
            .client
            .get(format!("{}/client/verify", self.base_url))
            .header(COOKIE, self.cookie_header())
            .send()
            .await
            .context("Verify request failed")?
            .error_for_status()?
            .json()
            .await
            .context("Invalid verify response")?;
        Ok(response.token)
    }

    async fn fetch_posts(&self, token: &str) -> Result<Vec<NormalizedPost>> {
        self.client
            .get(format!("{}/client/posts", self.base_url))
            .header(COOKIE, self.cookie_header())
            .header(AUTHORIZATION, token)
            .send()
            .await
            .context("Posts request failed")?
            .error_for_status()?
            .json()
            .await
            .context("Invalid posts response")
    }

    async fn submit(&self, post: &NewQueuedPost) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/booru", self.base_url))
            .header(COOKIE, self.cookie_header())
            .json(post)
            .send()
            .await
            .context("Submit request failed")?;

        if !response.status().is_success() {
            bail!("Submit rejected (HTTP {})", response.status());
        }
        Ok(())
    }
}
