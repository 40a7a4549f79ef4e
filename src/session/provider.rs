// Session provider sign-out over HTTP
// Author: kelexine (https://github.com/kelexine)

use super::{SessionProvider, SignOutOptions};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

/// Signs out by posting the options to the provider's sign-out endpoint.
///
/// The request is sent once. A failed sign-out is handled by the guard's
/// fallback navigation, not by retrying here.
pub struct HttpSignOut {
    http_client: Client,
    url: String,
}

impl HttpSignOut {
    pub fn new(http_client: Client, base_url: &str, signout_path: &str) -> Self {
        Self {
            http_client,
            url: format!("{}{}", base_url.trim_end_matches('/'), signout_path),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SessionProvider for HttpSignOut {
    async fn sign_out(&self, options: SignOutOptions) -> anyhow::Result<()> {
        debug!("Signing out via {}", self.url);

        self.http_client
            .post(&self.url)
            .json(&options)
            .send()
            .await
            .context("sign-out request failed")?
            .error_for_status()
            .context("sign-out rejected by session provider")?;

        Ok(())
    }
}
