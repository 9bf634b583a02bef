use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

use crate::{
    config::Config,
    error::{Error, Result, truncate_body},
};

pub(crate) fn build_client(config: &Config) -> Result<Client> {
    Client::builder()
        .timeout(config.request_timeout())
        .user_agent(config.user_agent.as_str())
        .build()
        .map_err(Error::Client)
}

/// Send a GET and decode its JSON body.
///
/// Network failures and non-success statuses become `Transport`; a body that
/// doesn't match `T` becomes `MalformedResponse`.
pub(crate) async fn get_json<T: DeserializeOwned>(
    request: RequestBuilder,
    endpoint: &'static str,
) -> Result<T> {
    let res = request.send().await.map_err(|e| Error::transport(endpoint, e))?;

    let status = res.status();
    let body = res.text().await.map_err(|e| Error::transport(endpoint, e))?;

    if !status.is_success() {
        tracing::debug!(endpoint, %status, "provider returned an error status");
        return Err(Error::transport(
            endpoint,
            format!("status {}: {}", status, truncate_body(&body)),
        ));
    }

    serde_json::from_str(&body).map_err(|e| Error::malformed(endpoint, e))
}
