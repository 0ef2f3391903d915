use super::EndpointError;
use crate::{request::interpret_response, ApiClient, ApiError};
use serde_derive::{Deserialize, Serialize};

/// Exchange a username and password for an access token.
///
/// Unlike the rest of the API, this endpoint only accepts a form-encoded
/// body.
pub async fn login(
    client: &ApiClient,
    username: &str,
    password: &str,
) -> Result<AccessToken, EndpointError> {
    let url = client.config().url_for("/token");
    let data = Data { username, password };

    log::debug!("Sending a login request to {}", url);

    let result = send(client, &url, &data).await;

    match result {
        Ok(token) => {
            log::info!("Logged in as {}", username);
            Ok(token)
        },
        Err(e) => {
            log::error!("Login failed: {}", e);
            Err(e)
        },
    }
}

async fn send(
    client: &ApiClient,
    url: &str,
    data: &Data<'_>,
) -> Result<AccessToken, EndpointError> {
    let response = client
        .http()
        .post(url)
        .form(data)
        .send()
        .await
        .map_err(ApiError::from)?;

    let status = response.status();
    log::trace!("Headers: {:#?}", response.headers());

    let body = response.bytes().await.map_err(ApiError::from)?;
    let value = interpret_response(status, &body)?;

    serde_json::from_value(value).map_err(EndpointError::UnexpectedResponse)
}

/// A bearer token handed out by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: String,
}

#[derive(Copy, Clone, Serialize)]
struct Data<'a> {
    username: &'a str,
    password: &'a str,
}
