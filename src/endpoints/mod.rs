//! The BugWise API's endpoints.

mod login;
mod users;

pub use login::{login, AccessToken};
pub use users::{
    current_user, delete_user, get_user, list_users, register, update_user,
};

use crate::{ApiClient, ApiError, Method};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

/// Typical endpoint errors.
#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    /// The request failed or the server rejected it.
    #[error(transparent)]
    Api(#[from] ApiError),
    /// The response was valid JSON, just not the JSON we expected.
    #[error("The server sent an unexpected response")]
    UnexpectedResponse(#[source] serde_json::Error),
}

impl EndpointError {
    pub fn status(&self) -> Option<reqwest::StatusCode> {
        match self {
            EndpointError::Api(e) => e.status(),
            EndpointError::UnexpectedResponse(_) => None,
        }
    }
}

async fn call<T>(
    client: &ApiClient,
    endpoint: &str,
    method: Method,
    data: Option<&Value>,
    token: Option<&str>,
) -> Result<T, EndpointError>
where
    T: DeserializeOwned,
{
    let value = client.request(endpoint, method, data, token).await?;
    log::trace!("Parsed response: {:#?}", value);

    serde_json::from_value(value).map_err(EndpointError::UnexpectedResponse)
}

fn payload<D: Serialize>(data: &D) -> Result<Value, EndpointError> {
    serde_json::to_value(data)
        .map_err(|e| EndpointError::Api(ApiError::Encode(e)))
}
