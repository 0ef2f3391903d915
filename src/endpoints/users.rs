use super::{call, payload, EndpointError};
use crate::{ApiClient, Method, NewUser, User, UserUpdate};
use serde_json::Value;
use url::form_urlencoded;

const USERS: &str = "/api/v1/users";

/// Create a new account. No token is needed.
pub async fn register(
    client: &ApiClient,
    user: &NewUser,
) -> Result<User, EndpointError> {
    let data = payload(user)?;
    let endpoint = format!("{}/register", USERS);

    call(client, &endpoint, Method::Post, Some(&data), None).await
}

/// Get the profile of whoever owns `token`.
pub async fn current_user(
    client: &ApiClient,
    token: &str,
) -> Result<User, EndpointError> {
    let endpoint = format!("{}/me", USERS);

    call(client, &endpoint, Method::Get, None, Some(token)).await
}

/// List every user, a page at a time. Only admins may do this.
pub async fn list_users(
    client: &ApiClient,
    token: &str,
    skip: usize,
    limit: usize,
) -> Result<Vec<User>, EndpointError> {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("skip", &skip.to_string())
        .append_pair("limit", &limit.to_string())
        .finish();
    let endpoint = format!("{}/?{}", USERS, query);

    call(client, &endpoint, Method::Get, None, Some(token)).await
}

/// Look up a single user. Only admins may do this.
pub async fn get_user(
    client: &ApiClient,
    token: &str,
    id: u64,
) -> Result<User, EndpointError> {
    let endpoint = format!("{}/{}", USERS, id);

    call(client, &endpoint, Method::Get, None, Some(token)).await
}

pub async fn update_user(
    client: &ApiClient,
    token: &str,
    id: u64,
    update: &UserUpdate,
) -> Result<User, EndpointError> {
    let data = payload(update)?;
    let endpoint = format!("{}/{}", USERS, id);

    call(client, &endpoint, Method::Put, Some(&data), Some(token)).await
}

pub async fn delete_user(
    client: &ApiClient,
    token: &str,
    id: u64,
) -> Result<(), EndpointError> {
    let endpoint = format!("{}/{}", USERS, id);

    // the server replies with a 204, which comes back as {"success": true}
    let _: Value =
        call(client, &endpoint, Method::Delete, None, Some(token)).await?;

    Ok(())
}
