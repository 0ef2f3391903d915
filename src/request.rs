//! Sending requests to the BugWise API and normalising what comes back.

use crate::Config;
use reqwest::{
    header::CONTENT_TYPE, Client, Error as ReqwestError, Request, StatusCode,
};
use serde_json::{json, Value};
use std::{
    fmt::{self, Display, Formatter},
    str::FromStr,
};

/// The message used when a failed response doesn't say what went wrong.
pub const FALLBACK_ERROR_MESSAGE: &str = "Something went wrong";

/// The HTTP methods the API understands.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl Method {
    /// Will a JSON payload be attached when using this method?
    ///
    /// Only `POST`, `PUT` and `DELETE` send a body. Any data passed along
    /// with a `GET` or `PATCH` is silently dropped.
    pub fn carries_body(self) -> bool {
        match self {
            Method::Post | Method::Put | Method::Delete => true,
            Method::Get | Method::Patch => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
        }
    }
}

impl Default for Method {
    fn default() -> Self { Method::Get }
}

impl Display for Method {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> reqwest::Method {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
            Method::Patch => reqwest::Method::PATCH,
        }
    }
}

impl FromStr for Method {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Method, Self::Err> {
        let method = match s.to_ascii_uppercase().as_str() {
            "GET" => Method::Get,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "DELETE" => Method::Delete,
            "PATCH" => Method::Patch,
            _ => return Err(UnknownMethod(s.to_string())),
        };

        Ok(method)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("\"{0}\" isn't a supported HTTP method")]
pub struct UnknownMethod(String);

/// Something that may go wrong while talking to the API.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP client encountered an error.
    #[error("Unable to send the request")]
    HttpClient(#[from] ReqwestError),
    /// The response body wasn't valid JSON.
    #[error("Unable to parse the response")]
    Decode(#[from] serde_json::Error),
    /// The payload couldn't be turned into JSON.
    #[error("Unable to serialize the payload")]
    Encode(#[source] serde_json::Error),
    /// The server answered with a non-2xx status code.
    #[error("{message}")]
    Server { status: StatusCode, message: String },
}

impl ApiError {
    /// The status code the server rejected our request with, if it got that
    /// far.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Server { status, .. } => Some(*status),
            ApiError::HttpClient(e) => e.status(),
            _ => None,
        }
    }
}

/// A handle to the BugWise API.
///
/// Cloning is cheap, all clones share the same connection pool and cookie
/// jar.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    config: Config,
}

impl ApiClient {
    /// Create a new [`ApiClient`] which remembers cookies between requests.
    pub fn new(config: Config) -> Result<Self, ApiError> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .cookie_store(true)
            .build()?;

        Ok(ApiClient::with_client(client, config))
    }

    /// Use an existing [`Client`], leaving cookie handling up to the caller.
    pub fn with_client(client: Client, config: Config) -> Self {
        ApiClient { client, config }
    }

    pub fn config(&self) -> &Config { &self.config }

    pub(crate) fn http(&self) -> &Client { &self.client }

    /// Send a request to `endpoint` and decode the JSON response.
    ///
    /// A `204 No Content` response becomes `{"success": true}`. Failures are
    /// logged before being handed back to the caller.
    pub async fn request(
        &self,
        endpoint: &str,
        method: Method,
        data: Option<&Value>,
        token: Option<&str>,
    ) -> Result<Value, ApiError> {
        let result = self.send(endpoint, method, data, token).await;

        if let Err(ref e) = result {
            log::error!("API request error: {}", e);
        }

        result
    }

    async fn send(
        &self,
        endpoint: &str,
        method: Method,
        data: Option<&Value>,
        token: Option<&str>,
    ) -> Result<Value, ApiError> {
        let request = self.build_request(endpoint, method, data, token)?;

        log::debug!("Sending a {} request to {}", method, request.url());
        log::trace!("Payload: {:#?}", data);

        let response = self.client.execute(request).await?;
        let status = response.status();
        log::trace!("Headers: {:#?}", response.headers());

        if status == StatusCode::NO_CONTENT {
            return Ok(success());
        }

        let body = response.bytes().await?;
        log::trace!("Response: {}", String::from_utf8_lossy(&body));

        interpret_response(status, &body)
    }

    /// Assemble the request [`ApiClient::request()`] would send, without
    /// sending it.
    pub fn build_request(
        &self,
        endpoint: &str,
        method: Method,
        data: Option<&Value>,
        token: Option<&str>,
    ) -> Result<Request, ApiError> {
        let url = self.config.url_for(endpoint);

        let mut builder = self
            .client
            .request(method.into(), &url)
            .header(CONTENT_TYPE, "application/json");

        if let Some(token) = token.filter(|t| !t.is_empty()) {
            builder = builder.bearer_auth(token);
        }

        if method.carries_body() {
            if let Some(data) = data.filter(|d| !d.is_null()) {
                builder = builder.json(data);
            }
        }

        builder.build().map_err(ApiError::from)
    }
}

/// Turn a status code and raw body into either the decoded JSON or an error.
pub fn interpret_response(
    status: StatusCode,
    body: &[u8],
) -> Result<Value, ApiError> {
    if status == StatusCode::NO_CONTENT {
        return Ok(success());
    }

    let value: Value = serde_json::from_slice(body)?;

    if status.is_success() {
        Ok(value)
    } else {
        Err(ApiError::Server {
            status,
            message: error_message(&value),
        })
    }
}

fn success() -> Value { json!({ "success": true }) }

/// Pull the `detail` out of an error response, falling back to
/// [`FALLBACK_ERROR_MESSAGE`] when it is missing or empty.
fn error_message(body: &Value) -> String {
    match body.get("detail") {
        None | Some(Value::Null) | Some(Value::Bool(false)) => {
            String::from(FALLBACK_ERROR_MESSAGE)
        },
        Some(Value::String(s)) if s.is_empty() => {
            String::from(FALLBACK_ERROR_MESSAGE)
        },
        Some(Value::Number(n)) if n.as_f64() == Some(0.0) => {
            String::from(FALLBACK_ERROR_MESSAGE)
        },
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use reqwest::header::AUTHORIZATION;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::{TcpListener, TcpStream},
        task::JoinHandle,
    };

    fn client() -> ApiClient {
        ApiClient::new(Config::new("http://bugs.test")).unwrap()
    }

    fn body_of(request: &Request) -> Option<Value> {
        request
            .body()
            .and_then(|b| b.as_bytes())
            .map(|b| serde_json::from_slice(b).unwrap())
    }

    #[test]
    fn get_never_sends_a_body() {
        let data = json!({ "title": "crash on save" });

        let request = client()
            .build_request("/api/v1/bugs", Method::Get, Some(&data), None)
            .unwrap();

        assert_eq!(request.method(), reqwest::Method::GET);
        assert_eq!(request.url().as_str(), "http://bugs.test/api/v1/bugs");
        assert_eq!(request.headers()[CONTENT_TYPE], "application/json");
        assert!(request.headers().get(AUTHORIZATION).is_none());
        assert!(request.body().is_none());
    }

    #[test]
    fn patch_drops_the_payload_too() {
        let data = json!({ "status": "closed" });

        let request = client()
            .build_request("/api/v1/bugs/1", Method::Patch, Some(&data), None)
            .unwrap();

        assert!(request.body().is_none());
    }

    #[test]
    fn post_put_and_delete_send_json() {
        let data = json!({ "username": "alice", "role": "admin" });

        for method in &[Method::Post, Method::Put, Method::Delete] {
            let request = client()
                .build_request("/api/v1/users/1", *method, Some(&data), None)
                .unwrap();

            assert_eq!(request.method(), reqwest::Method::from(*method));
            assert_eq!(body_of(&request), Some(data.clone()));
        }
    }

    #[test]
    fn null_data_is_not_sent() {
        let request = client()
            .build_request("/x", Method::Post, Some(&Value::Null), None)
            .unwrap();

        assert!(request.body().is_none());
    }

    #[test]
    fn bearer_token_only_when_present() {
        let with_token = client()
            .build_request("/me", Method::Get, None, Some("abc123"))
            .unwrap();
        assert_eq!(with_token.headers()[AUTHORIZATION], "Bearer abc123");

        let empty_token = client()
            .build_request("/me", Method::Get, None, Some(""))
            .unwrap();
        assert!(empty_token.headers().get(AUTHORIZATION).is_none());
    }

    #[test]
    fn no_content_is_always_a_success() {
        let got =
            interpret_response(StatusCode::NO_CONTENT, b"definitely not json")
                .unwrap();

        assert_eq!(got, json!({ "success": true }));
    }

    #[test]
    fn not_found_uses_the_detail() {
        let err = interpret_response(
            StatusCode::NOT_FOUND,
            br#"{"detail":"not found"}"#,
        )
        .unwrap_err();

        assert_eq!(err.to_string(), "not found");
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
    }

    #[test]
    fn missing_detail_falls_back_to_a_generic_message() {
        let err = interpret_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            br#"{"error":"boom"}"#,
        )
        .unwrap_err();

        assert_eq!(err.to_string(), "Something went wrong");

        let err =
            interpret_response(StatusCode::BAD_REQUEST, br#"{"detail":""}"#)
                .unwrap_err();
        assert_eq!(err.to_string(), "Something went wrong");
    }

    #[test]
    fn structured_detail_is_rendered_as_json() {
        let body = br#"{"detail":[{"loc":["body","email"],"msg":"bad"}]}"#;

        let err = interpret_response(StatusCode::UNPROCESSABLE_ENTITY, body)
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            r#"[{"loc":["body","email"],"msg":"bad"}]"#
        );
    }

    #[test]
    fn non_json_bodies_fail_even_on_success() {
        let err = interpret_response(StatusCode::OK, b"<html>").unwrap_err();

        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[test]
    fn non_json_bodies_fail_on_error_statuses_too() {
        let err = interpret_response(
            StatusCode::BAD_GATEWAY,
            b"<html>bad gateway</html>",
        )
        .unwrap_err();

        assert!(matches!(err, ApiError::Decode(_)));
        assert_eq!(err.status(), None);
    }

    #[test]
    fn parse_methods() {
        assert_eq!("get".parse::<Method>().unwrap(), Method::Get);
        assert_eq!("DELETE".parse::<Method>().unwrap(), Method::Delete);
        assert!("TRACE".parse::<Method>().is_err());
        assert_eq!(Method::default(), Method::Get);
    }

    /// A canned response for [`serve()`] to send back.
    pub(crate) struct Canned {
        pub status: &'static str,
        pub headers: &'static [&'static str],
        pub body: &'static str,
    }

    impl Canned {
        pub fn json(status: &'static str, body: &'static str) -> Self {
            Canned {
                status,
                headers: &[],
                body,
            }
        }
    }

    /// Start a server on the loopback interface which answers one connection
    /// per canned response, handing back the raw requests it received.
    pub(crate) async fn serve(
        responses: Vec<Canned>,
    ) -> (String, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let mut requests = Vec::new();

            for canned in responses {
                let (mut stream, _) = listener.accept().await.unwrap();
                requests.push(read_request(&mut stream).await);

                let mut response = format!("HTTP/1.1 {}\r\n", canned.status);
                for header in canned.headers {
                    response.push_str(header);
                    response.push_str("\r\n");
                }
                if !canned.status.starts_with("204") {
                    response.push_str("Content-Type: application/json\r\n");
                    response.push_str(&format!(
                        "Content-Length: {}\r\n",
                        canned.body.len()
                    ));
                }
                response.push_str("Connection: close\r\n\r\n");
                response.push_str(canned.body);

                stream.write_all(response.as_bytes()).await.unwrap();
                stream.shutdown().await.unwrap();
            }

            requests
        });

        (base_url, handle)
    }

    async fn read_request(stream: &mut TcpStream) -> String {
        let mut raw = Vec::new();
        let mut buffer = [0; 1024];

        let header_end = loop {
            let n = stream.read(&mut buffer).await.unwrap();
            assert!(n > 0, "Connection closed mid-request");
            raw.extend_from_slice(&buffer[..n]);

            if let Some(ix) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
                break ix + 4;
            }
        };

        let head = String::from_utf8_lossy(&raw[..header_end]).to_lowercase();
        let content_length = head
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .map(|len| len.trim().parse::<usize>().unwrap())
            .unwrap_or(0);

        while raw.len() < header_end + content_length {
            let n = stream.read(&mut buffer).await.unwrap();
            assert!(n > 0, "Connection closed mid-body");
            raw.extend_from_slice(&buffer[..n]);
        }

        String::from_utf8_lossy(&raw).into_owned()
    }

    #[tokio::test]
    async fn round_trip_a_post() {
        let (base_url, server) =
            serve(vec![Canned::json("201 Created", r#"{"id":7}"#)]).await;
        let client = ApiClient::new(Config::new(base_url)).unwrap();
        let data = json!({ "title": "crash on save" });

        let got = client
            .request("/api/v1/bugs", Method::Post, Some(&data), Some("tok"))
            .await
            .unwrap();

        assert_eq!(got, json!({ "id": 7 }));
        let requests = server.await.unwrap();
        let raw = &requests[0];
        assert!(raw.starts_with("POST /api/v1/bugs HTTP/1.1\r\n"));
        assert!(raw.contains("authorization: Bearer tok\r\n"));
        assert!(raw.contains("content-type: application/json\r\n"));
        assert!(raw.ends_with(r#"{"title":"crash on save"}"#));
    }

    #[tokio::test]
    async fn server_errors_carry_the_detail() {
        let (base_url, server) = serve(vec![Canned::json(
            "404 Not Found",
            r#"{"detail":"not found"}"#,
        )])
        .await;
        let client = ApiClient::new(Config::new(base_url)).unwrap();

        let err = client
            .request("/api/v1/users/42", Method::Get, None, None)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "not found");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn empty_no_content_response() {
        let (base_url, server) =
            serve(vec![Canned::json("204 No Content", "")]).await;
        let client = ApiClient::new(Config::new(base_url)).unwrap();

        let got = client
            .request("/api/v1/users/3", Method::Delete, None, Some("tok"))
            .await
            .unwrap();

        assert_eq!(got, json!({ "success": true }));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn cookies_are_sent_back() {
        let (base_url, server) = serve(vec![
            Canned {
                status: "200 OK",
                headers: &["Set-Cookie: session=s3cr3t; Path=/"],
                body: "{}",
            },
            Canned::json("200 OK", "{}"),
        ])
        .await;
        let client = ApiClient::new(Config::new(base_url)).unwrap();

        client.request("/first", Method::Get, None, None).await.unwrap();
        client
            .request("/second", Method::Get, None, None)
            .await
            .unwrap();

        let requests = server.await.unwrap();
        assert!(!requests[0].contains("cookie: "));
        assert!(requests[1].contains("cookie: session=s3cr3t\r\n"));
    }

    #[tokio::test]
    async fn html_error_pages_are_decode_errors() {
        let (base_url, server) = serve(vec![Canned {
            status: "502 Bad Gateway",
            headers: &[],
            body: "<html>bad gateway</html>",
        }])
        .await;
        let client = ApiClient::new(Config::new(base_url)).unwrap();

        let err = client
            .request("/api/v1/users/me", Method::Get, None, Some("tok"))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Decode(_)));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn unreachable_servers_are_reported() {
        // nothing listens on the port once the listener is dropped
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);
        let client = ApiClient::new(Config::new(base_url)).unwrap();

        let err = client.request("/", Method::Get, None, None).await.unwrap_err();

        assert!(matches!(err, ApiError::HttpClient(_)));
    }
}
