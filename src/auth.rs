//! The HTTP Basic authentication gate in front of the WebDAV engine.
//!
//! Every request must carry credentials that the configured [`UserStore`] accepts. The verified
//! [`User`] is handed to the rest of the pipeline, which trusts it without further checks.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use dav_server::body::Body;
use homedav_core::auth::{User, UserStore, UserStoreError};
use hyper::{
    HeaderMap, Response, StatusCode,
    header::{AUTHORIZATION, HeaderValue, WWW_AUTHENTICATE},
};

/// The realm announced in the challenge unless another one is configured.
pub const DEFAULT_REALM: &str = "Restricted Access";

/// What the gate decided about a request.
#[derive(Debug)]
pub enum Outcome {
    /// The credentials check out.
    Authenticated(User),
    /// No usable credentials or the wrong ones. The client should be challenged.
    Challenge,
    /// The user store could not answer.
    Failure(UserStoreError),
}

/// Extracts user name and password from a `Basic` authorization header value. The user name
/// ends at the first `:`, so passwords may contain colons.
pub fn parse_basic(value: &HeaderValue) -> Option<(String, String)> {
    let value = value.to_str().ok()?;
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = BASE64.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

/// Verifies the credentials in `headers` against `store`.
pub async fn authenticate<U>(store: &U, headers: &HeaderMap) -> Outcome
where
    U: UserStore + ?Sized,
{
    let Some((username, password)) = headers.get(AUTHORIZATION).and_then(parse_basic) else {
        return Outcome::Challenge;
    };
    if username.is_empty() {
        return Outcome::Challenge;
    }
    match store.check(&username, &password).await {
        Ok(true) => Outcome::Authenticated(User::new(username)),
        Ok(false) => Outcome::Challenge,
        Err(err) => Outcome::Failure(err),
    }
}

/// The `401 Unauthorized` response asking for Basic credentials in `realm`.
pub fn challenge(realm: &str) -> Response<Body> {
    let mut response = status_response(StatusCode::UNAUTHORIZED);
    let value = HeaderValue::from_str(&format!("Basic realm=\"{}\"", realm.replace('"', "")))
        .unwrap_or_else(|_| HeaderValue::from_static("Basic realm=\"Restricted Access\""));
    response.headers_mut().insert(WWW_AUTHENTICATE, value);
    response
}

/// The plain response for `status`, with the reason phrase as body.
pub fn status_response(status: StatusCode) -> Response<Body> {
    let reason = status.canonical_reason().unwrap_or_default();
    let mut response = Response::new(Body::from(format!("{reason}\n")));
    *response.status_mut() = status;
    response
}
