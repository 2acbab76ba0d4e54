//! Shared HTTP plumbing: agent setup, credentials and status classification.

use std::time::Duration;

use serde_json::Value;
use ureq::http::Response;
use ureq::Body;

use crate::auth::AuthProvider;
use crate::error::ClientError;

/// Default bound on a single remote call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A configured `ureq` agent with a global per-call timeout.
///
/// Status codes are not turned into errors by the agent; they are
/// classified here so that 401/403 and `{error}` bodies can be told apart.
#[derive(Clone)]
pub struct HttpTransport {
    agent: ureq::Agent,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();
        let agent: ureq::Agent = config.into();
        Self { agent, timeout }
    }

    pub fn agent(&self) -> &ureq::Agent {
        &self.agent
    }

    /// Maps a transport failure. Timeouts and connection problems are all
    /// network errors, which the user may retry.
    pub(crate) fn transport_error(&self, err: ureq::Error) -> ClientError {
        match err {
            ureq::Error::Timeout(_) => ClientError::Network(format!(
                "no response within {}s",
                self.timeout.as_secs()
            )),
            ureq::Error::StatusCode(code) => ClientError::Service {
                message: format!("request failed with HTTP {}", code),
            },
            other => ClientError::Network(other.to_string()),
        }
    }

    /// Reads the body of a reply, classifying non-success statuses.
    ///
    /// 401 and 403 expire the token on `auth` and become [`ClientError::Auth`].
    /// Other failures surface the backend's `{"error": ...}` message verbatim.
    /// The token is expired on 401/403 even if the body cannot be read.
    pub(crate) fn read_reply(
        &self,
        mut response: Response<Body>,
        auth: &dyn AuthProvider,
    ) -> Result<String, ClientError> {
        let status = response.status().as_u16();
        if matches!(status, 401 | 403) {
            auth.expire();
            let message = response
                .body_mut()
                .read_to_string()
                .ok()
                .and_then(|body| error_message(&body));
            return Err(ClientError::Auth(
                message.unwrap_or_else(|| format!("HTTP {}", status)),
            ));
        }

        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|err| self.transport_error(err))?;

        match status {
            200..=299 => Ok(body),
            _ => Err(ClientError::Service {
                message: error_message(&body)
                    .unwrap_or_else(|| format!("request failed with HTTP {}", status)),
            }),
        }
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

/// Returns the token, or an auth error before anything is sent.
pub(crate) fn bearer_header(auth: &dyn AuthProvider) -> Result<String, ClientError> {
    auth.current_token()
        .map(|token| format!("Bearer {token}"))
        .ok_or_else(|| ClientError::Auth("not signed in".to_string()))
}

fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("error")
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenStore;

    #[test]
    fn missing_token_is_an_auth_error() {
        let auth = TokenStore::new();
        assert!(matches!(bearer_header(&auth), Err(ClientError::Auth(_))));
    }

    #[test]
    fn bearer_header_uses_current_token() {
        let auth = TokenStore::with_token("t0k");
        assert_eq!(bearer_header(&auth).unwrap(), "Bearer t0k");
    }

    #[test]
    fn extracts_backend_error_message() {
        assert_eq!(
            error_message(r#"{"error": "description is required"}"#).as_deref(),
            Some("description is required")
        );
        assert_eq!(error_message("<html>oops</html>"), None);
        assert_eq!(error_message(r#"{"error": 3}"#), None);
    }
}
