//! Credential POSTs and response classification.

use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, warn};

use super::{Credentials, INVALID_CREDENTIALS_MESSAGE, LoginError, TOKEN_MISSING_MESSAGE};
use crate::http::{body_message, non_empty_str, read_json_body};

/// Token fields accepted in a successful login response, by priority.
const TOKEN_FIELDS: [&str; 3] = ["token", "accessToken", "jwt"];

/// Outcome of a single login attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Authenticated(String),
    /// Terminal failure. No further candidates are tried.
    Rejected(LoginError),
    /// The endpoint is missing or unreachable here; try the next candidate.
    TryNext,
}

/// A token together with the endpoint that issued it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authenticated {
    pub token: String,
    pub url: String,
}

/// Maps an HTTP status and JSON body to an attempt outcome.
pub fn classify(status: StatusCode, body: &Value) -> AttemptOutcome {
    match status.as_u16() {
        400 | 401 => AttemptOutcome::Rejected(LoginError::Credentials(
            body_message(body).unwrap_or_else(|| INVALID_CREDENTIALS_MESSAGE.to_string()),
        )),
        404 | 405 => AttemptOutcome::TryNext,
        _ if status.is_success() => match TOKEN_FIELDS
            .iter()
            .find_map(|field| non_empty_str(body, field))
        {
            Some(token) => AttemptOutcome::Authenticated(token),
            None => AttemptOutcome::Rejected(LoginError::MalformedResponse(
                TOKEN_MISSING_MESSAGE.to_string(),
            )),
        },
        _ => match body_message(body) {
            Some(message) => AttemptOutcome::Rejected(LoginError::Credentials(message)),
            None => AttemptOutcome::TryNext,
        },
    }
}

/// Sends login requests; stateless apart from the HTTP client.
#[derive(Debug, Clone)]
pub struct LoginTransport {
    http: reqwest::Client,
}

impl LoginTransport {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// POSTs the credentials to a single URL and classifies the response.
    /// Network failures classify as `TryNext`.
    pub async fn attempt(&self, url: &str, credentials: &Credentials) -> AttemptOutcome {
        let response = match self.http.post(url).json(credentials).send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(url, error = %err, "login request failed");
                return AttemptOutcome::TryNext;
            }
        };

        let status = response.status();
        debug!(url, status = status.as_u16(), "login attempt");
        let body = read_json_body(response).await;
        classify(status, &body)
    }

    /// Tries each URL strictly in order.
    ///
    /// Stops at the first token or the first rejection.
    ///
    /// # Errors
    /// Returns the first rejection, or `LoginError::EndpointNotFound` when
    /// every candidate was missing or unreachable.
    pub async fn attempt_sequence(
        &self,
        urls: &[String],
        credentials: &Credentials,
    ) -> Result<Authenticated, LoginError> {
        for url in urls {
            match self.attempt(url, credentials).await {
                AttemptOutcome::Authenticated(token) => {
                    return Ok(Authenticated {
                        token,
                        url: url.clone(),
                    });
                }
                AttemptOutcome::Rejected(err) => return Err(err),
                AttemptOutcome::TryNext => {}
            }
        }

        Err(LoginError::endpoint_not_found())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::login::{ENDPOINT_NOT_FOUND_MESSAGE, LoginForm};
    use crate::role::Role;

    fn can_bind_localhost() -> bool {
        std::net::TcpListener::bind("127.0.0.1:0").is_ok()
    }

    fn admin_credentials() -> Credentials {
        LoginForm::new(Role::Admin, "a", "b").validate().unwrap()
    }

    fn transport() -> LoginTransport {
        LoginTransport::new(reqwest::Client::new())
    }

    #[test]
    fn test_classify_credential_errors() {
        assert_eq!(
            classify(StatusCode::UNAUTHORIZED, &json!({"message": "bad creds"})),
            AttemptOutcome::Rejected(LoginError::Credentials("bad creds".into()))
        );
        assert_eq!(
            classify(StatusCode::BAD_REQUEST, &json!({})),
            AttemptOutcome::Rejected(LoginError::Credentials("Invalid credentials".into()))
        );
    }

    #[test]
    fn test_classify_missing_routes_try_next() {
        assert_eq!(
            classify(StatusCode::NOT_FOUND, &json!({"message": "nope"})),
            AttemptOutcome::TryNext
        );
        assert_eq!(
            classify(StatusCode::METHOD_NOT_ALLOWED, &json!({})),
            AttemptOutcome::TryNext
        );
    }

    #[test]
    fn test_classify_other_errors_depend_on_message() {
        assert_eq!(
            classify(StatusCode::INTERNAL_SERVER_ERROR, &json!({})),
            AttemptOutcome::TryNext
        );
        assert_eq!(
            classify(StatusCode::FORBIDDEN, &json!({"message": "locked"})),
            AttemptOutcome::Rejected(LoginError::Credentials("locked".into()))
        );
    }

    #[test]
    fn test_classify_token_field_priority() {
        assert_eq!(
            classify(
                StatusCode::OK,
                &json!({"jwt": "J", "accessToken": "A", "token": "T"})
            ),
            AttemptOutcome::Authenticated("T".into())
        );
        assert_eq!(
            classify(StatusCode::OK, &json!({"jwt": "J", "accessToken": "A"})),
            AttemptOutcome::Authenticated("A".into())
        );
        assert_eq!(
            classify(StatusCode::CREATED, &json!({"token": "", "jwt": "J"})),
            AttemptOutcome::Authenticated("J".into())
        );
    }

    #[test]
    fn test_classify_success_without_token_is_malformed() {
        assert_eq!(
            classify(StatusCode::OK, &json!({})),
            AttemptOutcome::Rejected(LoginError::MalformedResponse(
                "Login succeeded but token is missing.".into()
            ))
        );
    }

    #[tokio::test]
    async fn test_sequence_skips_not_found_and_returns_second() {
        if !can_bind_localhost() {
            eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
            return;
        }
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/one"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/two"))
            .and(body_json(json!({"username": "a", "password": "b"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "T1"})))
            .expect(1)
            .mount(&server)
            .await;

        let urls = vec![
            format!("{}/one", server.uri()),
            format!("{}/two", server.uri()),
        ];
        let result = transport()
            .attempt_sequence(&urls, &admin_credentials())
            .await
            .unwrap();

        assert_eq!(result.token, "T1");
        assert_eq!(result.url, urls[1]);
    }

    #[tokio::test]
    async fn test_sequence_stops_at_rejection() {
        if !can_bind_localhost() {
            eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
            return;
        }
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/one"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"message": "bad creds"})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/two"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "T1"})))
            .expect(0)
            .mount(&server)
            .await;

        let urls = vec![
            format!("{}/one", server.uri()),
            format!("{}/two", server.uri()),
        ];
        let err = transport()
            .attempt_sequence(&urls, &admin_credentials())
            .await
            .unwrap_err();

        assert_eq!(err, LoginError::Credentials("bad creds".into()));
    }

    #[tokio::test]
    async fn test_sequence_exhausts_when_all_missing() {
        if !can_bind_localhost() {
            eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
            return;
        }
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404))
            .expect(3)
            .mount(&server)
            .await;

        let urls: Vec<String> = ["/a", "/b", "/c"]
            .iter()
            .map(|p| format!("{}{p}", server.uri()))
            .collect();
        let err = transport()
            .attempt_sequence(&urls, &admin_credentials())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            LoginError::EndpointNotFound(ENDPOINT_NOT_FOUND_MESSAGE.into())
        );
    }

    #[tokio::test]
    async fn test_network_failure_moves_to_next_candidate() {
        if !can_bind_localhost() {
            eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"jwt": "J9"})))
            .mount(&server)
            .await;

        // Bind then drop to get a port with nothing listening.
        let dead_port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let urls = vec![
            format!("http://127.0.0.1:{dead_port}/admin"),
            format!("{}/ok", server.uri()),
        ];
        let result = transport()
            .attempt_sequence(&urls, &admin_credentials())
            .await
            .unwrap();

        assert_eq!(result.token, "J9");
    }
}
