//! HTTP implementation of the media viewer calls with response parsing

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::{DownloadClick, MediaViewerApi, RemoteError, TokenLookup};
use crate::config::RemoteConfig;
use crate::token::TokenRecord;

/// Key the service uses to attach an error string to a token response
const ERROR_FIELD: &str = "errmsg";

/// Form body of a viewed-marking call.
#[derive(Debug, Serialize)]
struct ViewedForm<'a> {
    viewed: bool,
    guid: &'a str,
}

/// Media viewer client over HTTP with basic authentication.
pub struct HttpMediaViewerClient {
    guid_url: String,
    download_click_url: String,
    viewed_url: String,
    username: String,
    password: String,
    client: reqwest::Client,
}

impl HttpMediaViewerClient {
    /// Creates a client from the remote service configuration.
    ///
    /// Certificate verification is disabled when `verify_tls` is false; every
    /// request uses the configured timeout.
    ///
    /// # Errors
    ///
    /// - `RemoteError::ClientSetup` - If the TLS backend cannot be initialized
    pub fn new(config: &RemoteConfig) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .danger_accept_invalid_certs(!config.verify_tls)
            .user_agent(concat!("waiter/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(RemoteError::ClientSetup)?;

        Ok(Self {
            guid_url: config.guid_url.clone(),
            download_click_url: config.download_click_url.clone(),
            viewed_url: config.viewed_url.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            client,
        })
    }

    /// Token lookup URL for `guid`, with the GUID percent-encoded.
    pub fn token_url(&self, guid: &str) -> String {
        self.guid_url
            .replace("{guid}", urlencoding::encode(guid).as_ref())
    }

    async fn post_form<T: Serialize + ?Sized>(
        &self,
        url: &str,
        form: &T,
    ) -> Result<(), RemoteError> {
        let response = self
            .client
            .post(url)
            .basic_auth(&self.username, Some(&self.password))
            .form(form)
            .send()
            .await
            .map_err(|source| RemoteError::Request {
                url: url.to_string(),
                source,
            })?;

        check_status(url, &response)
    }
}

fn check_status(url: &str, response: &reqwest::Response) -> Result<(), RemoteError> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(RemoteError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        })
    }
}

#[async_trait]
impl MediaViewerApi for HttpMediaViewerClient {
    async fn fetch_token(&self, guid: &str) -> Result<TokenLookup, RemoteError> {
        let url = self.token_url(guid);
        debug!("Fetching token from {}", url);

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .map_err(|source| RemoteError::Request {
                url: url.clone(),
                source,
            })?;
        check_status(&url, &response)?;

        let body = response
            .text()
            .await
            .map_err(|source| RemoteError::Request {
                url: url.clone(),
                source,
            })?;

        parse_token_response(&body)
    }

    async fn report_download(&self, click: &DownloadClick) -> Result<(), RemoteError> {
        debug!(?click, "Reporting download");
        self.post_form(&self.download_click_url, click).await
    }

    async fn mark_viewed(&self, guid: &str) -> Result<(), RemoteError> {
        self.post_form(&self.viewed_url, &ViewedForm { viewed: true, guid })
            .await
    }
}

/// Classifies a token lookup body.
///
/// An empty body, `null` or `{}` is a missing token. An object carrying a
/// non-empty `errmsg` is a rejection with that text. Anything else must
/// deserialize into a [`TokenRecord`]; unknown keys are ignored.
///
/// # Errors
///
/// - `RemoteError::Malformed` - If the body is not JSON or lacks required token fields
pub fn parse_token_response(body: &str) -> Result<TokenLookup, RemoteError> {
    if body.trim().is_empty() {
        return Ok(TokenLookup::Missing);
    }

    let value: Value = serde_json::from_str(body).map_err(|e| RemoteError::Malformed {
        reason: e.to_string(),
    })?;

    match &value {
        Value::Null => return Ok(TokenLookup::Missing),
        Value::Object(fields) if fields.is_empty() => return Ok(TokenLookup::Missing),
        Value::Object(fields) => {
            if let Some(Value::String(message)) = fields.get(ERROR_FIELD)
                && !message.is_empty()
            {
                return Ok(TokenLookup::Rejected {
                    message: message.clone(),
                });
            }
        }
        _ => {
            return Err(RemoteError::Malformed {
                reason: "expected a JSON object".to_string(),
            });
        }
    }

    serde_json::from_value::<TokenRecord>(value)
        .map(TokenLookup::Found)
        .map_err(|e| RemoteError::Malformed {
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MOVIE_TOKEN: &str = r#"{
        "guid": "abc123",
        "ismovie": true,
        "path": "Movies",
        "filename": "Some.Movie.2019",
        "displayname": "Some Movie",
        "userid": 7,
        "tokenid": 99,
        "waitertheme": "dark",
        "binge_mode": false,
        "videoprogresses": []
    }"#;

    #[test]
    fn test_parse_movie_token() {
        let lookup = parse_token_response(MOVIE_TOKEN).unwrap();
        let TokenLookup::Found(token) = lookup else {
            panic!("expected a token record");
        };

        assert!(token.is_movie);
        assert_eq!(token.filename, "Some.Movie.2019");
        assert_eq!(token.display_name, "Some Movie");
        assert_eq!(token.user_id, 7);
        assert_eq!(token.token_id, 99);
        assert_eq!(token.theme.as_deref(), Some("dark"));
        assert_eq!(token.tv_id, None);
    }

    #[test]
    fn test_parse_service_error_string() {
        let lookup = parse_token_response(r#"{"errmsg": "Token is expired"}"#).unwrap();
        assert_eq!(
            lookup,
            TokenLookup::Rejected {
                message: "Token is expired".to_string()
            }
        );
    }

    #[test]
    fn test_parse_empty_records() {
        assert_eq!(parse_token_response("").unwrap(), TokenLookup::Missing);
        assert_eq!(parse_token_response("null").unwrap(), TokenLookup::Missing);
        assert_eq!(parse_token_response("{}").unwrap(), TokenLookup::Missing);
    }

    #[test]
    fn test_parse_rejects_unexpected_shapes() {
        assert!(matches!(
            parse_token_response("[1, 2]"),
            Err(RemoteError::Malformed { .. })
        ));
        assert!(matches!(
            parse_token_response(r#"{"ismovie": true}"#),
            Err(RemoteError::Malformed { .. })
        ));
        assert!(matches!(
            parse_token_response("<html>"),
            Err(RemoteError::Malformed { .. })
        ));
    }

    #[test]
    fn test_token_url_encodes_guid() {
        let mut config = RemoteConfig::default();
        config.guid_url = "https://viewer.example/api/token/{guid}/".to_string();
        let client = HttpMediaViewerClient::new(&config).unwrap();

        assert_eq!(
            client.token_url("a b/c"),
            "https://viewer.example/api/token/a%20b%2Fc/"
        );
    }
}
