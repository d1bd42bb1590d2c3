//! Blocking HTTP implementation of the redemption service API.

use anyhow::{anyhow, Context, Result};
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, USER_AGENT};
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::api::{ApiResponse, CaptchaData, RedeemApi, RedeemRequest};
use crate::batch::config::RedeemConfig;

pub struct HttpRedeemClient {
    client: Client,
    captcha_url: String,
    redeem_url: String,
}

impl HttpRedeemClient {
    /// Builds a client from the service section of the configuration.
    pub fn new(config: &RedeemConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("redeem-batch"));
        if let Some(token) = config.auth_token.as_deref().filter(|t| !t.is_empty()) {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .context("auth_token contains characters not allowed in a header")?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;

        let base = config.base_url.trim_end_matches('/');
        Ok(Self {
            client,
            captcha_url: format!("{}{}", base, config.captcha_path),
            redeem_url: format!("{}{}", base, config.redeem_path),
        })
    }
}

/// Reads the service envelope from a response.
///
/// The service sometimes reports declared failures with a non-2xx status; the
/// body is used whenever it parses, and the status only when it does not.
fn read_envelope<T: DeserializeOwned>(response: Response) -> Result<ApiResponse<T>> {
    let status = response.status();
    let body = response.text().context("Failed to read response body")?;
    match serde_json::from_str(&body) {
        Ok(envelope) => Ok(envelope),
        Err(e) if status.is_success() => Err(anyhow!("Malformed response body: {}", e)),
        Err(_) => Err(anyhow!("HTTP {}", status)),
    }
}

impl RedeemApi for HttpRedeemClient {
    fn get_captcha(&self) -> Result<ApiResponse<CaptchaData>> {
        let response = self
            .client
            .get(&self.captcha_url)
            .send()
            .context("Captcha request failed")?;
        read_envelope(response)
    }

    fn redeem_code(&self, request: &RedeemRequest) -> Result<ApiResponse<serde_json::Value>> {
        let response = self
            .client
            .post(&self.redeem_url)
            .json(request)
            .send()
            .context("Redeem request failed")?;
        read_envelope(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_joined_without_double_slash() {
        let config = RedeemConfig {
            base_url: "https://example.com/".to_string(),
            captcha_path: "/captcha".to_string(),
            redeem_path: "/redeem".to_string(),
            ..Default::default()
        };
        let client = HttpRedeemClient::new(&config).unwrap();
        assert_eq!(client.captcha_url, "https://example.com/captcha");
        assert_eq!(client.redeem_url, "https://example.com/redeem");
    }

    #[test]
    fn test_invalid_token_rejected() {
        let config = RedeemConfig {
            auth_token: Some("bad\ntoken".to_string()),
            ..Default::default()
        };
        assert!(HttpRedeemClient::new(&config).is_err());
    }
}
