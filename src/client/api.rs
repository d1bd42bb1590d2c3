use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Envelope used by every endpoint of the redemption service.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ApiResponse<T> {
    /// Service status code; 0 means success
    pub code: Option<i64>,
    /// Human-readable message, usually Chinese
    pub msg: Option<String>,
    #[serde(default)]
    pub ok: bool,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Trimmed message, if the service sent a non-empty one.
    pub fn message(&self) -> Option<&str> {
        self.msg.as_deref().map(str::trim).filter(|m| !m.is_empty())
    }
}

/// Payload of a successful captcha request.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptchaData {
    /// Base64 image, possibly as a data URL
    pub captcha_base64_image: String,
    /// Opaque challenge identifier
    pub captcha_uuid: String,
    /// Seconds until the challenge expires
    #[serde(default)]
    pub expire_seconds: u64,
}

/// Body of a redemption request.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemRequest {
    /// The 4 recognized captcha digits
    pub captcha_code: String,
    /// Identifier of the challenge the digits belong to
    pub captcha_uuid: String,
    /// Normalized redemption code
    pub code: String,
}

/// The two remote calls the engine makes.
///
/// `Err` means the call itself failed (transport, undecodable body);
/// declared failures come back as `Ok` with `ok == false`.
pub trait RedeemApi: Send + Sync {
    fn get_captcha(&self) -> Result<ApiResponse<CaptchaData>>;

    fn redeem_code(&self, request: &RedeemRequest) -> Result<ApiResponse<serde_json::Value>>;
}
