//! Scripted stand-in for the remote service, shared by unit tests.

use anyhow::{anyhow, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{ImageBuffer, ImageFormat, Rgba, RgbaImage};
use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::Mutex;

use super::api::{ApiResponse, CaptchaData, RedeemApi, RedeemRequest};

type Scripted<T> = Mutex<VecDeque<Result<ApiResponse<T>, String>>>;

/// Replays queued responses in order; an empty queue answers with a
/// transport error.
#[derive(Default)]
pub struct FakeApi {
    captchas: Scripted<CaptchaData>,
    redeems: Scripted<serde_json::Value>,
    submitted: Mutex<Vec<RedeemRequest>>,
    captcha_calls: Mutex<u32>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_captcha(self, response: ApiResponse<CaptchaData>) -> Self {
        self.captchas.lock().unwrap().push_back(Ok(response));
        self
    }

    pub fn with_captcha_error(self, msg: &str) -> Self {
        self.captchas.lock().unwrap().push_back(Err(msg.to_string()));
        self
    }

    pub fn with_redeem(self, response: ApiResponse<serde_json::Value>) -> Self {
        self.redeems.lock().unwrap().push_back(Ok(response));
        self
    }

    pub fn with_redeem_error(self, msg: &str) -> Self {
        self.redeems.lock().unwrap().push_back(Err(msg.to_string()));
        self
    }

    /// Requests received by `redeem_code`, in order.
    pub fn submitted(&self) -> Vec<RedeemRequest> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn captcha_calls(&self) -> u32 {
        *self.captcha_calls.lock().unwrap()
    }
}

impl RedeemApi for FakeApi {
    fn get_captcha(&self) -> Result<ApiResponse<CaptchaData>> {
        *self.captcha_calls.lock().unwrap() += 1;
        match self.captchas.lock().unwrap().pop_front() {
            Some(Ok(response)) => Ok(response),
            Some(Err(msg)) => Err(anyhow!(msg)),
            None => Err(anyhow!("no scripted captcha response")),
        }
    }

    fn redeem_code(&self, request: &RedeemRequest) -> Result<ApiResponse<serde_json::Value>> {
        self.submitted.lock().unwrap().push(request.clone());
        match self.redeems.lock().unwrap().pop_front() {
            Some(Ok(response)) => Ok(response),
            Some(Err(msg)) => Err(anyhow!(msg)),
            None => Err(anyhow!("no scripted redeem response")),
        }
    }
}

/// A small decodable captcha image as a data URL.
pub fn captcha_image() -> String {
    let img: RgbaImage = ImageBuffer::from_fn(24, 12, |x, _| {
        if x % 2 == 0 {
            Rgba([200, 40, 40, 255])
        } else {
            Rgba([255, 255, 255, 255])
        }
    });
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, ImageFormat::Png).unwrap();
    format!("data:image/png;base64,{}", STANDARD.encode(buffer.into_inner()))
}

pub fn captcha_ok(uuid: &str) -> ApiResponse<CaptchaData> {
    ApiResponse {
        code: Some(0),
        msg: None,
        ok: true,
        data: Some(CaptchaData {
            captcha_base64_image: captcha_image(),
            captcha_uuid: uuid.to_string(),
            expire_seconds: 60,
        }),
    }
}

pub fn captcha_failed(msg: &str) -> ApiResponse<CaptchaData> {
    ApiResponse {
        code: Some(500),
        msg: Some(msg.to_string()),
        ok: false,
        data: None,
    }
}

pub fn redeem_ok() -> ApiResponse<serde_json::Value> {
    ApiResponse {
        code: Some(0),
        msg: Some("激活成功".to_string()),
        ok: true,
        data: None,
    }
}

pub fn redeem_failed(msg: &str) -> ApiResponse<serde_json::Value> {
    ApiResponse {
        code: Some(500),
        msg: Some(msg.to_string()),
        ok: false,
        data: None,
    }
}
