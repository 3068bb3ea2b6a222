//! Fetch-based HTTP edge
//!
//! Thin async wrapper over the browser fetch API. Returns status and
//! body text; protocol interpretation (404 normalization, JSON decoding)
//! stays in `protocol` where it can be tested without a browser.

use crate::error::EngineError;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{Headers, Request, RequestInit, Response};

/// Minimal fetch client rooted at a base URL
#[derive(Clone)]
pub struct HttpClient {
    base_url: String,
}

impl HttpClient {
    /// `base_url` may be empty for same-origin requests
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    pub async fn get(&self, path: &str) -> Result<(u16, String), EngineError> {
        self.request("GET", path, None).await
    }

    pub async fn post_json(&self, path: &str, body: &str) -> Result<(u16, String), EngineError> {
        self.request("POST", path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<(u16, String), EngineError> {
        self.request("DELETE", path, None).await
    }

    async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<&str>,
    ) -> Result<(u16, String), EngineError> {
        let url = format!("{}{}", self.base_url, path);

        let mut init = RequestInit::new();
        init.method(method);
        if let Some(body) = body {
            let headers = Headers::new().map_err(|e| network_err("headers", &e))?;
            headers
                .set("Content-Type", "application/json")
                .map_err(|e| network_err("headers", &e))?;
            init.headers(headers.as_ref());
            init.body(Some(&JsValue::from_str(body)));
        }

        let request = Request::new_with_str_and_init(&url, &init)
            .map_err(|e| network_err(&url, &e))?;
        let window = web_sys::window()
            .ok_or_else(|| EngineError::NetworkFailure("no window".to_string()))?;

        let response = JsFuture::from(window.fetch_with_request(&request))
            .await
            .map_err(|e| network_err(&url, &e))?;
        let response: Response = response
            .dyn_into()
            .map_err(|e| network_err(&url, &e))?;
        let status = response.status();

        let text = JsFuture::from(response.text().map_err(|e| network_err(&url, &e))?)
            .await
            .map_err(|e| network_err(&url, &e))?;
        Ok((status, text.as_string().unwrap_or_default()))
    }
}

fn network_err(context: &str, err: &JsValue) -> EngineError {
    let detail = err
        .as_string()
        .unwrap_or_else(|| format!("{:?}", err));
    EngineError::NetworkFailure(format!("{}: {}", context, detail))
}
