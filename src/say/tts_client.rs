//! Streaming client for the external TTS HTTP backend.

use futures_util::Stream;
use reqwest::Client;

use crate::error::TtsError;

const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

pub struct TtsClient {
    base_url: String,
    http: Client,
}

impl TtsClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build().unwrap_or_default();
        Self { base_url: base_url.into(), http }
    }

    /// `GET {base}/voice/{model}?text=...&id=...&format=wav&lang=...&streaming=true`
    pub async fn stream(&self, model: &str, text: &str, lang: &str, request_id: &str) -> Result<impl Stream<Item = Result<bytes::Bytes, reqwest::Error>>, TtsError> {
        let url = format!("{}/voice/{}", self.base_url.trim_end_matches('/'), model);
        let response = self
            .http
            .get(&url)
            .query(&[("text", text), ("id", request_id), ("format", "wav"), ("lang", lang), ("streaming", "true")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TtsError::Http(response.status().as_u16()));
        }
        Ok(response.bytes_stream())
    }
}
