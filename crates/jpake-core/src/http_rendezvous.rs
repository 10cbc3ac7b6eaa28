#![cfg(feature = "http-rendezvous")]

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, StatusCode};
use serde_json::Value;
use tracing::debug;

use crate::transport::{RendezvousResponse, RendezvousTransport, TransportError};

const CLIENT_ID_HEADER: &str = "X-KeyExchange-Id";

/// Rendezvous transport over HTTPS.
///
/// Channels live at `{base_url}/{channel}`; new ones are allocated with
/// `GET {base_url}/new_channel`, which answers with a JSON string.
#[derive(Clone)]
pub struct HttpRendezvous {
    base_url: String,
    client: reqwest::Client,
}

fn map_reqwest(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Http(e.to_string())
    }
}

impl HttpRendezvous {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(request_timeout)
            .build()
            .map_err(|e| TransportError::Http(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn channel_url(&self, channel: &str) -> String {
        format!("{}/{}", self.base_url, channel)
    }

    async fn into_response(resp: reqwest::Response) -> Result<RendezvousResponse, TransportError> {
        let status = resp.status();
        let etag = resp
            .headers()
            .get(header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let body = if status == StatusCode::OK {
            let text = resp.text().await.map_err(map_reqwest)?;
            parse_body(&text)
        } else {
            None
        };

        Ok(RendezvousResponse {
            status: status.as_u16(),
            etag,
            body,
        })
    }
}

/// Body of a 200 response. Text that is not JSON is passed on as a JSON
/// string so the session rejects it as a malformed message, not a network
/// failure.
fn parse_body(text: &str) -> Option<Value> {
    if text.trim().is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(text) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(error = %e, "response body is not json");
            Some(Value::String(text.to_owned()))
        }
    }
}

#[async_trait]
impl RendezvousTransport for HttpRendezvous {
    async fn new_channel(&self, client_id: &str) -> Result<String, TransportError> {
        let resp = self
            .client
            .get(format!("{}/new_channel", self.base_url))
            .header(CLIENT_ID_HEADER, client_id)
            .send()
            .await
            .map_err(map_reqwest)?;

        if resp.status() != StatusCode::OK {
            return Err(TransportError::BadResponse(format!(
                "status={} body={:?}",
                resp.status(),
                resp.text().await.ok()
            )));
        }
        let channel: String = resp
            .json()
            .await
            .map_err(|e| TransportError::BadResponse(format!("channel id: {e}")))?;
        Ok(channel)
    }

    async fn get(
        &self,
        channel: &str,
        client_id: &str,
        if_none_match: Option<&str>,
    ) -> Result<RendezvousResponse, TransportError> {
        let mut req = self
            .client
            .get(self.channel_url(channel))
            .header(CLIENT_ID_HEADER, client_id);
        if let Some(etag) = if_none_match {
            req = req.header(header::IF_NONE_MATCH, etag);
        }
        let resp = req.send().await.map_err(map_reqwest)?;
        Self::into_response(resp).await
    }

    async fn put(
        &self,
        channel: &str,
        client_id: &str,
        body: &Value,
    ) -> Result<RendezvousResponse, TransportError> {
        let resp = self
            .client
            .put(self.channel_url(channel))
            .header(CLIENT_ID_HEADER, client_id)
            .json(body)
            .send()
            .await
            .map_err(map_reqwest)?;
        Self::into_response(resp).await
    }

    async fn delete(&self, channel: &str, client_id: &str) -> Result<RendezvousResponse, TransportError> {
        let resp = self
            .client
            .delete(self.channel_url(channel))
            .header(CLIENT_ID_HEADER, client_id)
            .send()
            .await
            .map_err(map_reqwest)?;
        Self::into_response(resp).await
    }
}
