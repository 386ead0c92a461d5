//! Scripted [`Transport`] for unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::cookie::Cookie;
use crate::error::{CloudMusicError, Result};
use crate::options::{ClientSettings, EffectiveOptions};
use crate::provider::{HttpMethod, Query};
use crate::transport::{Transport, TransportResponse};

#[derive(Debug, Clone)]
pub struct SentCall {
    pub method: HttpMethod,
    pub url: String,
    pub data: Query,
    pub options: EffectiveOptions,
}

#[derive(Debug, Clone)]
pub struct RawCall {
    pub url: String,
    pub method: HttpMethod,
    pub headers: Vec<(String, String)>,
    pub settings: ClientSettings,
}

/// Replays queued responses in order and records every call.
#[derive(Default)]
pub struct MockTransport {
    replies: Mutex<VecDeque<Result<TransportResponse>>>,
    pages: Mutex<VecDeque<Result<Vec<u8>>>>,
    calls: Mutex<Vec<SentCall>>,
    raw_calls: Mutex<Vec<RawCall>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, body: Value) {
        self.reply_with_cookies(body, Vec::new());
    }

    pub fn reply_with_cookies(&self, body: Value, cookies: Vec<Cookie>) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Ok(TransportResponse { body, cookies }));
    }

    pub fn fail(&self, message: &str) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(CloudMusicError::Transport(message.to_owned())));
    }

    pub fn page(&self, html: &str) {
        self.pages
            .lock()
            .unwrap()
            .push_back(Ok(html.as_bytes().to_vec()));
    }

    pub fn page_error(&self, message: &str) {
        self.pages
            .lock()
            .unwrap()
            .push_back(Err(CloudMusicError::Transport(message.to_owned())));
    }

    pub fn calls(&self) -> Vec<SentCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn raw_calls(&self) -> Vec<RawCall> {
        self.raw_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(
        &self,
        method: HttpMethod,
        url: &str,
        data: Query,
        options: &EffectiveOptions,
    ) -> Result<TransportResponse> {
        self.calls.lock().unwrap().push(SentCall {
            method,
            url: url.to_owned(),
            data,
            options: options.clone(),
        });
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(CloudMusicError::Transport("no reply queued".into())))
    }

    async fn send_raw(
        &self,
        url: &str,
        method: HttpMethod,
        headers: &[(&str, String)],
        settings: &ClientSettings,
    ) -> Result<Vec<u8>> {
        self.raw_calls.lock().unwrap().push(RawCall {
            url: url.to_owned(),
            method,
            headers: headers
                .iter()
                .map(|(name, value)| ((*name).to_owned(), value.clone()))
                .collect(),
            settings: settings.clone(),
        });
        self.pages
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(CloudMusicError::Transport("no page queued".into())))
    }
}
