//! Telegram transport -- prompt delivery via the Bot API.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::error::TransportError;
use crate::integrations::traits::MessageTransport;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Sends messages through `POST /bot{token}/sendMessage`.
pub struct TelegramTransport {
    client: Client,
    base_url: String,
    bot_token: String,
}

impl TelegramTransport {
    pub fn new(bot_token: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: TELEGRAM_API_BASE.to_string(),
            bot_token: bot_token.to_string(),
        }
    }

    /// Point the transport at a different API host (test servers).
    pub fn with_base_url(bot_token: &str, base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            bot_token: bot_token.to_string(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.bot_token.is_empty()
    }
}

#[async_trait]
impl MessageTransport for TelegramTransport {
    async fn send(&self, chat_handle: &str, text: &str) -> Result<(), TransportError> {
        if !self.is_configured() {
            return Err(TransportError::NotConfigured(
                "telegram bot token is empty".to_string(),
            ));
        }

        let url = format!("{}/bot{}/sendMessage", self.base_url, self.bot_token);
        let body = json!({ "chat_id": chat_handle, "text": text });

        let resp = self.client.post(&url).json(&body).send().await?;
        if resp.status().is_success() {
            return Ok(());
        }

        let status = resp.status().as_u16();
        let detail = resp.text().await.unwrap_or_default();
        Err(TransportError::Rejected { status, detail })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_posts_chat_id_and_text() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/botTOKEN/sendMessage")
            .match_body(mockito::Matcher::PartialJson(json!({
                "chat_id": "12345",
                "text": "hello"
            })))
            .with_status(200)
            .with_body(r#"{"ok":true}"#)
            .create_async()
            .await;

        let transport = TelegramTransport::with_base_url("TOKEN", &server.url());
        transport.send("12345", "hello").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn api_rejection_surfaces_status_and_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/botTOKEN/sendMessage")
            .with_status(403)
            .with_body("bot was blocked by the user")
            .create_async()
            .await;

        let transport = TelegramTransport::with_base_url("TOKEN", &server.url());
        let err = transport.send("12345", "hello").await.unwrap_err();
        match err {
            TransportError::Rejected { status, detail } => {
                assert_eq!(status, 403);
                assert!(detail.contains("blocked"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn missing_token_fails_without_network() {
        let transport = TelegramTransport::new("");
        assert!(matches!(
            transport.send("12345", "hello").await,
            Err(TransportError::NotConfigured(_))
        ));
    }
}
