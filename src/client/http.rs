//! HTTP-backed game client.
//!
//! Thin glue between the `GameClient` trait and the browser game's plain
//! HTML endpoints. Every interaction is a single GET carrying the session
//! cookie; the last fetched page is kept so `read_page_text` reflects what
//! the "browser" currently shows.
//!
//! Page interaction semantics (which markers mean which state) live in the
//! game, not here — this module only moves text.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Mutex;
use tracing::debug;

use super::{anchors_for, GameClient};
use crate::types::Category;

/// Marker shown on the confirmation page of a pending purchase.
const CONFIRM_PROMPT: &str = "Wirklich kaufen?";

/// Marker shown while the action budget is exhausted.
const COOLDOWN_MARKER: &str = "Du bist noch erschöpft";

pub struct HttpGameClient {
    http: Client,
    base_url: String,
    session_cookie: Option<String>,
    /// Raw text of the most recently fetched page.
    last_page: Mutex<String>,
}

impl HttpGameClient {
    pub fn new(base_url: &str, session_cookie: Option<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .user_agent("HAGGLER/0.1.0")
            .build()
            .context("Failed to build game HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            session_cookie,
            last_page: Mutex::new(String::new()),
        })
    }

    /// Fetch a path relative to the game base URL and remember the page.
    async fn fetch(&self, path_and_query: &str) -> Result<String> {
        let url = format!("{}/{}", self.base_url, path_and_query.trim_start_matches('/'));
        let mut request = self.http.get(&url);
        if let Some(cookie) = &self.session_cookie {
            request = request.header(reqwest::header::COOKIE, cookie.clone());
        }
        let body = request
            .send()
            .await
            .with_context(|| format!("Request failed: {url}"))?
            .error_for_status()
            .with_context(|| format!("Bad status from {url}"))?
            .text()
            .await
            .context("Failed to read page body")?;

        debug!(url = %url, bytes = body.len(), "Page fetched");
        *self.last_page.lock().unwrap() = body.clone();
        Ok(body)
    }
}

#[async_trait]
impl GameClient for HttpGameClient {
    async fn open_category_menu(&self, category: Category) -> Result<bool> {
        let anchors = anchors_for(category);
        let path = format!(
            "main.php?action=haendler&kategorie={}",
            urlencoding::encode(anchors.menu_label)
        );
        let page = self.fetch(&path).await?;
        Ok(page.contains(anchors.section_start))
    }

    async fn read_page_text(&self) -> Result<String> {
        Ok(self.last_page.lock().unwrap().clone())
    }

    async fn click_purchase_ref(&self, purchase_ref: &str) -> Result<bool> {
        // The reference is only valid while its listing still exists; the
        // game answers with the confirmation page when it does.
        let page = self.fetch(purchase_ref).await?;
        Ok(page.contains(CONFIRM_PROMPT))
    }

    async fn click_confirm(&self) -> Result<bool> {
        let page = self.fetch("main.php?action=kaufen&bestaetigt=1").await?;
        Ok(!page.contains(CONFIRM_PROMPT))
    }

    async fn exit_menu(&self) -> Result<()> {
        self.fetch("main.php?action=uebersicht").await?;
        Ok(())
    }

    async fn can_act_now(&self) -> Result<bool> {
        let page = self.fetch("main.php?action=status").await?;
        Ok(!page.contains(COOLDOWN_MARKER))
    }

    async fn chat_history(&self) -> Result<Vec<String>> {
        let page = self.fetch("chattext.php").await?;
        Ok(page.lines().map(str::to_string).collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction_strips_trailing_slash() {
        let client = HttpGameClient::new("https://game.example/", None).unwrap();
        assert_eq!(client.base_url, "https://game.example");
    }

    #[tokio::test]
    async fn test_read_page_text_starts_empty() {
        let client = HttpGameClient::new("https://game.example", None).unwrap();
        assert_eq!(client.read_page_text().await.unwrap(), "");
    }
}
