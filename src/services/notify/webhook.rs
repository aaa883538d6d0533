use anyhow::Context;
use async_trait::async_trait;

use super::{NotificationProvider, ReservationNotice};
use crate::services::auth;

pub const SIGNATURE_HEADER: &str = "x-slotbook-signature";

/// Posts each notice as JSON to a relay that handles actual delivery.
pub struct WebhookNotifier {
    url: String,
    from_address: String,
    signing_secret: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: String, from_address: String, signing_secret: String) -> Self {
        Self {
            url,
            from_address,
            signing_secret,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl NotificationProvider for WebhookNotifier {
    async fn send_notice(&self, notice: &ReservationNotice) -> anyhow::Result<()> {
        let payload = serde_json::json!({
            "from": self.from_address,
            "to": notice.to,
            "reply_to": notice.reply_to,
            "subject": notice.subject,
            "html": notice.body,
        });
        let body = serde_json::to_vec(&payload).context("failed to encode notice")?;
        let signature = auth::sign(&self.signing_secret, &body)?;

        self.client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(SIGNATURE_HEADER, signature)
            .body(body)
            .send()
            .await
            .context("failed to send notification")?
            .error_for_status()
            .context("notification relay returned error")?;

        Ok(())
    }
}
