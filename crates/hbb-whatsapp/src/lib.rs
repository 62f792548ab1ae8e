//! WhatsApp adapter (Twilio).
//!
//! Outbound messages go through the Twilio Messages REST API; inbound
//! messages arrive on the axum webhook in [`webhook`].

use async_trait::async_trait;
use serde::Deserialize;

pub mod signature;
pub mod webhook;

pub use webhook::run_webhook;

use hbb_core::{
    config::whatsapp_address,
    domain::{Address, ChannelKind},
    errors::Error,
    messaging::port::{ChannelCapabilities, ChannelPort},
    Result,
};

const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";
const MAX_BODY_LEN: usize = 1600;

#[derive(Clone)]
pub struct WhatsAppChannel {
    http: reqwest::Client,
    api_base: String,
    account_sid: String,
    auth_token: String,
    from: String,
}

#[derive(Debug, Deserialize)]
struct MessageCreated {
    sid: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TwilioError {
    code: Option<i64>,
    message: Option<String>,
}

impl WhatsAppChannel {
    pub fn new(
        account_sid: impl Into<String>,
        auth_token: impl Into<String>,
        from: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: TWILIO_API_BASE.to_string(),
            account_sid: account_sid.into(),
            auth_token: auth_token.into(),
            from: whatsapp_address(&from.into()),
        }
    }

    /// Point the client at another API root (a local stand-in in tests).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/Accounts/{}/Messages.json",
            self.api_base, self.account_sid
        )
    }

    async fn post_message(&self, to: &Address, body: &str) -> Result<()> {
        let to = whatsapp_address(to.as_str());
        let resp = self
            .http
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[
                ("From", self.from.as_str()),
                ("To", to.as_str()),
                ("Body", body),
            ])
            .send()
            .await
            .map_err(|e| Error::Delivery(format!("twilio request failed: {e}")))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| Error::Delivery(format!("twilio response unreadable: {e}")))?;

        if !status.is_success() {
            let detail = match serde_json::from_str::<TwilioError>(&text) {
                Ok(TwilioError {
                    code: Some(code),
                    message,
                }) => format!("{code}: {}", message.unwrap_or_default()),
                _ => text,
            };
            return Err(Error::Delivery(format!("twilio error ({status}) {detail}")));
        }

        let sid = serde_json::from_str::<MessageCreated>(&text)
            .ok()
            .and_then(|m| m.sid)
            .unwrap_or_default();
        tracing::debug!(message_sid = %sid, "whatsapp message sent");
        Ok(())
    }
}

#[async_trait]
impl ChannelPort for WhatsAppChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::WhatsApp
    }

    fn capabilities(&self) -> ChannelCapabilities {
        ChannelCapabilities {
            supports_markdown: false,
            max_message_len: MAX_BODY_LEN,
        }
    }

    // WhatsApp renders its own `*bold*` markup; there is no parse mode to reject.
    async fn send_markdown(&self, to: &Address, text: &str) -> Result<()> {
        self.post_message(to, text).await
    }

    async fn send_plain(&self, to: &Address, text: &str) -> Result<()> {
        self.post_message(to, text).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        extract::{Path, State},
        http::{HeaderMap, StatusCode},
        response::IntoResponse,
        routing::post,
        Form, Json, Router,
    };

    use super::*;

    #[derive(Clone, Default)]
    struct FakeTwilio {
        requests: Arc<Mutex<Vec<(String, Option<String>, Vec<(String, String)>)>>>,
    }

    async fn create_message(
        State(fake): State<FakeTwilio>,
        Path(sid): Path<String>,
        headers: HeaderMap,
        Form(params): Form<Vec<(String, String)>>,
    ) -> impl IntoResponse {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bad_number = params.iter().any(|(k, v)| k == "To" && v == "whatsapp:+0");
        fake.requests.lock().unwrap().push((sid, auth, params));
        if bad_number {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"code": 21211, "message": "Invalid 'To' Phone Number"})),
            );
        }
        (
            StatusCode::CREATED,
            Json(serde_json::json!({"sid": "SM0001", "status": "queued"})),
        )
    }

    async fn spawn_fake() -> (String, FakeTwilio) {
        let fake = FakeTwilio::default();
        let app = Router::new()
            .route("/Accounts/:sid/Messages.json", post(create_message))
            .with_state(fake.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), fake)
    }

    #[tokio::test]
    async fn posts_form_with_basic_auth() {
        let (base, fake) = spawn_fake().await;
        let ch = WhatsAppChannel::new("AC123", "secret", "+15550000000").with_api_base(base);

        ch.send_plain(&Address::new("+15551112222"), "hello").await.unwrap();

        let reqs = fake.requests.lock().unwrap().clone();
        assert_eq!(reqs.len(), 1);
        let (sid, auth, params) = &reqs[0];
        assert_eq!(sid, "AC123");
        // base64("AC123:secret")
        assert_eq!(auth.as_deref(), Some("Basic QUMxMjM6c2VjcmV0"));
        assert!(params.contains(&("From".to_string(), "whatsapp:+15550000000".to_string())));
        assert!(params.contains(&("To".to_string(), "whatsapp:+15551112222".to_string())));
        assert!(params.contains(&("Body".to_string(), "hello".to_string())));
    }

    #[tokio::test]
    async fn api_errors_become_delivery_errors() {
        let (base, _fake) = spawn_fake().await;
        let ch = WhatsAppChannel::new("AC123", "secret", "whatsapp:+15550000000").with_api_base(base);

        let err = ch
            .send_plain(&Address::new("whatsapp:+0"), "hello")
            .await
            .unwrap_err();
        match err {
            Error::Delivery(msg) => assert!(msg.contains("21211"), "{msg}"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn never_claims_markdown_support() {
        let ch = WhatsAppChannel::new("AC1", "t", "+1");
        assert!(!ch.capabilities().supports_markdown);
        assert_eq!(ch.kind(), ChannelKind::WhatsApp);
    }
}
