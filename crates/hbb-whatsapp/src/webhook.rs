//! Twilio webhook receiver.
//!
//! - `POST /webhook` takes the inbound message form, checks the signature and
//!   hands the message to the bridge.
//! - `GET /webhook` answers Twilio's endpoint verification.
//! - `GET /health` reports liveness.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Form, Json, Router,
};
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use hbb_core::{
    bridge::{Bridge, BridgeConfig, Outcome},
    config::Config,
    domain::{Address, InboundMessage},
    messaging::port::ChannelPort,
    queue::TaskQueue,
    relay::{RelayConfig, ResponseRelay},
    responder::Responder,
    utils::{iso_timestamp_millis, redact_pii},
};

use crate::{signature, WhatsAppChannel};

const EMPTY_TWIML: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response></Response>";
const WEBHOOK_PATH: &str = "/webhook";

/// Signature settings for inbound requests.
#[derive(Clone, Debug)]
pub struct SignatureCheck {
    pub auth_token: String,
    /// URL Twilio signs; `https://{Host}/webhook` when unset.
    pub public_url: Option<String>,
}

pub struct WebhookState {
    bridge: Arc<Bridge>,
    /// `None` disables validation.
    signature: Option<SignatureCheck>,
}

impl WebhookState {
    pub fn new(bridge: Arc<Bridge>, signature: Option<SignatureCheck>) -> Self {
        Self { bridge, signature }
    }
}

pub fn router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route(WEBHOOK_PATH, get(verify).post(receive))
        .route("/health", get(health))
        .with_state(state)
}

/// Run the WhatsApp webhook server and its reply relay until `cancel` fires.
///
/// Without Twilio credentials the channel is disabled: a warning is logged and
/// this returns immediately.
pub async fn run_webhook(
    cfg: Arc<Config>,
    queue: Arc<TaskQueue>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let wa = &cfg.whatsapp;
    let (Some(account_sid), Some(auth_token), Some(from)) = (
        wa.account_sid.clone(),
        wa.auth_token.clone(),
        wa.from_number.clone(),
    ) else {
        warn!("Twilio credentials not configured; WhatsApp channel disabled");
        return Ok(());
    };

    let channel: Arc<dyn ChannelPort> =
        Arc::new(WhatsAppChannel::new(account_sid, auth_token.clone(), from));

    let relay = Arc::new(ResponseRelay::new(
        channel.clone(),
        RelayConfig::new(wa.responses_path.clone(), wa.owner_number.clone()),
    ));

    let bridge = Arc::new(Bridge::new(
        channel,
        queue,
        Responder::new(cfg.heartbeat_path.clone(), cfg.assistant_name.clone()),
        BridgeConfig {
            owner: wa.owner_number.clone(),
        },
    ));

    let signature = wa.validate_signature.then(|| SignatureCheck {
        auth_token,
        public_url: wa.public_url.clone(),
    });
    let app = router(Arc::new(WebhookState::new(bridge, signature)));

    let addr = SocketAddr::from(([0, 0, 0, 0], wa.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding webhook listener on {addr}"))?;

    let relay_cancel = cancel.child_token();
    let relay_task = tokio::spawn({
        let relay_cancel = relay_cancel.clone();
        async move {
            if let Err(e) = relay.run(relay_cancel).await {
                error!(error = %e, "whatsapp reply relay failed; replies will not be delivered");
            }
        }
    });

    info!(
        %addr,
        heartbeat = %cfg.heartbeat_path.display(),
        owner_configured = wa.owner_number.is_some(),
        signature_validation = wa.validate_signature,
        "whatsapp webhook listening"
    );

    let stop = cancel.clone();
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            stop.cancelled().await;
            info!("stopping whatsapp webhook server");
        })
        .await
        .context("webhook server failed");

    relay_cancel.cancel();
    if let Err(e) = relay_task.await {
        error!(error = %e, "whatsapp reply relay panicked");
    }

    served
}

async fn verify() -> &'static str {
    "WhatsApp webhook is active"
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "channel": "whatsapp",
        "timestamp": iso_timestamp_millis(Utc::now()),
    }))
}

async fn receive(
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
    Form(params): Form<Vec<(String, String)>>,
) -> Response {
    if let Some(check) = &state.signature {
        if !signature_ok(check, &headers, &params) {
            warn!("rejecting webhook request with missing or invalid signature");
            return StatusCode::FORBIDDEN.into_response();
        }
    }

    let Some(from) = param(&params, "From") else {
        debug!("webhook request without From");
        return StatusCode::BAD_REQUEST.into_response();
    };
    let inbound = InboundMessage {
        sender: Address::new(from),
        message_id: param(&params, "MessageSid").unwrap_or_default().to_string(),
        text: param(&params, "Body")
            .filter(|b| !b.trim().is_empty())
            .map(str::to_string),
    };

    match state.bridge.handle_inbound(inbound).await {
        Outcome::Unauthorized => StatusCode::FORBIDDEN.into_response(),
        outcome => {
            if let Outcome::QueueFailed(err) = &outcome {
                error!(sender = %redact_pii(from), error = %err, "task not queued");
            }
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/xml")],
                EMPTY_TWIML,
            )
                .into_response()
        }
    }
}

fn param<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

fn signature_ok(check: &SignatureCheck, headers: &HeaderMap, params: &[(String, String)]) -> bool {
    let Some(provided) = headers
        .get(signature::SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
    else {
        return false;
    };

    let url = match &check.public_url {
        Some(url) => url.clone(),
        None => {
            let Some(host) = headers.get(header::HOST).and_then(|v| v.to_str().ok()) else {
                return false;
            };
            format!("https://{host}{WEBHOOK_PATH}")
        }
    };

    signature::validate_signature(&check.auth_token, provided, &url, params)
}
