//! # Discord interactions endpoint
//!
//! Discord delivers button clicks as signed HTTP POSTs to the URL configured
//! for the application. Every request carries an Ed25519 signature over
//! `timestamp ‖ body` which must be checked against the application's public
//! key; Discord probes the endpoint with unsigned or badly signed requests and
//! disables it if any of them is accepted.

use crate::core::code_cache::ScriptCodeCache;
use crate::core::embed::{copy_reply, COPY_BUTTON_PREFIX};
use crate::core::shutdown::ShutdownState;
use crate::utils::error::{RelayError, Result};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

pub const SIGNATURE_HEADER: &str = "x-signature-ed25519";
pub const TIMESTAMP_HEADER: &str = "x-signature-timestamp";

const INTERACTION_PING: u8 = 1;
const INTERACTION_COMPONENT: u8 = 3;
const RESPONSE_PONG: u8 = 1;
const RESPONSE_CHANNEL_MESSAGE: u8 = 4;
const FLAG_EPHEMERAL: u64 = 1 << 6;

#[derive(Debug, Deserialize)]
pub struct Interaction {
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub data: Option<InteractionData>,
}

#[derive(Debug, Deserialize)]
pub struct InteractionData {
    #[serde(default)]
    pub custom_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct InteractionResponse {
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<MessageData>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct MessageData {
    pub content: String,
    pub flags: u64,
}

#[derive(Clone)]
pub struct InteractionState {
    verifying_key: VerifyingKey,
    cache: ScriptCodeCache,
}

impl InteractionState {
    pub fn new(verifying_key: VerifyingKey, cache: ScriptCodeCache) -> Self {
        Self {
            verifying_key,
            cache,
        }
    }

    pub fn from_hex(public_key: &str, cache: ScriptCodeCache) -> Result<Self> {
        let bytes: [u8; 32] = hex::decode(public_key)
            .ok()
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| RelayError::InvalidConfigValueError {
                field: "interactions.public_key".to_string(),
                value: public_key.to_string(),
                reason: "Expected 32 hex-encoded bytes".to_string(),
            })?;

        let verifying_key =
            VerifyingKey::from_bytes(&bytes).map_err(|e| RelayError::InvalidConfigValueError {
                field: "interactions.public_key".to_string(),
                value: public_key.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self::new(verifying_key, cache))
    }
}

/// Checks the Ed25519 signature Discord attaches to every interaction.
pub fn verify_signature(
    key: &VerifyingKey,
    timestamp: &str,
    body: &[u8],
    signature_hex: &str,
) -> Result<()> {
    let signature_bytes = hex::decode(signature_hex).map_err(|e| RelayError::SignatureError {
        message: format!("signature is not hex: {}", e),
    })?;
    let signature =
        Signature::from_slice(&signature_bytes).map_err(|e| RelayError::SignatureError {
            message: e.to_string(),
        })?;

    let mut message = Vec::with_capacity(timestamp.len() + body.len());
    message.extend_from_slice(timestamp.as_bytes());
    message.extend_from_slice(body);

    key.verify(&message, &signature)
        .map_err(|e| RelayError::SignatureError {
            message: e.to_string(),
        })
}

fn verify_request(key: &VerifyingKey, headers: &HeaderMap, body: &[u8]) -> Result<()> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| RelayError::SignatureError {
                message: format!("missing {} header", name),
            })
    };

    verify_signature(key, header(TIMESTAMP_HEADER)?, body, header(SIGNATURE_HEADER)?)
}

fn ephemeral(content: String) -> InteractionResponse {
    InteractionResponse {
        kind: RESPONSE_CHANNEL_MESSAGE,
        data: Some(MessageData {
            content,
            flags: FLAG_EPHEMERAL,
        }),
    }
}

/// Maps a verified interaction to the response Discord should show.
pub fn respond(cache: &ScriptCodeCache, interaction: &Interaction) -> Result<InteractionResponse> {
    match interaction.kind {
        INTERACTION_PING => Ok(InteractionResponse {
            kind: RESPONSE_PONG,
            data: None,
        }),
        INTERACTION_COMPONENT => {
            let custom_id = interaction
                .data
                .as_ref()
                .and_then(|d| d.custom_id.as_deref())
                .unwrap_or("");

            let Some(script_id) = custom_id.strip_prefix(COPY_BUTTON_PREFIX) else {
                return Err(RelayError::InteractionError {
                    message: format!("unknown component {}", custom_id),
                });
            };

            Ok(match cache.get(script_id) {
                Some(code) => {
                    tracing::debug!("📋 Copy requested for {}", script_id);
                    ephemeral(copy_reply(&code))
                }
                None => ephemeral("Script is no longer available.".to_string()),
            })
        }
        other => Err(RelayError::InteractionError {
            message: format!("unsupported interaction type {}", other),
        }),
    }
}

async fn handle_interaction(
    State(state): State<InteractionState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(e) = verify_request(&state.verifying_key, &headers, &body) {
        tracing::warn!("🔒 Rejected interaction: {}", e);
        return (StatusCode::UNAUTHORIZED, "invalid request signature").into_response();
    }

    let interaction: Interaction = match serde_json::from_slice(&body) {
        Ok(interaction) => interaction,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };

    match respond(&state.cache, &interaction) {
        Ok(response) => Json(response).into_response(),
        Err(e) => {
            tracing::warn!("⚠️ {}", e);
            (StatusCode::BAD_REQUEST, e.to_string()).into_response()
        }
    }
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "up",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub fn router(state: InteractionState) -> Router {
    Router::new()
        .route("/interactions", post(handle_interaction))
        .route("/health", get(health))
        .with_state(state)
}

/// Binds the listener up front so a taken port fails startup.
pub async fn bind(addr: SocketAddr) -> Result<TcpListener> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("🌐 Interactions endpoint listening on {}", addr);
    Ok(listener)
}

/// Serves the interactions endpoint until shutdown begins.
pub async fn serve(
    listener: TcpListener,
    state: InteractionState,
    shutdown: Arc<ShutdownState>,
) -> Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.wait().await })
        .await?;

    tracing::info!("🌐 Interactions endpoint stopped");
    Ok(())
}
