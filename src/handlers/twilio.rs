//! Twilio voice webhooks.
//!
//! `POST /incoming-call` is Twilio's voice URL. It opens the assistant channel
//! before answering, so the media stream never arrives ahead of the assistant,
//! and replies with TwiML pointing the call at `/media-stream/{CallSid}`.
//!
//! `POST /call-status-update` is the status callback. Terminal statuses tear
//! the active session down.

use std::sync::Arc;

use axum::{
    Form,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::{error, info};

use crate::errors::app_error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct IncomingCallForm {
    #[serde(rename = "CallSid", default)]
    pub call_sid: String,
    #[serde(rename = "From", default)]
    pub from: Option<String>,
    #[serde(rename = "To", default)]
    pub to: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CallStatusForm {
    #[serde(rename = "CallSid", default)]
    pub call_sid: Option<String>,
    #[serde(rename = "CallStatus", default)]
    pub call_status: String,
}

/// TwiML connecting the call to our media stream endpoint.
pub fn connect_stream_twiml(stream_url: &str) -> String {
    format!(
        "<Response><Connect><Stream url=\"{stream_url}\" /></Connect></Response>"
    )
}

pub async fn incoming_call(
    State(state): State<Arc<AppState>>,
    Form(form): Form<IncomingCallForm>,
) -> AppResult<impl IntoResponse> {
    if form.call_sid.is_empty() {
        return Err(AppError::BadRequest("missing CallSid".to_string()));
    }
    info!(
        call_sid = %form.call_sid,
        from = form.from.as_deref().unwrap_or("unknown"),
        to = form.to.as_deref().unwrap_or("unknown"),
        "Incoming call"
    );

    let session_id = state.sessions.accept_call(&form.call_sid).await?;

    let twiml = connect_stream_twiml(&state.config.media_stream_url(&form.call_sid));
    info!(call_sid = %form.call_sid, session_id = %session_id, "Answering with media stream TwiML");

    Ok((StatusCode::OK, [(header::CONTENT_TYPE, "text/xml")], twiml))
}

pub async fn call_status_update(
    State(state): State<Arc<AppState>>,
    Form(form): Form<CallStatusForm>,
) -> StatusCode {
    let call_sid = form.call_sid.as_deref().unwrap_or("unknown");

    match form.call_status.as_str() {
        "completed" | "busy" | "no-answer" | "canceled" => {
            info!(call_sid, status = %form.call_status, "Call ended");
            state.sessions.close_active().await;
        }
        "error" | "failed" => {
            error!(call_sid, status = %form.call_status, "Call ended with an error");
            state.sessions.close_active().await;
        }
        other => info!(call_sid, status = other, "Call status update"),
    }

    StatusCode::OK
}
