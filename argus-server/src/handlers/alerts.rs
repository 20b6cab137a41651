//! Alert egress: echo to the dashboard room and attempt delivery on the
//! configured outbound channels.

use crate::AppState;
use crate::errors::AppResult;
use argus_contracts::frames::{AlertFrame, Frame};
use axum::{Json, extract::State};
use serde::Serialize;
use std::time::Duration;
use tracing::warn;

/// Outbound webhook delivery timeout.
const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelResult {
    pub channel: String,
    pub delivered: bool,
    pub detail: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertEgressResponse {
    pub success: bool,
    pub channels: Vec<ChannelResult>,
}

/// `POST /api/alerts`
pub async fn post_alert(
    State(state): State<AppState>,
    Json(alert): Json<AlertFrame>,
) -> AppResult<Json<AlertEgressResponse>> {
    state.fabric.alert(Frame::Alert(alert.clone()));

    let mut channels = vec![ChannelResult {
        channel: "dashboard".to_string(),
        delivered: true,
        detail: format!(
            "broadcast to {} observers",
            state.fabric.room_size(argus_contracts::frames::DASHBOARD_ROOM)
        ),
    }];

    match &state.config.alert_webhook_url {
        Some(url) => channels.push(deliver_webhook(url, &alert).await),
        None => channels.push(ChannelResult {
            channel: "webhook".to_string(),
            delivered: false,
            detail: "not configured".to_string(),
        }),
    }

    // Mail transport is external plumbing; the channel still reports.
    channels.push(ChannelResult {
        channel: "email".to_string(),
        delivered: false,
        detail: "not configured".to_string(),
    });

    Ok(Json(AlertEgressResponse {
        success: true,
        channels,
    }))
}

async fn deliver_webhook(url: &str, alert: &AlertFrame) -> ChannelResult {
    let outcome = async {
        let client = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()?;
        let response = client.post(url).json(alert).send().await?;
        Ok::<_, reqwest::Error>(response.status())
    }
    .await;

    match outcome {
        Ok(status) if status.is_success() => ChannelResult {
            channel: "webhook".to_string(),
            delivered: true,
            detail: format!("status {status}"),
        },
        Ok(status) => {
            warn!("alert webhook returned {status}");
            ChannelResult {
                channel: "webhook".to_string(),
                delivered: false,
                detail: format!("status {status}"),
            }
        }
        Err(e) => {
            warn!("alert webhook delivery failed: {e}");
            ChannelResult {
                channel: "webhook".to_string(),
                delivered: false,
                detail: e.to_string(),
            }
        }
    }
}
