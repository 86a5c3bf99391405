//! Phoenix-channel websocket client carrying change notifications.
//!
//! One task per subscription: connect, join the table topic with a
//! `postgres_changes` config, answer heartbeats, and forward every matching
//! change event as a unit notification. Per the no-retry policy there is no
//! reconnect; a dropped socket ends the feed with a warning and the owning
//! view keeps whatever it last fetched.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};
use uuid::Uuid;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);
const NOTIFY_BUFFER: usize = 16;

#[derive(Debug, Serialize)]
struct OutgoingMessage<'a> {
    topic: &'a str,
    event: &'a str,
    payload: Value,
    #[serde(rename = "ref")]
    msg_ref: String,
}

#[derive(Debug, Deserialize)]
struct IncomingMessage {
    #[serde(default)]
    event: String,
}

/// Channel topic for a table subscription, e.g.
/// `realtime:public:logs:userId=eq.<uuid>`.
pub fn channel_topic(table: &str, filter_user_id: Option<Uuid>) -> String {
    match filter_user_id {
        Some(id) => format!("realtime:public:{table}:userId=eq.{id}"),
        None => format!("realtime:public:{table}"),
    }
}

fn join_payload(table: &str, filter_user_id: Option<Uuid>) -> Value {
    let mut change = json!({
        "event": "*",
        "schema": "public",
        "table": table,
    });
    if let Some(id) = filter_user_id {
        change["filter"] = json!(format!("userId=eq.{id}"));
    }
    json!({ "config": { "postgres_changes": [change] } })
}

/// Spawns the feed task and returns its notification channel plus the handle
/// the subscription aborts on drop.
pub fn spawn_change_feed(
    url: String,
    table: &str,
    filter_user_id: Option<Uuid>,
) -> (mpsc::Receiver<()>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(NOTIFY_BUFFER);
    let table = table.to_string();
    let task = tokio::spawn(async move {
        if let Err(e) = run_change_feed(&url, &table, filter_user_id, tx).await {
            warn!("Realtime feed ended: {e}");
        }
    });
    (rx, task)
}

async fn run_change_feed(
    url: &str,
    table: &str,
    filter_user_id: Option<Uuid>,
    tx: mpsc::Sender<()>,
) -> anyhow::Result<()> {
    let (mut socket, _response) = connect_async(url).await?;
    let topic = channel_topic(table, filter_user_id);

    let join = OutgoingMessage {
        topic: &topic,
        event: "phx_join",
        payload: join_payload(table, filter_user_id),
        msg_ref: "1".to_string(),
    };
    socket
        .send(Message::Text(serde_json::to_string(&join)?))
        .await?;
    debug!("Joined realtime topic {topic}");

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await; // first tick fires immediately
    let mut heartbeat_ref: u64 = 2;

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                let beat = OutgoingMessage {
                    topic: "phoenix",
                    event: "heartbeat",
                    payload: json!({}),
                    msg_ref: heartbeat_ref.to_string(),
                };
                heartbeat_ref += 1;
                socket.send(Message::Text(serde_json::to_string(&beat)?)).await?;
            }
            frame = socket.next() => {
                let Some(frame) = frame else {
                    anyhow::bail!("socket closed by peer");
                };
                match frame? {
                    Message::Text(text) => {
                        let incoming: IncomingMessage =
                            serde_json::from_str(&text).unwrap_or(IncomingMessage {
                                event: String::new(),
                            });
                        if incoming.event == "postgres_changes" {
                            // Payload is irrelevant; the owning view re-fetches.
                            if tx.send(()).await.is_err() {
                                return Ok(()); // subscriber gone
                            }
                        }
                    }
                    Message::Close(_) => anyhow::bail!("socket closed by peer"),
                    _ => {}
                }
            }
        }
    }
}
