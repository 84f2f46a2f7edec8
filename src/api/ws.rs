use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use serde::{Deserialize, Serialize};
use tokio::{select, sync::broadcast::error::RecvError};
use tracing::{debug, warn};

use crate::api::auth::{AuthUser, user_from_token};
use crate::error::{ApiError, ApiResult};
use crate::realtime::{Channel, Subscriptions};
use crate::state::AppState;

// Subscription action enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionAction {
    Subscribe,
    Unsubscribe,
}

// Subscription message from client
#[derive(Debug, Deserialize)]
struct SubscriptionMessage {
    action: SubscriptionAction,
    channel: Channel,
    symbol: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Success,
    Error,
}

// Acknowledgment message to client
#[derive(Debug, Serialize)]
struct SubscriptionAck {
    status: SubscriptionStatus,
    message: String,
    channel: Option<Channel>,
}

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

/// Browsers cannot set headers on a WebSocket handshake, so the JWT comes in
/// the query string. Rejected with 401 before the upgrade.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(q): Query<WsQuery>,
) -> ApiResult<Response> {
    let user = q
        .token
        .as_deref()
        .and_then(|t| user_from_token(&state.jwt_secret, t))
        .ok_or(ApiError::Unauthorized)?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user)))
}

async fn send_json<T: Serialize>(socket: &mut WebSocket, value: &T) -> bool {
    match serde_json::to_string(value) {
        Ok(json) => socket.send(Message::Text(json.into())).await.is_ok(),
        Err(_) => true,
    }
}

fn handle_text(subs: &mut Subscriptions, text: &str) -> SubscriptionAck {
    let msg = match serde_json::from_str::<SubscriptionMessage>(text) {
        Ok(msg) => msg,
        Err(_) => {
            return SubscriptionAck {
                status: SubscriptionStatus::Error,
                message: "Invalid message format. Expected: {\"action\": \"subscribe\", \"channel\": \"prices\", \"symbol\": \"BTC\"}".to_string(),
                channel: None,
            };
        }
    };
    match msg.action {
        SubscriptionAction::Subscribe => match subs.subscribe(msg.channel, msg.symbol.as_deref()) {
            Ok(message) => SubscriptionAck {
                status: SubscriptionStatus::Success,
                message,
                channel: Some(msg.channel),
            },
            Err(message) => SubscriptionAck {
                status: SubscriptionStatus::Error,
                message,
                channel: Some(msg.channel),
            },
        },
        SubscriptionAction::Unsubscribe => SubscriptionAck {
            status: SubscriptionStatus::Success,
            message: subs.unsubscribe(msg.channel, msg.symbol.as_deref()),
            channel: Some(msg.channel),
        },
    }
}

async fn handle_socket(mut socket: WebSocket, state: AppState, user: AuthUser) {
    let mut broadcast_receiver = state.realtime.subscribe();
    let mut subs = Subscriptions::new(user.user_id);
    debug!(user_id = %user.user_id, "websocket connected");

    loop {
        select! {
            result = broadcast_receiver.recv() => {
                match result {
                    Ok(event) => {
                        if subs.wants(&event) && !send_json(&mut socket, &event).await {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(user_id = %user.user_id, skipped, "websocket client lagging, events dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Text(text))) => {
                        let ack = handle_text(&mut subs, text.as_str());
                        if !send_json(&mut socket, &ack).await {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    // Ignore other message types (binary, ping, pong)
                    _ => {}
                }
            }
        }
    }
    debug!(user_id = %user.user_id, "websocket disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use uuid::Uuid;

    fn ack_json(subs: &mut Subscriptions, text: &str) -> Value {
        serde_json::to_value(handle_text(subs, text)).unwrap()
    }

    #[test]
    fn subscribe_to_table_acks_with_channel() {
        let mut subs = Subscriptions::new(Uuid::new_v4());
        let ack = ack_json(&mut subs, r#"{"action":"subscribe","channel":"futures"}"#);
        assert_eq!(
            ack,
            json!({ "status": "success", "message": "Subscribed to futures", "channel": "futures" })
        );
    }

    #[test]
    fn prices_subscription_needs_a_symbol() {
        let mut subs = Subscriptions::new(Uuid::new_v4());

        let ack = ack_json(&mut subs, r#"{"action":"subscribe","channel":"prices"}"#);
        assert_eq!(ack["status"], "error");
        assert_eq!(ack["channel"], "prices");
        assert_eq!(ack["message"], "prices subscriptions require a symbol");

        let ack = ack_json(
            &mut subs,
            r#"{"action":"subscribe","channel":"prices","symbol":"btc"}"#,
        );
        assert_eq!(ack["status"], "success");
        assert_eq!(ack["message"], "Subscribed to prices for BTC");
    }

    #[test]
    fn unsubscribe_always_succeeds() {
        let mut subs = Subscriptions::new(Uuid::new_v4());
        ack_json(&mut subs, r#"{"action":"subscribe","channel":"holdings"}"#);

        let ack = ack_json(&mut subs, r#"{"action":"unsubscribe","channel":"holdings"}"#);
        assert_eq!(ack["status"], "success");
        assert_eq!(ack["message"], "Unsubscribed from holdings");

        let ack = ack_json(&mut subs, r#"{"action":"unsubscribe","channel":"prices"}"#);
        assert_eq!(ack["message"], "Unsubscribed from all prices");
    }

    #[test]
    fn malformed_messages_get_an_error_ack() {
        let mut subs = Subscriptions::new(Uuid::new_v4());
        for text in [
            "not json",
            r#"{"action":"subscribe"}"#,
            r#"{"action":"shout","channel":"futures"}"#,
            r#"{"action":"subscribe","channel":"orders"}"#,
        ] {
            let ack = ack_json(&mut subs, text);
            assert_eq!(ack["status"], "error", "{}", text);
            assert_eq!(ack["channel"], Value::Null, "{}", text);
            assert!(
                ack["message"]
                    .as_str()
                    .unwrap()
                    .starts_with("Invalid message format"),
                "{}",
                text
            );
        }
    }
}
