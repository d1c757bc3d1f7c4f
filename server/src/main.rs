//! WebSocket transport for folletto's vault.
//!
//! One process hosts many rooms. Each connection gets a uuid identity, joins
//! at most one room, and sends tagged JSON intents answered with ack/error
//! frames; every successful mutation fans a fresh room snapshot out to all
//! watchers of that room. All game logic lives in `folletto-engine`; this
//! binary only decodes intents, serializes access to the room store and
//! publishes the results.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State as AxumState;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use folletto_engine::{
    claim_seat, handle_action, handle_confirm, handle_roll, host_control, rename, start_game,
    DiceRng, HostAction, RoomError, RoomSnapshot, RoomState, RoomStore, Signal,
};
use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};
use uuid::Uuid;

/// Room-code alphabet; ambiguous glyphs (0/O, 1/I) are left out so codes
/// survive being read aloud.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

#[derive(Clone, Debug)]
struct ServerConfig {
    host: String,
    port: u16,
    code_len: usize,
    broadcast_capacity: usize,
}

impl ServerConfig {
    fn from_env() -> Self {
        Self {
            host: std::env::var("VAULT_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: read_u16("VAULT_PORT", 9130),
            code_len: read_usize("VAULT_ROOM_CODE_LEN", 4),
            broadcast_capacity: read_usize("VAULT_BROADCAST_CAPACITY", 1024),
        }
    }
}

fn read_u16(key: &str, fallback: u16) -> u16 {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse::<u16>().ok())
        .unwrap_or(fallback)
}

fn read_usize(key: &str, fallback: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse::<usize>().ok())
        .unwrap_or(fallback)
}

fn generate_code(rng: &mut impl Rng, len: usize) -> String {
    (0..len)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

fn parse_host_action(action: &str) -> Option<HostAction> {
    match action.to_ascii_lowercase().as_str() {
        "pause" => Some(HostAction::Pause),
        "resume" => Some(HostAction::Resume),
        "reset" => Some(HostAction::Reset),
        _ => None,
    }
}

#[derive(Clone)]
struct AppState {
    store: Arc<Mutex<RoomStore>>,
    broadcaster: broadcast::Sender<Broadcast>,
    code_len: usize,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum InboundMessage {
    #[serde(rename = "createRoom")]
    CreateRoom {
        #[serde(rename = "requestId")]
        request_id: String,
        #[serde(rename = "playerCount")]
        player_count: usize,
    },
    #[serde(rename = "joinRoom")]
    JoinRoom {
        #[serde(rename = "requestId")]
        request_id: String,
        code: String,
    },
    #[serde(rename = "claimSeat")]
    ClaimSeat {
        #[serde(rename = "requestId")]
        request_id: String,
        seat: usize,
        nick: Option<String>,
        avatar: Option<String>,
    },
    #[serde(rename = "rename")]
    Rename {
        #[serde(rename = "requestId")]
        request_id: String,
        seat: usize,
        nick: String,
    },
    #[serde(rename = "startGame")]
    StartGame {
        #[serde(rename = "requestId")]
        request_id: String,
    },
    #[serde(rename = "roll")]
    Roll {
        #[serde(rename = "requestId")]
        request_id: String,
    },
    #[serde(rename = "confirmSum")]
    ConfirmSum {
        #[serde(rename = "requestId")]
        request_id: String,
        sum: u8,
    },
    #[serde(rename = "doAction")]
    DoAction {
        #[serde(rename = "requestId")]
        request_id: String,
    },
    #[serde(rename = "hostControl")]
    HostControl {
        #[serde(rename = "requestId")]
        request_id: String,
        action: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum OutboundResponse {
    #[serde(rename = "ack")]
    Ack {
        #[serde(rename = "requestId")]
        request_id: String,
    },
    #[serde(rename = "roomCreated")]
    RoomCreated {
        #[serde(rename = "requestId")]
        request_id: String,
        code: String,
    },
    #[serde(rename = "roomJoined")]
    RoomJoined {
        #[serde(rename = "requestId")]
        request_id: String,
        code: String,
        state: RoomSnapshot,
    },
    #[serde(rename = "error")]
    Error {
        #[serde(rename = "requestId")]
        request_id: String,
        code: String,
        message: String,
    },
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type")]
enum Broadcast {
    #[serde(rename = "state")]
    State { room: String, payload: RoomSnapshot },
    #[serde(rename = "gameOver")]
    GameOver {
        room: String,
        winners: Vec<usize>,
        coins: Vec<u32>,
    },
}

impl Broadcast {
    fn room(&self) -> &str {
        match self {
            Broadcast::State { room, .. } => room,
            Broadcast::GameOver { room, .. } => room,
        }
    }
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    AxumState(state): AxumState<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection_id = Uuid::new_v4().to_string();
    info!(%connection_id, "connection opened");

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let mut broadcast_rx = state.broadcaster.subscribe();
    let watching: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));

    let write_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let broadcast_task = {
        let tx = tx.clone();
        let watching = watching.clone();
        tokio::spawn(async move {
            while let Ok(event) = broadcast_rx.recv().await {
                let room = { watching.lock().unwrap().clone() };
                if room.as_deref() != Some(event.room()) {
                    continue;
                }
                if let Ok(payload) = serde_json::to_string(&event) {
                    let _ = tx.send(Message::Text(payload));
                }
            }
        })
    };

    while let Some(Ok(message)) = receiver.next().await {
        match message {
            Message::Text(text) => match serde_json::from_str::<InboundMessage>(&text) {
                Ok(inbound) => {
                    handle_inbound(inbound, &state, &connection_id, &watching, &tx);
                }
                Err(err) => {
                    warn!(%connection_id, ?err, "invalid inbound message");
                }
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    // Disconnect cleanup: vacate every seat held by this identity, then
    // re-broadcast the rooms that changed.
    let vacated = {
        let mut store = state.store.lock().unwrap();
        let touched = store.vacate_connection(&connection_id);
        touched
            .into_iter()
            .filter_map(|code| {
                store
                    .get(&code)
                    .ok()
                    .map(|room| (code.clone(), room.snapshot()))
            })
            .collect::<Vec<_>>()
    };
    for (code, snapshot) in vacated {
        let _ = state.broadcaster.send(Broadcast::State {
            room: code,
            payload: snapshot,
        });
    }

    write_task.abort();
    broadcast_task.abort();
    info!(%connection_id, "connection closed");
}

/// Run one intent against a room under the store lock and hand back the
/// code, the post-mutation snapshot and any discrete signals.
fn run_intent<F>(
    state: &AppState,
    watching: &Arc<Mutex<Option<String>>>,
    intent: F,
) -> Result<(String, RoomSnapshot, Vec<Signal>), RoomError>
where
    F: FnOnce(&mut RoomState) -> Result<Vec<Signal>, RoomError>,
{
    let code = watching
        .lock()
        .unwrap()
        .clone()
        .ok_or(RoomError::RoomNotFound)?;
    let mut store = state.store.lock().unwrap();
    let room = store.get_mut(&code)?;
    let signals = intent(room)?;
    Ok((code, room.snapshot(), signals))
}

fn publish(state: &AppState, code: &str, snapshot: RoomSnapshot, signals: Vec<Signal>) {
    let _ = state.broadcaster.send(Broadcast::State {
        room: code.to_string(),
        payload: snapshot,
    });
    for signal in signals {
        match signal {
            Signal::GameOver { winners, coins } => {
                info!(room = %code, ?winners, "game over");
                let _ = state.broadcaster.send(Broadcast::GameOver {
                    room: code.to_string(),
                    winners,
                    coins,
                });
            }
        }
    }
}

fn seat_of(room: &RoomState, connection_id: &str) -> Result<usize, RoomError> {
    room.seat_of_connection(connection_id)
        .ok_or(RoomError::NotSeated)
}

fn handle_inbound(
    inbound: InboundMessage,
    state: &AppState,
    connection_id: &str,
    watching: &Arc<Mutex<Option<String>>>,
    tx: &mpsc::UnboundedSender<Message>,
) {
    let response = match inbound {
        InboundMessage::CreateRoom {
            request_id,
            player_count,
        } => {
            let (code, snapshot) = {
                let mut store = state.store.lock().unwrap();
                let mut rng = rand::thread_rng();
                let mut code = generate_code(&mut rng, state.code_len);
                while store.contains(&code) {
                    code = generate_code(&mut rng, state.code_len);
                }
                store.create(&code, player_count, connection_id);
                let snapshot = store.get(&code).ok().map(RoomState::snapshot);
                (code, snapshot)
            };
            *watching.lock().unwrap() = Some(code.clone());
            if let Some(snapshot) = snapshot {
                publish(state, &code, snapshot, Vec::new());
            }
            OutboundResponse::RoomCreated { request_id, code }
        }
        InboundMessage::JoinRoom { request_id, code } => {
            let normalized = RoomStore::normalize_code(&code);
            let joined = {
                let store = state.store.lock().unwrap();
                store.get(&normalized).map(RoomState::snapshot)
            };
            match joined {
                Ok(snapshot) => {
                    *watching.lock().unwrap() = Some(normalized.clone());
                    OutboundResponse::RoomJoined {
                        request_id,
                        code: normalized,
                        state: snapshot,
                    }
                }
                Err(err) => error_response(request_id, err),
            }
        }
        InboundMessage::ClaimSeat {
            request_id,
            seat,
            nick,
            avatar,
        } => respond(state, watching, request_id, |room| {
            claim_seat(
                room,
                seat,
                nick.as_deref().unwrap_or(""),
                avatar.as_deref().unwrap_or(""),
                connection_id,
            )
            .map(|()| Vec::new())
        }),
        InboundMessage::Rename {
            request_id,
            seat,
            nick,
        } => respond(state, watching, request_id, |room| {
            rename(room, seat, &nick, connection_id).map(|()| Vec::new())
        }),
        InboundMessage::StartGame { request_id } => {
            respond(state, watching, request_id, |room| {
                start_game(room, connection_id).map(|()| Vec::new())
            })
        }
        InboundMessage::Roll { request_id } => {
            let roll = DiceRng::from_entropy().roll_pair();
            respond(state, watching, request_id, |room| {
                let seat = seat_of(room, connection_id)?;
                handle_roll(room, seat, roll)
            })
        }
        InboundMessage::ConfirmSum { request_id, sum } => {
            respond(state, watching, request_id, |room| {
                let seat = seat_of(room, connection_id)?;
                handle_confirm(room, seat, sum)
            })
        }
        InboundMessage::DoAction { request_id } => {
            respond(state, watching, request_id, |room| {
                let seat = seat_of(room, connection_id)?;
                handle_action(room, seat)
            })
        }
        InboundMessage::HostControl { request_id, action } => {
            match parse_host_action(&action) {
                Some(host_action) => respond(state, watching, request_id, |room| {
                    host_control(room, host_action, connection_id).map(|()| Vec::new())
                }),
                None => OutboundResponse::Error {
                    request_id,
                    code: "INVALID_ACTION".to_string(),
                    message: format!("unknown host action: {action}"),
                },
            }
        }
    };
    send_response(tx, response);
}

/// Shared ack/error plumbing for room-scoped intents.
fn respond<F>(
    state: &AppState,
    watching: &Arc<Mutex<Option<String>>>,
    request_id: String,
    intent: F,
) -> OutboundResponse
where
    F: FnOnce(&mut RoomState) -> Result<Vec<Signal>, RoomError>,
{
    match run_intent(state, watching, intent) {
        Ok((code, snapshot, signals)) => {
            publish(state, &code, snapshot, signals);
            OutboundResponse::Ack { request_id }
        }
        Err(err) => error_response(request_id, err),
    }
}

fn send_response(tx: &mpsc::UnboundedSender<Message>, response: OutboundResponse) {
    if let Ok(payload) = serde_json::to_string(&response) {
        let _ = tx.send(Message::Text(payload));
    }
}

fn error_response(request_id: String, err: RoomError) -> OutboundResponse {
    OutboundResponse::Error {
        request_id,
        code: err.code().to_string(),
        message: err.to_string(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = ServerConfig::from_env();
    let (broadcaster, _) = broadcast::channel::<Broadcast>(config.broadcast_capacity);
    let state = AppState {
        store: Arc::new(Mutex::new(RoomStore::new())),
        broadcaster,
        code_len: config.code_len,
    };

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/healthz", get(healthz))
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("invalid listen addr")?;
    info!(%addr, "folletto's vault listening");

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn codes_use_the_unambiguous_alphabet() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..200 {
            let code = generate_code(&mut rng, 4);
            assert_eq!(code.len(), 4);
            assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
            assert!(!code.contains('O') && !code.contains('0'));
        }
    }

    #[test]
    fn host_actions_parse_case_insensitively() {
        assert_eq!(parse_host_action("pause"), Some(HostAction::Pause));
        assert_eq!(parse_host_action("RESUME"), Some(HostAction::Resume));
        assert_eq!(parse_host_action("Reset"), Some(HostAction::Reset));
        assert_eq!(parse_host_action("explode"), None);
    }
}
