//! Real-time bridge
//!
//! Mirrors the session phase onto a websocket: while a session is live, one
//! channel keyed by the current access token stays open, and every
//! credential change (login or refresh) tears the old channel down and dials
//! a fresh one. Incoming frames are `{"event", "data"}` pairs; data events
//! fan out into the domain stores through a fixed handler table, and
//! anything unrecognized is ignored.
//!
//! There is no retry machinery here: a dropped or failed connection stays
//! down until the next credential change.

use crate::models::{ChatMessage, LessonUpdate, Notification, ProgressUpdate, TypingEvent};
use crate::session::SessionPhase;
use crate::stores::Stores;
use futures::StreamExt;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, warn};
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection state of the real-time channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

enum BridgeCommand {
    /// Close the current channel and idle until the next credential change
    Close,
}

/// How the read loop ended
#[derive(Debug, PartialEq)]
enum LoopExit {
    /// The session phase moved; re-evaluate it immediately
    PhaseChanged,
    /// Server closed, transport failed, or a control event asked us to stop
    Closed,
    /// An explicit close command arrived
    Commanded,
    /// The store or the bridge handle is gone
    Shutdown,
}

/// Handle to the background task that owns the websocket
pub struct RealtimeBridge {
    state_rx: watch::Receiver<ConnectionState>,
    command_tx: mpsc::Sender<BridgeCommand>,
    handle: JoinHandle<()>,
}

impl RealtimeBridge {
    /// Spawn the bridge task
    ///
    /// The task follows `phase`: it dials whenever a token is available and
    /// hangs up whenever the phase goes anonymous or the token rotates.
    pub fn spawn(
        realtime_url: Url,
        connect_timeout: Duration,
        stores: Stores,
        phase: watch::Receiver<SessionPhase>,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (command_tx, command_rx) = mpsc::channel(4);

        let handle = tokio::spawn(run(
            realtime_url,
            connect_timeout,
            stores,
            phase,
            state_tx,
            command_rx,
        ));

        Self {
            state_rx,
            command_tx,
            handle,
        }
    }

    /// Current connection state
    pub fn connection_state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Close the channel and wait until the socket is down
    ///
    /// Used by logout so the socket teardown deterministically precedes the
    /// credential wipe. Bounded: a wedged task cannot hang the caller.
    pub async fn close_channel(&self) {
        if self.command_tx.send(BridgeCommand::Close).await.is_err() {
            return;
        }

        let mut state_rx = self.state_rx.clone();
        let _ = timeout(
            Duration::from_secs(5),
            state_rx.wait_for(|state| *state == ConnectionState::Disconnected),
        )
        .await;
    }

    /// Stop the bridge task outright
    pub fn shutdown(&self) {
        self.handle.abort();
    }
}

impl Drop for RealtimeBridge {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn run(
    realtime_url: Url,
    connect_timeout: Duration,
    stores: Stores,
    mut phase: watch::Receiver<SessionPhase>,
    state_tx: watch::Sender<ConnectionState>,
    mut commands: mpsc::Receiver<BridgeCommand>,
) {
    loop {
        // Idle until the session hands us a token
        let token = loop {
            if let SessionPhase::Authenticated { access_token } = phase.borrow_and_update().clone()
            {
                break access_token;
            }
            tokio::select! {
                changed = phase.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
                cmd = commands.recv() => {
                    // Close while already idle is a no-op
                    if cmd.is_none() {
                        return;
                    }
                }
            }
        };

        set_state(&state_tx, ConnectionState::Connecting);
        let connect_url = channel_url(&realtime_url, &token);

        let ws = tokio::select! {
            result = timeout(connect_timeout, connect_async(connect_url.as_str())) => {
                match result {
                    Ok(Ok((ws, _response))) => ws,
                    Ok(Err(e)) => {
                        error!("Realtime connect failed: {}", e);
                        set_state(&state_tx, ConnectionState::Disconnected);
                        if !next_credential_change(&mut phase, &mut commands).await {
                            return;
                        }
                        continue;
                    }
                    Err(_) => {
                        error!("Realtime connect timed out");
                        set_state(&state_tx, ConnectionState::Disconnected);
                        if !next_credential_change(&mut phase, &mut commands).await {
                            return;
                        }
                        continue;
                    }
                }
            }
            cmd = commands.recv() => {
                set_state(&state_tx, ConnectionState::Disconnected);
                if cmd.is_none() || !next_credential_change(&mut phase, &mut commands).await {
                    return;
                }
                continue;
            }
        };

        set_state(&state_tx, ConnectionState::Connected);
        info!("Realtime channel connected");

        let exit = read_loop(ws, &mut phase, &mut commands, &stores).await;
        set_state(&state_tx, ConnectionState::Disconnected);

        match exit {
            LoopExit::PhaseChanged => {}
            LoopExit::Closed | LoopExit::Commanded => {
                if !next_credential_change(&mut phase, &mut commands).await {
                    return;
                }
            }
            LoopExit::Shutdown => return,
        }
    }
}

/// Park until the phase moves again; false means the bridge should stop
async fn next_credential_change(
    phase: &mut watch::Receiver<SessionPhase>,
    commands: &mut mpsc::Receiver<BridgeCommand>,
) -> bool {
    loop {
        tokio::select! {
            changed = phase.changed() => {
                return changed.is_ok();
            }
            cmd = commands.recv() => {
                // Already disconnected; swallow stray close commands
                if cmd.is_none() {
                    return false;
                }
            }
        }
    }
}

async fn read_loop(
    mut ws: WsStream,
    phase: &mut watch::Receiver<SessionPhase>,
    commands: &mut mpsc::Receiver<BridgeCommand>,
    stores: &Stores,
) -> LoopExit {
    loop {
        tokio::select! {
            changed = phase.changed() => {
                // This socket is keyed on a token that no longer exists
                let _ = ws.close(None).await;
                return if changed.is_err() {
                    LoopExit::Shutdown
                } else {
                    LoopExit::PhaseChanged
                };
            }
            cmd = commands.recv() => {
                let _ = ws.close(None).await;
                return if cmd.is_none() {
                    LoopExit::Shutdown
                } else {
                    LoopExit::Commanded
                };
            }
            frame = ws.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        // Frames racing a sign-out must not touch the stores
                        if !matches!(*phase.borrow(), SessionPhase::Authenticated { .. }) {
                            debug!("Dropping realtime frame received while signed out");
                            continue;
                        }
                        if dispatch_event(text.as_str(), stores) == EventOutcome::Close {
                            let _ = ws.close(None).await;
                            return LoopExit::Closed;
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("Realtime channel closed by server");
                        return LoopExit::Closed;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!("Realtime transport error: {}", e);
                        return LoopExit::Closed;
                    }
                    None => return LoopExit::Closed,
                }
            }
        }
    }
}

/// What the read loop should do after an event
#[derive(Debug, PartialEq)]
enum EventOutcome {
    Continue,
    Close,
}

/// Wire shape of every frame on the channel
#[derive(Debug, Deserialize)]
struct EventFrame {
    event: String,
    #[serde(default)]
    data: Value,
}

type EventHandler = fn(&Stores, Value);

/// Every store-mutating event the backend can push
///
/// Extending the protocol means adding a row here, nothing else.
const EVENT_HANDLERS: &[(&str, EventHandler)] = &[
    ("message-received", apply_message_received),
    ("user-typing", apply_user_typing),
    ("user-stopped-typing", apply_user_stopped_typing),
    ("new-notification", apply_new_notification),
    ("progress-update", apply_progress_update),
    ("lesson-update", apply_lesson_update),
];

fn dispatch_event(text: &str, stores: &Stores) -> EventOutcome {
    let frame: EventFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!("Discarding malformed realtime frame: {}", e);
            return EventOutcome::Continue;
        }
    };

    // Connection-control signals steer the loop instead of the stores
    match frame.event.as_str() {
        "connect" => {
            debug!("Realtime channel acknowledged by server");
            return EventOutcome::Continue;
        }
        "disconnect" => {
            info!("Server asked the realtime channel to close");
            return EventOutcome::Close;
        }
        "transport-error" => {
            error!("Server reported a transport error: {}", frame.data);
            return EventOutcome::Close;
        }
        _ => {}
    }

    match EVENT_HANDLERS.iter().find(|(name, _)| *name == frame.event) {
        Some((_, handler)) => handler(stores, frame.data),
        None => debug!("Ignoring unrecognized realtime event: {}", frame.event),
    }

    EventOutcome::Continue
}

fn parse_payload<T: DeserializeOwned>(event: &str, data: Value) -> Option<T> {
    match serde_json::from_value(data) {
        Ok(payload) => Some(payload),
        Err(e) => {
            warn!("Malformed {} payload: {}", event, e);
            None
        }
    }
}

fn apply_message_received(stores: &Stores, data: Value) {
    if let Some(message) = parse_payload::<ChatMessage>("message-received", data) {
        stores.chat.append(message);
    }
}

fn apply_user_typing(stores: &Stores, data: Value) {
    if let Some(event) = parse_payload::<TypingEvent>("user-typing", data) {
        stores.chat.set_typing(event.user_id, true);
    }
}

fn apply_user_stopped_typing(stores: &Stores, data: Value) {
    if let Some(event) = parse_payload::<TypingEvent>("user-stopped-typing", data) {
        stores.chat.set_typing(event.user_id, false);
    }
}

fn apply_new_notification(stores: &Stores, data: Value) {
    if let Some(notification) = parse_payload::<Notification>("new-notification", data) {
        stores.notifications.push(notification);
    }
}

fn apply_progress_update(stores: &Stores, data: Value) {
    if let Some(update) = parse_payload::<ProgressUpdate>("progress-update", data) {
        stores.progress.apply_progress(update);
    }
}

fn apply_lesson_update(stores: &Stores, data: Value) {
    if let Some(update) = parse_payload::<LessonUpdate>("lesson-update", data) {
        stores.progress.apply_lesson(update);
    }
}

fn channel_url(base: &Url, token: &str) -> Url {
    let mut url = base.clone();
    url.query_pairs_mut().append_pair("token", token);
    url
}

fn set_state(tx: &watch::Sender<ConnectionState>, state: ConnectionState) {
    if tx.send_replace(state) != state {
        debug!("Realtime connection state: {:?}", state);
    }
}
