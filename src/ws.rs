use crate::{
    client::Client,
    event::{Event, MessageHandle},
    game::OwnerId,
    gateway::{Gateway, GatewayError, Matcher, Reply},
    session::SessionManager,
};
use dashmap::DashMap;
use futures_util::future::{ready, BoxFuture};
use futures_util::{select, FutureExt, SinkExt, StreamExt, TryStreamExt};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

/// How many of a user's most recent messages can still be edited or deleted.
pub const MAX_TRACKED_MESSAGES: usize = 64;

#[derive(Error, Debug)]
pub enum WsError {
    #[error("violation of the application-layer protocol")]
    ProtocolError,
    #[error("say hello before sending messages")]
    NotIdentified,
}

/// Delivers replies to users connected over websockets.
pub struct WsGateway {
    connections: DashMap<OwnerId, mpsc::UnboundedSender<Value>>,
    /// Ids of each connected user's messages that can still be edited or deleted, oldest first.
    messages: DashMap<OwnerId, VecDeque<u64>>,
    next_id: AtomicU64,
    command_prefixes: Vec<char>,
    matcher: Matcher,
}

impl WsGateway {
    pub fn new(command_prefixes: Vec<char>) -> Self {
        Self {
            connections: DashMap::new(),
            messages: DashMap::new(),
            next_id: AtomicU64::new(1),
            command_prefixes,
            matcher: Matcher::new(),
        }
    }

    pub fn command_prefixes(&self) -> &[char] {
        &self.command_prefixes
    }

    pub fn connected_users(&self) -> usize {
        self.connections.len()
    }

    /// Routes the user's messages to `outbox`, replacing any older connection.
    pub fn connect(&self, owner: OwnerId, outbox: mpsc::UnboundedSender<Value>) {
        if self.connections.insert(owner, outbox).is_some() {
            log::info!("User {} reconnected", owner);
        }
    }

    /// Forgets the connection and its messages, unless the user has since
    /// connected elsewhere.
    pub fn disconnect(&self, owner: OwnerId, outbox: &mpsc::UnboundedSender<Value>) {
        let removed = self
            .connections
            .remove_if(&owner, |_, current| current.same_channel(outbox));
        if removed.is_some() {
            self.messages.remove(&owner);
        }
    }

    /// Allocates a handle for a message the user typed, so it can be tidied away later.
    pub fn register(&self, owner: OwnerId) -> MessageHandle {
        let handle = self.allocate(owner);
        self.track(handle);
        handle
    }

    /// Whether `handle` names a message that is still in the conversation.
    pub fn knows(&self, handle: MessageHandle) -> bool {
        self.messages
            .get(&handle.owner)
            .is_some_and(|ids| ids.contains(&handle.id))
    }

    /// Number of messages tracked across all users.
    #[cfg(test)]
    fn tracked_messages(&self) -> usize {
        self.messages.iter().map(|ids| ids.len()).sum()
    }

    fn track(&self, handle: MessageHandle) {
        let mut ids = self.messages.entry(handle.owner).or_default();
        ids.push_back(handle.id);
        if ids.len() > MAX_TRACKED_MESSAGES {
            ids.pop_front();
        }
    }

    fn untrack(&self, handle: MessageHandle) -> bool {
        let Some(mut ids) = self.messages.get_mut(&handle.owner) else {
            return false;
        };
        match ids.iter().position(|id| *id == handle.id) {
            Some(idx) => {
                ids.remove(idx);
                true
            }
            None => false,
        }
    }

    fn allocate(&self, owner: OwnerId) -> MessageHandle {
        MessageHandle {
            owner,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        }
    }

    fn deliver(&self, owner: OwnerId, frame: Value) -> Result<(), GatewayError> {
        let outbox = self
            .connections
            .get(&owner)
            .ok_or(GatewayError::NotConnected(owner))?;
        outbox
            .send(frame)
            .map_err(|_| GatewayError::NotConnected(owner))
    }

    fn post(&self, owner: OwnerId, reply: Reply) -> Result<MessageHandle, GatewayError> {
        let handle = self.allocate(owner);
        self.deliver(owner, message_frame("send", handle, &reply))?;
        self.track(handle);
        Ok(handle)
    }

    fn replace(&self, message: MessageHandle, reply: Reply) -> Result<(), GatewayError> {
        if !self.knows(message) {
            return Err(GatewayError::UnknownMessage(message));
        }
        self.deliver(message.owner, message_frame("edit", message, &reply))
    }

    fn remove(&self, message: MessageHandle) -> Result<(), GatewayError> {
        if !self.untrack(message) {
            return Err(GatewayError::UnknownMessage(message));
        }
        self.deliver(
            message.owner,
            json!({
                "type": "delete",
                "message_id": message.id
            }),
        )
    }
}

impl Gateway for WsGateway {
    fn send(&self, owner: OwnerId, reply: Reply) -> BoxFuture<'_, Result<MessageHandle, GatewayError>> {
        Box::pin(ready(self.post(owner, reply)))
    }

    fn edit(&self, message: MessageHandle, reply: Reply) -> BoxFuture<'_, Result<(), GatewayError>> {
        Box::pin(ready(self.replace(message, reply)))
    }

    fn delete(&self, message: MessageHandle) -> BoxFuture<'_, Result<(), GatewayError>> {
        Box::pin(ready(self.remove(message)))
    }

    fn matcher(&self) -> &Matcher {
        &self.matcher
    }
}

pub async fn accept_connection(stream: TcpStream, manager: Arc<SessionManager>, gateway: Arc<WsGateway>) {
    log::info!("Accepted new connection");

    let Ok(stream) = tokio_tungstenite::accept_async(stream).await else {
        log::error!("Error occured during websocket handshake");
        return;
    };
    let (mut write, read) = stream.split();
    let mut read = read.fuse();

    let (outbox, mut frames) = mpsc::unbounded_channel();
    let mut client = Client::new(&gateway, outbox);

    loop {
        select! {
            msg = read.try_next() => {
                let msg = match msg {
                    Ok(Some(Message::Text(msg))) => msg,
                    Ok(Some(Message::Ping(_) | Message::Pong(_))) => continue,
                    _ => break,
                };
                let Ok(msg) = serde_json::from_str::<Value>(&msg) else {
                    log::error!("Invalid JSON received: {}", &msg);
                    break;
                };
                match parse_request(&msg).and_then(|req| process_request(req, &mut client)) {
                    Ok(Some(event)) => manager.dispatch(event),
                    Ok(None) => {}
                    Err(err) => {
                        log::warn!("Invalid message received: {} ({})", &msg, err);
                        let reply = json!({
                            "type": "error",
                            "error": err.to_string()
                        });
                        write.send(Message::Text(reply.to_string())).await.ok();
                    }
                }
            },
            frame = frames.recv().fuse() => {
                let Some(frame) = frame else {
                    break;
                };
                if write.send(Message::Text(frame.to_string())).await.is_err() {
                    log::error!("Could not send websockets message");
                    break;
                }
            }
        }
    }

    client.leave();
    log::info!("Connection closed");
}

/// A message sent by a chat client to the server.
#[derive(Debug, PartialEq)]
enum Request {
    Hello { user_id: OwnerId },
    Text { text: String },
    Button { message_id: u64, data: String },
}

/// Parses a websockets message from the client.
fn parse_request(req: &Value) -> Result<Request, WsError> {
    match req["type"].as_str().unwrap_or("") {
        "hello" => {
            let user_id = req["user_id"].as_i64().ok_or(WsError::ProtocolError)?;
            Ok(Request::Hello { user_id })
        }
        "text" => {
            let text = req["text"]
                .as_str()
                .ok_or(WsError::ProtocolError)?
                .to_string();
            Ok(Request::Text { text })
        }
        "button" => {
            let message_id = req["message_id"].as_u64().ok_or(WsError::ProtocolError)?;
            let data = req["data"]
                .as_str()
                .ok_or(WsError::ProtocolError)?
                .to_string();
            Ok(Request::Button { message_id, data })
        }
        _ => Err(WsError::ProtocolError),
    }
}

/// Processes a request from the client, returning the event it stands for.
fn process_request(req: Request, client: &mut Client) -> Result<Option<Event>, WsError> {
    match req {
        Request::Hello { user_id } => {
            client.hello(user_id);
            Ok(None)
        }
        Request::Text { text } => client.text(&text).map(Some),
        Request::Button { message_id, data } => client.button(message_id, &data),
    }
}

/// Formats an outgoing message to be sent over websockets.
fn message_frame(kind: &str, handle: MessageHandle, reply: &Reply) -> Value {
    json!({
        "type": kind,
        "message_id": handle.id,
        "text": reply.text,
        "buttons": reply.buttons
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Button, Command, EventKind};
    use crate::gateway::ButtonSpec;

    fn gateway() -> WsGateway {
        WsGateway::new(vec!['/'])
    }

    #[test]
    fn parses_requests() {
        assert_eq!(
            parse_request(&json!({ "type": "hello", "user_id": 42 })).unwrap(),
            Request::Hello { user_id: 42 }
        );
        assert_eq!(
            parse_request(&json!({ "type": "text", "text": "Ann\nBob" })).unwrap(),
            Request::Text {
                text: "Ann\nBob".into()
            }
        );
        assert_eq!(
            parse_request(&json!({ "type": "button", "message_id": 7, "data": "role_0_1" })).unwrap(),
            Request::Button {
                message_id: 7,
                data: "role_0_1".into()
            }
        );
    }

    #[test]
    fn rejects_malformed_requests() {
        for req in [
            json!({}),
            json!({ "type": "hello" }),
            json!({ "type": "hello", "user_id": "42" }),
            json!({ "type": "text", "text": 3 }),
            json!({ "type": "button", "data": "next" }),
            json!({ "type": "join" }),
        ] {
            assert!(matches!(parse_request(&req), Err(WsError::ProtocolError)), "{}", req);
        }
    }

    #[test]
    fn requests_become_events() {
        let gateway = gateway();
        let (outbox, _frames) = mpsc::unbounded_channel();
        let mut client = Client::new(&gateway, outbox);

        let before_hello = process_request(Request::Text { text: "hi".into() }, &mut client);
        assert!(matches!(before_hello, Err(WsError::NotIdentified)));

        assert_eq!(process_request(Request::Hello { user_id: 5 }, &mut client).unwrap(), None);
        let event = process_request(Request::Text { text: "/ng".into() }, &mut client)
            .unwrap()
            .unwrap();
        assert_eq!(event.sender, 5);
        assert_eq!(event.kind, EventKind::Command(Command::NewGame));

        let click = Request::Button {
            message_id: 99,
            data: "next".into(),
        };
        let event = process_request(click, &mut client).unwrap().unwrap();
        assert_eq!(event.as_button(), Some(Button::Next));
        assert_eq!(event.message, None);

        let bogus = Request::Button {
            message_id: 99,
            data: "launch_missiles".into(),
        };
        assert_eq!(process_request(bogus, &mut client).unwrap(), None);
    }

    #[tokio::test]
    async fn frames_for_connected_user() {
        let gateway = gateway();
        let (outbox, mut frames) = mpsc::unbounded_channel();
        gateway.connect(3, outbox);

        let reply = Reply::text("Ready!").row(vec![ButtonSpec::new("Start", Button::StartDistribution)]);
        let handle = gateway.send(3, reply.clone()).await.unwrap();
        assert_eq!(
            frames.recv().await.unwrap(),
            json!({
                "type": "send",
                "message_id": handle.id,
                "text": "Ready!",
                "buttons": [[{ "label": "Start", "data": "start_distribution" }]]
            })
        );

        gateway.edit(handle, Reply::text("Done")).await.unwrap();
        assert_eq!(frames.recv().await.unwrap()["type"], "edit");

        gateway.delete(handle).await.unwrap();
        assert_eq!(
            frames.recv().await.unwrap(),
            json!({ "type": "delete", "message_id": handle.id })
        );
        assert!(matches!(
            gateway.edit(handle, reply).await,
            Err(GatewayError::UnknownMessage(_))
        ));
    }

    #[tokio::test]
    async fn message_handles_are_bounded() {
        let gateway = gateway();
        let (outbox, _frames) = mpsc::unbounded_channel();
        gateway.connect(6, outbox.clone());

        let first = gateway.send(6, Reply::text("first")).await.unwrap();
        let typed: Vec<_> = (0..MAX_TRACKED_MESSAGES).map(|_| gateway.register(6)).collect();
        assert!(!gateway.knows(first));
        assert!(typed.iter().all(|handle| gateway.knows(*handle)));
        assert_eq!(gateway.tracked_messages(), MAX_TRACKED_MESSAGES);
        assert!(matches!(
            gateway.edit(first, Reply::text("again")).await,
            Err(GatewayError::UnknownMessage(_))
        ));

        gateway.disconnect(6, &outbox);
        assert_eq!(gateway.tracked_messages(), 0);
        assert!(!gateway.knows(typed[0]));
    }

    #[tokio::test]
    async fn offline_users_are_reported() {
        let gateway = gateway();
        assert!(matches!(
            gateway.send(8, Reply::text("hi")).await,
            Err(GatewayError::NotConnected(8))
        ));

        let (old, _old_frames) = mpsc::unbounded_channel();
        let (new, _new_frames) = mpsc::unbounded_channel();
        gateway.connect(8, old.clone());
        gateway.connect(8, new.clone());

        // A stale connection closing doesn't sign the user out
        gateway.disconnect(8, &old);
        assert_eq!(gateway.connected_users(), 1);
        gateway.disconnect(8, &new);
        assert_eq!(gateway.connected_users(), 0);
    }
}
