use crate::{
    event::{Button, Event, MessageHandle},
    game::OwnerId,
    ws::{WsError, WsGateway},
};
use serde_json::Value;
use tokio::sync::mpsc;

/// A single chat connection, speaking for at most one user at a time.
pub struct Client<'a> {
    gateway: &'a WsGateway,
    outbox: mpsc::UnboundedSender<Value>,
    user: Option<OwnerId>,
}

impl<'a> Client<'a> {
    /// Creates a client whose outgoing frames are written to `outbox`.
    pub fn new(gateway: &'a WsGateway, outbox: mpsc::UnboundedSender<Value>) -> Self {
        Self {
            gateway,
            outbox,
            user: None,
        }
    }

    /// Binds the connection to a user, so their prompts are delivered here.
    pub fn hello(&mut self, user: OwnerId) {
        if self.user.is_some_and(|current| current != user) {
            self.leave();
        }
        log::info!("User {} connected", user);
        self.gateway.connect(user, self.outbox.clone());
        self.user = Some(user);
    }

    /// A line typed by the user.
    pub fn text(&self, text: &str) -> Result<Event, WsError> {
        let user = self.user.ok_or(WsError::NotIdentified)?;
        let message = self.gateway.register(user);
        Ok(Event::text(
            user,
            Some(message),
            text,
            self.gateway.command_prefixes(),
        ))
    }

    /// A click on a button of message `message_id`. Unknown payloads are dropped.
    pub fn button(&self, message_id: u64, data: &str) -> Result<Option<Event>, WsError> {
        let user = self.user.ok_or(WsError::NotIdentified)?;
        let Some(button) = Button::parse(data) else {
            log::debug!("Unknown button {:?} from {}", data, user);
            return Ok(None);
        };
        let message = MessageHandle {
            owner: user,
            id: message_id,
        };
        let message = self.gateway.knows(message).then_some(message);
        Ok(Some(Event::button(user, message, button)))
    }

    /// Unbinds the connection from its user.
    pub fn leave(&mut self) {
        if let Some(user) = self.user.take() {
            log::info!("User {} disconnected", user);
            self.gateway.disconnect(user, &self.outbox);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use crate::gateway::{Gateway, Reply};

    #[tokio::test]
    async fn clicks_refer_to_own_messages() {
        let gateway = WsGateway::new(vec!['/']);
        let (outbox, _frames) = mpsc::unbounded_channel();
        let mut client = Client::new(&gateway, outbox);
        client.hello(4);

        let sent = gateway.send(4, Reply::text("Ready!")).await.unwrap();
        let event = client.button(sent.id, "start_distribution").unwrap().unwrap();
        assert_eq!(event.message, Some(sent));

        // Another user's message id is not ours to edit
        let theirs = gateway.register(5);
        let event = client.button(theirs.id, "next").unwrap().unwrap();
        assert_eq!(event.message, None);
    }

    #[test]
    fn typed_text_gets_a_handle() {
        let gateway = WsGateway::new(vec!['/']);
        let (outbox, _frames) = mpsc::unbounded_channel();
        let mut client = Client::new(&gateway, outbox);
        client.hello(4);

        let event = client.text("Ann\nBob").unwrap();
        assert_eq!(event.kind, EventKind::Text("Ann\nBob".into()));
        let message = event.message.unwrap();
        assert_eq!(message.owner, 4);
        assert!(gateway.knows(message));
    }

    #[test]
    fn switching_user_releases_previous() {
        let gateway = WsGateway::new(vec!['/']);
        let (outbox, _frames) = mpsc::unbounded_channel();
        let mut client = Client::new(&gateway, outbox);
        client.hello(1);
        client.hello(2);
        assert_eq!(gateway.connected_users(), 1);

        client.leave();
        assert_eq!(gateway.connected_users(), 0);
        assert!(matches!(client.text("hi"), Err(WsError::NotIdentified)));
    }
}
