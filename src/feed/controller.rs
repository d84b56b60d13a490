use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use super::events::{FeedEvent, Generation};
use super::surface::RenderSurface;
use super::view::{MessageView, ViewFormatter};
use crate::auth::{AuthChange, AuthProvider, Identity};
use crate::config::{ConfigError, FeedConfig};
use crate::message::{validate_text, Change, ChangeKind, Message, NewMessage};
use crate::shared::{ErrorKind, FeedError};
use crate::store::{BatchSink, CancelHandle, LiveQuery, MessageStore};

/// The live query currently feeding the surface
struct Subscription {
    room_id: String,
    generation: Generation,
    cancel: CancelHandle,
}

/// Owns the active room's live query and the rendered message sequence
///
/// Every method takes `&mut self`: the owner drives the controller from one
/// task, and collaborators report back through the controller's inbox
/// (`next_event` / `drain_pending`), so callbacks never interleave.
///
/// Each live query is tagged with a fresh `Generation`; batches carrying any
/// other generation are dropped, which covers deliveries that were already in
/// flight when a query was cancelled.
pub struct RoomFeedController<S: RenderSurface> {
    config: FeedConfig,
    formatter: ViewFormatter,
    auth: Arc<dyn AuthProvider>,
    store: Arc<dyn MessageStore>,
    surface: S,
    active: Option<Subscription>,
    /// Room selected by the last `activate`, kept across sign-out
    last_room: Option<String>,
    last_generation: Generation,
    messages: Vec<Message>,
    inbox_tx: mpsc::UnboundedSender<FeedEvent>,
    inbox_rx: mpsc::UnboundedReceiver<FeedEvent>,
    /// Inserts go through one writer task so they reach the store in send order
    outbox: Option<mpsc::UnboundedSender<NewMessage>>,
}

impl<S: RenderSurface> RoomFeedController<S> {
    pub fn new(
        config: FeedConfig,
        auth: Arc<dyn AuthProvider>,
        store: Arc<dyn MessageStore>,
        surface: S,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let formatter = ViewFormatter::from_config(&config)?;
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();

        Ok(Self {
            config,
            formatter,
            auth,
            store,
            surface,
            active: None,
            last_room: None,
            last_generation: Generation::new(0),
            messages: Vec::new(),
            inbox_tx,
            inbox_rx,
            outbox: None,
        })
    }

    /// Switches the feed to `room_id`
    ///
    /// The previous live query is cancelled before the new one is issued. A
    /// store that refuses the query is reported through the surface, not
    /// returned; only an unknown room is an error here.
    #[instrument(skip(self))]
    pub fn activate(&mut self, room_id: &str) -> Result<(), FeedError> {
        let room = self
            .config
            .rooms
            .get(room_id)
            .cloned()
            .ok_or_else(|| FeedError::UnknownRoom(room_id.to_string()))?;

        self.cancel_active();

        self.messages.clear();
        self.surface.reset(&room);
        self.last_room = Some(room.id.clone());

        let generation = self.last_generation.next();
        self.last_generation = generation;

        let query = LiveQuery::for_room(room.id.clone(), self.config.message_limit);
        let sink = BatchSink::new(generation, self.inbox_tx.clone());

        match self.store.subscribe(query, sink) {
            Ok(cancel) => {
                info!(room_id = %room.id, generation = %generation, "Room feed activated");
                self.active = Some(Subscription {
                    room_id: room.id,
                    generation,
                    cancel,
                });
            }
            Err(e) => {
                warn!(room_id = %room.id, error = %e, "Failed to start live query");
                self.surface
                    .on_error(ErrorKind::Subscription, &e.to_string());
            }
        }

        Ok(())
    }

    /// Cancels the active live query, if any. Calling it again does nothing.
    #[instrument(skip(self))]
    pub fn deactivate(&mut self) {
        if self.cancel_active() {
            self.messages.clear();
            self.surface.render(&[]);
            info!("Room feed deactivated");
        } else {
            debug!("Deactivate with no active subscription");
        }
    }

    /// Applies a change batch from the live query tagged `generation`
    ///
    /// Returns how many changes altered the view.
    pub fn on_change_batch(
        &mut self,
        generation: Generation,
        changes: Vec<Change>,
    ) -> Result<usize, FeedError> {
        let active_room = self.check_generation(generation)?.to_string();

        let mut applied = 0;
        for change in changes {
            if change.message.room_id != active_room {
                warn!(
                    room_id = %active_room,
                    message_room = %change.message.room_id,
                    "Dropping change for another room"
                );
                continue;
            }

            let existing = self
                .messages
                .iter()
                .position(|m| m.id == change.message.id);

            match (change.kind, existing) {
                (ChangeKind::Added, None) => {
                    self.messages.push(change.message);
                    applied += 1;
                }
                // Re-delivery of a known message replaces it in place
                (ChangeKind::Added, Some(index)) | (ChangeKind::Modified, Some(index)) => {
                    self.messages[index] = change.message;
                    applied += 1;
                }
                (ChangeKind::Modified, None) => {
                    debug!(message_id = %change.message.id, "Modified change for unknown message");
                }
                (ChangeKind::Removed, _) => {
                    debug!(message_id = %change.message.id, "Ignoring removal, feed is append-only");
                }
            }
        }

        let limit = self.config.message_limit;
        if self.messages.len() > limit {
            let excess = self.messages.len() - limit;
            self.messages.drain(..excess);
        }

        debug!(generation = %generation, applied, total = self.messages.len(), "Applied change batch");
        self.render();
        Ok(applied)
    }

    /// The live query tagged `generation` died; it stays dead until the next `activate`
    pub fn on_subscription_error(
        &mut self,
        generation: Generation,
        detail: &str,
    ) -> Result<(), FeedError> {
        let room_id = self.check_generation(generation)?.to_string();

        let error = FeedError::Subscription(detail.to_string());
        warn!(room_id = %room_id, generation = %generation, error = %error, "Live query failed");
        self.cancel_active();
        self.surface.on_error(ErrorKind::Subscription, detail);
        Ok(())
    }

    /// Validates and issues one insert; the message shows up through the live query
    ///
    /// Store failures are reported later through the surface.
    #[instrument(skip(self, text, author))]
    pub fn send(
        &mut self,
        text: &str,
        author: Option<&Identity>,
        room_id: &str,
    ) -> Result<(), FeedError> {
        let author = author.ok_or(FeedError::Unauthenticated)?;
        let text = validate_text(text, self.config.max_message_chars)?;
        if !self.config.rooms.contains(room_id) {
            return Err(FeedError::UnknownRoom(room_id.to_string()));
        }

        let record = NewMessage {
            room_id: room_id.to_string(),
            author_id: author.id.clone(),
            author_label: author.label.clone(),
            text,
        };

        if let Err(detail) = self.enqueue(record) {
            warn!(detail = %detail, "Message could not be queued");
            self.surface.on_error(ErrorKind::Send, &detail);
        }

        Ok(())
    }

    /// Hands a record to the writer task, starting it on first use
    fn enqueue(&mut self, record: NewMessage) -> Result<(), String> {
        let outbox = match &self.outbox {
            Some(outbox) if !outbox.is_closed() => outbox.clone(),
            _ => {
                let runtime = tokio::runtime::Handle::try_current().map_err(|e| e.to_string())?;
                let (outbox, pending) = mpsc::unbounded_channel();
                runtime.spawn(write_messages(
                    self.store.clone(),
                    pending,
                    self.inbox_tx.clone(),
                ));
                debug!("Message writer started");
                self.outbox = Some(outbox.clone());
                outbox
            }
        };

        outbox
            .send(record)
            .map_err(|_| "message writer stopped".to_string())
    }

    /// Sends as the current identity into the selected room
    pub fn send_current(&mut self, text: &str) -> Result<(), FeedError> {
        let identity = self.auth.current_identity();
        let room_id = self.last_room.clone().ok_or(FeedError::NoActiveRoom)?;
        self.send(text, identity.as_ref(), &room_id)
    }

    /// Signing out tears the feed down; signing in resumes the last room
    pub fn on_auth_change(&mut self, change: AuthChange) -> Result<(), FeedError> {
        match change {
            AuthChange::SignedOut => {
                self.deactivate();
                Ok(())
            }
            AuthChange::SignedIn(identity) => {
                let room_id = self
                    .last_room
                    .clone()
                    .unwrap_or_else(|| self.config.rooms.default_room().to_string());
                info!(user_id = %identity.id, room_id = %room_id, "Signed in, loading room");
                self.activate(&room_id)
            }
        }
    }

    pub fn handle_event(&mut self, event: FeedEvent) {
        let event_type = event.event_type();
        let result = match event {
            FeedEvent::Batch {
                generation,
                changes,
            } => self.on_change_batch(generation, changes).map(|_| ()),
            FeedEvent::SubscriptionFailed { generation, detail } => {
                self.on_subscription_error(generation, &detail)
            }
            FeedEvent::SendFailed { detail } => {
                self.surface.on_error(ErrorKind::Send, &detail);
                Ok(())
            }
        };

        if let Err(e) = result {
            debug!(event = event_type, error = %e, "Feed event dropped");
        }
    }

    /// Waits for the next event from a collaborator
    pub async fn next_event(&mut self) -> Option<FeedEvent> {
        self.inbox_rx.recv().await
    }

    /// Applies everything already queued, returning how many events were handled
    pub fn drain_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.inbox_rx.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn views(&self) -> Vec<MessageView> {
        let viewer = self.auth.current_identity().map(|i| i.id);
        self.messages
            .iter()
            .map(|m| self.formatter.view(m, viewer.as_deref()))
            .collect()
    }

    /// Room selected by the last `activate`, even if its live query failed
    pub fn active_room(&self) -> Option<&str> {
        self.last_room.as_deref()
    }

    pub fn active_generation(&self) -> Option<Generation> {
        self.active.as_ref().map(|s| s.generation)
    }

    pub fn is_subscribed(&self) -> bool {
        self.active.is_some()
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    fn check_generation(&self, generation: Generation) -> Result<&str, FeedError> {
        match &self.active {
            Some(active) if active.generation == generation => Ok(&active.room_id),
            other => {
                let active = other.as_ref().map(|s| s.generation);
                debug!(
                    received = %generation,
                    active = ?active,
                    "Discarding stale delivery"
                );
                Err(FeedError::StaleDelivery {
                    received: generation,
                    active,
                })
            }
        }
    }

    fn cancel_active(&mut self) -> bool {
        match self.active.take() {
            Some(subscription) => {
                debug!(
                    room_id = %subscription.room_id,
                    generation = %subscription.generation,
                    "Cancelling subscription"
                );
                subscription.cancel.cancel();
                true
            }
            None => false,
        }
    }

    fn render(&mut self) {
        let views = self.views();
        self.surface.render(&views);
    }
}

/// Inserts queued records one at a time; ends when the controller drops its outbox
async fn write_messages(
    store: Arc<dyn MessageStore>,
    mut pending: mpsc::UnboundedReceiver<NewMessage>,
    inbox: mpsc::UnboundedSender<FeedEvent>,
) {
    while let Some(record) = pending.recv().await {
        match store.insert(record).await {
            Ok(id) => debug!(message_id = %id, "Message accepted by store"),
            Err(e) => {
                warn!(error = %e, "Message insert failed");
                let _ = inbox.send(FeedEvent::SendFailed {
                    detail: e.to_string(),
                });
            }
        }
    }
    debug!("Message writer stopped");
}

impl<S: RenderSurface> Drop for RoomFeedController<S> {
    fn drop(&mut self) {
        self.cancel_active();
    }
}
