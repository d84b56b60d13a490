use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, instrument, warn};

use super::repository::{MessageStore, StoreError};
use super::subscription::{BatchSink, CancelHandle, LiveQuery};
use crate::message::{Change, Message, MessageId, NewMessage};

#[derive(Default)]
struct StoreState {
    records: Vec<Message>, // insertion order
}

impl StoreState {
    /// Last `limit` records of a room, ordered by `created_at` with unconfirmed ones last
    fn snapshot(&self, query: &LiveQuery) -> Vec<Message> {
        let mut matching: Vec<Message> = self
            .records
            .iter()
            .filter(|m| m.room_id == query.room_id)
            .cloned()
            .collect();

        // Stable sort keeps insertion order for equal timestamps
        matching.sort_by_key(|m| (m.created_at.is_none(), m.created_at));

        let skip = matching.len().saturating_sub(query.limit);
        matching.split_off(skip)
    }
}

/// In-memory implementation of MessageStore for development and testing
///
/// With an `ack_delay`, inserts are first published without a timestamp and
/// confirmed by a later `modified` change, the way a remote backend compensates
/// for latency.
pub struct InMemoryMessageStore {
    state: Arc<Mutex<StoreState>>,
    live: broadcast::Sender<Change>,
    ack_delay: Option<Duration>,
}

impl Default for InMemoryMessageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        let (live, _) = broadcast::channel(1024);
        Self {
            state: Arc::new(Mutex::new(StoreState::default())),
            live,
            ack_delay: None,
        }
    }

    pub fn with_ack_delay(mut self, delay: Duration) -> Self {
        self.ack_delay = Some(delay);
        self
    }

    /// All records of a room in insertion order
    pub fn messages_in(&self, room_id: &str) -> Vec<Message> {
        lock(&self.state)
            .records
            .iter()
            .filter(|m| m.room_id == room_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.state).records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn publish(state: &Mutex<StoreState>, live: &broadcast::Sender<Change>, message: Message) {
        let mut state = lock(state);
        state.records.push(message.clone());
        // Sent under the lock so a concurrent subscribe sees it in the snapshot or the stream, never both
        if live.send(Change::added(message)).is_err() {
            debug!("Insert published with no live queries");
        }
    }

    fn confirm(state: &Mutex<StoreState>, live: &broadcast::Sender<Change>, id: &MessageId) {
        let mut state = lock(state);
        let Some(record) = state.records.iter_mut().find(|m| &m.id == id) else {
            warn!(message_id = %id, "Confirmed message no longer exists");
            return;
        };
        record.created_at = Some(Utc::now());
        let confirmed = record.clone();
        if live.send(Change::modified(confirmed)).is_err() {
            debug!(message_id = %id, "Confirmation published with no live queries");
        }
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    #[instrument(skip(self, record), fields(room_id = %record.room_id))]
    async fn insert(&self, record: NewMessage) -> Result<MessageId, StoreError> {
        if record.room_id.trim().is_empty() {
            return Err(StoreError::Rejected("room id is required".to_string()));
        }

        let id = MessageId::generate();

        match self.ack_delay {
            None => {
                let message = record.into_message(id.clone(), Some(Utc::now()));
                Self::publish(&self.state, &self.live, message);
            }
            Some(delay) => {
                let message = record.into_message(id.clone(), None);
                Self::publish(&self.state, &self.live, message);

                let state = self.state.clone();
                let live = self.live.clone();
                let pending = id.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    Self::confirm(&state, &live, &pending);
                });
            }
        }

        debug!(message_id = %id, "Message inserted");
        Ok(id)
    }

    #[instrument(skip(self, sink), fields(generation = %sink.generation()))]
    fn subscribe(&self, query: LiveQuery, sink: BatchSink) -> Result<CancelHandle, StoreError> {
        if query.limit == 0 {
            return Err(StoreError::Rejected("limit must be positive".to_string()));
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| StoreError::Unavailable(format!("no async runtime: {}", e)))?;

        let (initial, mut receiver) = {
            let state = lock(&self.state);
            (state.snapshot(&query), self.live.subscribe())
        };

        info!(
            room_id = %query.room_id,
            initial_count = initial.len(),
            "Starting live query"
        );

        let task = runtime.spawn(async move {
            let generation = sink.generation();
            if !sink.deliver(initial.into_iter().map(Change::added).collect()) {
                return;
            }

            loop {
                match receiver.recv().await {
                    Ok(change) => {
                        if change.message.room_id != query.room_id {
                            continue;
                        }
                        if !sink.deliver(vec![change]) {
                            debug!(generation = %generation, "Live query receiver dropped");
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(generation = %generation, skipped, "Live query fell behind");
                        sink.fail(format!("live query lagged by {} changes", skipped));
                        break;
                    }
                    Err(RecvError::Closed) => {
                        sink.fail("message store shut down");
                        break;
                    }
                }
            }

            debug!(room_id = %query.room_id, generation = %generation, "Live query ended");
        });

        Ok(CancelHandle::from_task(task))
    }
}

fn lock(state: &Mutex<StoreState>) -> std::sync::MutexGuard<'_, StoreState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{FeedEvent, Generation};
    use crate::message::ChangeKind;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    fn new_message(room_id: &str, text: &str) -> NewMessage {
        NewMessage {
            room_id: room_id.to_string(),
            author_id: "u1".to_string(),
            author_label: "alice@example.com".to_string(),
            text: text.to_string(),
        }
    }

    async fn next_batch(rx: &mut mpsc::UnboundedReceiver<FeedEvent>) -> Vec<Change> {
        match timeout(Duration::from_secs(1), rx.recv()).await {
            Ok(Some(FeedEvent::Batch { changes, .. })) => changes,
            other => panic!("expected a batch, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_initial_batch_is_room_filtered_and_ordered() {
        let store = InMemoryMessageStore::new();
        store.insert(new_message("general", "one")).await.unwrap();
        store.insert(new_message("random", "elsewhere")).await.unwrap();
        store.insert(new_message("general", "two")).await.unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let _handle = store
            .subscribe(LiveQuery::for_room("general", 100), BatchSink::new(Generation::new(1), tx))
            .unwrap();

        let texts: Vec<_> = next_batch(&mut rx)
            .await
            .into_iter()
            .map(|c| c.message.text)
            .collect();
        assert_eq!(texts, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_initial_batch_keeps_most_recent_records() {
        let store = InMemoryMessageStore::new();
        for i in 0..5 {
            store.insert(new_message("general", &i.to_string())).await.unwrap();
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        let _handle = store
            .subscribe(LiveQuery::for_room("general", 2), BatchSink::new(Generation::new(1), tx))
            .unwrap();

        let texts: Vec<_> = next_batch(&mut rx)
            .await
            .into_iter()
            .map(|c| c.message.text)
            .collect();
        assert_eq!(texts, vec!["3", "4"]);
    }

    #[tokio::test]
    async fn test_live_changes_follow_initial_batch() {
        let store = InMemoryMessageStore::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _handle = store
            .subscribe(LiveQuery::for_room("general", 100), BatchSink::new(Generation::new(1), tx))
            .unwrap();

        assert!(next_batch(&mut rx).await.is_empty());

        store.insert(new_message("random", "skip me")).await.unwrap();
        store.insert(new_message("general", "live")).await.unwrap();

        let changes = next_batch(&mut rx).await;
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::Added);
        assert_eq!(changes[0].message.text, "live");
        assert!(changes[0].message.is_confirmed());
    }

    #[tokio::test]
    async fn test_cancel_stops_delivery() {
        let store = InMemoryMessageStore::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = store
            .subscribe(LiveQuery::for_room("general", 100), BatchSink::new(Generation::new(1), tx))
            .unwrap();
        next_batch(&mut rx).await;

        handle.cancel();
        tokio::task::yield_now().await;
        store.insert(new_message("general", "after cancel")).await.unwrap();

        // The aborted task drops its sink, closing the channel
        let result = timeout(Duration::from_secs(1), rx.recv()).await;
        assert!(matches!(result, Ok(None)));
    }

    #[tokio::test]
    async fn test_ack_delay_publishes_unconfirmed_then_modified() {
        let store = InMemoryMessageStore::new().with_ack_delay(Duration::from_millis(10));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _handle = store
            .subscribe(LiveQuery::for_room("general", 100), BatchSink::new(Generation::new(1), tx))
            .unwrap();
        next_batch(&mut rx).await;

        let id = store.insert(new_message("general", "pending")).await.unwrap();

        let added = next_batch(&mut rx).await;
        assert_eq!(added[0].kind, ChangeKind::Added);
        assert!(added[0].message.created_at.is_none());

        let modified = next_batch(&mut rx).await;
        assert_eq!(modified[0].kind, ChangeKind::Modified);
        assert_eq!(modified[0].message.id, id);
        assert!(modified[0].message.created_at.is_some());
    }

    #[tokio::test]
    async fn test_unconfirmed_records_sort_last() {
        let store = InMemoryMessageStore::new().with_ack_delay(Duration::from_secs(60));
        store.insert(new_message("general", "pending")).await.unwrap();
        {
            let mut state = lock(&store.state);
            state.records.push(Message {
                id: MessageId::from("old"),
                room_id: "general".to_string(),
                author_id: "u2".to_string(),
                author_label: "bob@example.com".to_string(),
                text: "confirmed".to_string(),
                created_at: Some(Utc::now()),
            });
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        let _handle = store
            .subscribe(LiveQuery::for_room("general", 100), BatchSink::new(Generation::new(1), tx))
            .unwrap();

        let texts: Vec<_> = next_batch(&mut rx)
            .await
            .into_iter()
            .map(|c| c.message.text)
            .collect();
        assert_eq!(texts, vec!["confirmed", "pending"]);
    }

    #[tokio::test]
    async fn test_insert_requires_room() {
        let store = InMemoryMessageStore::new();

        let result = store.insert(new_message(" ", "hi")).await;

        assert!(matches!(result, Err(StoreError::Rejected(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn test_subscribe_outside_runtime_is_unavailable() {
        let store = InMemoryMessageStore::new();
        let (tx, _rx) = mpsc::unbounded_channel();

        let result = store.subscribe(
            LiveQuery::for_room("general", 100),
            BatchSink::new(Generation::new(1), tx),
        );

        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_lagging_live_query_reports_failure() {
        let store = InMemoryMessageStore::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _handle = store
            .subscribe(LiveQuery::for_room("general", 100), BatchSink::new(Generation::new(7), tx))
            .unwrap();

        // Inserts never yield, so the live query task cannot keep up
        for i in 0..1100 {
            store.insert(new_message("general", &i.to_string())).await.unwrap();
        }

        loop {
            match timeout(Duration::from_secs(1), rx.recv()).await {
                Ok(Some(FeedEvent::Batch { .. })) => continue,
                Ok(Some(FeedEvent::SubscriptionFailed { generation, detail })) => {
                    assert_eq!(generation, Generation::new(7));
                    assert!(detail.contains("lagged"));
                    break;
                }
                other => panic!("expected a subscription failure, got {:?}", other),
            }
        }
    }
}
