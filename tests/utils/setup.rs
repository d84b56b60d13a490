use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use roomfeed::{
    FeedConfig, Identity, InMemoryAuthProvider, InMemoryMessageStore, RoomFeedController,
};

use super::mocks::MockSurface;

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

pub struct TestSetup {
    pub controller: RoomFeedController<MockSurface>,
    pub surface: MockSurface,
    pub store: Arc<InMemoryMessageStore>,
    pub auth: Arc<InMemoryAuthProvider>,
    pub identity: Option<Identity>,
}

pub struct TestSetupBuilder {
    config: FeedConfig,
    ack_delay: Option<Duration>,
    user: Option<(String, String)>,
}

impl TestSetupBuilder {
    pub fn new() -> Self {
        Self {
            config: FeedConfig::default(),
            ack_delay: None,
            user: None,
        }
    }

    pub fn with_user(mut self, email: &str) -> Self {
        self.user = Some((email.to_string(), "secret123".to_string()));
        self
    }

    pub fn with_alice(self) -> Self {
        self.with_user("alice@example.com")
    }

    pub fn with_ack_delay(mut self, delay: Duration) -> Self {
        self.ack_delay = Some(delay);
        self
    }

    pub fn with_message_limit(mut self, limit: usize) -> Self {
        self.config.message_limit = limit;
        self
    }

    pub async fn build(self) -> TestSetup {
        let mut store = InMemoryMessageStore::new();
        if let Some(delay) = self.ack_delay {
            store = store.with_ack_delay(delay);
        }
        let store = Arc::new(store);
        let auth = Arc::new(InMemoryAuthProvider::new());

        let identity = match &self.user {
            Some((email, password)) => Some(
                auth.sign_up(email, password)
                    .await
                    .expect("sign-up should succeed"),
            ),
            None => None,
        };

        let surface = MockSurface::new();
        let controller = RoomFeedController::new(
            self.config,
            auth.clone(),
            store.clone(),
            surface.clone(),
        )
        .expect("default config is valid");

        TestSetup {
            controller,
            surface,
            store,
            auth,
            identity,
        }
    }
}

impl TestSetup {
    /// Pumps the controller inbox until `done` holds or a second passes
    pub async fn pump_until<F>(&mut self, mut done: F) -> bool
    where
        F: FnMut(&TestSetup) -> bool,
    {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
        while !done(self) {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            match timeout(remaining, self.controller.next_event()).await {
                Ok(Some(event)) => self.controller.handle_event(event),
                _ => return done(self),
            }
        }
        true
    }

    /// Lets spawned tasks run, then applies whatever reached the inbox
    pub async fn settle(&mut self) {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
        self.controller.drain_pending();
    }

    pub fn send(&mut self, text: &str, room_id: &str) -> Result<(), roomfeed::FeedError> {
        let identity = self.identity.clone();
        self.controller.send(text, identity.as_ref(), room_id)
    }
}
