use std::sync::{Arc, Mutex};

use roomfeed::{ErrorKind, MessageView, RenderSurface, Room};

// ============================================================================
// Mock Infrastructure
// ============================================================================

#[derive(Clone, Default)]
pub struct MockSurface {
    resets: Arc<Mutex<Vec<String>>>,
    frames: Arc<Mutex<Vec<Vec<MessageView>>>>,
    errors: Arc<Mutex<Vec<(ErrorKind, String)>>>,
}

impl MockSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resets(&self) -> Vec<String> {
        self.resets.lock().unwrap().clone()
    }

    pub fn last_frame(&self) -> Vec<MessageView> {
        self.frames
            .lock()
            .unwrap()
            .last()
            .cloned()
            .unwrap_or_default()
    }

    pub fn last_texts(&self) -> Vec<String> {
        self.last_frame().into_iter().map(|v| v.text).collect()
    }

    /// Every text ever painted, across all frames
    pub fn all_painted_texts(&self) -> Vec<String> {
        self.frames
            .lock()
            .unwrap()
            .iter()
            .flatten()
            .map(|v| v.text.clone())
            .collect()
    }

    pub fn errors(&self) -> Vec<(ErrorKind, String)> {
        self.errors.lock().unwrap().clone()
    }
}

impl RenderSurface for MockSurface {
    fn reset(&mut self, room: &Room) {
        self.resets.lock().unwrap().push(room.id.clone());
    }

    fn render(&mut self, messages: &[MessageView]) {
        self.frames.lock().unwrap().push(messages.to_vec());
    }

    fn on_error(&mut self, kind: ErrorKind, detail: &str) {
        self.errors.lock().unwrap().push((kind, detail.to_string()));
    }
}
