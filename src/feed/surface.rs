use super::view::MessageView;
use crate::room::Room;
use crate::shared::ErrorKind;

/// Where the controller paints; implemented by the UI layer
pub trait RenderSurface: Send {
    /// A new room became active; drop whatever was shown for the previous one
    fn reset(&mut self, room: &Room);

    /// The full ordered view of the active room
    fn render(&mut self, messages: &[MessageView]);

    fn on_error(&mut self, kind: ErrorKind, detail: &str);
}
