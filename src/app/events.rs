use super::actions::Action;
use crate::sources::PlayStatus;

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Input(Action),
    Player(PlayerEvent),
    /// Stdin closed.
    InputClosed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    Status(PlayStatus),
    Position { position: f64, duration: f64 },
    /// The active source could not play the current track.
    Error(String),
}
