use crate::app::actions::{self, Action};
use crate::app::events::Event;
use std::io::BufRead;
use tokio::sync::mpsc;

/// Read commands from stdin on a blocking thread until stdin closes or the
/// session drops its receiver.
pub fn spawn_input_task(tx: mpsc::Sender<Event>) {
    tokio::task::spawn_blocking(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };
            let event = match actions::parse_action(&line) {
                Some(action) => Event::Input(action),
                None => {
                    eprintln!("unknown command {:?} (h for help)", line.trim());
                    continue;
                }
            };
            let quit = event == Event::Input(Action::Quit);
            if tx.blocking_send(event).is_err() || quit {
                return;
            }
        }
        let _ = tx.blocking_send(Event::InputClosed);
    });
}
