//! Keyboard reader feeding local commands to the role loop

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use log::{debug, warn};
use shared::{Key, LocalCommand};
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Maps a terminal key event to a local command. Releases and unmapped
/// keys give `None`.
pub fn translate(key: KeyEvent) -> Option<LocalCommand> {
    if key.kind == KeyEventKind::Release {
        return None;
    }

    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(LocalCommand::Quit)
        }
        KeyCode::Char('q') | KeyCode::Esc => Some(LocalCommand::Quit),
        KeyCode::Char(c) => Some(LocalCommand::Key(Key::Char(c.to_ascii_lowercase()))),
        KeyCode::Up => Some(LocalCommand::Key(Key::Up)),
        KeyCode::Down => Some(LocalCommand::Key(Key::Down)),
        KeyCode::Left => Some(LocalCommand::Key(Key::Left)),
        KeyCode::Right => Some(LocalCommand::Key(Key::Right)),
        _ => None,
    }
}

/// Reads keys on a dedicated thread until quit is pressed or the receiving
/// loop goes away.
pub fn spawn_keyboard_reader(commands: UnboundedSender<LocalCommand>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        while !commands.is_closed() {
            match event::poll(POLL_INTERVAL) {
                Ok(false) => continue,
                Ok(true) => {}
                Err(e) => {
                    warn!("Keyboard polling failed: {}", e);
                    break;
                }
            }

            let command = match event::read() {
                Ok(Event::Key(key)) => translate(key),
                Ok(_) => None,
                Err(e) => {
                    warn!("Keyboard read failed: {}", e);
                    break;
                }
            };

            if let Some(command) = command {
                debug!("Key command {:?}", command);
                if commands.send(command).is_err() || command == LocalCommand::Quit {
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventState;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_steering_keys() {
        assert_eq!(
            translate(press(KeyCode::Char('w'))),
            Some(LocalCommand::Key(Key::Char('w')))
        );
        assert_eq!(
            translate(press(KeyCode::Char('D'))),
            Some(LocalCommand::Key(Key::Char('d')))
        );
        assert_eq!(
            translate(press(KeyCode::Left)),
            Some(LocalCommand::Key(Key::Left))
        );
    }

    #[test]
    fn test_quit_keys() {
        assert_eq!(translate(press(KeyCode::Char('q'))), Some(LocalCommand::Quit));
        assert_eq!(translate(press(KeyCode::Esc)), Some(LocalCommand::Quit));
        assert_eq!(
            translate(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(LocalCommand::Quit)
        );
    }

    #[test]
    fn test_ignored_events() {
        assert_eq!(translate(press(KeyCode::Tab)), None);
        let release = KeyEvent {
            code: KeyCode::Char('w'),
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Release,
            state: KeyEventState::NONE,
        };
        assert_eq!(translate(release), None);
    }
}
