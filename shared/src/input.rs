//! Key to direction translation for the locally controlled snake

use crate::snake::Direction;

/// A key press, already stripped of terminal specifics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Up,
    Down,
    Left,
    Right,
}

/// What the local player asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalCommand {
    Key(Key),
    Quit,
}

/// Maps WASD and the arrow keys to a heading. Anything else is ignored.
pub fn direction_for_key(key: Key) -> Option<Direction> {
    match key {
        Key::Char('s') | Key::Down => Some(Direction::Down),
        Key::Char('a') | Key::Left => Some(Direction::Left),
        Key::Char('w') | Key::Up => Some(Direction::Up),
        Key::Char('d') | Key::Right => Some(Direction::Right),
        _ => None,
    }
}

/// Decides whether a requested heading is a real turn.
///
/// Repeating the heading applied on the last tick is pointless, and reversing
/// it would run the snake into its own neck.
pub fn accepts_turn(last_direction: Direction, requested: Direction) -> bool {
    requested != last_direction && requested != last_direction.opposite()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_mapping() {
        assert_eq!(direction_for_key(Key::Char('w')), Some(Direction::Up));
        assert_eq!(direction_for_key(Key::Char('a')), Some(Direction::Left));
        assert_eq!(direction_for_key(Key::Char('s')), Some(Direction::Down));
        assert_eq!(direction_for_key(Key::Char('d')), Some(Direction::Right));
        assert_eq!(direction_for_key(Key::Up), Some(Direction::Up));
        assert_eq!(direction_for_key(Key::Right), Some(Direction::Right));
    }

    #[test]
    fn test_unknown_keys_ignored() {
        assert_eq!(direction_for_key(Key::Char('x')), None);
        assert_eq!(direction_for_key(Key::Char('W')), None);
        assert_eq!(direction_for_key(Key::Char(' ')), None);
    }

    #[test]
    fn test_turn_acceptance() {
        assert!(accepts_turn(Direction::Down, Direction::Left));
        assert!(accepts_turn(Direction::Down, Direction::Right));
        assert!(!accepts_turn(Direction::Down, Direction::Up));
        assert!(!accepts_turn(Direction::Down, Direction::Down));
        assert!(!accepts_turn(Direction::Left, Direction::Right));
    }
}
