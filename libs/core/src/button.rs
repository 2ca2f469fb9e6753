use std::fmt::{self, Display, Formatter};

/// A physical button on the front panel.
///
/// Presses arrive from the display as commands with function `0x80` and the
/// button code as the payload.
///
/// # Examples
///
/// ```
/// use lcm_core::{Button, Function, Kind, Message};
///
/// let press = Message::new(Kind::Command, Function::Button, &[0x02]);
/// assert_eq!(Some(Button::Down), Button::from_byte(press.value()[0]));
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Button {
    /// The up arrow.
    Up,
    /// The down arrow.
    Down,
    /// The back button.
    Back,
    /// The enter button.
    Enter,
}

impl Button {
    /// Interprets a payload byte as a button, or `None` for codes the
    /// hardware has never been observed to produce.
    pub fn from_byte(byte: u8) -> Option<Button> {
        match byte {
            1 => Some(Button::Up),
            2 => Some(Button::Down),
            3 => Some(Button::Back),
            4 => Some(Button::Enter),
            _ => None,
        }
    }

    /// Returns the payload byte for this button.
    pub fn to_byte(self) -> u8 {
        match self {
            Button::Up => 1,
            Button::Down => 2,
            Button::Back => 3,
            Button::Enter => 4,
        }
    }
}

impl Display for Button {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Button::Up => write!(f, "Up"),
            Button::Down => write!(f, "Down"),
            Button::Back => write!(f, "Back"),
            Button::Enter => write!(f, "Enter"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_round_trip() {
        for button in [Button::Up, Button::Down, Button::Back, Button::Enter] {
            assert_eq!(Some(button), Button::from_byte(button.to_byte()));
        }
    }

    #[test]
    fn unknown_codes_rejected() {
        assert_eq!(None, Button::from_byte(0));
        assert_eq!(None, Button::from_byte(5));
        assert_eq!(None, Button::from_byte(0xFF));
    }

    #[test]
    fn display_names() {
        assert_eq!("Up", format!("{}", Button::Up));
        assert_eq!("Enter", format!("{}", Button::Enter));
    }
}
