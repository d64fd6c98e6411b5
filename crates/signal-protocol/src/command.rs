//! Session command tokens

/// Commands a registered device may send during its command loop.
///
/// Parsing is exact-match on the full message; unrecognized content is
/// not an error, the session simply ignores it and keeps reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Begin a frame upload.
    SendImage,
    /// Request the approach's current output vector.
    GetLed,
    /// Graceful disconnect.
    Exit,
}

impl Command {
    /// Parse a raw message as a command. Case-sensitive exact match.
    pub fn parse(raw: &[u8]) -> Option<Command> {
        match raw {
            b"/send_image" => Some(Command::SendImage),
            b"/get_led" => Some(Command::GetLed),
            b"/exit" => Some(Command::Exit),
            _ => None,
        }
    }

    /// Wire token for this command.
    pub fn token(&self) -> &'static str {
        match self {
            Command::SendImage => "/send_image",
            Command::GetLed => "/get_led",
            Command::Exit => "/exit",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_round_trip() {
        for cmd in [Command::SendImage, Command::GetLed, Command::Exit] {
            assert_eq!(Command::parse(cmd.token().as_bytes()), Some(cmd));
        }
    }

    #[test]
    fn exact_match_only() {
        assert_eq!(Command::parse(b"/send_image "), None);
        assert_eq!(Command::parse(b"/SEND_IMAGE"), None);
        assert_eq!(Command::parse(b"send_image"), None);
        assert_eq!(Command::parse(b"/get_leds"), None);
        assert_eq!(Command::parse(b""), None);
    }
}
