//! DSP state classification for card state nodes.

use std::fmt;

/// Online/offline status of a sound card's DSP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardState {
    Online,
    Offline,
}

impl CardState {
    /// Classify raw state-node text by prefix.
    ///
    /// The node reports a short token (`ONLINE`/`OFFLINE`) possibly followed
    /// by a newline or further text; only the prefix is significant. Any
    /// other content yields `None`: no transition is recognized.
    pub fn classify(text: &[u8]) -> Option<CardState> {
        if text.starts_with(b"OFFLINE") {
            Some(CardState::Offline)
        } else if text.starts_with(b"ONLINE") {
            Some(CardState::Online)
        } else {
            None
        }
    }
}

impl fmt::Display for CardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CardState::Online => f.write_str("ONLINE"),
            CardState::Offline => f.write_str("OFFLINE"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_online_prefix() {
        assert_eq!(CardState::classify(b"ONLINE"), Some(CardState::Online));
        assert_eq!(CardState::classify(b"ONLINE\n"), Some(CardState::Online));
        assert_eq!(CardState::classify(b"ONLINE x"), Some(CardState::Online));
    }

    #[test]
    fn classifies_offline_prefix() {
        assert_eq!(CardState::classify(b"OFFLINE"), Some(CardState::Offline));
        assert_eq!(CardState::classify(b"OFFLINE\n"), Some(CardState::Offline));
    }

    #[test]
    fn unrecognized_text_is_no_transition() {
        assert_eq!(CardState::classify(b""), None);
        assert_eq!(CardState::classify(b"RESET\n"), None);
        assert_eq!(CardState::classify(b"ONLIN"), None);
        assert_eq!(CardState::classify(b"online\n"), None);
    }

    #[test]
    fn display_matches_node_tokens() {
        assert_eq!(CardState::Online.to_string(), "ONLINE");
        assert_eq!(CardState::Offline.to_string(), "OFFLINE");
    }
}
