//! Sound-card discovery from the kernel card listing.
//!
//! The listing file describes each card on a pair of lines; the first line
//! of each pair starts with the card index (` 0 [PCH   ]: ...`), the second
//! is a continuation. Discovery takes the index token from every even line,
//! opens the matching `card<N>/state` node, and keeps whatever opens
//! successfully.

use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::os::fd::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use crate::state::CardState;

/// An open handle on one card's state node.
#[derive(Debug)]
pub struct CardHandle {
    /// Kernel card index.
    pub card: u32,
    file: File,
}

impl CardHandle {
    /// Read the state node and classify its content.
    ///
    /// Reads at most 8 bytes (enough for the `ONLINE`/`OFFLINE` token) and
    /// rewinds afterwards, since sysfs attribute files do not reset their
    /// read position on their own. A zero-byte read is an error.
    pub fn read_state(&mut self) -> Result<Option<CardState>> {
        let mut buf = [0u8; 8];
        let n = self
            .file
            .read(&mut buf)
            .with_context(|| format!("read card{} state node", self.card))?;
        if n == 0 {
            bail!("empty read from card{} state node", self.card);
        }
        self.file
            .seek(SeekFrom::Start(0))
            .with_context(|| format!("rewind card{} state node", self.card))?;
        Ok(CardState::classify(&buf[..n]))
    }
}

impl AsRawFd for CardHandle {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

/// Path of the state node for a card index under `cards_root`.
pub fn state_node_path(cards_root: &Path, card: u32) -> PathBuf {
    cards_root.join(format!("card{card}")).join("state")
}

/// Enumerate sound cards from `listing` and open their state nodes.
///
/// Cards whose index token does not parse or whose state node cannot be
/// opened are logged and skipped. An unreadable listing file is an error;
/// an empty result is left to the caller, which needs at least one card.
pub fn discover_cards(listing: &Path, cards_root: &Path) -> Result<Vec<CardHandle>> {
    let file =
        File::open(listing).with_context(|| format!("open card listing {listing:?}"))?;
    let reader = BufReader::new(file);

    let mut handles = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("read card listing {listing:?}"))?;
        // Odd lines are continuations of the previous card's entry.
        if line_no % 2 == 1 {
            continue;
        }
        let Some(token) = line.split([' ', '[']).find(|t| !t.is_empty()) else {
            continue;
        };
        let card: u32 = match token.parse() {
            Ok(card) => card,
            Err(_) => {
                tracing::warn!(token, "card listing token is not a card index");
                continue;
            }
        };

        let path = state_node_path(cards_root, card);
        match File::open(&path) {
            Ok(file) => {
                tracing::debug!(card, path = ?path, "opened sound card state node");
                handles.push(CardHandle { card, file });
            }
            Err(e) => tracing::warn!(card, path = ?path, "open state node failed: {e}"),
        }
    }

    tracing::info!(count = handles.len(), "sound cards detected");
    Ok(handles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    /// Lay out a cards root with a listing file and one state node per entry.
    fn fixture(cards: &[(u32, &str)]) -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let mut listing = String::new();
        for (card, state) in cards {
            listing.push_str(&format!(
                " {card} [card{card}         ]: fake - Fake Card {card}\n"
            ));
            listing.push_str("                      Fake Card description\n");
            let node_dir = dir.path().join(format!("card{card}"));
            fs::create_dir_all(&node_dir).unwrap();
            fs::write(node_dir.join("state"), state).unwrap();
        }
        let listing_path = dir.path().join("cards");
        fs::write(&listing_path, listing).unwrap();
        (dir, listing_path)
    }

    #[test]
    fn discovers_all_openable_cards() {
        let (dir, listing) = fixture(&[(0, "ONLINE\n"), (1, "OFFLINE\n")]);
        let handles = discover_cards(&listing, dir.path()).unwrap();
        let indices: Vec<u32> = handles.iter().map(|h| h.card).collect();
        assert_eq!(indices, vec![0, 1]);
    }

    #[test]
    fn skips_cards_without_state_node() {
        let (dir, listing) = fixture(&[(0, "ONLINE\n")]);
        // Append a listing entry for a card with no node on disk.
        let mut raw = fs::read_to_string(&listing).unwrap();
        raw.push_str(" 7 [ghost          ]: fake - Ghost\n");
        raw.push_str("                      Ghost description\n");
        fs::write(&listing, raw).unwrap();

        let handles = discover_cards(&listing, dir.path()).unwrap();
        assert_eq!(handles.len(), 1);
        assert_eq!(handles[0].card, 0);
    }

    #[test]
    fn skips_unparseable_index_tokens() {
        let dir = TempDir::new().unwrap();
        let listing = dir.path().join("cards");
        fs::write(&listing, "junk line without index\nsecond line\n").unwrap();
        let handles = discover_cards(&listing, dir.path()).unwrap();
        assert!(handles.is_empty());
    }

    #[test]
    fn ignores_continuation_lines() {
        // The continuation line starts with spaces; if it were scanned it
        // would produce no token, but make the point with a decoy digit.
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("card3")).unwrap();
        fs::write(dir.path().join("card3").join("state"), "ONLINE\n").unwrap();
        fs::create_dir_all(dir.path().join("card9")).unwrap();
        fs::write(dir.path().join("card9").join("state"), "ONLINE\n").unwrap();
        let listing = dir.path().join("cards");
        fs::write(&listing, " 3 [x ]: fake - Three\n 9 decoy continuation\n").unwrap();

        let handles = discover_cards(&listing, dir.path()).unwrap();
        assert_eq!(handles.len(), 1);
        assert_eq!(handles[0].card, 3);
    }

    #[test]
    fn missing_listing_is_an_error() {
        let dir = TempDir::new().unwrap();
        let result = discover_cards(&dir.path().join("no-such-file"), dir.path());
        assert!(result.is_err());
    }

    #[test]
    fn read_state_classifies_and_rewinds() {
        let (dir, listing) = fixture(&[(0, "ONLINE\n")]);
        let mut handles = discover_cards(&listing, dir.path()).unwrap();
        let handle = &mut handles[0];
        assert_eq!(handle.read_state().unwrap(), Some(CardState::Online));
        // Second read must observe the same content from the start.
        assert_eq!(handle.read_state().unwrap(), Some(CardState::Online));
    }

    #[test]
    fn read_state_reports_empty_node() {
        let (dir, listing) = fixture(&[(0, "")]);
        let mut handles = discover_cards(&listing, dir.path()).unwrap();
        assert!(handles[0].read_state().is_err());
    }

    #[test]
    fn read_state_passes_through_unrecognized_text() {
        let (dir, listing) = fixture(&[(0, "RESET\n")]);
        let mut handles = discover_cards(&listing, dir.path()).unwrap();
        assert_eq!(handles[0].read_state().unwrap(), None);
    }
}
