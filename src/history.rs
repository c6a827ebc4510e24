//! Conversation history: the in-memory message store, its on-disk form, and
//! the character-budget pruning applied to outbound requests.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use serde_json::{from_reader, to_writer_pretty};

use crate::error::{Error, Result};
use crate::types::Message;

/// Default character budget for the history sent with each request.
pub const MAX_HISTORY_CHARS: usize = 25_000;

/// Returns the longest suffix of `messages` whose text fits in `max_chars`.
///
/// Messages are considered newest first and whole: the scan stops before the
/// first message that would push the total over budget.  The newest message
/// is always kept, even when it alone exceeds the budget, so the result is
/// empty only when `messages` is.
pub fn prune(messages: &[Message], max_chars: usize) -> &[Message] {
    let mut start = messages.len();
    let mut total = 0usize;
    for (idx, message) in messages.iter().enumerate().rev() {
        let chars = message.char_count();
        if start < messages.len() && total.saturating_add(chars) > max_chars {
            break;
        }
        total = total.saturating_add(chars);
        start = idx;
    }
    &messages[start..]
}

/// Outcome of reading a history file.
#[derive(Debug)]
pub enum HistoryLoad {
    /// The file was read and parsed.
    Loaded(History),
    /// There is no history file yet.
    Missing,
    /// The file exists but does not hold a message list.
    Corrupt {
        /// Why parsing failed.
        reason: String,
    },
}

impl HistoryLoad {
    /// Returns the loaded history, or an empty one.
    pub fn into_history(self) -> History {
        match self {
            HistoryLoad::Loaded(history) => history,
            HistoryLoad::Missing | HistoryLoad::Corrupt { .. } => History::new(),
        }
    }
}

/// The ordered record of every turn in the session, oldest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct History {
    messages: Vec<Message>,
}

impl History {
    /// Creates an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a history from existing messages.
    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    /// Appends a message.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Returns the number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns true if there are no messages.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Returns all messages.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Returns the newest message.
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Total characters of sanitized text across all messages.
    pub fn char_count(&self) -> usize {
        self.messages.iter().map(Message::char_count).sum()
    }

    /// Returns the suffix of the history that fits in `max_chars`.
    pub fn pruned(&self, max_chars: usize) -> &[Message] {
        prune(&self.messages, max_chars)
    }

    /// Consumes the history, returning its messages.
    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    /// Reads a history file.
    ///
    /// A missing file and unparsable content are reported through
    /// [`HistoryLoad`]; only other I/O failures are errors.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<HistoryLoad> {
        let file = match File::open(path.as_ref()) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(HistoryLoad::Missing),
            Err(err) => return Err(Error::io("failed to open history file", err)),
        };
        let reader = BufReader::new(file);
        match from_reader::<_, Vec<Message>>(reader) {
            Ok(messages) => Ok(HistoryLoad::Loaded(Self::from_messages(messages))),
            Err(err) if err.is_io() => Err(Error::io(
                "failed to read history file",
                io::Error::other(err),
            )),
            Err(err) => Ok(HistoryLoad::Corrupt {
                reason: err.to_string(),
            }),
        }
    }

    /// Writes the full history to `path`, replacing any previous content.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .map_err(|err| Error::io("failed to create history directory", err))?;
        }
        let file =
            File::create(path).map_err(|err| Error::io("failed to create history file", err))?;
        let mut writer = BufWriter::new(file);
        to_writer_pretty(&mut writer, &self.messages).map_err(|err| {
            Error::serialization("failed to serialize history", Some(Box::new(err)))
        })?;
        writer
            .flush()
            .map_err(|err| Error::io("failed to write history file", err))
    }
}

impl From<Vec<Message>> for History {
    fn from(messages: Vec<Message>) -> Self {
        Self::from_messages(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Part, Role};
    use serde_json::json;

    fn sized(role: Role, chars: usize) -> Message {
        Message::new_with_text(role, "x".repeat(chars))
    }

    fn total(messages: &[Message]) -> usize {
        messages.iter().map(Message::char_count).sum()
    }

    #[test]
    fn prune_drops_oldest_whole_messages() {
        let history: Vec<Message> = (0..5).map(|_| sized(Role::User, 6_000)).collect();
        let pruned = prune(&history, MAX_HISTORY_CHARS);
        assert_eq!(pruned.len(), 4);
        assert_eq!(total(pruned), 24_000);
        assert!(std::ptr::eq(pruned.as_ptr(), history[1..].as_ptr()));
    }

    #[test]
    fn prune_keeps_oversized_newest_message() {
        let history = vec![sized(Role::User, 10), sized(Role::Model, 30_000)];
        let pruned = prune(&history, MAX_HISTORY_CHARS);
        assert_eq!(pruned.len(), 1);
        assert_eq!(total(pruned), 30_000);
    }

    #[test]
    fn prune_stops_at_first_overflow() {
        // The scan stops at the 20k message even though the 1k message
        // before it would still fit.
        let history = vec![
            sized(Role::User, 1_000),
            sized(Role::Model, 20_000),
            sized(Role::User, 10_000),
        ];
        let pruned = prune(&history, MAX_HISTORY_CHARS);
        assert_eq!(pruned.len(), 1);
    }

    #[test]
    fn prune_counts_empty_messages_as_zero() {
        let history = vec![
            sized(Role::User, 100),
            Message::new(Role::Model, vec![Part::Other(json!({"inline_data": {}}))]),
            Message::new(Role::User, Vec::new()),
            sized(Role::User, 100),
        ];
        let pruned = prune(&history, 200);
        assert_eq!(pruned.len(), 4);
        let pruned = prune(&history, 150);
        assert_eq!(pruned.len(), 3);
    }

    #[test]
    fn prune_empty_history() {
        assert!(prune(&[], MAX_HISTORY_CHARS).is_empty());
    }

    #[test]
    fn prune_properties_hold() {
        // Deterministic LCG so the property sweep is reproducible.
        let mut state: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = move |bound: u64| {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            (state >> 33) % bound
        };
        for _ in 0..500 {
            let len = next(12) as usize;
            let history: Vec<Message> = (0..len)
                .map(|i| {
                    let role = if i % 2 == 0 { Role::User } else { Role::Model };
                    sized(role, next(400) as usize)
                })
                .collect();
            let budget = next(1_500) as usize;
            let pruned = prune(&history, budget);

            // contiguous suffix
            assert_eq!(pruned, &history[history.len() - pruned.len()..]);
            // never empty for non-empty input
            assert_eq!(pruned.is_empty(), history.is_empty());
            // within budget unless a lone message
            assert!(total(pruned) <= budget || pruned.len() == 1);
            // idempotent
            assert_eq!(prune(pruned, budget), pruned);
        }
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");
        let history = History::from_messages(vec![
            Message::user("hello"),
            Message::model("hi there\n```rust\nfn main() {}\n```"),
            Message::user("ünïcödé"),
            Message::model(""),
        ]);
        history.save(&path).unwrap();

        match History::load(&path).unwrap() {
            HistoryLoad::Loaded(loaded) => assert_eq!(loaded, history),
            other => panic!("unexpected load outcome: {other:?}"),
        }
    }

    #[test]
    fn save_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        History::from_messages(vec![Message::user("a"), Message::model("b")])
            .save(&path)
            .unwrap();
        History::from_messages(vec![Message::user("c")])
            .save(&path)
            .unwrap();
        let loaded = History::load(&path).unwrap().into_history();
        assert_eq!(loaded.messages(), &[Message::user("c")]);
    }

    #[test]
    fn saved_file_is_a_flat_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        History::from_messages(vec![Message::user("a")])
            .save(&path)
            .unwrap();
        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw, json!([{"role": "user", "parts": [{"text": "a"}]}]));
    }

    #[test]
    fn load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = History::load(dir.path().join("absent.json")).unwrap();
        assert!(matches!(outcome, HistoryLoad::Missing));
        assert!(outcome.into_history().is_empty());
    }

    #[test]
    fn load_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        for content in ["", "{not json", "{\"role\": \"user\"}", "[1, 2]"] {
            fs::write(&path, content).unwrap();
            let outcome = History::load(&path).unwrap();
            assert!(
                matches!(outcome, HistoryLoad::Corrupt { .. }),
                "content {content:?} gave {outcome:?}"
            );
        }
    }

    #[test]
    fn load_normalizes_roles_but_keeps_parts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(
            &path,
            r#"[{"role": "system", "parts": [{"text": "a"}, {"blob": 1}]}, {"parts": []}]"#,
        )
        .unwrap();
        let history = History::load(&path).unwrap().into_history();
        assert_eq!(history.len(), 2);
        assert_eq!(history.messages()[0].role, Role::User);
        assert_eq!(history.messages()[0].parts.len(), 2);
        assert_eq!(history.messages()[1].role, Role::User);
    }

    #[test]
    fn load_keeps_messages_with_non_string_roles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(
            &path,
            r#"[{"role":"user","parts":[{"text":"keep me"}]},{"role":7,"parts":[{"text":"a"}]},{"role":null,"parts":[]}]"#,
        )
        .unwrap();
        let outcome = History::load(&path).unwrap();
        assert!(matches!(outcome, HistoryLoad::Loaded(_)), "{outcome:?}");
        let history = outcome.into_history();
        assert_eq!(history.len(), 3);
        assert!(history.messages().iter().all(|m| m.role == Role::User));
        assert_eq!(history.messages()[0], Message::user("keep me"));
    }
}
