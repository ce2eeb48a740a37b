//! Stream command topic grammar
//!
//! ```text
//! <root>/<public key>/<action>[/<private key>]
//! ```
//!
//! A topic is a command only when it has three or four levels, the first
//! level equals the configured root and the action is `write`, `input` or
//! `clear`. Everything else belongs to someone else on the broker and is
//! ignored. Empty key levels still parse; the dispatcher decides what an
//! empty key means.

use std::fmt;

/// What a command asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Append a record (`write` or `input`)
    Write,
    /// Remove every record of the stream
    Clear,
}

impl Action {
    pub fn parse(level: &str) -> Option<Self> {
        match level {
            "write" | "input" => Some(Self::Write),
            "clear" => Some(Self::Clear),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Write => "write",
            Self::Clear => "clear",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A topic decomposed into its command levels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTopic<'a> {
    pub public_key: &'a str,
    pub action: Action,
    /// `None` for three-level topics
    pub private_key: Option<&'a str>,
}

impl<'a> CommandTopic<'a> {
    /// Parse `topic` against the grammar rooted at `root`
    pub fn parse(root: &str, topic: &'a str) -> Option<Self> {
        let levels: Vec<&'a str> = topic.split('/').collect();

        let (public_key, action, private_key) = match levels.as_slice() {
            [first, public, action] if *first == root => (*public, *action, None),
            [first, public, action, private] if *first == root => {
                (*public, *action, Some(*private))
            }
            _ => return None,
        };

        Some(Self {
            public_key,
            action: Action::parse(action)?,
            private_key,
        })
    }
}

/// Topic that responses for `public_key` are published on
pub fn response_topic(root: &str, public_key: &str, subtopic: &str) -> String {
    format!("{root}/{public_key}/{subtopic}")
}
