
use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;
use tracing::debug;

/// Speaker of a single conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRole {
    User,
    Assistant,
}

impl TurnRole {
    /// Label used when a turn is rendered into a prompt.
    #[inline]
    pub fn label(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Assistant => "Assistant",
        }
    }
}

/// One utterance in a session transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: TurnRole,
    pub text: String,
}

/// Per-session conversation transcripts, kept in memory only.
///
/// History is lost on restart. Sessions are keyed by the caller-chosen id;
/// an unknown id is simply a session with no history yet. Each session keeps
/// at most `max_turns` turns (zero disables the cap), dropping the oldest
/// first.
pub struct SessionMemory {
    max_turns: usize,
    sessions: RwLock<HashMap<String, VecDeque<Turn>>>,
}

impl SessionMemory {
    #[inline]
    pub fn new(max_turns: usize) -> Self {
        Self {
            max_turns,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Append a single turn to a session, creating the session on first use.
    #[inline]
    pub async fn append(&self, session_id: &str, turn: Turn) {
        let mut sessions = self.sessions.write().await;
        let transcript = sessions.entry(session_id.to_string()).or_default();
        transcript.push_back(turn);
        self.trim(transcript);
        debug!("Session {} now holds {} turns", session_id, transcript.len());
    }

    /// Append a completed question/answer pair to a session.
    ///
    /// Both turns land under one lock, so readers never observe a question
    /// without its answer.
    #[inline]
    pub async fn append_exchange(&self, session_id: &str, question: &str, answer: &str) {
        let mut sessions = self.sessions.write().await;
        let transcript = sessions.entry(session_id.to_string()).or_default();
        transcript.push_back(Turn {
            role: TurnRole::User,
            text: question.to_string(),
        });
        transcript.push_back(Turn {
            role: TurnRole::Assistant,
            text: answer.to_string(),
        });
        self.trim(transcript);
        debug!("Session {} now holds {} turns", session_id, transcript.len());
    }

    fn trim(&self, transcript: &mut VecDeque<Turn>) {
        if self.max_turns > 0 {
            while transcript.len() > self.max_turns {
                transcript.pop_front();
            }
        }
    }

    /// The most recent `window` turns of a session, oldest first.
    ///
    /// A window of zero or an unknown session yields an empty transcript.
    #[inline]
    pub async fn recent(&self, session_id: &str, window: usize) -> Vec<Turn> {
        if window == 0 {
            return Vec::new();
        }
        let sessions = self.sessions.read().await;
        let Some(transcript) = sessions.get(session_id) else {
            return Vec::new();
        };
        let skip = transcript.len().saturating_sub(window);
        transcript.iter().skip(skip).cloned().collect()
    }

    /// Number of sessions holding at least one turn.
    #[inline]
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Number of turns currently stored for a session.
    #[inline]
    pub async fn turn_count(&self, session_id: &str) -> usize {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map_or(0, VecDeque::len)
    }
}
