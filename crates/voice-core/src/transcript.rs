use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Speaker {
    User,
    Agent,
}

/// One line of the running conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub speaker: Speaker,
    pub text: String,
    pub is_final: bool,
}

/// How the finality flag of agent fragments is applied to a newly appended message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AgentFinality {
    /// Use the flag as reported.
    #[default]
    Honor,
    /// Always open a new agent message as non-final, even if the fragment was final.
    ForceNonFinal,
}

impl FromStr for AgentFinality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "honor" => Ok(AgentFinality::Honor),
            "force-non-final" => Ok(AgentFinality::ForceNonFinal),
            other => Err(format!(
                "unknown agent finality '{}', expected 'honor' or 'force-non-final'",
                other
            )),
        }
    }
}

/// Merges incremental transcription fragments into display messages.
///
/// Each direction keeps the text received since its last final fragment. The
/// newest message is rewritten in place while it is non-final and belongs to
/// the same speaker; anything else starts a new message.
#[derive(Debug, Default)]
pub struct TranscriptAggregator {
    messages: Vec<Message>,
    user_pending: String,
    agent_pending: String,
    agent_finality: AgentFinality,
}

impl TranscriptAggregator {
    pub fn new(agent_finality: AgentFinality) -> Self {
        Self {
            agent_finality,
            ..Self::default()
        }
    }

    /// Folds one fragment into the transcript.
    ///
    /// A fragment that is strictly longer than the text accumulated so far and
    /// starts with it is taken as a resend of the whole utterance and replaces
    /// the accumulator. This keeps cumulative sources from doubling text, at
    /// the cost of a genuine delta that repeats the utterance so far ("I" then
    /// "I think") being read as a resend.
    ///
    /// An empty fragment can only update that speaker's open message; it never
    /// starts a new one.
    pub fn apply_fragment(&mut self, speaker: Speaker, text: &str, is_final: bool) -> &[Message] {
        let continues_last = matches!(
            self.messages.last(),
            Some(last) if last.speaker == speaker && !last.is_final
        );
        if text.is_empty() && !continues_last {
            if is_final {
                self.pending_mut(speaker).clear();
            }
            return &self.messages;
        }

        let pending = self.pending_mut(speaker);
        if !pending.is_empty() && text.len() > pending.len() && text.starts_with(pending.as_str()) {
            pending.clear();
        }
        pending.push_str(text);
        let accumulated = pending.clone();
        if is_final {
            pending.clear();
        }

        if continues_last {
            if let Some(last) = self.messages.last_mut() {
                last.text = accumulated;
                last.is_final = is_final;
            }
        } else {
            if let Some(previous) = self.messages.last_mut() {
                if !previous.is_final {
                    // The superseded utterance is closed for good.
                    previous.is_final = true;
                    let superseded = previous.speaker;
                    self.pending_mut(superseded).clear();
                }
            }
            let is_final = match (speaker, self.agent_finality) {
                (Speaker::Agent, AgentFinality::ForceNonFinal) => false,
                _ => is_final,
            };
            self.messages.push(Message {
                speaker,
                text: accumulated,
                is_final,
            });
        }

        &self.messages
    }

    fn pending_mut(&mut self, speaker: Speaker) -> &mut String {
        match speaker {
            Speaker::User => &mut self.user_pending,
            Speaker::Agent => &mut self.agent_pending,
        }
    }

    /// Marks every message final and drops any partial text.
    pub fn finalize_all(&mut self) {
        for message in &mut self.messages {
            message.is_final = true;
        }
        self.user_pending.clear();
        self.agent_pending.clear();
    }

    pub fn reset(&mut self) {
        self.messages.clear();
        self.user_pending.clear();
        self.agent_pending.clear();
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Text accumulated for `speaker` since its last final fragment.
    pub fn pending(&self, speaker: Speaker) -> &str {
        match speaker {
            Speaker::User => &self.user_pending,
            Speaker::Agent => &self.agent_pending,
        }
    }
}
