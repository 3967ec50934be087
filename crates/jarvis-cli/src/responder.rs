//! Demo rule-based [`Responder`] used as the fallback command processor.
//!
//! Rules are checked in order against the lowercased command; the first
//! match wins and anything unmatched gets a "didn't catch that" reply.

use async_trait::async_trait;
use chrono::Local;
use jarvis_runtime::Responder;
use rand::seq::SliceRandom;

const JOKES: &[&str] = &[
    "Why did the developer go broke? Because he used up all his cache.",
    "Why don't skeletons fight each other? They don't have the guts.",
    "What do you call fake spaghetti? An impasta.",
];

pub const HELP_TEXT: &str = "Here's what I can do for you:
  • \"What time is it?\" – current time
  • \"What day is it?\" – today's date
  • \"Tell me a joke\" – fun joke
  • \"Hi / Bye / How are you?\" – basic chat
Anything else, teach me with /teach <input> => <response>.";

pub const UNKNOWN_REPLY: &str = "Hmm, I didn't catch that. Try saying \"help\" to see what I can do.";

#[derive(Debug, Default, Clone, Copy)]
pub struct RuleResponder;

fn includes_any(text: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| text.contains(n))
}

fn has_word(text: &str, words: &[&str]) -> bool {
    text.split(|c: char| !c.is_alphanumeric())
        .any(|w| words.contains(&w))
}

impl RuleResponder {
    /// Synchronous rule evaluation.
    pub fn respond(&self, command: &str) -> String {
        let text = command.trim().to_lowercase();

        if includes_any(&text, &["time", "clock"]) {
            return format!(
                "It's currently {}. Need anything else?",
                Local::now().format("%I:%M %p")
            );
        }
        if includes_any(&text, &["date", "today"]) || has_word(&text, &["day"]) {
            return format!(
                "Today is {}. Hope you're having a good one!",
                Local::now().format("%A, %B %-d, %Y")
            );
        }
        if text.contains("weather") {
            return "I'm still learning to read the weather.".to_string();
        }
        if text.contains("joke") {
            return JOKES
                .choose(&mut rand::thread_rng())
                .copied()
                .unwrap_or(UNKNOWN_REPLY)
                .to_string();
        }
        if text.contains("how are you") {
            return "I'm doing great, thanks for asking! How about you?".to_string();
        }
        if has_word(&text, &["hi", "hello", "hey"]) {
            return "Hey there! I'm your assistant. What can I help you with?".to_string();
        }
        if has_word(&text, &["bye", "goodbye"]) {
            return "Goodbye! I'm always here if you need anything.".to_string();
        }
        if includes_any(&text, &["help", "commands"]) {
            return HELP_TEXT.to_string();
        }
        UNKNOWN_REPLY.to_string()
    }
}

#[async_trait]
impl Responder for RuleResponder {
    async fn process_command(&self, command: &str) -> String {
        self.respond(command)
    }
}
