//! /history command - show the conversation context

use super::CommandResult;
use crate::utils::truncate_chars;
use danya_agent::ConversationTurn;

const PREVIEW_CHARS: usize = 120;

pub struct HistoryCommand;

impl HistoryCommand {
    pub fn execute(history: &[ConversationTurn]) -> CommandResult {
        if history.is_empty() {
            return CommandResult::Message("History is empty".to_string());
        }

        let mut output = format!("History: {} turns\n", history.len());
        output.push_str(&"-".repeat(40));
        for (i, turn) in history.iter().enumerate() {
            let text = turn.text().replace('\n', " ");
            output.push_str(&format!(
                "\n{:>3}. {:<9} {}",
                i + 1,
                turn.role().as_str(),
                truncate_chars(&text, PREVIEW_CHARS)
            ));
        }
        CommandResult::Message(output)
    }
}
