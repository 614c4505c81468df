//! Slash commands for interactive mode

mod format;
mod history;
mod stats;

pub use format::{FormatCommand, name as format_name};
pub use history::HistoryCommand;
pub use stats::StatsCommand;

use danya_agent::{ConversationTurn, OrchestrationMode, ResponseFormat, Roster, UsageStats};

/// Result of executing a slash command
#[derive(Debug, PartialEq)]
pub enum CommandResult {
    /// Clear the chat
    Clear,
    /// Change the response format
    ChangeFormat(ResponseFormat),
    /// Show a message to the user (not sent to the agent)
    Message(String),
    /// Exit the application
    Exit,
    /// Unknown command
    Unknown(String),
}

/// Session snapshot the commands read from
pub struct CommandContext<'a> {
    pub mode: OrchestrationMode,
    pub format: ResponseFormat,
    pub usage: UsageStats,
    pub history: &'a [ConversationTurn],
    pub roster: &'a Roster,
}

/// Parse and execute a slash command
pub fn execute_command(input: &str, ctx: &CommandContext<'_>) -> Option<CommandResult> {
    let input = input.trim();

    let rest = input.strip_prefix('/')?;
    let parts: Vec<&str> = rest.splitn(2, ' ').collect();
    let command = parts[0].to_lowercase();
    let args = parts.get(1).map(|s| s.trim()).unwrap_or("");

    Some(match command.as_str() {
        "help" | "h" | "?" => CommandResult::Message(help_message()),

        "clear" | "c" => CommandResult::Clear,

        "quit" | "exit" | "q" => CommandResult::Exit,

        "stats" | "s" => StatsCommand::execute(ctx),

        "history" => HistoryCommand::execute(ctx.history),

        "format" | "f" => FormatCommand::execute(args, ctx.format),

        _ => CommandResult::Unknown(command),
    })
}

fn help_message() -> String {
    r#"Available commands:
  /help, /h, /?        Show this help message
  /stats, /s           Show token usage, compressions and agents
  /history             Show the context sent to the model
  /format, /f [fmt]    Show or set the response format (text/json)
  /clear, /c           Clear the chat, history and usage
  /quit, /exit, /q     Exit danya

Examples:
  /format json         Ask agents for JSON and render it as an outline
  /clear               Start a fresh chat"#
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use danya_agent::AgentDescriptor;

    fn roster() -> Roster {
        Roster::new(vec![AgentDescriptor::new("GigaDanya", "a1", "yandexgpt-lite")]).unwrap()
    }

    fn run(input: &str) -> Option<CommandResult> {
        let roster = roster();
        let ctx = CommandContext {
            mode: OrchestrationMode::default(),
            format: ResponseFormat::Text,
            usage: UsageStats::default(),
            history: &[],
            roster: &roster,
        };
        execute_command(input, &ctx)
    }

    #[test]
    fn test_plain_text_is_not_a_command() {
        assert_eq!(run("hello"), None);
    }

    #[test]
    fn test_basic_commands() {
        assert_eq!(run("/clear"), Some(CommandResult::Clear));
        assert_eq!(run("  /Q  "), Some(CommandResult::Exit));
        assert!(matches!(run("/help"), Some(CommandResult::Message(_))));
        assert_eq!(
            run("/teleport now"),
            Some(CommandResult::Unknown("teleport".to_string()))
        );
    }

    #[test]
    fn test_format_command() {
        assert_eq!(
            run("/format json"),
            Some(CommandResult::ChangeFormat(ResponseFormat::Json))
        );
        match run("/format") {
            Some(CommandResult::Message(msg)) => assert!(msg.contains("text")),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
