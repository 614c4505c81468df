//! /format command - show and set the response format

use super::CommandResult;
use danya_agent::ResponseFormat;

pub struct FormatCommand;

impl FormatCommand {
    pub fn execute(args: &str, current: ResponseFormat) -> CommandResult {
        if args.is_empty() {
            return CommandResult::Message(format!(
                "Response format: {}\nValid formats: text, json",
                name(current)
            ));
        }

        match crate::config::parse_format(args) {
            Ok(format) => CommandResult::ChangeFormat(format),
            Err(_) => CommandResult::Message(format!(
                "Unknown format: '{}'\nValid formats: text, json",
                args
            )),
        }
    }
}

pub fn name(format: ResponseFormat) -> &'static str {
    match format {
        ResponseFormat::Text => "text",
        ResponseFormat::Json => "json",
    }
}
