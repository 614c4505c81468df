//! /stats command - show token usage and the agent roster

use super::{CommandContext, CommandResult};
use crate::utils::format_number;
use danya_agent::{ContextMode, Endpoint, OrchestrationMode};

pub struct StatsCommand;

impl StatsCommand {
    pub fn execute(ctx: &CommandContext<'_>) -> CommandResult {
        let usage = &ctx.usage;

        let mut output = String::from("Session Info\n");
        output.push_str(&"-".repeat(40));
        output.push('\n');

        output.push_str(&format!("Mode:       {}\n", mode_label(ctx.mode)));
        output.push_str(&format!("Format:     {}\n", super::format::name(ctx.format)));
        output.push_str(&format!("History:    {} turns\n", ctx.history.len()));
        output.push('\n');

        output.push_str("Token Usage:\n");
        output.push_str(&format!(
            "  Input:       {:>8}\n",
            format_number(usage.total_input_tokens)
        ));
        output.push_str(&format!(
            "  Output:      {:>8}\n",
            format_number(usage.total_output_tokens)
        ));
        output.push_str(&format!(
            "  Total:       {:>8}\n",
            format_number(usage.total_tokens())
        ));
        if usage.compression_count > 0 {
            output.push_str(&format!(
                "  Compressed:  {:>8} times, {} tokens saved\n",
                usage.compression_count, usage.saved_tokens
            ));
        }
        output.push('\n');

        output.push_str("Agents:\n");
        for agent in ctx.roster.iter() {
            output.push_str(&format!(
                "  {} ({}, {})\n",
                agent.display_name, agent.model_type, agent.remote_id
            ));
        }

        CommandResult::Message(output)
    }
}

fn mode_label(mode: OrchestrationMode) -> &'static str {
    match mode {
        OrchestrationMode::FanOut => "fan-out",
        OrchestrationMode::Single {
            endpoint: Endpoint::Agent,
            context: ContextMode::Full,
        } => "single (agent, full history)",
        OrchestrationMode::Single {
            endpoint: Endpoint::Agent,
            context: ContextMode::Latest,
        } => "single (agent, latest message)",
        OrchestrationMode::Single {
            endpoint: Endpoint::Completion,
            context: ContextMode::Full,
        } => "single (completion, full history)",
        OrchestrationMode::Single {
            endpoint: Endpoint::Completion,
            context: ContextMode::Latest,
        } => "single (completion, latest message)",
    }
}
