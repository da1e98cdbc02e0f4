use crate::cli::commands::{Cli, Commands};
use anyhow::{Context, Result, anyhow};
use dashclaw::guard::GuardContext;
use dashclaw::heartbeat::{AgentStatus, HeartbeatReport};
use dashclaw::{ClientConfig, DashClaw};
use serde::Serialize;

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn dispatch(cli: Cli) -> Result<()> {
    let config = ClientConfig::load(cli.config.as_deref()).context("loading configuration")?;
    let client = DashClaw::new(config).context("building DashClaw client")?;

    match cli.command {
        Commands::Guard {
            action_type,
            risk_score,
            goal,
            systems,
            reversible,
            include_signals,
        } => {
            let context = GuardContext {
                risk_score,
                declared_goal: goal,
                systems_touched: (!systems.is_empty()).then_some(systems),
                reversible,
                ..GuardContext::new(action_type)
            };
            let decision = client.guard(&context, include_signals).await?;
            print_json(&decision)
        }

        Commands::Approve {
            action_id,
            decision,
            reasoning,
        } => {
            let response = client
                .approve_action(&action_id, &decision, reasoning.as_deref())
                .await?;
            print_json(&response)
        }

        Commands::Pending { limit, offset } => {
            let pending = client.get_pending_approvals(limit, offset).await?;
            print_json(&pending)
        }

        Commands::Wait { action_id } => {
            let resolved = client.wait_for_approval(&action_id).await?;
            print_json(&resolved)
        }

        Commands::Heartbeat { status, task } => {
            let status = AgentStatus::parse(&status)
                .ok_or_else(|| anyhow!("status must be one of: online, busy, error; got {status:?}"))?;
            let report = HeartbeatReport {
                status,
                current_task_id: task,
                metadata: None,
            };
            let ack = client.heartbeat(&report).await?;
            print_json(&ack)
        }
    }
}
