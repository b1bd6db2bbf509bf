use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Subcommand;
use tokio_util::sync::CancellationToken;

use stagehand_types::id::FlowId;

use super::{open_orchestrator, print_json};

#[derive(Subcommand)]
pub enum FlowCommands {
    /// Register a flow against the state database
    Create {
        /// Identifier for the flow
        #[arg(long, short)]
        id: String,
        /// Path to the flow specification
        #[arg(long, short)]
        spec: PathBuf,
    },
    /// List all registered flows
    List,
    /// Build an image for each distinct component in a flow
    Build {
        /// Identifier of the flow to build
        #[arg(long, short)]
        id: String,
    },
    /// Execute a flow, stage by stage
    Execute {
        /// Identifier of the flow to execute
        #[arg(long, short)]
        id: String,
    },
}

/// Execute a `flow` subcommand.
pub async fn execute(state_dir: &Path, command: FlowCommands) -> Result<()> {
    let orchestrator = open_orchestrator(state_dir)?;
    let cancel = CancellationToken::new();

    match command {
        FlowCommands::Create { id, spec } => {
            let record = orchestrator.register_flow(FlowId::new(id), spec).await?;
            print_json(&record)
        }
        FlowCommands::List => {
            for record in orchestrator.store().list_flows()? {
                print_json(&record)?;
            }
            Ok(())
        }
        FlowCommands::Build { id } => {
            orchestrator.negotiate_api_version(&cancel).await?;
            let mut sink = std::io::stdout();
            let builds = orchestrator
                .build_flow(FlowId::new(id), &mut sink, &cancel)
                .await?;
            println!("Builds:");
            for (component, build) in &builds {
                println!("  - {component}: {}", build.id);
            }
            Ok(())
        }
        FlowCommands::Execute { id } => {
            orchestrator.negotiate_api_version(&cancel).await?;
            let executions = orchestrator
                .execute_flow(FlowId::new(id), &cancel)
                .await?;
            print_json(&executions)
        }
    }
}
