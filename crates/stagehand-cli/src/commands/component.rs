use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;

use stagehand_types::id::{BuildId, ComponentId};
use stagehand_types::record::ComponentKind;
use stagehand_types::spec::MountBinding;

use super::{open_orchestrator, print_json};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum KindArg {
    Service,
    Task,
}

impl From<KindArg> for ComponentKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Service => Self::Service,
            KindArg::Task => Self::Task,
        }
    }
}

#[derive(Subcommand)]
pub enum ComponentCommands {
    /// Register a component against the state database
    Create {
        /// Identifier for the component
        #[arg(long, short)]
        id: String,
        /// Kind of component
        #[arg(long, short, value_enum)]
        kind: KindArg,
        /// Directory in which the component is defined
        #[arg(long, short)]
        context: PathBuf,
        /// Path to the component specification
        /// (defaults to component.json inside the context directory)
        #[arg(long, short)]
        spec: Option<PathBuf>,
    },
    /// List all registered components
    List,
    /// Remove a component from the state database
    Remove {
        /// Identifier of the component to remove
        #[arg(long, short)]
        id: String,
    },
    /// Build an image for a component from its current state on disk
    Build {
        /// Identifier of the component to build
        #[arg(long, short)]
        id: String,
    },
    /// List builds, optionally restricted to one component
    Builds {
        /// Identifier of the component whose builds to list
        #[arg(long, short)]
        id: Option<String>,
    },
    /// Run a standalone container for a build
    Execute {
        /// Identifier of the build to execute
        #[arg(long, short)]
        build: String,
        /// JSON array of mount bindings
        /// (e.g. '[{"source": "/tmp/x", "target": "/in", "method": "bind"}]')
        #[arg(long, short)]
        mounts: Option<String>,
        /// JSON object of extra environment variables
        #[arg(long, short)]
        env: Option<String>,
    },
}

/// Execute a `component` subcommand.
pub async fn execute(state_dir: &Path, command: ComponentCommands) -> Result<()> {
    let orchestrator = open_orchestrator(state_dir)?;
    let cancel = CancellationToken::new();

    match command {
        ComponentCommands::Create {
            id,
            kind,
            context,
            spec,
        } => {
            let record = orchestrator
                .register_component(ComponentId::new(id), kind.into(), context, spec)
                .await?;
            print_json(&record)
        }
        ComponentCommands::List => {
            for record in orchestrator.store().list_components()? {
                print_json(&record)?;
            }
            Ok(())
        }
        ComponentCommands::Remove { id } => {
            orchestrator.remove_component(ComponentId::new(&id)).await?;
            println!("{id}");
            Ok(())
        }
        ComponentCommands::Build { id } => {
            orchestrator.negotiate_api_version(&cancel).await?;
            let mut sink = std::io::stdout();
            let build = orchestrator
                .build_component(ComponentId::new(id), &mut sink, &cancel)
                .await?;
            println!("Build succeeded: {}", build.id);
            Ok(())
        }
        ComponentCommands::Builds { id } => {
            let component = id.map(ComponentId::new);
            for record in orchestrator.store().list_builds(component.as_ref())? {
                print_json(&record)?;
            }
            Ok(())
        }
        ComponentCommands::Execute { build, mounts, env } => {
            orchestrator.negotiate_api_version(&cancel).await?;
            let mounts: Vec<MountBinding> = match mounts {
                Some(doc) => {
                    serde_json::from_str(&doc).context("parsing mount configuration")?
                }
                None => Vec::new(),
            };
            let env: BTreeMap<String, String> = match env {
                Some(doc) => {
                    serde_json::from_str(&doc).context("parsing environment configuration")?
                }
                None => BTreeMap::new(),
            };
            let execution = orchestrator
                .execute_build(BuildId::new(build), mounts, env, &cancel)
                .await?;
            println!("{}", execution.id);
            Ok(())
        }
    }
}
