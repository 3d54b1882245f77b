//! `signage` command-line entry point.
//!
//! # Responsibility
//! - Build store settings from flags or environment.
//! - Expose description and clone flows for operators.
//!
//! Environment variables:
//!   SIGNAGE_BASE_URL - REST store base URL (default: http://localhost:3000)
//!   SIGNAGE_API_KEY - bearer token sent with every request
//!   SIGNAGE_TIMEOUT_SECS - per-request timeout (default: 30)
//!   SIGNAGE_LOG_DIR - absolute directory for rolling log files

use clap::{Parser, Subcommand};
use log::error;
use serde_json::{Map, Value};
use signage_core::{
    AbsoluteTimeline, Call, Cloneable, DescriptionRequest, DescriptionService, EntityKind,
    EntityRepository, Event, ExpandOptions, Profile, RelativeTimeline, RepoResult, Serializable,
    StoreConfig, Zone,
};
use std::process::ExitCode;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "signage")]
#[command(about = "Inspect and duplicate signage entities in the REST store")]
#[command(version)]
struct Args {
    /// REST store base URL
    #[arg(long, env = "SIGNAGE_BASE_URL", default_value = "http://localhost:3000")]
    base_url: String,

    /// Bearer token for the store
    #[arg(long, env = "SIGNAGE_API_KEY")]
    api_key: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, env = "SIGNAGE_TIMEOUT_SECS", default_value = "30")]
    timeout_secs: u64,

    /// Absolute directory for log files; logging is off when unset
    #[arg(long, env = "SIGNAGE_LOG_DIR")]
    log_dir: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print core linkage info
    Ping,
    /// Answer a description request, e.g. `describe RetrieveZoneDescription <id>`
    Describe {
        event: String,
        id: Uuid,
        /// Association layers to expand below the entity
        #[arg(long, default_value_t = 1)]
        depth: usize,
        /// Render the last expanded layer as bare ids
        #[arg(long)]
        ids_only: bool,
    },
    /// Deep-copy an entity, e.g. `clone Profile <id>`
    Clone { kind: String, id: Uuid },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Some(log_dir) = args.log_dir.as_deref() {
        if let Err(err) = signage_core::init_logging(signage_core::default_log_level(), log_dir) {
            eprintln!("logging disabled: {err}");
        }
    }

    match run(args).await {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(message) => {
            error!("event=cli_command module=cli status=error error={}", message);
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<String, String> {
    match &args.command {
        Command::Ping => Ok(format!(
            "signage_core ping={} version={}",
            signage_core::ping(),
            signage_core::core_version()
        )),
        Command::Describe {
            event,
            id,
            depth,
            ids_only,
        } => {
            let repo = store_repository(&args)?;
            let request = DescriptionRequest::parse(event).map_err(|err| err.to_string())?;
            let mut payload = Map::new();
            payload.insert(request.id_key(), Value::String(id.to_string()));

            let options = ExpandOptions {
                depth: *depth,
                ids_only: *ids_only,
            };
            let envelopes = DescriptionService::new(repo)
                .with_options(options)
                .handle(event, &Value::Object(payload))
                .await;
            let rendered =
                serde_json::to_string_pretty(&envelopes).map_err(|err| err.to_string())?;
            if envelopes.iter().any(|envelope| !envelope.is_ok()) {
                return Err(rendered);
            }
            Ok(rendered)
        }
        Command::Clone { kind, id } => {
            let repo = store_repository(&args)?;
            let kind = EntityKind::from_label(kind)
                .ok_or_else(|| format!("unknown entity kind `{kind}`"))?;
            let clone = clone_kind(&repo, kind, *id)
                .await?
                .map_err(|err| err.to_string())?;
            serde_json::to_string_pretty(&clone).map_err(|err| err.to_string())
        }
    }
}

fn store_repository(args: &Args) -> Result<EntityRepository, String> {
    let mut config = StoreConfig::new(args.base_url.clone()).with_timeout_secs(args.timeout_secs);
    if let Some(api_key) = args.api_key.clone() {
        config = config.with_api_key(api_key);
    }
    EntityRepository::from_config(&config).map_err(|err| err.to_string())
}

async fn clone_kind(
    repo: &EntityRepository,
    kind: EntityKind,
    id: Uuid,
) -> Result<RepoResult<Value>, String> {
    let outcome = match kind {
        EntityKind::Profile => clone_by_id::<Profile>(repo, id).await,
        EntityKind::Zone => clone_by_id::<Zone>(repo, id).await,
        EntityKind::Call => clone_by_id::<Call>(repo, id).await,
        EntityKind::RelativeTimeline => clone_by_id::<RelativeTimeline>(repo, id).await,
        EntityKind::AbsoluteTimeline => clone_by_id::<AbsoluteTimeline>(repo, id).await,
        EntityKind::Event => clone_by_id::<Event>(repo, id).await,
        EntityKind::Widget => return Err("widgets are shared and cannot be cloned".to_string()),
    };
    Ok(outcome)
}

async fn clone_by_id<E: Cloneable>(repo: &EntityRepository, id: Uuid) -> RepoResult<Value> {
    let mut source: E = repo.read(id).await?;
    let clone = source.clone_entity(repo).await?;
    clone.to_flat()
}
