use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use tracing::debug;

use coopvote_common::logging::init_logging;
use coopvote_common::{Configuration, MemberId, SystemClock, VotingConfig};
use coopvote_governance::lifecycle;
use coopvote_governance::{
    GovernanceError, GovernanceResult, Resolution, ResolutionDraft, VoteRequest, VotingService,
};
use coopvote_identity::{AccessGate, AccessRequest, CallerContext, Member, MemberDirectory, MemberRegistry, Role};
use coopvote_storage::{FileStorage, Storage};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory, overrides the configuration
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(flatten)]
    identity: IdentityArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Caller identity as forwarded by the identity provider
#[derive(Args)]
struct IdentityArgs {
    /// Shared access token
    #[arg(long, global = true)]
    token: Option<String>,

    /// Caller member id
    #[arg(long, global = true)]
    member: Option<String>,

    /// Caller display name, "<given> <surname>"
    #[arg(long, global = true)]
    name: Option<String>,

    /// Caller cooperative id
    #[arg(long, global = true)]
    scope: Option<String>,

    /// Caller is an administrator of the cooperative
    #[arg(long, global = true)]
    admin: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List resolutions of the caller's cooperative
    List,
    /// Create a resolution
    Create {
        #[command(flatten)]
        draft: DraftArgs,
    },
    /// Edit an open resolution
    Edit {
        /// Resolution ID
        id: String,
        #[command(flatten)]
        draft: DraftArgs,
    },
    /// Delete a resolution
    Delete {
        /// Resolution ID
        id: String,
    },
    /// Cast or change a ballot
    Vote {
        /// Resolution ID
        id: String,
        /// Yes, No or Abstain
        #[arg(long)]
        option: String,
        /// Member to assign a proxy ballot to; omit to revoke
        #[arg(long)]
        delegate_to: Option<String>,
    },
    /// Per-member ballot detail
    Detail {
        /// Resolution ID
        id: String,
    },
    /// Current counts
    Tally {
        /// Resolution ID
        id: String,
    },
    /// Show one resolution with its status
    Show {
        /// Resolution ID
        id: String,
    },
    /// Manage the member directory
    Members {
        #[command(subcommand)]
        command: MemberCommands,
    },
}

#[derive(Args)]
struct DraftArgs {
    /// Title
    #[arg(long)]
    title: Option<String>,
    /// Details
    #[arg(long)]
    details: Option<String>,
    /// Voting window in minutes
    #[arg(long)]
    duration: Option<i64>,
    /// Proposing member id
    #[arg(long)]
    proposer: Option<String>,
}

impl From<DraftArgs> for ResolutionDraft {
    fn from(args: DraftArgs) -> Self {
        ResolutionDraft {
            title: args.title,
            details: args.details,
            proposer: args.proposer,
            duration_minutes: args.duration,
        }
    }
}

#[derive(Subcommand)]
enum MemberCommands {
    /// Add a member to the caller's cooperative
    Add {
        /// Member id
        member_id: String,
        /// Display name, "<given> <surname>"
        display_name: String,
        /// Register as a cooperative administrator
        #[arg(long)]
        as_admin: bool,
    },
    /// List the caller's cooperative
    List,
}

struct App {
    service: VotingService,
    registry: Arc<MemberRegistry>,
    gate: AccessGate,
}

impl App {
    async fn open(config: &VotingConfig) -> Result<Self> {
        let storage: Arc<dyn Storage> = Arc::new(
            FileStorage::new(config.data_dir.clone())
                .with_context(|| format!("opening data directory {}", config.data_dir.display()))?,
        );
        let registry = Arc::new(MemberRegistry::new(storage.clone()));
        let service = VotingService::new(storage, registry.clone(), Arc::new(SystemClock), config);
        let gate = AccessGate::new(config.access_token.clone(), registry.clone());

        Ok(Self {
            service,
            registry,
            gate,
        })
    }

    async fn authenticate(&self, identity: IdentityArgs) -> GovernanceResult<CallerContext> {
        let request = AccessRequest {
            token: identity.token,
            member_id: identity.member,
            display_name: identity.name,
            scope_id: identity.scope,
            role: if identity.admin { Role::CooperativeAdmin } else { Role::Member },
        };
        Ok(self.gate.authenticate(request).await?)
    }

    async fn run(&self, caller: &CallerContext, command: Commands) -> GovernanceResult<Value> {
        let scope = caller.scope_id.as_str();

        let body = match command {
            Commands::List => {
                let listing = self.service.list_resolutions(caller, scope).await?;
                let active: Vec<Value> = listing.active.iter().map(|r| self.scheduled(r)).collect();
                json!({ "active": active, "past": listing.past })
            }
            Commands::Create { draft } => {
                let id = self.service.create_resolution(caller, scope, draft.into()).await?;
                json!({ "id": id })
            }
            Commands::Edit { id, draft } => {
                let resolution = self.service.edit_resolution(caller, &id, scope, draft.into()).await?;
                json!({ "resolution": resolution })
            }
            Commands::Delete { id } => {
                self.service.delete_resolution(caller, &id, scope).await?;
                json!({ "message": format!("resolution {} deleted", id) })
            }
            Commands::Vote { id, option, delegate_to } => {
                let request = VoteRequest { option, delegate_to };
                let counts = self.service.cast_vote(caller, &id, request).await?;
                json!({ "counts": counts })
            }
            Commands::Detail { id } => {
                let detail = self.service.ballot_detail(caller, &id).await?;
                json!({ "detail": detail })
            }
            Commands::Tally { id } => {
                let counts = self.service.tally(caller, &id).await?;
                json!({ "counts": counts })
            }
            Commands::Show { id } => {
                let resolution = self.service.get_resolution(caller, &id).await?;
                json!({
                    "status": self.service.status(&resolution),
                    "closesAt": lifecycle::closes_at(&resolution),
                    "remainingMinutes": self.service.remaining(&resolution).num_minutes(),
                    "resolution": resolution,
                })
            }
            Commands::Members { command } => self.members(caller, command).await?,
        };

        Ok(body)
    }

    /// Resolution with its closing time and minutes left to vote
    fn scheduled(&self, resolution: &Resolution) -> Value {
        json!({
            "closesAt": lifecycle::closes_at(resolution),
            "remainingMinutes": self.service.remaining(resolution).num_minutes(),
            "resolution": resolution,
        })
    }

    async fn members(&self, caller: &CallerContext, command: MemberCommands) -> GovernanceResult<Value> {
        match command {
            MemberCommands::Add {
                member_id,
                display_name,
                as_admin,
            } => {
                if !caller.is_admin() {
                    return Err(GovernanceError::permission_denied("only administrators can add members"));
                }
                let role = if as_admin { Role::CooperativeAdmin } else { Role::Member };
                let member = Member::from_display_name(
                    MemberId::parse(member_id)?,
                    caller.scope_id.clone(),
                    &display_name,
                    role,
                );
                self.registry.register(&member).await?;
                Ok(json!({ "member": member }))
            }
            MemberCommands::List => {
                let members = self.registry.eligible_members(&caller.scope_id).await?;
                Ok(json!({ "members": members }))
            }
        }
    }
}

fn load_config(path: Option<&PathBuf>, data_dir: Option<PathBuf>) -> Result<VotingConfig> {
    let mut config = match path {
        Some(path) => VotingConfig::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => VotingConfig::default(),
    };
    config.apply_env()?;
    if let Some(data_dir) = data_dir {
        config.data_dir = data_dir;
    }
    Ok(config)
}

fn respond(result: GovernanceResult<Value>) -> (bool, Value) {
    match result {
        Ok(mut body) => {
            if let Value::Object(fields) = &mut body {
                fields.insert("success".to_string(), Value::Bool(true));
            }
            (true, body)
        }
        Err(e) => (false, json!({ "success": false, "error": e.report() })),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_ref(), cli.data_dir)?;
    config.ensure_directories()?;
    init_logging(config.log_dir.as_deref(), "coopvote", &config.log_level)?;
    debug!(data_dir = %config.data_dir.display(), "configuration loaded");

    let app = App::open(&config).await?;
    let result = match app.authenticate(cli.identity).await {
        Ok(caller) => app.run(&caller, cli.command).await,
        Err(e) => Err(e),
    };

    let (success, body) = respond(result);
    println!("{}", serde_json::to_string_pretty(&body)?);
    if !success {
        std::process::exit(1);
    }

    Ok(())
}
