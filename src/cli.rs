use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Report, Result};
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

use crate::api::{ApiClient, ApiError, ReqwestTransport};
use crate::app::{App, BrowseExit};
use crate::auth::{check_session, AuthHolder, AuthService, Registration, SessionStatus};
use crate::cache::{KeyValueStorage, NoopStorage, SqliteStorage};
use crate::config::Config;
use crate::domain::kinds;
use crate::domain::permissions::has_permission;
use crate::domain::{Record, ResourceKind};
use crate::notice::{Notice, NoticeLevel, Notifier};
use crate::sync::Registry;

#[derive(Parser, Debug)]
#[command(name = "sitedash")]
#[command(about = "Terminal client for a construction project-management backend")]
#[command(version)]
pub struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/sitedash/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Override api.base_url from the config file
  #[arg(long, global = true)]
  api_url: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Log in and store the session
  Login {
    email: String,
    /// Falls back to SITEDASH_PASSWORD
    #[arg(long)]
    password: Option<String>,
  },
  /// Create an account
  Register {
    name: String,
    email: String,
    #[arg(long)]
    password: Option<String>,
  },
  /// Forget the stored session
  Logout,
  /// Show the logged-in user
  Whoami,
  ChangePassword {
    #[arg(long)]
    current: String,
    #[arg(long)]
    new: String,
  },
  /// Ask for a password reset email
  ForgotPassword { email: String },
  /// Set a new password with the token from the reset email
  ResetPassword {
    token: String,
    #[arg(long)]
    password: Option<String>,
  },
  /// Fetch a collection and print it
  List { resource: String },
  /// Fetch one record
  Get { resource: String, id: String },
  Create {
    resource: String,
    /// JSON object
    #[arg(long)]
    data: String,
  },
  Update {
    resource: String,
    id: String,
    /// JSON object
    #[arg(long)]
    data: String,
  },
  Delete { resource: String, id: String },
  /// Print the locally stored collection (or one record) without touching the network
  Cached { resource: String, id: Option<String> },
  /// Check a permission for the logged-in user
  Can { permission: String },
  /// Interactive table over a resource
  Browse {
    #[arg(default_value = "projects")]
    resource: String,
  },
}

impl Command {
  fn is_protected(&self) -> bool {
    matches!(
      self,
      Command::ChangePassword { .. }
        | Command::List { .. }
        | Command::Get { .. }
        | Command::Create { .. }
        | Command::Update { .. }
        | Command::Delete { .. }
        | Command::Cached { .. }
        | Command::Can { .. }
        | Command::Browse { .. }
    )
  }
}

/// Everything a command needs, wired once per process.
struct Context {
  auth: AuthHolder,
  service: AuthService,
  registry: Arc<Registry>,
  base_url: String,
}

pub async fn run(args: Args) -> Result<()> {
  let mut config = Config::load(args.config.as_deref())?;
  if let Some(url) = args.api_url {
    config.api.base_url = url;
  }

  let storage: Arc<dyn KeyValueStorage> = if config.cache.enabled {
    Arc::new(SqliteStorage::open(config.cache.path.as_deref())?)
  } else {
    Arc::new(NoopStorage)
  };

  let auth = AuthHolder::load(storage.clone());
  let transport = Arc::new(ReqwestTransport::new(&config.api)?);
  let client = ApiClient::new(&config.api.base_url, transport, auth.clone())?;
  let (notifier, notices) = Notifier::channel();

  let service = AuthService::new(
    client.clone(),
    auth.clone(),
    notifier.clone(),
    config.session.ttl(),
  );
  let registry = Arc::new(Registry::new(
    client.clone(),
    storage,
    notifier,
    config.cache.stale_time(),
  ));

  let ctx = Context {
    base_url: client.base_url().to_string(),
    auth,
    service,
    registry,
  };

  // Expired sessions are cleared before anything else runs.
  let status = check_session(&ctx.auth);
  info!(?status, "session checked");

  require_session(&status, &args.command)?;

  dispatch(&ctx, args.command, notices).await
}

/// Refuse protected commands unless a live session is held.
fn require_session(status: &SessionStatus, command: &Command) -> Result<()> {
  if !command.is_protected() {
    return Ok(());
  }
  match status {
    SessionStatus::Active { .. } => Ok(()),
    SessionStatus::Expired => Err(eyre!("Session expired, please log in")),
    SessionStatus::Anonymous => Err(eyre!("Not logged in. Run `sitedash login <email>`")),
  }
}

async fn dispatch(
  ctx: &Context,
  command: Command,
  mut notices: mpsc::UnboundedReceiver<Notice>,
) -> Result<()> {
  if let Command::Browse { resource } = &command {
    let kind = resolve_kind(resource)?;
    let mut app = App::new(ctx.registry.clone(), kind, ctx.auth.clone(), ctx.base_url.clone())?;
    return match app.run(notices).await? {
      BrowseExit::Quit => Ok(()),
      BrowseExit::SessionExpired => Err(eyre!("Session expired, please log in")),
    };
  }

  let result = execute(ctx, command).await;
  print_notices(&mut notices);
  result
}

async fn execute(ctx: &Context, command: Command) -> Result<()> {
  match command {
    Command::Login { email, password } => {
      let password = password_or_env(password)?;
      let user = ctx.service.login(&email, &password).await?;
      print_json(&user)
    }
    Command::Register {
      name,
      email,
      password,
    } => {
      let password = password_or_env(password)?;
      let user = ctx
        .service
        .register(&Registration {
          name,
          email,
          password,
        })
        .await?;
      match user {
        Some(user) => print_json(&user),
        None => Ok(()),
      }
    }
    Command::Logout => {
      ctx.service.logout();
      Ok(())
    }
    Command::Whoami => match ctx.auth.session() {
      Some(session) => {
        println!(
          "{} ({}), session valid for {} more minutes",
          session.user.display_name(),
          session.user.role.as_ref().map(|r| r.name()).unwrap_or("no role"),
          session.remaining().as_secs() / 60
        );
        Ok(())
      }
      None => Err(eyre!("Not logged in")),
    },
    Command::ChangePassword { current, new } => {
      ctx.service.change_password(&current, &new).await?;
      Ok(())
    }
    Command::ForgotPassword { email } => {
      ctx.service.forgot_password(&email).await?;
      Ok(())
    }
    Command::ResetPassword { token, password } => {
      let password = password_or_env(password)?;
      ctx.service.reset_password(&token, &password).await?;
      Ok(())
    }
    Command::List { resource } => {
      let resource = ctx.registry.records(resolve_kind(&resource)?)?;
      let result = resource.list().await;
      if let (true, Some(error)) = (result.is_error, result.error) {
        return Err(error.into());
      }
      print_records(&resource.store().items())
    }
    Command::Get { resource, id } => {
      let resource = ctx.registry.records(resolve_kind(&resource)?)?;
      let result = resource.get(&id).await;
      if result.is_success() {
        // The fetch went through the store's selected slot
        if let Some(record) = resource.store().selected().filter(|r| r.id == id) {
          return print_json(record.as_ref());
        }
      }
      match (result.data, result.error) {
        (Some(record), _) => print_json(&record),
        (None, Some(error)) if result.is_error => Err(error.into()),
        (None, _) => Err(eyre!("{} {} not found", resource.kind().label(), id)),
      }
    }
    Command::Create { resource, data } => {
      let resource = ctx.registry.records(resolve_kind(&resource)?)?;
      let payload = parse_payload(&data)?;
      let record = resource.create(&payload).await.map_err(mutation_error)?;
      print_json(&record)
    }
    Command::Update { resource, id, data } => {
      let resource = ctx.registry.records(resolve_kind(&resource)?)?;
      let payload = parse_payload(&data)?;
      let record = resource.update(&id, &payload).await.map_err(mutation_error)?;
      print_json(&record)
    }
    Command::Delete { resource, id } => {
      let resource = ctx.registry.records(resolve_kind(&resource)?)?;
      resource.delete(&id).await.map_err(mutation_error)?;
      Ok(())
    }
    Command::Cached { resource, id } => {
      let resource = ctx.registry.records(resolve_kind(&resource)?)?;
      let store = resource.store();
      match id {
        Some(id) => match store.get(&id) {
          Some(record) => print_json(record.as_ref()),
          None => Err(eyre!("{} {} is not in the local store", resource.kind().label(), id)),
        },
        None => {
          if store.is_empty() {
            eprintln!(
              "Nothing stored for {} yet, run `sitedash list {}` first",
              resource.kind(),
              resource.kind()
            );
          }
          print_records(&store.items())
        }
      }
    }
    Command::Can { permission } => {
      println!("{}", has_permission(ctx.auth.user().as_ref(), &permission));
      Ok(())
    }
    Command::Browse { .. } => Err(eyre!("browse needs the notice channel, run it through dispatch")),
  }
}

fn password_or_env(password: Option<String>) -> Result<String> {
  match password {
    Some(password) => Ok(password),
    None => Config::get_password(),
  }
}

fn resolve_kind(input: &str) -> Result<ResourceKind> {
  kinds::resolve(input).ok_or_else(|| {
    let known: Vec<&str> = kinds::KINDS.iter().map(|k| k.name).collect();
    eyre!("Unknown resource '{}'. Known: {}", input, known.join(", "))
  })
}

/// Validation failures get their own wording; everything else passes through.
fn mutation_error(error: ApiError) -> Report {
  if error.is_validation() {
    eyre!("Rejected by server validation: {}", error.user_message())
  } else {
    error.into()
  }
}

fn parse_payload(data: &str) -> Result<Value> {
  let value: Value =
    serde_json::from_str(data).map_err(|e| eyre!("--data is not valid JSON: {}", e))?;
  if !value.is_object() {
    return Err(eyre!("--data must be a JSON object"));
  }
  Ok(value)
}

fn print_records(items: &[Arc<Record>]) -> Result<()> {
  let records: Vec<&Record> = items.iter().map(|r| r.as_ref()).collect();
  print_json(&records)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
  let out = serde_json::to_string_pretty(value)
    .map_err(|e| eyre!("Failed to serialize output: {}", e))?;
  println!("{}", out);
  Ok(())
}

fn print_notices(notices: &mut mpsc::UnboundedReceiver<Notice>) {
  while let Ok(notice) = notices.try_recv() {
    let prefix = match notice.level {
      NoticeLevel::Success => "ok",
      NoticeLevel::Info => "info",
      NoticeLevel::Error => "error",
    };
    eprintln!("[{}] {}", prefix, notice.message);
  }
}
