//! `crew`: command-line front end for the Crew team-messaging client.
//!
//! # Usage
//!
//! ```
//! crew register --id u1 --name Ada --email ada@example.com --phone 555-0100
//! crew users
//! crew --as u1 create-team --name Eng --member u2 --member u3
//! crew --as u1 teams
//! crew --as u2 send --team <team-id> hello everyone
//! crew --as u1 watch --team <team-id>
//! ```

mod settings;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use settings::ClientConfig;
use crew_client::{
  Session, SessionEvent, SessionState,
  identity::{IdentitySource, Principal, identity_channel},
  registry::TeamRegistry,
};
use crew_core::{message::Message, profile::UserProfile, store::RecordStore};
use crew_store_sqlite::SqliteStore;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "crew", version, about = "Team messaging from the terminal")]
struct Args {
  /// Path to a TOML config file (store_path, user).
  #[arg(short, long, value_name = "FILE", default_value = "crew.toml")]
  config: PathBuf,

  /// SQLite store to use instead of the configured one.
  #[arg(long, value_name = "FILE")]
  store: Option<PathBuf>,

  /// Profile id to act as.
  #[arg(long = "as", value_name = "USER", global = true)]
  as_user: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Write a user profile (normally done by sign-up).
  Register {
    #[arg(long)]
    id:    String,
    #[arg(long)]
    name:  String,
    #[arg(long, default_value = "")]
    email: String,
    #[arg(long, default_value = "")]
    phone: String,
  },
  /// List every known user.
  Users,
  /// List the teams you belong to.
  Teams,
  /// Create a team; you are added as a member automatically.
  CreateTeam {
    #[arg(long)]
    name:   String,
    /// A user to add; repeat for more.
    #[arg(long = "member", value_name = "USER")]
    members: Vec<String>,
  },
  /// Send one message to a team.
  Send {
    #[arg(long)]
    team:    Uuid,
    /// Message text; words are joined with spaces.
    #[arg(required = true)]
    content: Vec<String>,
  },
  /// Follow a team's messages live; lines typed on stdin are sent.
  Watch {
    #[arg(long)]
    team: Uuid,
  },
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  // Logs go to stderr so command output stays clean.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();
  let cfg = ClientConfig::load(&args.config)?;

  let store_path = args.store.unwrap_or(cfg.store_path);
  if let Some(parent) = store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("creating {}", parent.display()))?;
  }
  let store = Arc::new(
    SqliteStore::open(&store_path)
      .await
      .with_context(|| format!("failed to open store at {store_path:?}"))?,
  );

  let user = args.as_user.or(cfg.user);

  match args.command {
    Command::Register {
      id,
      name,
      email,
      phone,
    } => {
      store
        .put_profile(UserProfile {
          id,
          name,
          email,
          phone,
        })
        .await
        .context("writing profile")?;
    }
    Command::Users => {
      for p in store.list_profiles().await.context("listing users")? {
        println!("{}\t{}\t{}\t{}", p.id, p.name, p.email, p.phone);
      }
    }
    Command::Teams => {
      let (_source, session) = signed_in(store, user).await?;
      print_teams(session.state());
    }
    Command::CreateTeam { name, members } => {
      let (_source, mut session) = signed_in(store, user).await?;
      let team = session.create_team(&name, &members).await?;
      println!("{}", team.team_id);
    }
    Command::Send { team, content } => {
      let (_source, mut session) = signed_in(store, user).await?;
      let mut draft = content.join(" ");
      if session.send_to(team, &mut draft).await?.is_none() {
        bail!("message is empty");
      }
      session.shutdown();
    }
    Command::Watch { team } => watch(store, user, team).await?,
  }

  Ok(())
}

// ─── Commands ─────────────────────────────────────────────────────────────────

/// Build a session for `user` and wait until it has signed in.
///
/// The returned source must outlive the session: dropping it closes the
/// identity feed.
async fn signed_in(
  store: Arc<SqliteStore>,
  user: Option<String>,
) -> Result<(IdentitySource, Session<SqliteStore>)> {
  let user = user.ok_or_else(|| anyhow!("no user: pass --as or set CREW_USER"))?;
  let (source, feed) = identity_channel(Some(Principal::new(user)));
  let mut session = Session::new(store, feed);

  match session.next_event().await {
    Some(SessionEvent::SignedIn(_)) => Ok((source, session)),
    Some(SessionEvent::ProfileMissing(id)) => {
      bail!("no profile for {id}; run `crew register` first")
    }
    Some(SessionEvent::SignInFailed(e)) => Err(e).context("signing in"),
    other => bail!("unexpected session event: {other:?}"),
  }
}

async fn watch(store: Arc<SqliteStore>, user: Option<String>, team: Uuid) -> Result<()> {
  let (_source, mut session) = signed_in(store, user).await?;
  session.select_team(team)?;

  let mut lines = BufReader::new(tokio::io::stdin()).lines();
  let mut stdin_open = true;
  let mut shown = 0;

  loop {
    tokio::select! {
      _ = tokio::signal::ctrl_c() => break,
      event = session.next_event() => match event {
        Some(SessionEvent::MessagesUpdated { .. }) => {
          let state = session.state();
          // Snapshots are complete; print only what is new.
          for m in state.messages.iter().skip(shown) {
            print_message(m, state);
          }
          shown = state.messages.len();
        }
        Some(_) => {}
        None => break,
      },
      line = lines.next_line(), if stdin_open => match line.context("reading stdin")? {
        Some(mut draft) => {
          if let Err(e) = session.send(&mut draft).await {
            tracing::warn!(error = %e, "message not sent");
          }
        }
        None => stdin_open = false,
      },
    }
  }

  session.shutdown();
  Ok(())
}

// ─── Output ───────────────────────────────────────────────────────────────────

fn print_teams(state: &SessionState) {
  if state.teams.is_empty() {
    println!("You are not a member of any teams yet.");
    return;
  }
  for team in &state.teams {
    let members =
      TeamRegistry::<SqliteStore>::resolve_member_names(team, &state.directory);
    let creator = TeamRegistry::<SqliteStore>::creator_name(team, &state.directory);
    println!("{}\t{}", team.team_id, team.name);
    println!("  members:    {}", members.join(", "));
    println!("  created by: {creator}");
  }
}

fn print_message(message: &Message, state: &SessionState) {
  let mine = state
    .profile
    .as_ref()
    .is_some_and(|p| message.is_from(&p.id));
  let marker = if mine { '>' } else { '<' };
  println!(
    "{marker} [{}] {}: {}",
    message.sent_at.format("%H:%M:%S"),
    state.directory.display_name(&message.sender_id),
    message.content
  );
}
