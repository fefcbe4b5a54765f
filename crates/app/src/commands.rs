//! Command dispatch.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use gymlog_application::{ApiClient, ApiError, FitnessApi, Session};
use gymlog_domain::{NewUser, ProfileUpdate};
use gymlog_infrastructure::{
    ClientSettings, FileTokenStore, FileUserStore, ReqwestHttpClient, TokioFileSystem,
};
use tracing::info;

use crate::cli::{Cli, Command};

type CliSession = Session<ReqwestHttpClient>;

/// Builds the client stack from settings and runs `cli.command`.
pub async fn run(cli: Cli) -> Result<()> {
    let mut settings =
        ClientSettings::load(cli.config.as_deref()).context("could not load settings")?;
    if let Some(base_url) = cli.base_url {
        settings.base_url = base_url;
    }
    info!(base_url = %settings.base_url, data_dir = %settings.data_dir.display(), "Starting");

    let session = Arc::new(build_session(&settings)?);
    let restored = session.restore().await?;
    if cli.command.needs_session() && restored.is_none() {
        bail!("not signed in, run `gymlog sign-in` first");
    }

    let _registration = session.activate();
    let result = execute(&session, cli.command).await;

    // The client's sign-out runs in the background; finish it before exiting.
    if let Err(e) = &result
        && e
            .downcast_ref::<ApiError>()
            .is_some_and(ApiError::is_session_expired)
    {
        session.sign_out().await?;
    }
    result
}

fn build_session(settings: &ClientSettings) -> Result<CliSession> {
    let transport =
        ReqwestHttpClient::with_user_agent(settings.base_url.clone(), &settings.user_agent)?
            .with_timeout(settings.request_timeout());
    let tokens = Arc::new(FileTokenStore::new(TokioFileSystem, &settings.data_dir));
    let users = Arc::new(FileUserStore::new(TokioFileSystem, &settings.data_dir));

    let client =
        ApiClient::new(transport, tokens).with_refresh_timeout(settings.refresh_timeout());
    let api = FitnessApi::new(Arc::new(client), settings.base_url.clone());
    Ok(Session::new(api, users))
}

async fn execute(session: &CliSession, command: Command) -> Result<()> {
    let api = session.api();

    match command {
        Command::SignIn { email, password } => {
            let user = session.sign_in(&email, &password).await?;
            println!("Signed in as {} <{}>", user.name, user.email);
        }
        Command::SignUp {
            name,
            email,
            password,
        } => {
            api.sign_up(&NewUser {
                name,
                email,
                password,
            })
            .await?;
            println!("Account created, you can sign in now");
        }
        Command::SignOut => {
            session.sign_out().await?;
            println!("Signed out");
        }
        Command::Whoami => {
            if let Some(user) = session.current_user() {
                println!("{} <{}>", user.name, user.email);
                if let Some(avatar) = &user.avatar {
                    println!("avatar: {}", api.avatar_url(avatar)?);
                }
            }
        }
        Command::Groups => {
            for group in api.groups().await? {
                println!("{group}");
            }
        }
        Command::Exercises { group } => {
            for exercise in api.exercises_by_group(&group).await? {
                println!(
                    "{:>5}  {}  ({} x {})",
                    exercise.id, exercise.name, exercise.series, exercise.repetitions
                );
            }
        }
        Command::Exercise { id } => {
            let exercise = api.exercise(id).await?;
            println!("{} [{}]", exercise.name, exercise.group);
            println!("{} series x {} repetitions", exercise.series, exercise.repetitions);
            println!("demo: {}", api.exercise_demo_url(&exercise.demo)?);
            println!("thumb: {}", api.exercise_thumb_url(&exercise.thumb)?);
        }
        Command::Done { id } => {
            api.mark_done(id).await?;
            println!("Exercise {id} logged");
        }
        Command::History => {
            for day in api.history().await? {
                println!("{}", day.title);
                for entry in day.data {
                    println!("  {}  {} ({})", entry.hour, entry.name, entry.group);
                }
            }
        }
        Command::Profile {
            name,
            password,
            old_password,
        } => {
            let update = ProfileUpdate {
                name,
                password,
                old_password,
            };
            if let Some(user) = session.update_profile(&update).await? {
                println!("Profile updated: {}", user.name);
            }
        }
    }
    Ok(())
}
