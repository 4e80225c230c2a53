use anyhow::Result;
use dialoguer::Password;
use serde::Serialize;

use coop_client::api::CoopApi;
use coop_client::auth::AuthCoordinator;
use coop_client::config::{Command, Config, LogFormat};
use coop_client::error::ApiError;
use coop_client::session::Session;

#[tokio::main]
async fn main() -> Result<()> {
    let (config, command) = Config::load()?;
    config.validate()?;

    init_logging(&config);

    tracing::debug!(
        "Backend: {} (refresh {} with {}s timeout)",
        config.api_base,
        config.refresh_path,
        config.refresh_timeout
    );
    tracing::debug!("Credentials file: {}", config.credentials_file.display());

    let coordinator = AuthCoordinator::from_config(&config)?;
    let session = Session::new(coordinator.clone());
    let api = CoopApi::new(coordinator);

    match run(command, &session, &api).await {
        Ok(()) => Ok(()),
        Err(e) if e.is_session_expired() => {
            tracing::error!("❌ {}", e);
            anyhow::bail!("Your session has expired. Sign in again with `coop-client login <email>`.")
        }
        Err(ApiError::AuthorizationFailed(reason)) => {
            anyhow::bail!("Not signed in ({}). Run `coop-client login <email>` first.", reason)
        }
        Err(e) => Err(e.into()),
    }
}

fn init_logging(config: &Config) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_level.to_lowercase()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    match config.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.with_file(true).with_line_number(true).init(),
    }
}

async fn run(command: Command, session: &Session, api: &CoopApi) -> coop_client::error::Result<()> {
    match command {
        Command::Login { email, password } => {
            let password = match password {
                Some(password) => password,
                None => Password::new()
                    .with_prompt("Password")
                    .interact()
                    .map_err(|e| ApiError::Internal(e.into()))?,
            };
            let user = session.login(&email, &password).await?;
            println!("✅ Signed in as {} <{}>", user.full_name(), user.email);
        }
        Command::Logout => {
            session.logout().await?;
            println!("Signed out");
        }
        Command::Me => match session.restore().await? {
            Some(user) => print_json(&user)?,
            None => {
                return Err(ApiError::AuthorizationFailed(
                    "no stored session".to_string(),
                ))
            }
        },
        Command::Users { skip, limit } => print_json(&api.list_users(skip, limit).await?)?,
        Command::User { id } => print_json(&api.get_user(id).await?)?,
        Command::Deposit { id } => print_json(&api.get_deposit(id).await?)?,
        Command::Notifications => print_json(&api.list_notifications().await?)?,
        Command::ReadAll => {
            let marked = api.mark_all_notifications_read().await?;
            println!("Marked {} notification(s) read", marked);
        }
        Command::Policies => {
            let (deposit, loan) =
                tokio::try_join!(api.list_deposit_policies(), api.list_loan_policies())?;
            print_json(&serde_json::json!({ "deposit": deposit, "loan": loan }))?;
        }
        Command::Get { path } => print_json(&api.get_json(&path).await?)?,
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> coop_client::error::Result<()> {
    let rendered =
        serde_json::to_string_pretty(value).map_err(|e| ApiError::Decode(e.to_string()))?;
    println!("{}", rendered);
    Ok(())
}
