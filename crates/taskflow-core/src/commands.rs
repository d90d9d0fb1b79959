use std::sync::Arc;

use anyhow::{Context, anyhow, bail};
use taskflow_shared::SignupRequest;
use tracing::{debug, info, instrument, warn};

use crate::api::{RestClient, TodoApi};
use crate::cli::{AddArgs, Command, EditArgs, ListArgs, LoginArgs, SignupArgs};
use crate::config::Config;
use crate::controller::{DashboardController, DashboardPhase};
use crate::error::SyncError;
use crate::render::Renderer;
use crate::session::{SessionContext, SessionGate};
use crate::task::TaskId;

pub const SESSION_EXPIRED: &str = "session expired; run `taskflow login`";

/// Everything a command needs after startup.
pub struct App {
    pub cfg: Config,
    pub session: SessionContext,
    pub client: Arc<RestClient>,
    pub renderer: Renderer,
}

#[instrument(skip(app, command))]
pub async fn dispatch(app: &App, command: Command) -> anyhow::Result<()> {
    debug!(?command, "dispatching command");

    if command.needs_dashboard() {
        let api: Arc<dyn TodoApi> = app.client.clone();
        return run_dashboard_command(
            api,
            app.session.clone(),
            app.cfg.serialize_per_id,
            &app.renderer,
            command,
        )
        .await;
    }

    match command {
        Command::Login(args) => cmd_login(app, args).await,
        Command::Signup(args) => cmd_signup(app, args).await,
        Command::Logout => cmd_logout(app),
        Command::Whoami => cmd_whoami(app).await,
        other => Err(anyhow!("{other:?} needs a mounted dashboard")),
    }
}

/// Mounts a dashboard and runs one task command against it.
#[instrument(skip(api, session, renderer, command))]
pub async fn run_dashboard_command(
    api: Arc<dyn TodoApi>,
    session: SessionContext,
    serialize_per_id: bool,
    renderer: &Renderer,
    command: Command,
) -> anyhow::Result<()> {
    let dashboard =
        DashboardController::new(api, session).serialize_per_id(serialize_per_id);
    mount(&dashboard).await?;

    match command {
        Command::List(args) => cmd_list(&dashboard, renderer, args),
        Command::Stats => renderer.print_stats(dashboard.stats()),
        Command::Add(args) => cmd_add(&dashboard, renderer, args).await,
        Command::Toggle { id } => cmd_toggle(&dashboard, renderer, id).await,
        Command::Edit(args) => cmd_edit(&dashboard, renderer, args).await,
        Command::Rm { id } => cmd_rm(&dashboard, renderer, id).await,
        other => Err(anyhow!("{other:?} does not run on the dashboard")),
    }
}

async fn mount(dashboard: &DashboardController) -> anyhow::Result<()> {
    match dashboard.mount().await {
        DashboardPhase::Ready => {}
        DashboardPhase::Redirecting => bail!(SESSION_EXPIRED),
        phase => bail!("dashboard stopped in {phase:?}"),
    }

    if let Some(message) = dashboard.last_error() {
        bail!(message);
    }
    Ok(())
}

fn surface(dashboard: &DashboardController, err: SyncError) -> anyhow::Error {
    if dashboard.phase() == DashboardPhase::Redirecting {
        return anyhow!(SESSION_EXPIRED);
    }
    match dashboard.last_error() {
        Some(message) => anyhow::Error::new(err).context(message),
        None => anyhow::Error::new(err),
    }
}

fn cmd_list(
    dashboard: &DashboardController,
    renderer: &Renderer,
    args: ListArgs,
) -> anyhow::Result<()> {
    dashboard.set_status_filter(args.status);
    if let Some(query) = args.search.as_deref() {
        dashboard.set_search(query);
    }

    let visible = dashboard.visible_tasks();
    debug!(visible = visible.len(), filters = ?dashboard.filters(), "listing tasks");
    renderer.print_task_table(&visible)
}

async fn cmd_add(
    dashboard: &DashboardController,
    renderer: &Renderer,
    args: AddArgs,
) -> anyhow::Result<()> {
    dashboard.open_add();
    let created = dashboard
        .submit_add(&args.title, args.description.as_deref())
        .await
        .map_err(|err| surface(dashboard, err))?;
    renderer.print_task("Created", &created)
}

async fn cmd_toggle(
    dashboard: &DashboardController,
    renderer: &Renderer,
    id: TaskId,
) -> anyhow::Result<()> {
    dashboard.toggle(id).await.map_err(|err| surface(dashboard, err))?;

    let task = dashboard
        .repository()
        .get(id)
        .ok_or_else(|| anyhow!("task {id} vanished after toggle"))?;
    let verb = if task.completed { "Completed" } else { "Reopened" };
    renderer.print_task(verb, &task)
}

async fn cmd_edit(
    dashboard: &DashboardController,
    renderer: &Renderer,
    args: EditArgs,
) -> anyhow::Result<()> {
    if args.title.is_none() && args.description.is_none() {
        bail!("nothing to change; pass --title and/or --description");
    }

    dashboard.open_edit(args.id).map_err(|err| surface(dashboard, err))?;
    let current = dashboard
        .repository()
        .get(args.id)
        .ok_or(SyncError::NotFound(args.id))?;

    let title = args.title.unwrap_or(current.title);
    let description = args.description.or(current.description);
    let saved = dashboard
        .submit_edit(&title, description.as_deref())
        .await
        .map_err(|err| surface(dashboard, err))?;
    renderer.print_task("Updated", &saved)
}

async fn cmd_rm(
    dashboard: &DashboardController,
    renderer: &Renderer,
    id: TaskId,
) -> anyhow::Result<()> {
    let task = dashboard.repository().get(id).ok_or(SyncError::NotFound(id))?;
    dashboard.delete(id).await.map_err(|err| surface(dashboard, err))?;
    renderer.print_task("Deleted", &task)
}

#[instrument(skip(app, args))]
async fn cmd_login(app: &App, args: LoginArgs) -> anyhow::Result<()> {
    let token = match (args.token, args.email, args.password) {
        (Some(token), _, _) => token,
        (None, Some(email), Some(password)) => {
            let granted = app
                .client
                .login(&email, &password)
                .await
                .with_context(|| format!("login failed for {email}"))?;
            debug!(token_type = %granted.token_type, "received access token");
            granted.access_token
        }
        _ => bail!("pass --token, or --email with --password"),
    };

    app.session.sign_in(&token).context("failed to store access token")?;
    info!("access token stored");

    let api: Arc<dyn TodoApi> = app.client.clone();
    match SessionGate::new(app.session.clone(), api).verify().await {
        Ok(profile) => {
            print!("Signed in as ");
            app.renderer.print_session(&profile)
        }
        Err(err) => {
            warn!(error = %err, "stored token was not accepted");
            bail!("token stored but rejected by {}: {err}", app.client.base_url());
        }
    }
}

#[instrument(skip(app, args))]
async fn cmd_signup(app: &App, args: SignupArgs) -> anyhow::Result<()> {
    let request = SignupRequest {
        email: args.email.trim().to_string(),
        password: args.password,
        name: args
            .name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty()),
    };
    if request.email.is_empty() || request.password.is_empty() {
        bail!("email and password are required");
    }

    let profile = app
        .client
        .signup(&request)
        .await
        .with_context(|| format!("signup failed for {}", request.email))?;
    println!(
        "Registered {}; run `taskflow login --email {} --password ...` to sign in",
        profile.email, profile.email
    );
    Ok(())
}

fn cmd_logout(app: &App) -> anyhow::Result<()> {
    let api: Arc<dyn TodoApi> = app.client.clone();
    DashboardController::new(api, app.session.clone()).logout();
    println!("Signed out");
    Ok(())
}

async fn cmd_whoami(app: &App) -> anyhow::Result<()> {
    let api: Arc<dyn TodoApi> = app.client.clone();
    let gate = SessionGate::new(app.session.clone(), api);
    match gate.verify().await {
        Ok(profile) => app.renderer.print_session(&profile),
        Err(SyncError::Unauthenticated) => {
            app.session.invalidate();
            bail!(SESSION_EXPIRED)
        }
        Err(err) => Err(err.into()),
    }
}
