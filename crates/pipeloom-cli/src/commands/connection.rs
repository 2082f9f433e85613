//! Connection management commands

use anyhow::{Context, Result};
use clap::Args;
use pipeloom_core::{ConnectionDraft, ConnectionKind, Credential, DbEngine};

use crate::project::{Project, ensure, resolve_connection};

/// Arguments of `connection add`
#[derive(Args)]
pub struct AddArgs {
    /// Display name
    #[arg(long)]
    pub name: String,

    /// Role of the connection: source or target
    #[arg(long = "type", default_value = "source")]
    pub kind: String,

    /// Database engine: mysql, postgresql, sqlserver, oracle, mongodb, sqlite
    #[arg(long, default_value = "mysql")]
    pub engine: String,

    /// Host name or address
    #[arg(long)]
    pub host: String,

    /// Port (engine default when omitted)
    #[arg(long)]
    pub port: Option<String>,

    /// Login user
    #[arg(short, long)]
    pub username: Option<String>,

    /// Login password
    #[arg(short, long, env = "PIPELOOM_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

/// Register a connection
pub async fn add(config_path: &str, args: AddArgs) -> Result<()> {
    let mut project = Project::load(config_path)?;
    let workbench = project.workbench()?;

    let kind: ConnectionKind = args.kind.parse().context("Invalid connection type")?;
    let engine: DbEngine = args.engine.parse().context("Invalid database engine")?;

    if workbench
        .workspace()
        .await
        .registry
        .find_by_name(&args.name)
        .is_some()
    {
        anyhow::bail!("A connection named '{}' already exists", args.name);
    }

    let mut credential = Credential::new(engine, args.host);
    if let Some(port) = args.port {
        credential = credential.with_port(port);
    }
    if let Some(username) = args.username {
        credential = credential.with_username(username);
    }
    if let Some(password) = args.password {
        credential = credential.with_password(password);
    }

    let id = workbench
        .add_connection(ConnectionDraft::new(args.name, kind, credential))
        .await?;
    println!("{}", id);
    project.finish(workbench)
}

/// List connections
pub async fn list(config_path: &str) -> Result<()> {
    let project = Project::load(config_path)?;
    let workbench = project.workbench()?;
    let ws = workbench.workspace().await;

    if ws.registry.is_empty() {
        println!("No connections");
        return Ok(());
    }
    for conn in ws.registry.connections() {
        println!(
            "{}  {:<20} {:<6} {:<10} {}@{}{}",
            conn.id,
            conn.name,
            conn.kind,
            conn.status,
            conn.credential.username_or_empty(),
            conn.credential.host,
            conn.database().map(|d| format!("/{}", d)).unwrap_or_default(),
        );
    }
    Ok(())
}

/// Show connection details
pub async fn show(config_path: &str, reference: &str) -> Result<()> {
    let project = Project::load(config_path)?;
    let workbench = project.workbench()?;
    let ws = workbench.workspace().await;
    let id = resolve_connection(&ws, reference)?;
    let Some(conn) = ws.registry.get_connection_by_id(id) else {
        anyhow::bail!("No connection named '{}'", reference);
    };

    println!("Id:        {}", conn.id);
    println!("Name:      {}", conn.name);
    println!("Type:      {}", conn.kind);
    println!("Engine:    {}", conn.credential.connection_type);
    println!("Host:      {}", conn.credential.host);
    if let Some(port) = conn.credential.effective_port() {
        println!("Port:      {}", port);
    }
    println!("Username:  {}", conn.credential.username_or_empty());
    if let Some(password) = &conn.credential.password {
        println!("Password:  {}", password);
    }
    println!("Status:    {}", conn.status);
    if let Some(database) = conn.database() {
        println!("Database:  {}", database);
    }
    if let Some(at) = conn.last_tested {
        println!("Tested:    {}", at.to_rfc3339());
    }
    if let Some(message) = &conn.last_message {
        println!("Message:   {}", message);
    }
    if !conn.databases.is_empty() {
        println!("Databases: {}", conn.databases.join(", "));
    }
    Ok(())
}

/// Remove a connection with its cached schemas and selection
pub async fn remove(config_path: &str, reference: &str) -> Result<()> {
    let mut project = Project::load(config_path)?;
    let workbench = project.workbench()?;
    {
        let mut ws = workbench.workspace_mut().await;
        let id = resolve_connection(&ws, reference)?;
        ws.forget_connection(id);
    }
    println!("✓ Removed {}", reference);
    project.finish(workbench)
}

/// Test one connection, or all of them
pub async fn test(config_path: &str, reference: Option<&str>) -> Result<()> {
    let mut project = Project::load(config_path)?;
    let workbench = project.workbench()?;

    let outcomes = match reference {
        Some(reference) => {
            let id = resolve_connection(&*workbench.workspace().await, reference)?;
            vec![workbench.test_connection(id).await]
        }
        None => workbench
            .test_all_connections()
            .await
            .into_iter()
            .map(|(_, outcome)| outcome)
            .collect(),
    };

    project.finish(workbench)?;
    let failed = outcomes.iter().filter(|o| !o.success).count();
    if failed > 0 {
        anyhow::bail!("{} connection test(s) failed", failed);
    }
    Ok(())
}

/// Pick the database a connection works against
pub async fn select_db(config_path: &str, reference: &str, database: &str) -> Result<()> {
    let mut project = Project::load(config_path)?;
    let workbench = project.workbench()?;
    let id = resolve_connection(&*workbench.workspace().await, reference)?;

    let outcome = workbench.select_database_for_connection(id, database).await;

    project.finish(workbench)?;
    ensure(&outcome)
}

/// Forget the selected database; the connection goes back to `connected`
pub async fn clear_db(config_path: &str, reference: &str) -> Result<()> {
    let mut project = Project::load(config_path)?;
    let workbench = project.workbench()?;
    {
        let mut ws = workbench.workspace_mut().await;
        let id = resolve_connection(&ws, reference)?;
        ws.registry.clear_database(id)?;
        ws.selection.clear_for(id);
    }
    println!("✓ Cleared database of {}", reference);
    project.finish(workbench)
}
