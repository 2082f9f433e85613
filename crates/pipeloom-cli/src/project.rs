//! Loading and saving project state between invocations

use anyhow::{Context, Result};
use pipeloom_client::{Workbench, backend_for};
use pipeloom_core::session::{NoticeLevel, Preferences};
use pipeloom_core::{Config, ConnectionId, Outcome, Session, Workspace};

/// A loaded project: configuration plus persisted preferences
pub struct Project {
    pub config: Config,
    pub prefs: Preferences,
}

impl Project {
    /// Load `pipeloom.yaml` and the preferences next to it
    pub fn load(config_path: &str) -> Result<Self> {
        let config = Config::load(config_path).context("Failed to load configuration")?;
        let prefs = Preferences::load(config.preferences_path())
            .context("Failed to read preferences")?;
        Ok(Self { config, prefs })
    }

    /// Build a workbench over the persisted workspace
    pub fn workbench(&self) -> Result<Workbench> {
        let workspace = Workspace::load(self.config.workspace_path())
            .context("Failed to read workspace")?;
        let backend = backend_for(&self.config.project, &self.prefs)
            .context("Failed to create backend client")?;
        tracing::debug!(backend = backend.name(), "Opened workspace");
        Ok(
            Workbench::new(backend, workspace, Session::from_preferences(&self.prefs))
                .with_preview_limit(self.config.project.preview_limit),
        )
    }

    /// Print the session's notices and persist the workspace and preferences
    pub fn finish(&mut self, workbench: Workbench) -> Result<()> {
        let (workspace, mut session) = workbench.into_parts();
        print_notices(&mut session);
        workspace
            .save(self.config.workspace_path())
            .context("Failed to save workspace")?;
        self.prefs.is_authenticated = session.is_authenticated();
        self.save_prefs()
    }

    /// Persist preferences only
    pub fn save_prefs(&self) -> Result<()> {
        self.prefs
            .save(self.config.preferences_path())
            .context("Failed to save preferences")
    }
}

fn print_notices(session: &mut Session) {
    for notice in session.notices_mut().drain() {
        let marker = match notice.level {
            NoticeLevel::Success => "✓",
            NoticeLevel::Info => "•",
            NoticeLevel::Destructive => "✗",
        };
        println!("{} {}: {}", marker, notice.title, notice.message);
    }
}

/// Find a connection by id or name
pub fn resolve_connection(workspace: &Workspace, reference: &str) -> Result<ConnectionId> {
    if let Ok(id) = reference.parse::<ConnectionId>()
        && workspace.registry.get_connection_by_id(id).is_some()
    {
        return Ok(id);
    }
    workspace
        .registry
        .find_by_name(reference)
        .map(|c| c.id)
        .ok_or_else(|| anyhow::anyhow!("No connection named '{}'", reference))
}

/// Turn a failed outcome into an error after state has been saved
pub fn ensure(outcome: &Outcome) -> Result<()> {
    if outcome.success {
        Ok(())
    } else {
        anyhow::bail!("{}", outcome.message)
    }
}
