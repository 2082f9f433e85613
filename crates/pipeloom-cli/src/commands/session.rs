//! Login, logout and proxy commands

use anyhow::Result;

use crate::project::Project;

/// Log in as `user`
pub async fn login(config_path: &str, user: &str) -> Result<()> {
    let mut project = Project::load(config_path)?;
    let workbench = project.workbench()?;
    workbench.login(user).await;
    project.finish(workbench)
}

/// Log out
pub async fn logout(config_path: &str) -> Result<()> {
    let mut project = Project::load(config_path)?;
    let workbench = project.workbench()?;
    workbench.logout().await;
    project.finish(workbench)
}

/// Set or clear the CORS proxy prefix
pub async fn set_proxy(config_path: &str, url: Option<&str>) -> Result<()> {
    let mut project = Project::load(config_path)?;
    if let Some(url) = url
        && !(url.starts_with("http://") || url.starts_with("https://"))
    {
        anyhow::bail!("Proxy must be an http(s) URL, got '{}'", url);
    }
    project.prefs.set_cors_proxy(url);
    project.save_prefs()?;
    match &project.prefs.cors_proxy_url {
        Some(proxy) => println!("✓ Requests now go through {}", proxy),
        None => println!("✓ Proxy cleared"),
    }
    Ok(())
}
