//! Session state, user notices and persisted preferences
//!
//! A [`Session`] is created explicitly and handed to whoever needs it; it
//! carries the login state and the notices produced while working.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;
use std::time::Duration;

use crate::error::Result;

/// Severity of a notice
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    /// Neutral information
    Info,
    /// Something worked
    Success,
    /// Something failed
    Destructive,
}

/// A message for the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    /// Severity
    pub level: NoticeLevel,
    /// Short heading
    pub title: String,
    /// Details
    pub message: String,
    /// When it was raised
    pub at: DateTime<Utc>,
}

impl Notice {
    /// How long the notice stays visible; failures linger longer
    pub fn duration(&self) -> Duration {
        match self.level {
            NoticeLevel::Destructive => Duration::from_secs(10),
            NoticeLevel::Info | NoticeLevel::Success => Duration::from_secs(5),
        }
    }
}

/// Bounded log of recent notices, newest last
#[derive(Debug, Clone)]
pub struct NoticeLog {
    notices: VecDeque<Notice>,
    capacity: usize,
}

impl Default for NoticeLog {
    fn default() -> Self {
        Self::with_capacity(20)
    }
}

impl NoticeLog {
    /// Keep at most `capacity` notices
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            notices: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Record a notice, evicting the oldest when full
    pub fn push(&mut self, level: NoticeLevel, title: impl Into<String>, message: impl Into<String>) {
        let notice = Notice {
            level,
            title: title.into(),
            message: message.into(),
            at: Utc::now(),
        };
        tracing::debug!(?level, title = %notice.title, "{}", notice.message);
        if self.notices.len() == self.capacity {
            self.notices.pop_front();
        }
        self.notices.push_back(notice);
    }

    /// Most recent notice
    pub fn latest(&self) -> Option<&Notice> {
        self.notices.back()
    }

    /// All retained notices, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &Notice> {
        self.notices.iter()
    }

    /// Remove and return all notices
    pub fn drain(&mut self) -> Vec<Notice> {
        self.notices.drain(..).collect()
    }

    /// Number of retained notices
    pub fn len(&self) -> usize {
        self.notices.len()
    }

    /// Whether there are no notices
    pub fn is_empty(&self) -> bool {
        self.notices.is_empty()
    }
}

/// Login state plus notices for one user session
#[derive(Debug, Clone, Default)]
pub struct Session {
    user: Option<String>,
    notices: NoticeLog,
}

impl Session {
    /// A fresh, logged-out session
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore a session from persisted preferences
    pub fn from_preferences(prefs: &Preferences) -> Self {
        Self {
            user: prefs.is_authenticated.then(|| "user".to_string()),
            notices: NoticeLog::default(),
        }
    }

    /// Log in as `user`
    pub fn login(&mut self, user: impl Into<String>) {
        let user = user.into();
        tracing::info!(%user, "Logged in");
        self.user = Some(user);
    }

    /// Log out
    pub fn logout(&mut self) {
        if let Some(user) = self.user.take() {
            tracing::info!(%user, "Logged out");
        }
    }

    /// Whether someone is logged in
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// Logged-in user
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Notices raised during this session
    pub fn notices(&self) -> &NoticeLog {
        &self.notices
    }

    /// Mutable access to the notices
    pub fn notices_mut(&mut self) -> &mut NoticeLog {
        &mut self.notices
    }

    /// Raise an informational notice
    pub fn info(&mut self, title: impl Into<String>, message: impl Into<String>) {
        self.notices.push(NoticeLevel::Info, title, message);
    }

    /// Raise a success notice
    pub fn success(&mut self, title: impl Into<String>, message: impl Into<String>) {
        self.notices.push(NoticeLevel::Success, title, message);
    }

    /// Raise a failure notice
    pub fn destructive(&mut self, title: impl Into<String>, message: impl Into<String>) {
        self.notices.push(NoticeLevel::Destructive, title, message);
    }
}

mod bool_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(if *value { "true" } else { "false" })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(s == "true")
    }
}

/// Durable key/value preferences.
///
/// Values are stored as strings under the keys `corsProxyUrl` and
/// `isAuthenticated`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    /// Prefix prepended to every backend URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cors_proxy_url: Option<String>,

    /// Whether the user is logged in
    #[serde(default, with = "bool_string")]
    pub is_authenticated: bool,
}

impl Preferences {
    /// Read preferences; a missing file yields defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Write preferences, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Set or clear the CORS proxy; blank values clear it
    pub fn set_cors_proxy(&mut self, url: Option<&str>) {
        self.cors_proxy_url = url
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_logout_lifecycle() {
        let mut session = Session::new();
        assert!(!session.is_authenticated());
        session.login("ada");
        assert_eq!(session.user(), Some("ada"));
        session.logout();
        assert!(!session.is_authenticated());
    }

    #[test]
    fn test_destructive_notices_last_longer() {
        let mut session = Session::new();
        session.info("Saved", "ok");
        session.destructive("Failed", "nope");
        let notices: Vec<_> = session.notices().iter().collect();
        assert!(notices[1].duration() > notices[0].duration());
        assert_eq!(session.notices().latest().unwrap().title, "Failed");
    }

    #[test]
    fn test_notice_log_is_bounded() {
        let mut log = NoticeLog::with_capacity(2);
        log.push(NoticeLevel::Info, "a", "");
        log.push(NoticeLevel::Info, "b", "");
        log.push(NoticeLevel::Info, "c", "");
        let titles: Vec<_> = log.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["b", "c"]);
        assert_eq!(log.drain().len(), 2);
        assert!(log.is_empty());
    }

    #[test]
    fn test_preferences_use_string_values() {
        let prefs = Preferences {
            cors_proxy_url: Some("https://proxy.example/".into()),
            is_authenticated: true,
        };
        let json = serde_json::to_value(&prefs).unwrap();
        assert_eq!(json["corsProxyUrl"], "https://proxy.example/");
        assert_eq!(json["isAuthenticated"], "true");
    }

    #[test]
    fn test_preferences_round_trip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state/preferences.json");
        assert_eq!(Preferences::load(&path).unwrap(), Preferences::default());

        let mut prefs = Preferences::default();
        prefs.set_cors_proxy(Some(" https://cors.example/ "));
        prefs.is_authenticated = true;
        prefs.save(&path).unwrap();

        let loaded = Preferences::load(&path).unwrap();
        assert_eq!(loaded.cors_proxy_url.as_deref(), Some("https://cors.example/"));
        assert!(Session::from_preferences(&loaded).is_authenticated());
    }

    #[test]
    fn test_blank_proxy_clears() {
        let mut prefs = Preferences::default();
        prefs.set_cors_proxy(Some("https://x/"));
        prefs.set_cors_proxy(Some("   "));
        assert!(prefs.cors_proxy_url.is_none());
    }
}
