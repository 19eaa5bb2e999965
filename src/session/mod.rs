use anyhow::{Context, Result};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::db::Database;

/// Staff roles, ordered by privilege.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Viewer,
    Editor,
    Admin,
}

impl Role {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "viewer" => Some(Role::Viewer),
            "editor" => Some(Role::Editor),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Viewer => "viewer",
            Role::Editor => "editor",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for Role {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Role {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        Role::parse(s).ok_or_else(|| FromSqlError::Other(format!("unknown role: {s}").into()))
    }
}

/// The signed-in staff member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffUser {
    pub email: String,
    pub role: Role,
}

/// Things that move a session between signed-in and signed-out.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    SignedIn(StaffUser),
    SignedOut,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AccessError {
    #[error("not signed in; run `fireshow login <email>` first")]
    NotSignedIn,

    #[error("{email} has role {actual}, but {required} is required")]
    Forbidden {
        email: String,
        required: Role,
        actual: Role,
    },

    #[error("{0} is not a staff member")]
    UnknownStaff(String),
}

/// Current sign-in state, passed explicitly to whatever needs it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    signed_in_at: Option<String>,
    user: Option<StaffUser>,
}

impl Session {
    /// Load the session from `path`. A missing file is a signed-out session.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Session::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read session: {}", path.display()))?;
        let session: Session =
            toml::from_str(&content).with_context(|| "Failed to parse session.toml")?;
        Ok(session)
    }

    /// Persist the session. Signing out removes the file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if self.user.is_none() {
            if path.exists() {
                std::fs::remove_file(path)
                    .with_context(|| format!("Failed to remove session: {}", path.display()))?;
            }
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string(self).context("Failed to serialize session")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write session: {}", path.display()))?;
        Ok(())
    }

    /// Path to the session file: ~/.fireshow/session.toml
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".fireshow").join("session.toml"))
    }

    pub fn apply(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::SignedIn(user) => {
                info!("Signed in: {} ({})", user.email, user.role);
                self.user = Some(user);
                self.signed_in_at = Some(chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string());
            }
            SessionEvent::SignedOut => {
                if let Some(ref u) = self.user {
                    info!("Signed out: {}", u.email);
                }
                self.user = None;
                self.signed_in_at = None;
            }
        }
    }

    pub fn user(&self) -> Option<&StaffUser> {
        self.user.as_ref()
    }

    pub fn signed_in_at(&self) -> Option<&str> {
        self.signed_in_at.as_deref()
    }

    /// Route guard: the signed-in user if their role is at least `required`.
    pub fn require(&self, required: Role) -> Result<&StaffUser, AccessError> {
        let user = self.user.as_ref().ok_or(AccessError::NotSignedIn)?;
        if user.role < required {
            return Err(AccessError::Forbidden {
                email: user.email.clone(),
                required,
                actual: user.role,
            });
        }
        Ok(user)
    }

    /// Re-check the signed-in user against the staff directory; removed
    /// staff are signed out, changed roles are picked up.
    pub fn refresh(&mut self, db: &Database) -> Result<()> {
        let Some(ref user) = self.user else {
            return Ok(());
        };
        match db.get_staff(&user.email)? {
            None => {
                warn!("{} is no longer staff, signing out", user.email);
                self.apply(SessionEvent::SignedOut);
            }
            Some(member) if member.role != user.role => {
                let at = self.signed_in_at.clone();
                self.apply(SessionEvent::SignedIn(StaffUser {
                    email: member.email,
                    role: member.role,
                }));
                self.signed_in_at = at;
            }
            Some(_) => {}
        }
        Ok(())
    }
}

/// Sign `email` in if it is in the staff directory.
pub fn sign_in<'a>(db: &Database, session: &'a mut Session, email: &str) -> Result<&'a StaffUser> {
    let member = db
        .get_staff(email)?
        .ok_or_else(|| AccessError::UnknownStaff(email.trim().to_string()))?;
    session.apply(SessionEvent::SignedIn(StaffUser {
        email: member.email,
        role: member.role,
    }));
    session
        .user()
        .context("session has no user right after sign-in")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed_in(role: Role) -> Session {
        let mut s = Session::default();
        s.apply(SessionEvent::SignedIn(StaffUser {
            email: "ana@example.com".into(),
            role,
        }));
        s
    }

    #[test]
    fn guard_checks_role_order() {
        assert_eq!(Session::default().require(Role::Viewer), Err(AccessError::NotSignedIn));
        let editor = signed_in(Role::Editor);
        assert!(editor.require(Role::Viewer).is_ok());
        assert!(editor.require(Role::Editor).is_ok());
        assert_eq!(
            editor.require(Role::Admin),
            Err(AccessError::Forbidden {
                email: "ana@example.com".into(),
                required: Role::Admin,
                actual: Role::Editor,
            })
        );
    }

    #[test]
    fn sign_out_clears_user() {
        let mut s = signed_in(Role::Admin);
        assert!(s.signed_in_at().is_some());
        s.apply(SessionEvent::SignedOut);
        assert!(s.user().is_none());
        assert!(s.signed_in_at().is_none());
    }

    #[test]
    fn sign_in_requires_staff_entry() {
        let db = Database::open_in_memory().unwrap();
        let mut s = Session::default();
        let err = sign_in(&db, &mut s, "nobody@example.com").unwrap_err();
        assert_eq!(
            err.downcast_ref::<AccessError>(),
            Some(&AccessError::UnknownStaff("nobody@example.com".into()))
        );

        db.upsert_staff("ana@example.com", Role::Editor).unwrap();
        let user = sign_in(&db, &mut s, "ANA@example.com").unwrap();
        assert_eq!(user.role, Role::Editor);
    }

    #[test]
    fn refresh_follows_staff_directory() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_staff("ana@example.com", Role::Editor).unwrap();
        let mut s = Session::default();
        sign_in(&db, &mut s, "ana@example.com").unwrap();

        db.upsert_staff("ana@example.com", Role::Admin).unwrap();
        s.refresh(&db).unwrap();
        assert_eq!(s.user().map(|u| u.role), Some(Role::Admin));

        db.remove_staff("ana@example.com").unwrap();
        s.refresh(&db).unwrap();
        assert!(s.user().is_none());
    }

    #[test]
    fn session_round_trips_through_toml() {
        let s = signed_in(Role::Viewer);
        let text = toml::to_string(&s).unwrap();
        let back: Session = toml::from_str(&text).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn role_parse() {
        assert_eq!(Role::parse(" Admin "), Some(Role::Admin));
        assert_eq!(Role::parse("owner"), None);
        assert!(Role::Viewer < Role::Admin);
    }
}
