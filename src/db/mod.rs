pub mod preferences;
pub mod schema;

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};

use crate::github::types::User;
pub use preferences::Preferences;

const TOKEN_KEY: &str = "user_token";
const USER_KEY: &str = "user";
const PREFERENCES_KEY: &str = "repositories";

/// Local state: login session and UI preferences.
///
/// Query results are never written here; they live only in memory.
pub struct Database {
  conn: Connection,
}

impl Database {
  /// Open or create the database at the default location
  pub fn open() -> Result<Self> {
    Self::open_at(&Self::default_path()?)
  }

  pub fn open_at(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create database directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open database at {}: {}", path.display(), e))?;

    let db = Self { conn };
    db.run_migrations()?;

    Ok(db)
  }

  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self> {
    let db = Self {
      conn: Connection::open_in_memory()?,
    };
    db.run_migrations()?;
    Ok(db)
  }

  /// Directory holding the database and the log file
  pub fn data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("ghdash"))
  }

  /// Get the default database path
  fn default_path() -> Result<PathBuf> {
    Ok(Self::data_dir()?.join("state.db"))
  }

  /// Run database migrations
  fn run_migrations(&self) -> Result<()> {
    self
      .conn
      .execute_batch(schema::SCHEMA)
      .map_err(|e| eyre!("Failed to run migrations: {}", e))?;
    Ok(())
  }

  fn get(&self, table: &str, key: &str) -> Result<Option<String>> {
    let sql = format!("SELECT value FROM {} WHERE key = ?", table);
    self
      .conn
      .query_row(&sql, params![key], |row| row.get(0))
      .optional()
      .map_err(|e| eyre!("Failed to read {}.{}: {}", table, key, e))
  }

  fn put(&self, table: &str, key: &str, value: &str) -> Result<()> {
    let sql = format!("INSERT OR REPLACE INTO {} (key, value) VALUES (?, ?)", table);
    self
      .conn
      .execute(&sql, params![key, value])
      .map_err(|e| eyre!("Failed to write {}.{}: {}", table, key, e))?;
    Ok(())
  }

  pub fn session_token(&self) -> Result<Option<String>> {
    self.get("session", TOKEN_KEY)
  }

  pub fn set_session_token(&self, token: &str) -> Result<()> {
    self.put("session", TOKEN_KEY, token)
  }

  /// User stored at the last successful login, if any
  pub fn cached_user(&self) -> Result<Option<User>> {
    match self.get("session", USER_KEY)? {
      Some(json) => Ok(serde_json::from_str(&json).ok()),
      None => Ok(None),
    }
  }

  pub fn set_cached_user(&self, user: &User) -> Result<()> {
    let json = serde_json::to_string(user)?;
    self.put("session", USER_KEY, &json)
  }

  /// Forget the token and user. Preferences are kept.
  pub fn clear_session(&self) -> Result<()> {
    self
      .conn
      .execute("DELETE FROM session", [])
      .map_err(|e| eyre!("Failed to clear session: {}", e))?;
    Ok(())
  }

  /// Stored preferences, or defaults when none (or unreadable) are stored
  pub fn preferences(&self) -> Result<Preferences> {
    Ok(
      self
        .get("preferences", PREFERENCES_KEY)?
        .and_then(|json| serde_json::from_str(&json).ok())
        .unwrap_or_default(),
    )
  }

  pub fn save_preferences(&self, prefs: &Preferences) -> Result<()> {
    let json = serde_json::to_string(prefs)?;
    self.put("preferences", PREFERENCES_KEY, &json)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::github::refine::SortField;

  #[test]
  fn test_session_round_trip() {
    let db = Database::open_in_memory().unwrap();
    assert_eq!(db.session_token().unwrap(), None);

    db.set_session_token("abc").unwrap();
    db.set_session_token("def").unwrap();
    assert_eq!(db.session_token().unwrap().as_deref(), Some("def"));

    let user = User {
      login: "octo".to_string(),
      name: Some("Octo Cat".to_string()),
      avatar_url: None,
    };
    db.set_cached_user(&user).unwrap();
    assert_eq!(db.cached_user().unwrap(), Some(user));
  }

  #[test]
  fn test_clear_session_keeps_preferences() {
    let db = Database::open_in_memory().unwrap();
    db.set_session_token("abc").unwrap();
    let mut prefs = Preferences::default();
    prefs.use_virtualization = false;
    prefs.refinement.sort_by = SortField::Stars;
    db.save_preferences(&prefs).unwrap();

    db.clear_session().unwrap();
    assert_eq!(db.session_token().unwrap(), None);
    assert_eq!(db.cached_user().unwrap(), None);
    assert_eq!(db.preferences().unwrap(), prefs);
  }

  #[test]
  fn test_defaults_when_nothing_stored() {
    let db = Database::open_in_memory().unwrap();
    assert_eq!(db.preferences().unwrap(), Preferences::default());
  }

  #[test]
  fn test_open_at_creates_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("state.db");
    {
      let db = Database::open_at(&path).unwrap();
      db.set_session_token("persisted").unwrap();
    }
    let db = Database::open_at(&path).unwrap();
    assert_eq!(db.session_token().unwrap().as_deref(), Some("persisted"));
  }
}
