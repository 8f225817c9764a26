// Workspace settings
// Persistent key-value storage in the app_state table

use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::database::{StorageResult, WorkspaceStore};

const DEFAULT_PAGE_SIZE_KEY: &str = "default_page_size";
const HISTORY_LIMIT_KEY: &str = "history_limit";
const RESTORE_TABS_KEY: &str = "restore_tabs";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceSettings {
    /// Rows per page when an execution does not name a page size
    pub default_page_size: u32,
    /// Entries requested per history refresh
    pub history_limit: u32,
    pub restore_tabs: bool,
}

impl Default for WorkspaceSettings {
    fn default() -> Self {
        Self {
            default_page_size: 100,
            history_limit: 50,
            restore_tabs: true,
        }
    }
}

impl WorkspaceStore {
    /// Get a setting value by key
    pub fn get_setting(&self, key: &str) -> StorageResult<Option<String>> {
        self.with_connection(|conn| {
            conn.query_row(
                "SELECT value FROM app_state WHERE key = ?",
                params![key],
                |row| row.get(0),
            )
            .optional()
        })
    }

    /// Set a setting value by key
    pub fn set_setting(&self, key: &str, value: &str) -> StorageResult<()> {
        self.with_connection(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO app_state (key, value, updated_at)
                 VALUES (?, ?, datetime('now'))",
                params![key, value],
            )?;
            Ok(())
        })
    }

    fn get_parsed<T: std::str::FromStr>(&self, key: &str, fallback: T) -> StorageResult<T> {
        let value = self.get_setting(key)?;
        Ok(value.and_then(|v| v.parse().ok()).unwrap_or(fallback))
    }

    /// Settings with defaults for anything unset or unparseable
    pub fn load_settings(&self) -> StorageResult<WorkspaceSettings> {
        let defaults = WorkspaceSettings::default();
        let page_size = self.get_parsed(DEFAULT_PAGE_SIZE_KEY, defaults.default_page_size)?;
        Ok(WorkspaceSettings {
            default_page_size: if page_size == 0 { defaults.default_page_size } else { page_size },
            history_limit: self.get_parsed(HISTORY_LIMIT_KEY, defaults.history_limit)?,
            restore_tabs: self.get_parsed(RESTORE_TABS_KEY, defaults.restore_tabs)?,
        })
    }

    pub fn save_settings(&self, settings: &WorkspaceSettings) -> StorageResult<()> {
        self.set_setting(DEFAULT_PAGE_SIZE_KEY, &settings.default_page_size.to_string())?;
        self.set_setting(HISTORY_LIMIT_KEY, &settings.history_limit.to_string())?;
        self.set_setting(RESTORE_TABS_KEY, &settings.restore_tabs.to_string())?;
        Ok(())
    }

    /// Write defaults for keys that do not exist yet
    pub fn init_default_settings(&self) -> StorageResult<()> {
        let defaults = WorkspaceSettings::default();
        let entries = [
            (DEFAULT_PAGE_SIZE_KEY, defaults.default_page_size.to_string()),
            (HISTORY_LIMIT_KEY, defaults.history_limit.to_string()),
            (RESTORE_TABS_KEY, defaults.restore_tabs.to_string()),
        ];
        for (key, value) in entries {
            if self.get_setting(key)?.is_none() {
                self.set_setting(key, &value)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::temp_store;

    #[test]
    fn test_get_set_setting() {
        let store = temp_store();

        assert_eq!(store.get_setting("test_key").unwrap(), None);

        store.set_setting("test_key", "test_value").unwrap();
        assert_eq!(
            store.get_setting("test_key").unwrap(),
            Some("test_value".to_string())
        );

        store.set_setting("test_key", "new_value").unwrap();
        assert_eq!(
            store.get_setting("test_key").unwrap(),
            Some("new_value".to_string())
        );
    }

    #[test]
    fn test_load_settings_defaults() {
        let store = temp_store();
        assert_eq!(store.load_settings().unwrap(), WorkspaceSettings::default());

        store.set_setting(HISTORY_LIMIT_KEY, "not a number").unwrap();
        store.set_setting(DEFAULT_PAGE_SIZE_KEY, "0").unwrap();
        let settings = store.load_settings().unwrap();
        assert_eq!(settings.history_limit, 50);
        assert_eq!(settings.default_page_size, 100);
    }

    #[test]
    fn test_save_and_load_settings() {
        let store = temp_store();
        let settings = WorkspaceSettings {
            default_page_size: 250,
            history_limit: 10,
            restore_tabs: false,
        };

        store.save_settings(&settings).unwrap();
        assert_eq!(store.load_settings().unwrap(), settings);
    }

    #[test]
    fn test_init_default_settings_keeps_existing() {
        let store = temp_store();
        store.set_setting(HISTORY_LIMIT_KEY, "5").unwrap();

        store.init_default_settings().unwrap();

        assert_eq!(store.get_setting(HISTORY_LIMIT_KEY).unwrap().as_deref(), Some("5"));
        assert_eq!(store.get_setting(DEFAULT_PAGE_SIZE_KEY).unwrap().as_deref(), Some("100"));
        assert_eq!(store.get_setting(RESTORE_TABS_KEY).unwrap().as_deref(), Some("true"));
    }
}
