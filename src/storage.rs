//! Durable key-value storage for client-side preferences.
//!
//! The query state is the only thing stored, under a single key, but the
//! storage itself is a plain string map so it can be swapped for an
//! in-memory map in tests.

use std::{collections::HashMap, sync::Mutex};

use rusqlite::{Connection, OptionalExtension};

use crate::Error;

const KEY_VALUE_TABLE: &str = "key_value";

/// A string-to-string map that survives between sessions.
pub trait KeyValueStorage: Send + Sync {
    /// Get the value stored under `key`, if any.
    ///
    /// # Errors
    /// Returns an error if the underlying storage cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, Error>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    /// Returns an error if the underlying storage cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), Error>;

    /// Remove `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    /// Returns an error if the underlying storage cannot be written.
    fn remove(&self, key: &str) -> Result<(), Error>;
}

/// Create the key-value table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_key_value_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            table = KEY_VALUE_TABLE
        ),
        (),
    )?;

    Ok(())
}

/// Key-value storage in a SQLite database.
#[derive(Debug)]
pub struct SqliteStorage {
    connection: Mutex<Connection>,
}

impl SqliteStorage {
    /// Wrap `connection`, creating the key-value table if needed.
    ///
    /// # Errors
    /// Returns [Error::SqlError] if the table cannot be created.
    pub fn new(connection: Connection) -> Result<Self, Error> {
        create_key_value_table(&connection)?;

        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    /// Open (or create) the database file at `path`.
    ///
    /// # Errors
    /// Returns [Error::SqlError] if the file cannot be opened or initialized.
    pub fn open(path: &str) -> Result<Self, Error> {
        let connection = Connection::open(path)
            .inspect_err(|error| tracing::error!("could not open state database {path}: {error}"))?;

        Self::new(connection)
    }
}

impl KeyValueStorage for SqliteStorage {
    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let connection = self.connection.lock().map_err(|_| Error::StorageLockError)?;
        let value = connection
            .query_row(
                &format!("SELECT value FROM {table} WHERE key = ?1", table = KEY_VALUE_TABLE),
                [key],
                |row| row.get(0),
            )
            .optional()?;

        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        let connection = self.connection.lock().map_err(|_| Error::StorageLockError)?;
        connection.execute(
            &format!(
                "INSERT INTO {table} (key, value) VALUES (?1, ?2)
                ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                table = KEY_VALUE_TABLE
            ),
            (key, value),
        )?;

        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), Error> {
        let connection = self.connection.lock().map_err(|_| Error::StorageLockError)?;
        connection.execute(
            &format!("DELETE FROM {table} WHERE key = ?1", table = KEY_VALUE_TABLE),
            [key],
        )?;

        Ok(())
    }
}

/// Key-value storage that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let values = self.values.lock().map_err(|_| Error::StorageLockError)?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        let mut values = self.values.lock().map_err(|_| Error::StorageLockError)?;
        values.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), Error> {
        let mut values = self.values.lock().map_err(|_| Error::StorageLockError)?;
        values.remove(key);
        Ok(())
    }
}
