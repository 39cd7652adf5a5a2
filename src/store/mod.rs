//! Access to the external database.
//!
//! The counter row and the player table are owned by the store; the service
//! only ever talks to them through [`Store`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{NewPlayer, PlayerRecord, PlayerUpdate};

mod sqlite;
mod supabase;

pub use sqlite::SqliteStore;
pub use supabase::SupabaseStore;

pub const COUNTER_TABLE: &str = "codipartida";
pub const PLAYERS_TABLE: &str = "jugadors";

/// Failure reported by a store backend. The `Display` text is the message
/// returned to clients.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Request(#[from] reqwest::Error),
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error("{0}")]
    Database(#[from] sqlx::Error),
    #[error("no existeix la fila del comptador a codipartida")]
    CounterMissing,
    #[error("resposta inesperada de la base de dades: {0}")]
    Decode(String),
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Current value of the single counter row
    async fn read_counter(&self) -> Result<i64, StoreError>;

    /// Set the counter to `next` only where it still holds `expected`.
    /// Returns the number of rows the condition matched.
    async fn compare_and_set_counter(&self, expected: i64, next: i64) -> Result<u64, StoreError>;

    async fn list_players(&self) -> Result<Vec<PlayerRecord>, StoreError>;

    /// Insert a row and return it as stored (with its `idGrup`)
    async fn insert_player(&self, player: &NewPlayer) -> Result<PlayerRecord, StoreError>;

    /// Returns the number of rows updated
    async fn update_player(&self, id_grup: i64, update: &PlayerUpdate) -> Result<u64, StoreError>;

    /// Delete rows whose `dataPartida` is strictly before `cutoff`.
    /// Returns the number of rows deleted.
    async fn delete_players_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;
}
