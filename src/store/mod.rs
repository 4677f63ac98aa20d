mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::models::{
    ClimateReading, CommandState, DispenserActivation, HistoryQuery, NewActivation,
    NewClimateReading, NewCommand, NewPresenceReading, PendingCommand, PresenceReading,
};

/// Shared handle to whichever store the process was configured with.
pub type SharedStore = Arc<dyn Store>;

/// Persistence for readings, activations and the command slot.
///
/// Every method is a single atomic operation against the backing store;
/// callers never hold anything across calls.
#[async_trait]
pub trait Store: Send + Sync {
    /// Cheap round-trip used by the health check.
    async fn ping(&self) -> Result<()>;

    async fn insert_climate(&self, reading: NewClimateReading) -> Result<ClimateReading>;

    /// Newest climate reading that has a parsed timestamp.
    async fn latest_climate(&self) -> Result<Option<ClimateReading>>;

    /// Climate readings with a parsed timestamp matching `query`, newest first.
    async fn climate_history(&self, query: &HistoryQuery) -> Result<Vec<ClimateReading>>;

    async fn insert_presence(&self, reading: NewPresenceReading) -> Result<PresenceReading>;

    async fn latest_presence(&self) -> Result<Option<PresenceReading>>;

    async fn insert_activation(&self, activation: NewActivation) -> Result<DispenserActivation>;

    async fn latest_activation(&self) -> Result<Option<DispenserActivation>>;

    /// The `limit` most recent activations, newest first.
    async fn recent_activations(&self, limit: i64) -> Result<Vec<DispenserActivation>>;

    async fn load_command(&self) -> Result<Option<PendingCommand>>;

    /// Overwrite the command slot with a fresh pending command. The version is
    /// one more than whatever the slot held before (1 for an empty slot).
    async fn open_command(&self, command: NewCommand) -> Result<PendingCommand>;

    /// Move the command with `version` from state `from` to `to`.
    ///
    /// Returns the updated command, or `None` when the slot no longer holds
    /// that version in that state.
    async fn transition_command(
        &self,
        version: i64,
        from: CommandState,
        to: CommandState,
        at: DateTime<Utc>,
    ) -> Result<Option<PendingCommand>>;

    /// `pending → executed` for `version` together with the activation it
    /// confirms, as one atomic write. Either both happen or neither does.
    ///
    /// `executed_at` is the activation's `activated_at`. Returns `None`, and
    /// records nothing, when the slot no longer holds that pending version.
    async fn execute_command(
        &self,
        version: i64,
        activation: NewActivation,
    ) -> Result<Option<PendingCommand>>;
}
