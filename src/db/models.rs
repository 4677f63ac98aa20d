use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Mirrors the `activation_source` Postgres enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "activation_source", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ActivationSource {
    /// Requested from the dashboard; the device has not confirmed it.
    Dashboard,
    /// Reported by the dispenser itself.
    Device,
}

/// Mirrors the `command_state` Postgres enum.
///
/// A missing row is the idle state; there is no `Idle` variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "command_state", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CommandState {
    Pending,
    Executed,
    Expired,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct ClimateReading {
    pub id: Uuid,
    /// `YYYY-MM-DD` taken from the device timestamp, or `unknown`.
    pub day_bucket: String,
    /// Degrees Celsius
    pub temperature: f64,
    /// Relative humidity percentage
    pub humidity: f64,
    /// Timestamp exactly as the device sent it.
    pub raw_timestamp: String,
    /// `None` when `raw_timestamp` could not be parsed.
    pub recorded_at: Option<DateTime<Utc>>,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewClimateReading {
    pub day_bucket: String,
    pub temperature: f64,
    pub humidity: f64,
    pub raw_timestamp: String,
    pub recorded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct PresenceReading {
    pub id: Uuid,
    pub day_bucket: String,
    /// `true` when the infrared sensor sees food in the bowl.
    pub available: bool,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPresenceReading {
    pub day_bucket: String,
    pub available: bool,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct DispenserActivation {
    pub id: Uuid,
    pub day_bucket: String,
    pub activated_at: DateTime<Utc>,
    pub raw_timestamp: Option<String>,
    pub source: ActivationSource,
    /// Set once the device has confirmed the activation happened.
    pub processed: bool,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewActivation {
    pub day_bucket: String,
    pub activated_at: DateTime<Utc>,
    pub raw_timestamp: Option<String>,
    pub source: ActivationSource,
    pub processed: bool,
}

/// Contents of the single command slot.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct PendingCommand {
    /// Bumped on every new command; acknowledgements must match it.
    pub version: i64,
    pub activate: bool,
    pub state: CommandState,
    pub triggered_by: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub executed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewCommand {
    pub triggered_by: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Filter for climate history queries. Results are newest first.
#[derive(Debug, Clone, Default)]
pub struct HistoryQuery {
    pub day: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: i64,
}
