use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};

use super::validation::{Fields, Issue, Validate};

// ---------------------------------------------------------------------------
// Ingestion payloads
// ---------------------------------------------------------------------------

/// Body of `POST /api/send-dht`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DhtPayload {
    /// Degrees Celsius. Also accepted as `temperature`.
    pub temperatura: f64,
    /// Relative humidity percentage. Also accepted as `humidity`.
    pub humedad: f64,
    /// Device wall-clock time, `DD/MM/YYYY HH:MM:SS`. Also accepted as `recordedAt`.
    #[serde(rename = "fechaHora")]
    pub fecha_hora: String,
}

impl Validate for DhtPayload {
    fn validate(value: &Value) -> Result<Self, Vec<Issue>> {
        let mut f = Fields::of(value)?;
        let temperatura = f.number(&["temperatura", "temperature"]);
        let humedad = f.number(&["humedad", "humidity"]);
        let fecha_hora = f.string(&["fechaHora", "recordedAt"]);
        match (temperatura, humedad, fecha_hora) {
            (Some(temperatura), Some(humedad), Some(fecha_hora)) => Ok(Self {
                temperatura,
                humedad,
                fecha_hora,
            }),
            _ => Err(f.into_issues()),
        }
    }
}

/// Body of `POST /api/send-infrared`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InfraredPayload {
    /// `true` when the sensor sees food in the bowl. Also accepted as `available`.
    pub disponibilidad: bool,
}

impl Validate for InfraredPayload {
    fn validate(value: &Value) -> Result<Self, Vec<Issue>> {
        let mut f = Fields::of(value)?;
        match f.boolean(&["disponibilidad", "available"]) {
            Some(disponibilidad) => Ok(Self { disponibilidad }),
            None => Err(f.into_issues()),
        }
    }
}

/// Body of `POST /api/send-servo`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServoPayload {
    /// When the dispenser fired. Also accepted as `activatedAt`.
    #[serde(rename = "fechaHoraAccionado")]
    pub fecha_hora_accionado: String,
}

impl Validate for ServoPayload {
    fn validate(value: &Value) -> Result<Self, Vec<Issue>> {
        let mut f = Fields::of(value)?;
        match f.string(&["fechaHoraAccionado", "activatedAt"]) {
            Some(fecha_hora_accionado) => Ok(Self {
                fecha_hora_accionado,
            }),
            None => Err(f.into_issues()),
        }
    }
}

/// Body of `POST /api/servo-executed`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ExecutedPayload {
    /// Must be `true`.
    pub executed: bool,
    /// Version of the command being acknowledged. Without it the current
    /// command is acknowledged.
    #[serde(rename = "commandId", skip_serializing_if = "Option::is_none")]
    pub command_id: Option<i64>,
}

impl Validate for ExecutedPayload {
    fn validate(value: &Value) -> Result<Self, Vec<Issue>> {
        let mut f = Fields::of(value)?;
        let executed = f.boolean(&["executed"]);
        let command_id = f.optional_integer(&["commandId", "version"]);
        if executed == Some(false) {
            f.push("executed", "Must be true");
        }
        let issues = f.into_issues();
        match executed {
            Some(true) if issues.is_empty() => Ok(Self {
                executed: true,
                command_id,
            }),
            _ => Err(issues),
        }
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Generic write acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// Latest climate reading, as shown on the status card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CurrentClimateDto {
    pub temperatura: f64,
    pub humedad: f64,
    /// `DD/MM/YYYY HH:MM:SS`, device-local.
    #[serde(rename = "fechaHora")]
    pub fecha_hora: String,
}

/// One point of the climate chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HistoryEntryDto {
    pub temperatura: f64,
    pub humedad: f64,
    /// `DD/MM/YYYY HH:MM:SS`, device-local.
    #[serde(rename = "fechaHora")]
    pub fecha_hora: String,
    /// `HH:MM`, device-local; the chart axis label.
    pub hora: String,
    /// Day bucket, `YYYY-MM-DD`.
    pub dia: String,
    /// Canonical UTC instant.
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HistoryResponse {
    /// Oldest first.
    pub data: Vec<HistoryEntryDto>,
}

/// Query string of `GET /api/get-dht-history`.
#[derive(Debug, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryParams {
    /// Only readings from this day bucket (`YYYY-MM-DD`).
    pub day: Option<String>,
    /// Start of time range (RFC3339, inclusive).
    pub from: Option<DateTime<Utc>>,
    /// End of time range (RFC3339, inclusive).
    pub to: Option<DateTime<Utc>>,
    /// Number of readings, newest ones kept.
    pub limit: Option<i64>,
}

impl Validate for HistoryParams {
    fn validate(value: &Value) -> Result<Self, Vec<Issue>> {
        let mut f = Fields::of(value)?;
        let params = Self {
            day: f.optional_string(&["day"]),
            from: f.optional_parsed(&["from"], "RFC 3339 date-time"),
            to: f.optional_parsed(&["to"], "RFC 3339 date-time"),
            limit: f.optional_parsed(&["limit"], "integer"),
        };
        let issues = f.into_issues();
        if issues.is_empty() {
            Ok(params)
        } else {
            Err(issues)
        }
    }
}

/// Latest infrared reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct InfraredDto {
    /// `true` when food is in the bowl.
    pub estado: bool,
    #[serde(rename = "fechaHora")]
    pub fecha_hora: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ServoLogEntryDto {
    /// `DD/MM/YYYY HH:MM:SS`, device-local.
    pub timestamp: String,
    /// `true` for the dispenser opening, `false` for it closing again.
    pub status: bool,
}

/// Whether the dispenser is currently open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ServoStateDto {
    pub status: bool,
    #[serde(rename = "activatedAt")]
    pub activated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ServoActivatedDto {
    pub success: bool,
    pub status: bool,
    #[serde(rename = "activatedAt")]
    pub activated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TriggerResponse {
    pub success: bool,
    pub message: String,
    #[serde(rename = "commandId")]
    pub command_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ServoStatusDto {
    /// `true` while a command is pending and unexpired.
    pub activate: bool,
    #[serde(rename = "commandId")]
    pub command_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ExecutedResponse {
    pub success: bool,
    /// `false` when the acknowledgement was a duplicate or stale.
    pub applied: bool,
    pub message: String,
}
