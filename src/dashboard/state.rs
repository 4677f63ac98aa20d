use std::fmt::Display;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::api::dto::{
    CurrentClimateDto, HistoryEntryDto, InfraredDto, ServoLogEntryDto, ServoStateDto,
};

/// One independently refreshed part of the dashboard.
///
/// A failed refresh keeps the last good value and raises `error`; the next
/// successful one clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Section<T> {
    pub value: T,
    pub error: bool,
}

impl<T> Section<T> {
    pub fn settle<E: Display>(&mut self, name: &str, result: Result<T, E>) {
        match result {
            Ok(value) => {
                self.value = value;
                self.error = false;
            }
            Err(e) => {
                warn!(section = name, error = %e, "Dashboard refresh failed");
                self.error = true;
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardState {
    pub current: Section<Option<CurrentClimateDto>>,
    pub history: Section<Vec<HistoryEntryDto>>,
    pub presence: Section<Option<InfraredDto>>,
    pub dispenser: Section<Option<ServoStateDto>>,
    pub servo_log: Section<Vec<ServoLogEntryDto>>,
    /// When the last refresh round finished, successful or not.
    pub last_refresh: Option<DateTime<Utc>>,
    /// Raised on a dispense click, lowered again after a fixed delay.
    pub dispensing: bool,
}

impl DashboardState {
    pub fn has_errors(&self) -> bool {
        self.current.error
            || self.history.error
            || self.presence.error
            || self.dispenser.error
            || self.servo_log.error
    }
}
