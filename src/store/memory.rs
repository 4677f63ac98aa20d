use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::Store;
use crate::db::models::{
    ClimateReading, CommandState, DispenserActivation, HistoryQuery, NewActivation,
    NewClimateReading, NewCommand, NewPresenceReading, PendingCommand, PresenceReading,
};

/// Process-local [`Store`]; contents are lost on restart. Clones share the
/// same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Default)]
struct Inner {
    climate: Vec<ClimateReading>,
    presence: Vec<PresenceReading>,
    activations: Vec<DispenserActivation>,
    command: Option<PendingCommand>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Inner {
    fn push_activation(&mut self, a: NewActivation) -> DispenserActivation {
        let activation = DispenserActivation {
            id: Uuid::new_v4(),
            day_bucket: a.day_bucket,
            activated_at: a.activated_at,
            raw_timestamp: a.raw_timestamp,
            source: a.source,
            processed: a.processed,
            received_at: Utc::now(),
        };
        self.activations.push(activation.clone());
        activation
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn insert_climate(&self, r: NewClimateReading) -> Result<ClimateReading> {
        let reading = ClimateReading {
            id: Uuid::new_v4(),
            day_bucket: r.day_bucket,
            temperature: r.temperature,
            humidity: r.humidity,
            raw_timestamp: r.raw_timestamp,
            recorded_at: r.recorded_at,
            received_at: Utc::now(),
        };
        self.inner.write().await.climate.push(reading.clone());
        Ok(reading)
    }

    async fn latest_climate(&self) -> Result<Option<ClimateReading>> {
        let history = self
            .climate_history(&HistoryQuery {
                limit: 1,
                ..Default::default()
            })
            .await?;
        Ok(history.into_iter().next())
    }

    async fn climate_history(&self, query: &HistoryQuery) -> Result<Vec<ClimateReading>> {
        let inner = self.inner.read().await;
        let mut rows: Vec<ClimateReading> = inner
            .climate
            .iter()
            .filter(|r| {
                let Some(ts) = r.recorded_at else {
                    return false;
                };
                query.day.as_deref().map_or(true, |d| r.day_bucket == d)
                    && query.from.map_or(true, |from| ts >= from)
                    && query.to.map_or(true, |to| ts <= to)
            })
            .cloned()
            .collect();

        // Newest first; insertion order breaks ties so the last write wins.
        rows.reverse();
        rows.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        rows.truncate(query.limit.max(0) as usize);
        Ok(rows)
    }

    async fn insert_presence(&self, r: NewPresenceReading) -> Result<PresenceReading> {
        let reading = PresenceReading {
            id: Uuid::new_v4(),
            day_bucket: r.day_bucket,
            available: r.available,
            recorded_at: r.recorded_at,
        };
        self.inner.write().await.presence.push(reading.clone());
        Ok(reading)
    }

    async fn latest_presence(&self) -> Result<Option<PresenceReading>> {
        let inner = self.inner.read().await;
        Ok(inner
            .presence
            .iter()
            .max_by_key(|r| r.recorded_at)
            .cloned())
    }

    async fn insert_activation(&self, a: NewActivation) -> Result<DispenserActivation> {
        Ok(self.inner.write().await.push_activation(a))
    }

    async fn latest_activation(&self) -> Result<Option<DispenserActivation>> {
        Ok(self.recent_activations(1).await?.into_iter().next())
    }

    async fn recent_activations(&self, limit: i64) -> Result<Vec<DispenserActivation>> {
        let inner = self.inner.read().await;
        let mut rows: Vec<DispenserActivation> = inner.activations.iter().rev().cloned().collect();
        rows.sort_by(|a, b| b.activated_at.cmp(&a.activated_at));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn load_command(&self) -> Result<Option<PendingCommand>> {
        Ok(self.inner.read().await.command.clone())
    }

    async fn open_command(&self, c: NewCommand) -> Result<PendingCommand> {
        let mut inner = self.inner.write().await;
        let version = inner.command.as_ref().map_or(1, |prev| prev.version + 1);
        let command = PendingCommand {
            version,
            activate: true,
            state: CommandState::Pending,
            triggered_by: c.triggered_by,
            created_at: c.created_at,
            expires_at: c.expires_at,
            executed_at: None,
        };
        inner.command = Some(command.clone());
        Ok(command)
    }

    async fn transition_command(
        &self,
        version: i64,
        from: CommandState,
        to: CommandState,
        at: DateTime<Utc>,
    ) -> Result<Option<PendingCommand>> {
        let mut inner = self.inner.write().await;
        match inner.command.as_mut() {
            Some(cmd) if cmd.version == version && cmd.state == from => {
                cmd.state = to;
                if to == CommandState::Executed {
                    cmd.executed_at = Some(at);
                }
                Ok(Some(cmd.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn execute_command(
        &self,
        version: i64,
        activation: NewActivation,
    ) -> Result<Option<PendingCommand>> {
        let mut inner = self.inner.write().await;
        let done = match inner.command.as_mut() {
            Some(cmd) if cmd.version == version && cmd.state == CommandState::Pending => {
                cmd.state = CommandState::Executed;
                cmd.executed_at = Some(activation.activated_at);
                cmd.clone()
            }
            _ => return Ok(None),
        };
        inner.push_activation(activation);
        Ok(Some(done))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::db::models::ActivationSource;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, h, m, 0).unwrap()
    }

    fn climate(day: &str, temperature: f64, recorded_at: Option<DateTime<Utc>>) -> NewClimateReading {
        NewClimateReading {
            day_bucket: day.to_owned(),
            temperature,
            humidity: 50.0,
            raw_timestamp: "raw".to_owned(),
            recorded_at,
        }
    }

    fn new_command(created_at: DateTime<Utc>) -> NewCommand {
        NewCommand {
            triggered_by: "dashboard".to_owned(),
            created_at,
            expires_at: created_at + Duration::seconds(60),
        }
    }

    #[tokio::test]
    async fn empty_store_returns_nothing() {
        let store = MemoryStore::new();
        assert!(store.latest_climate().await.unwrap().is_none());
        assert!(store.latest_presence().await.unwrap().is_none());
        assert!(store.latest_activation().await.unwrap().is_none());
        assert!(store.recent_activations(20).await.unwrap().is_empty());
        assert!(store.load_command().await.unwrap().is_none());
        let history = store
            .climate_history(&HistoryQuery { limit: 20, ..Default::default() })
            .await
            .unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn history_skips_unparsed_timestamps_and_orders_newest_first() {
        let store = MemoryStore::new();
        store.insert_climate(climate("2024-03-15", 20.0, Some(at(9, 0)))).await.unwrap();
        store.insert_climate(climate("unknown", 99.0, None)).await.unwrap();
        store.insert_climate(climate("2024-03-15", 22.0, Some(at(11, 0)))).await.unwrap();
        store.insert_climate(climate("2024-03-15", 21.0, Some(at(10, 0)))).await.unwrap();

        let rows = store
            .climate_history(&HistoryQuery { limit: 20, ..Default::default() })
            .await
            .unwrap();
        let temps: Vec<f64> = rows.iter().map(|r| r.temperature).collect();
        assert_eq!(temps, vec![22.0, 21.0, 20.0]);

        let latest = store.latest_climate().await.unwrap().unwrap();
        assert_eq!(latest.temperature, 22.0);
    }

    #[tokio::test]
    async fn history_filters_by_day_range_and_limit() {
        let store = MemoryStore::new();
        store.insert_climate(climate("2024-03-14", 18.0, Some(at(8, 0) - Duration::days(1)))).await.unwrap();
        store.insert_climate(climate("2024-03-15", 20.0, Some(at(9, 0)))).await.unwrap();
        store.insert_climate(climate("2024-03-15", 21.0, Some(at(10, 0)))).await.unwrap();

        let by_day = store
            .climate_history(&HistoryQuery {
                day: Some("2024-03-14".into()),
                limit: 20,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_day.len(), 1);
        assert_eq!(by_day[0].temperature, 18.0);

        let ranged = store
            .climate_history(&HistoryQuery {
                from: Some(at(9, 30)),
                to: Some(at(10, 0)),
                limit: 20,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(ranged.len(), 1);
        assert_eq!(ranged[0].temperature, 21.0);

        let limited = store
            .climate_history(&HistoryQuery { limit: 2, ..Default::default() })
            .await
            .unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].temperature, 21.0);
    }

    #[tokio::test]
    async fn latest_presence_is_most_recent() {
        let store = MemoryStore::new();
        for (available, ts) in [(true, at(9, 0)), (false, at(10, 0))] {
            store
                .insert_presence(NewPresenceReading {
                    day_bucket: "2024-03-15".into(),
                    available,
                    recorded_at: ts,
                })
                .await
                .unwrap();
        }
        let latest = store.latest_presence().await.unwrap().unwrap();
        assert!(!latest.available);
    }

    #[tokio::test]
    async fn activations_are_newest_first() {
        let store = MemoryStore::new();
        for m in [0, 30, 15] {
            store
                .insert_activation(NewActivation {
                    day_bucket: "2024-03-15".into(),
                    activated_at: at(9, m),
                    raw_timestamp: None,
                    source: ActivationSource::Dashboard,
                    processed: false,
                })
                .await
                .unwrap();
        }
        let rows = store.recent_activations(2).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].activated_at, at(9, 30));
        assert_eq!(rows[1].activated_at, at(9, 15));
    }

    #[tokio::test]
    async fn open_command_bumps_version() {
        let store = MemoryStore::new();
        let first = store.open_command(new_command(at(9, 0))).await.unwrap();
        let second = store.open_command(new_command(at(9, 1))).await.unwrap();
        assert_eq!(first.version, 1);
        assert_eq!(second.version, 2);
        assert_eq!(second.state, CommandState::Pending);
        assert_eq!(store.load_command().await.unwrap().unwrap(), second);
    }

    #[tokio::test]
    async fn transition_requires_matching_version_and_state() {
        let store = MemoryStore::new();
        let cmd = store.open_command(new_command(at(9, 0))).await.unwrap();

        let stale = store
            .transition_command(cmd.version + 1, CommandState::Pending, CommandState::Executed, at(9, 1))
            .await
            .unwrap();
        assert!(stale.is_none());

        let done = store
            .transition_command(cmd.version, CommandState::Pending, CommandState::Executed, at(9, 1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(done.state, CommandState::Executed);
        assert_eq!(done.executed_at, Some(at(9, 1)));

        let again = store
            .transition_command(cmd.version, CommandState::Pending, CommandState::Executed, at(9, 2))
            .await
            .unwrap();
        assert!(again.is_none());
    }

    #[tokio::test]
    async fn execute_records_activation_only_when_applied() {
        let store = MemoryStore::new();
        let cmd = store.open_command(new_command(at(9, 0))).await.unwrap();
        let confirmed = |when| NewActivation {
            day_bucket: "2024-03-15".to_owned(),
            activated_at: when,
            raw_timestamp: None,
            source: ActivationSource::Device,
            processed: true,
        };

        let stale = store
            .execute_command(cmd.version + 1, confirmed(at(9, 1)))
            .await
            .unwrap();
        assert!(stale.is_none());
        assert!(store.recent_activations(10).await.unwrap().is_empty());

        let done = store
            .execute_command(cmd.version, confirmed(at(9, 1)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(done.state, CommandState::Executed);
        assert_eq!(done.executed_at, Some(at(9, 1)));
        let recorded = store.recent_activations(10).await.unwrap();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].activated_at, at(9, 1));
        assert!(recorded[0].processed);

        let again = store
            .execute_command(cmd.version, confirmed(at(9, 2)))
            .await
            .unwrap();
        assert!(again.is_none());
        assert_eq!(store.recent_activations(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn clone_shares_state() {
        let store = MemoryStore::new();
        let clone = store.clone();
        store.open_command(new_command(at(9, 0))).await.unwrap();
        assert!(clone.load_command().await.unwrap().is_some());
    }
}
