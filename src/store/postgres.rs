use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::Store;
use crate::db::models::{
    ClimateReading, CommandState, DispenserActivation, HistoryQuery, NewActivation,
    NewClimateReading, NewCommand, NewPresenceReading, PendingCommand, PresenceReading,
};

const CLIMATE_COLUMNS: &str =
    "id, day_bucket, temperature, humidity, raw_timestamp, recorded_at, received_at";
const PRESENCE_COLUMNS: &str = "id, day_bucket, available, recorded_at";
const ACTIVATION_COLUMNS: &str =
    "id, day_bucket, activated_at, raw_timestamp, source, processed, received_at";
const COMMAND_COLUMNS: &str =
    "version, activate, state, triggered_by, created_at, expires_at, executed_at";

/// [`Store`] backed by the Postgres schema in `migrations/`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn insert_climate(&self, r: NewClimateReading) -> Result<ClimateReading> {
        let row = sqlx::query_as::<_, ClimateReading>(&format!(
            r#"
            INSERT INTO climate_readings (day_bucket, temperature, humidity, raw_timestamp, recorded_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {CLIMATE_COLUMNS}
            "#
        ))
        .bind(r.day_bucket)
        .bind(r.temperature)
        .bind(r.humidity)
        .bind(r.raw_timestamp)
        .bind(r.recorded_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn latest_climate(&self) -> Result<Option<ClimateReading>> {
        let row = sqlx::query_as::<_, ClimateReading>(&format!(
            r#"
            SELECT {CLIMATE_COLUMNS}
            FROM climate_readings
            WHERE recorded_at IS NOT NULL
            ORDER BY recorded_at DESC, received_at DESC
            LIMIT 1
            "#
        ))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn climate_history(&self, query: &HistoryQuery) -> Result<Vec<ClimateReading>> {
        let rows = sqlx::query_as::<_, ClimateReading>(&format!(
            r#"
            SELECT {CLIMATE_COLUMNS}
            FROM climate_readings
            WHERE recorded_at IS NOT NULL
              AND ($1::text IS NULL OR day_bucket = $1)
              AND ($2::timestamptz IS NULL OR recorded_at >= $2)
              AND ($3::timestamptz IS NULL OR recorded_at <= $3)
            ORDER BY recorded_at DESC, received_at DESC
            LIMIT $4
            "#
        ))
        .bind(query.day.as_deref())
        .bind(query.from)
        .bind(query.to)
        .bind(query.limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn insert_presence(&self, r: NewPresenceReading) -> Result<PresenceReading> {
        let row = sqlx::query_as::<_, PresenceReading>(&format!(
            r#"
            INSERT INTO presence_readings (day_bucket, available, recorded_at)
            VALUES ($1, $2, $3)
            RETURNING {PRESENCE_COLUMNS}
            "#
        ))
        .bind(r.day_bucket)
        .bind(r.available)
        .bind(r.recorded_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn latest_presence(&self) -> Result<Option<PresenceReading>> {
        let row = sqlx::query_as::<_, PresenceReading>(&format!(
            r#"
            SELECT {PRESENCE_COLUMNS}
            FROM presence_readings
            ORDER BY recorded_at DESC
            LIMIT 1
            "#
        ))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn insert_activation(&self, a: NewActivation) -> Result<DispenserActivation> {
        let row = sqlx::query_as::<_, DispenserActivation>(&format!(
            r#"
            INSERT INTO dispenser_activations (day_bucket, activated_at, raw_timestamp, source, processed)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {ACTIVATION_COLUMNS}
            "#
        ))
        .bind(a.day_bucket)
        .bind(a.activated_at)
        .bind(a.raw_timestamp)
        .bind(a.source)
        .bind(a.processed)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn latest_activation(&self) -> Result<Option<DispenserActivation>> {
        Ok(self.recent_activations(1).await?.into_iter().next())
    }

    async fn recent_activations(&self, limit: i64) -> Result<Vec<DispenserActivation>> {
        let rows = sqlx::query_as::<_, DispenserActivation>(&format!(
            r#"
            SELECT {ACTIVATION_COLUMNS}
            FROM dispenser_activations
            ORDER BY activated_at DESC, received_at DESC
            LIMIT $1
            "#
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn load_command(&self) -> Result<Option<PendingCommand>> {
        let row = sqlx::query_as::<_, PendingCommand>(&format!(
            "SELECT {COMMAND_COLUMNS} FROM pending_command WHERE slot = 1"
        ))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn open_command(&self, c: NewCommand) -> Result<PendingCommand> {
        let row = sqlx::query_as::<_, PendingCommand>(&format!(
            r#"
            INSERT INTO pending_command
                (slot, version, activate, state, triggered_by, created_at, expires_at, executed_at)
            VALUES (1, 1, TRUE, 'pending', $1, $2, $3, NULL)
            ON CONFLICT (slot) DO UPDATE SET
                version      = pending_command.version + 1,
                activate     = TRUE,
                state        = 'pending',
                triggered_by = EXCLUDED.triggered_by,
                created_at   = EXCLUDED.created_at,
                expires_at   = EXCLUDED.expires_at,
                executed_at  = NULL
            RETURNING {COMMAND_COLUMNS}
            "#
        ))
        .bind(c.triggered_by)
        .bind(c.created_at)
        .bind(c.expires_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn transition_command(
        &self,
        version: i64,
        from: CommandState,
        to: CommandState,
        at: DateTime<Utc>,
    ) -> Result<Option<PendingCommand>> {
        let row = sqlx::query_as::<_, PendingCommand>(&format!(
            r#"
            UPDATE pending_command
            SET state       = $3,
                executed_at = CASE WHEN $3 = 'executed'::command_state THEN $4 ELSE executed_at END
            WHERE slot = 1 AND version = $1 AND state = $2
            RETURNING {COMMAND_COLUMNS}
            "#
        ))
        .bind(version)
        .bind(from)
        .bind(to)
        .bind(at)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn execute_command(
        &self,
        version: i64,
        activation: NewActivation,
    ) -> Result<Option<PendingCommand>> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, PendingCommand>(&format!(
            r#"
            UPDATE pending_command
            SET state = 'executed', executed_at = $2
            WHERE slot = 1 AND version = $1 AND state = 'pending'
            RETURNING {COMMAND_COLUMNS}
            "#
        ))
        .bind(version)
        .bind(activation.activated_at)
        .fetch_optional(&mut *tx)
        .await?;

        // Lost the compare-and-set; dropping `tx` rolls back.
        let Some(row) = row else {
            return Ok(None);
        };

        sqlx::query(
            r#"
            INSERT INTO dispenser_activations (day_bucket, activated_at, raw_timestamp, source, processed)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&activation.day_bucket)
        .bind(activation.activated_at)
        .bind(&activation.raw_timestamp)
        .bind(activation.source)
        .bind(activation.processed)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(row))
    }
}
