use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokio::time;
use tracing::{error, info, warn};

use crate::{
    db::models::{ActivationSource, CommandState, NewActivation, NewCommand, PendingCommand},
    store::SharedStore,
    timestamp::DeviceZone,
};

/// What the device poller sees when it asks whether to dispense.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandStatus {
    pub activate: bool,
    /// Version of the command in the slot, if any.
    pub version: Option<i64>,
}

/// Why an acknowledgement changed nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoredAck {
    NoCommand,
    VersionMismatch,
    AlreadyExecuted,
    Expired,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Acknowledgement {
    Applied(PendingCommand),
    Ignored(IgnoredAck),
}

/// The one-slot command mailbox between the dashboard and the dispenser.
///
/// `idle → pending` on [`trigger`](Self::trigger), `pending → executed` on
/// [`acknowledge`](Self::acknowledge) and `pending → expired` once the TTL
/// passes. Only the state machine lives here; the slot itself is in the store.
#[derive(Clone)]
pub struct CommandService {
    store: SharedStore,
    zone: DeviceZone,
    ttl: chrono::Duration,
    sweep_interval: Duration,
}

impl CommandService {
    pub fn new(
        store: SharedStore,
        zone: DeviceZone,
        ttl: chrono::Duration,
        sweep_interval: Duration,
    ) -> Self {
        Self {
            store,
            zone,
            ttl,
            sweep_interval,
        }
    }

    /// Replace whatever is in the slot with a fresh pending command.
    pub async fn trigger(&self, triggered_by: &str, now: DateTime<Utc>) -> Result<PendingCommand> {
        let command = self
            .store
            .open_command(NewCommand {
                triggered_by: triggered_by.to_owned(),
                created_at: now,
                expires_at: now + self.ttl,
            })
            .await
            .context("failed to open dispenser command")?;

        info!(
            version = command.version,
            triggered_by = %command.triggered_by,
            expires_at = %command.expires_at,
            "Dispenser command pending"
        );
        Ok(command)
    }

    /// A command only asks for activation while it is pending and unexpired,
    /// even if the sweeper has not caught up with it yet.
    pub async fn status(&self, now: DateTime<Utc>) -> Result<CommandStatus> {
        let command = self.store.load_command().await?;
        Ok(match command {
            Some(cmd) => CommandStatus {
                activate: is_live(&cmd, now),
                version: Some(cmd.version),
            },
            None => CommandStatus {
                activate: false,
                version: None,
            },
        })
    }

    /// Mark the pending command as executed.
    ///
    /// Acknowledgements for a different version, an already executed or an
    /// expired command are ignored, so the device may safely repeat them.
    pub async fn acknowledge(
        &self,
        version: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<Acknowledgement> {
        let Some(cmd) = self.store.load_command().await? else {
            return Ok(Acknowledgement::Ignored(IgnoredAck::NoCommand));
        };

        if version.is_some_and(|v| v != cmd.version) {
            info!(expected = cmd.version, got = ?version, "Ignoring stale acknowledgement");
            return Ok(Acknowledgement::Ignored(IgnoredAck::VersionMismatch));
        }

        match cmd.state {
            CommandState::Executed => {
                return Ok(Acknowledgement::Ignored(IgnoredAck::AlreadyExecuted))
            }
            CommandState::Expired => return Ok(Acknowledgement::Ignored(IgnoredAck::Expired)),
            CommandState::Pending if !is_live(&cmd, now) => {
                self.expire(&cmd, now).await?;
                return Ok(Acknowledgement::Ignored(IgnoredAck::Expired));
            }
            CommandState::Pending => {}
        }

        let confirmed = NewActivation {
            day_bucket: self.zone.day_of(now),
            activated_at: now,
            raw_timestamp: None,
            source: ActivationSource::Device,
            processed: true,
        };
        let Some(done) = self
            .store
            .execute_command(cmd.version, confirmed)
            .await
            .context("failed to record confirmed activation")?
        else {
            // Lost a race with another acknowledgement, a new trigger or the sweeper.
            return Ok(match self.store.load_command().await? {
                Some(c) if c.version == cmd.version && c.state == CommandState::Expired => {
                    Acknowledgement::Ignored(IgnoredAck::Expired)
                }
                Some(c) if c.version == cmd.version => {
                    Acknowledgement::Ignored(IgnoredAck::AlreadyExecuted)
                }
                _ => Acknowledgement::Ignored(IgnoredAck::VersionMismatch),
            });
        };

        info!(version = done.version, "Dispenser command executed");
        Ok(Acknowledgement::Applied(done))
    }

    /// Persist the `pending → expired` transition for a command past its TTL.
    pub async fn expire_stale(&self, now: DateTime<Utc>) -> Result<Option<PendingCommand>> {
        match self.store.load_command().await? {
            Some(cmd) if cmd.state == CommandState::Pending && now >= cmd.expires_at => {
                self.expire(&cmd, now).await
            }
            _ => Ok(None),
        }
    }

    async fn expire(&self, cmd: &PendingCommand, now: DateTime<Utc>) -> Result<Option<PendingCommand>> {
        let expired = self
            .store
            .transition_command(cmd.version, CommandState::Pending, CommandState::Expired, now)
            .await?;
        if let Some(ref c) = expired {
            warn!(
                version = c.version,
                created_at = %c.created_at,
                "Dispenser command expired without acknowledgement"
            );
        }
        Ok(expired)
    }

    /// Runs the expiry sweeper indefinitely.
    /// Spawn this via `tokio::spawn`.
    pub async fn run(self) {
        info!(
            interval_secs = self.sweep_interval.as_secs(),
            "Command expiry sweeper started"
        );
        let mut ticker = time::interval(self.sweep_interval);

        loop {
            ticker.tick().await;
            if let Err(e) = self.expire_stale(Utc::now()).await {
                error!(error = %e, "Command expiry sweep failed");
            }
        }
    }
}

fn is_live(cmd: &PendingCommand, now: DateTime<Utc>) -> bool {
    cmd.activate && cmd.state == CommandState::Pending && now < cmd.expires_at
}
