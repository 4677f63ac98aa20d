use std::{future::Future, sync::Arc, time::Duration};

use chrono::Utc;
use tokio::{
    sync::{watch, Notify},
    time,
};
use tracing::{debug, info};

use super::{
    client::{ClientError, DashboardClient},
    state::DashboardState,
};
use crate::{api::dto::ServoActivatedDto, config::DashboardConfig};

/// Keeps a [`DashboardState`] up to date by polling the monitor API.
///
/// Every change is published on a watch channel; call [`Poller::subscribe`]
/// to follow it.
#[derive(Clone)]
pub struct Poller {
    client: DashboardClient,
    state: Arc<watch::Sender<DashboardState>>,
    refresh: Arc<Notify>,
    poll_interval: Duration,
    dispense_reset: Duration,
    refetch_delay: Duration,
}

impl Poller {
    pub fn new(client: DashboardClient, config: &DashboardConfig) -> Self {
        let (state, _) = watch::channel(DashboardState::default());
        Self {
            client,
            state: Arc::new(state),
            refresh: Arc::new(Notify::new()),
            poll_interval: config.poll_interval,
            dispense_reset: config.dispense_reset,
            refetch_delay: config.refetch_delay,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> DashboardState {
        self.state.borrow().clone()
    }

    /// Ask a running [`Poller::run`] loop to refresh now.
    pub fn request_refresh(&self) {
        self.refresh.notify_one();
    }

    /// Fetch every section concurrently. Each one settles on its own, so a
    /// failing endpoint only flags its own section.
    pub async fn refresh_all(&self) {
        let (current, history, presence, dispenser, servo_log) = tokio::join!(
            self.client.current(),
            self.client.history(),
            self.client.presence(),
            self.client.dispenser(),
            self.client.servo_log(),
        );

        self.state.send_modify(|s| {
            s.current.settle("current", current);
            s.history.settle("history", history);
            s.presence.settle("presence", presence);
            s.dispenser.settle("dispenser", dispenser.map(Some));
            s.servo_log.settle("servo_log", servo_log);
            s.last_refresh = Some(Utc::now());
        });
        debug!("Dashboard refreshed");
    }

    /// Refresh on every tick of the poll interval and whenever a refresh is
    /// requested, until `shutdown` resolves. The first tick fires at once.
    pub async fn run(self, shutdown: impl Future<Output = ()>) {
        let mut ticker = time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(
            interval_secs = self.poll_interval.as_secs(),
            "Dashboard polling started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => self.refresh_all().await,
                _ = self.refresh.notified() => self.refresh_all().await,
                _ = &mut shutdown => break,
            }
        }

        info!("Dashboard polling stopped");
    }

    /// Record a dispenser activation. The `dispensing` flag goes up
    /// immediately; a refresh follows after the refetch delay and the flag
    /// drops again after the reset delay.
    pub async fn dispense(&self) -> Result<ServoActivatedDto, ClientError> {
        self.state.send_modify(|s| s.dispensing = true);

        let activated = match self.client.dispense().await {
            Ok(activated) => activated,
            Err(e) => {
                self.state.send_modify(|s| s.dispensing = false);
                return Err(e);
            }
        };
        info!(activated_at = %activated.activated_at, "Dispense requested");

        let poller = self.clone();
        tokio::spawn(async move {
            time::sleep(poller.refetch_delay).await;
            poller.refresh_all().await;
        });

        let state = self.state.clone();
        let reset = self.dispense_reset;
        tokio::spawn(async move {
            time::sleep(reset).await;
            state.send_modify(|s| s.dispensing = false);
        });

        Ok(activated)
    }
}
