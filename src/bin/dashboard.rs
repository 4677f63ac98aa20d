//! Terminal dashboard for the monitor API.
//!
//! Commands on stdin: `r` refresh, `d` dispense, `q` quit.

use anyhow::Result;
use tokio::{
    io::{self, AsyncBufReadExt, BufReader},
    sync::oneshot,
};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use petcare_monitor::{
    config::DashboardConfig,
    dashboard::{render, DashboardClient, Poller},
};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    // Logs go to stderr so they don't interleave with the view.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let config = DashboardConfig::from_env()?;
    info!(api_url = %config.api_url, "Starting dashboard");

    let poller = Poller::new(DashboardClient::new(&config)?, &config);

    let mut updates = poller.subscribe();
    let printer = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let view = render(&updates.borrow_and_update());
            println!("{view}");
            println!("[r] refresh  [d] dispense  [q] quit");
        }
    });

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let polling = tokio::spawn(poller.clone().run(async {
        let _ = stop_rx.await;
    }));

    let mut lines = BufReader::new(io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "r" => poller.request_refresh(),
            "d" => {
                if let Err(e) = poller.dispense().await {
                    error!(error = %e, "Dispense failed");
                }
            }
            "q" => break,
            "" => {}
            other => eprintln!("unknown command: {other}"),
        }
    }

    let _ = stop_tx.send(());
    polling.await?;
    drop(poller);
    printer.abort();
    Ok(())
}
