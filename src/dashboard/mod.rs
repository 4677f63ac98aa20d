//! Terminal dashboard: polls the monitor API and renders a text view.

mod client;
mod poller;
mod render;
mod state;

pub use client::{ClientError, DashboardClient};
pub use poller::Poller;
pub use render::{render, sparkline};
pub use state::{DashboardState, Section};
