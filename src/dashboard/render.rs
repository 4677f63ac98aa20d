use std::fmt::Write;

use super::state::{DashboardState, Section};

const SPARK_BARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
const PLACEHOLDER: &str = "--";

/// Text view of the dashboard.
pub fn render(state: &DashboardState) -> String {
    let mut out = String::new();

    let refreshed = state
        .last_refresh
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "never".to_owned());
    let _ = writeln!(out, "PetCare Monitor (last refresh: {refreshed})");
    let _ = writeln!(out);

    let climate = match &state.current.value {
        Some(c) => format!(
            "{:.1} °C  {:.1} %  at {}",
            c.temperatura, c.humedad, c.fecha_hora
        ),
        None => format!("{PLACEHOLDER} °C  {PLACEHOLDER} %"),
    };
    let _ = writeln!(out, "Climate:    {climate}{}", marker(&state.current));

    let food = match &state.presence.value {
        Some(p) if p.estado => format!("food in bowl  at {}", p.fecha_hora),
        Some(p) => format!("bowl empty  at {}", p.fecha_hora),
        None => PLACEHOLDER.to_owned(),
    };
    let _ = writeln!(out, "Food:       {food}{}", marker(&state.presence));

    let dispenser = if state.dispensing {
        "dispensing...".to_owned()
    } else {
        match &state.dispenser.value {
            Some(d) if d.status => "open".to_owned(),
            Some(_) => "closed".to_owned(),
            None => PLACEHOLDER.to_owned(),
        }
    };
    let _ = writeln!(out, "Dispenser:  {dispenser}{}", marker(&state.dispenser));
    let _ = writeln!(out);

    let _ = writeln!(out, "Temperature history{}", marker(&state.history));
    let history = &state.history.value;
    if history.is_empty() {
        let _ = writeln!(out, "  no readings");
    } else {
        let temps: Vec<f64> = history.iter().map(|h| h.temperatura).collect();
        let (min, max) = min_max(&temps);
        let _ = writeln!(out, "  {}", sparkline(&temps));
        let _ = writeln!(
            out,
            "  {} .. {}  min {min:.1} °C  max {max:.1} °C",
            history[0].hora,
            history[history.len() - 1].hora,
        );
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "Dispenser log{}", marker(&state.servo_log));
    if state.servo_log.value.is_empty() {
        let _ = writeln!(out, "  no activity");
    }
    for entry in &state.servo_log.value {
        let what = if entry.status { "opened" } else { "closed" };
        let _ = writeln!(out, "  {}  {what}", entry.timestamp);
    }

    out
}

fn marker<T>(section: &Section<T>) -> &'static str {
    if section.error {
        "  [!] update failed"
    } else {
        ""
    }
}

fn min_max(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        })
}

/// One bar per value, scaled between the smallest and largest value.
pub fn sparkline(values: &[f64]) -> String {
    let (min, max) = min_max(values);
    let span = max - min;
    values
        .iter()
        .map(|&v| {
            if span <= f64::EPSILON {
                SPARK_BARS[SPARK_BARS.len() / 2]
            } else {
                let idx = ((v - min) / span * (SPARK_BARS.len() - 1) as f64).round() as usize;
                SPARK_BARS[idx.min(SPARK_BARS.len() - 1)]
            }
        })
        .collect()
}
