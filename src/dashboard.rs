//! ==============================================================================
//! dashboard.rs - presentation of the latest readings and history
//! ==============================================================================
//!
//! purpose:
//!     turns query windows into something a person looks at:
//!     - an html page (cards, one svg line chart per sensor, raw table)
//!     - a plain-text view for the terminal
//!
//! state:
//!     DashboardState is an explicit value, refreshed from the query service
//!     once per poll cycle and passed into every render call. latest values
//!     are merged, so a sensor that drops out of the window keeps showing its
//!     last known reading.
//!
//! relationships:
//!     - used by: server.rs (GET /dashboard), main.rs (`dashboard` command)
//!     - uses: query.rs (Window), display.rs (formatting)
//!
//! ==============================================================================

use crate::config::{HostConfig, SensorConfig};
use crate::display;
use crate::domain::SensorKind;
use crate::query::{QueryService, Window, WindowRow};
use crate::shutdown;

use chrono::{DateTime, FixedOffset, Utc};
use std::collections::BTreeMap;
use tokio::sync::watch;

const CHART_WIDTH: f64 = 480.0;
const CHART_HEIGHT: f64 = 160.0;

#[derive(Clone, Debug, Default)]
pub struct DashboardState {
    /// last known reading per sensor, kept across cycles
    pub latest: BTreeMap<String, WindowRow>,
    /// rows of the most recent window, newest first
    pub history: Vec<WindowRow>,
    pub warning: Option<String>,
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl DashboardState {
    pub fn refresh(&mut self, window: Window) {
        self.latest.extend(window.latest_by_sensor);
        self.history = window.rows;
        self.warning = window.warning;
        self.refreshed_at = Some(Utc::now());
    }

    /// rows of one sensor, oldest first; rows without a usable timestamp are left out
    fn series(&self, sensor_id: &str) -> Vec<(DateTime<Utc>, f64)> {
        let mut points: Vec<_> = self
            .history
            .iter()
            .filter(|r| r.sensor_id() == sensor_id)
            .filter_map(|r| display::parse_timestamp(r.timestamp()).map(|t| (t, r.value())))
            .collect();
        points.sort_by_key(|(t, _)| *t);
        points
    }
}

/// value + unit and formatted time for a card, "N/A" when never seen
fn card_values(state: &DashboardState, sensor: &SensorConfig, offset: &FixedOffset) -> (String, String) {
    match state.latest.get(&sensor.id) {
        Some(row) => (
            format!("{}{}", display::format_value(row.value(), Some(sensor)), sensor.unit),
            display::format_timestamp(row.timestamp(), offset),
        ),
        None => ("N/A".to_string(), "N/A".to_string()),
    }
}

// ==============================================================================
// html
// ==============================================================================

pub fn render_html(state: &DashboardState, config: &HostConfig, offset: &FixedOffset) -> String {
    let mut html = String::new();
    let refresh = config.poll_interval().as_secs();

    html.push_str(&format!(
        r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<meta http-equiv="refresh" content="{refresh}">
<title>Dashboard de Sensores</title>
<style>
body {{ font-family: system-ui; background: #1A202C; color: #E2E8F0; padding: 1.5rem; }}
.cards {{ display: flex; gap: 1rem; flex-wrap: wrap; }}
.card {{ background: #2D3748; border-radius: 0.75rem; padding: 1rem 1.5rem; min-width: 12rem; }}
.card.main .value {{ font-size: 4rem; font-weight: 800; color: #4FD1C5; }}
.card .value {{ font-size: 1.5rem; font-weight: 700; }}
.card .meta {{ color: #A0AEC0; font-size: 0.85rem; }}
.charts {{ display: grid; grid-template-columns: 1fr 1fr; gap: 1rem; margin-top: 1.5rem; }}
.chart {{ background: #2D3748; border-radius: 0.75rem; padding: 1rem; }}
.chart h3 {{ color: #4FD1C5; margin: 0 0 0.5rem 0; }}
table {{ border-collapse: collapse; width: 100%; margin-top: 1.5rem; }}
td, th {{ border-bottom: 1px solid #4A5568; padding: 0.25rem 0.5rem; text-align: left; }}
.warning {{ background: #744210; padding: 0.75rem; border-radius: 0.5rem; }}
</style>
</head>
<body>
"#
    ));

    if let Some(warning) = &state.warning {
        html.push_str(&format!("<p class=\"warning\">⚠ {}</p>\n", html_escape(warning)));
    }

    // cards: main sensor first, the rest after it
    html.push_str(r#"<div class="cards">"#);
    let main = config.sensor(&config.display.main_sensor);
    for sensor in main.into_iter().chain(config.sensors.iter().filter(|s| Some(*s) != main)) {
        let (value, when) = card_values(state, sensor, offset);
        let class = if Some(sensor) == main { "card main" } else { "card" };
        html.push_str(&format!(
            r#"<div class="{class}"><div class="meta">{label}</div><div class="value">{value}</div><div class="meta">Última leitura: {when}</div><div class="meta">Sensor ID: {id}</div></div>"#,
            label = html_escape(&sensor.label),
            value = html_escape(&value),
            when = html_escape(&when),
            id = html_escape(&sensor.id),
        ));
    }
    html.push_str("</div>\n");

    // charts
    if state.history.is_empty() {
        html.push_str("<p>Aguardando dados históricos no banco de dados para gerar os gráficos.</p>\n");
    } else {
        html.push_str(r#"<div class="charts">"#);
        for sensor in &config.sensors {
            html.push_str(&render_chart(state, sensor));
        }
        html.push_str("</div>\n");
    }

    // raw data
    html.push_str(&format!(
        "<h2>Últimas {} Leituras</h2>\n<table><tr><th>sensorId</th><th>value</th><th>timestamp</th></tr>\n",
        state.history.len()
    ));
    for row in &state.history {
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            html_escape(row.sensor_id()),
            row.value(),
            html_escape(&row.local_time)
        ));
    }
    html.push_str("</table>\n</body>\n</html>\n");
    html
}

/// one svg polyline for a sensor's history, scaled to its configured range
fn render_chart(state: &DashboardState, sensor: &SensorConfig) -> String {
    let points = state.series(&sensor.id);
    let (lo, hi) = match sensor.kind {
        SensorKind::Motion => (-0.1, 1.1),
        _ => (sensor.min, sensor.max),
    };
    let span = if hi > lo { hi - lo } else { 1.0 };
    let step = if points.len() > 1 { CHART_WIDTH / (points.len() - 1) as f64 } else { 0.0 };

    let coords: Vec<String> = points
        .iter()
        .enumerate()
        .map(|(i, (_, v))| {
            let y = CHART_HEIGHT - ((v - lo) / span).clamp(0.0, 1.0) * CHART_HEIGHT;
            format!("{:.1},{:.1}", i as f64 * step, y)
        })
        .collect();

    let axis = match sensor.kind {
        SensorKind::Motion => format!(
            r##"<text x="2" y="12" fill="#A0AEC0" font-size="10">{}</text><text x="2" y="{}" fill="#A0AEC0" font-size="10">{}</text>"##,
            display::MOTION_DETECTED,
            CHART_HEIGHT - 2.0,
            display::MOTION_ABSENT
        ),
        _ => String::new(),
    };

    format!(
        r##"<div class="chart"><h3>{label} ({unit})</h3><svg viewBox="0 0 {w} {h}" width="100%" height="{h}">{axis}<polyline fill="none" stroke="#4FD1C5" stroke-width="2" points="{points}"/></svg></div>"##,
        label = html_escape(&sensor.label),
        unit = html_escape(&sensor.unit),
        w = CHART_WIDTH,
        h = CHART_HEIGHT,
        points = coords.join(" "),
    )
}

/// escape html special characters to prevent xss
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

// ==============================================================================
// terminal
// ==============================================================================

pub fn render_text(state: &DashboardState, config: &HostConfig, offset: &FixedOffset) -> String {
    let mut out = String::new();
    out.push_str("────────────────────────────────────────────────────────────\n");
    for sensor in &config.sensors {
        let (value, when) = card_values(state, sensor, offset);
        let marker = if sensor.id == config.display.main_sensor { "*" } else { " " };
        out.push_str(&format!("{} {:<14} {:>12}   {} [{}]\n", marker, sensor.label, value, when, sensor.id));
    }
    out.push_str(&format!("  {} rows in window\n", state.history.len()));
    if let Some(warning) = &state.warning {
        out.push_str(&format!("  ⚠ {}\n", warning));
    }
    out
}

/// poll the query service and print the text view until shutdown
pub async fn run_terminal(
    query: QueryService,
    config: HostConfig,
    offset: FixedOffset,
    mut shutdown: watch::Receiver<bool>,
) {
    let interval = config.poll_interval();
    let limit = config.history_limit();
    let mut state = DashboardState::default();
    tracing::info!("[DASHBOARD] Polling every {}s (history {} rows/sensor)", interval.as_secs(), limit);

    loop {
        state.refresh(query.window_async(limit).await);
        println!("{}", render_text(&state, &config, &offset));

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown::wait(&mut shutdown) => break,
        }
    }

    tracing::info!("[DASHBOARD] Stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_offset;
    use crate::domain::{Reading, StoredReading};

    fn row(id: i64, sensor: &str, value: f64, ts: &str) -> WindowRow {
        WindowRow {
            stored: StoredReading {
                id,
                reading: Reading { sensor_id: sensor.into(), kind: None, value, timestamp: ts.into() },
            },
            local_time: ts.into(),
        }
    }

    fn window(rows: Vec<WindowRow>) -> Window {
        let latest_by_sensor = crate::query::latest_per_sensor(&rows);
        Window { rows, latest_by_sensor, warning: None }
    }

    #[test]
    fn latest_survives_a_window_without_the_sensor() {
        let mut state = DashboardState::default();
        state.refresh(window(vec![row(1, "T010", 22.0, "2025-01-18T14:00:00Z")]));
        state.refresh(window(vec![row(2, "H020", 50.0, "2025-01-18T14:00:05Z")]));

        assert_eq!(state.latest["T010"].value(), 22.0);
        assert_eq!(state.history.len(), 1);
        assert!(state.refreshed_at.is_some());
    }

    #[test]
    fn text_view_formats_cards() {
        let config = HostConfig::default();
        let offset = parse_offset("-03:00").unwrap();
        let mut state = DashboardState::default();
        state.refresh(window(vec![
            row(1, "T010", 23.456, "2025-01-18T14:32:55Z"),
            row(2, "M040", 1.0, "2025-01-18T14:32:55Z"),
        ]));

        let text = render_text(&state, &config, &offset);
        assert!(text.contains("23.5°C"));
        assert!(text.contains("Detectado"));
        assert!(text.contains("18/01/2025 11:32:55"));
        // never-seen sensors
        assert!(text.contains("N/A"));
    }

    #[test]
    fn html_has_cards_charts_and_table() {
        let config = HostConfig::default();
        let offset = parse_offset("Z").unwrap();
        let mut state = DashboardState::default();
        state.refresh(window(vec![
            row(3, "L030", 700.0, "2025-01-18T14:00:02Z"),
            row(2, "L030", 500.0, "2025-01-18T14:00:01Z"),
            row(1, "<script>", 1.0, "2025-01-18T14:00:00Z"),
        ]));

        let html = render_html(&state, &config, &offset);
        assert!(html.contains(r#"content="3""#));
        assert!(html.contains("Luminosidade"));
        assert!(html.contains("700lux"));
        assert!(html.contains("<polyline"));
        assert!(html.contains("Últimas 3 Leituras"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<td><script>"));
    }

    #[test]
    fn warning_shows_in_both_views() {
        let config = HostConfig::default();
        let offset = parse_offset("Z").unwrap();
        let mut state = DashboardState::default();
        state.refresh(Window { warning: Some("table <missing>".into()), ..Window::default() });

        let html = render_html(&state, &config, &offset);
        assert!(html.contains("<p class=\"warning\">⚠ table &lt;missing&gt;</p>\n"));
        let text = render_text(&state, &config, &offset);
        assert!(text.ends_with("  ⚠ table <missing>\n"));
        assert_eq!(text.lines().filter(|l| l.contains("N/A")).count(), config.sensors.len());
    }

    #[test]
    fn empty_state_asks_to_wait() {
        let config = HostConfig::default();
        let html = render_html(&DashboardState::default(), &config, &parse_offset("Z").unwrap());
        assert!(html.contains("Aguardando dados"));
    }

    #[test]
    fn series_is_chronological() {
        let mut state = DashboardState::default();
        state.refresh(window(vec![
            row(1, "T010", 2.0, "2025-01-18T14:00:02Z"),
            row(2, "T010", 1.0, "2025-01-18T14:00:01Z"),
            row(3, "T010", 9.0, "garbage"),
        ]));
        let values: Vec<f64> = state.series("T010").iter().map(|(_, v)| *v).collect();
        assert_eq!(values, [1.0, 2.0]);
    }
}
