//! ==============================================================================
//! generator.rs - synthetic sensor producer
//! ==============================================================================
//!
//! purpose:
//!     stands in for real hardware. every cycle it manufactures one reading
//!     per catalogue sensor and hands it to a sink.
//!
//! values:
//!     - motion: bernoulli draw, 1.0 with `motion_probability`, else 0.0
//!     - everything else: uniform over [min, max], rounded to `precision`
//!     the rng is seeded from config, so a given seed always yields the same
//!     sequence of values.
//!
//! sinks:
//!     - Direct: the in-process ingestion gateway
//!     - Push:   POST to a hub's /api/sensor/data (the sensor-node setup)
//!
//! a failed delivery is logged and dropped; the next cycle opens a fresh
//! connection and carries on.
//!
//! ==============================================================================

use crate::config::{GeneratorConfig, GeneratorMode, HostConfig, SensorConfig};
use crate::domain::{Reading, SensorKind};
use crate::ingest::IngestGateway;
use crate::shutdown;

use anyhow::{anyhow, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tokio::sync::watch;

pub struct Generator {
    sensors: Vec<SensorConfig>,
    motion_probability: f64,
    rng: StdRng,
}

impl Generator {
    pub fn new(sensors: Vec<SensorConfig>, seed: u64, motion_probability: f64) -> Self {
        Self {
            sensors,
            motion_probability: motion_probability.clamp(0.0, 1.0),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// catalogue, seed and motion probability from config
    pub fn from_config(config: &HostConfig) -> Self {
        Self::new(
            config.sensors.clone(),
            config.generator.seed,
            config.generator.motion_probability,
        )
    }

    /// draw one value for a sensor
    pub fn sample(&mut self, sensor: &SensorConfig) -> f64 {
        match sensor.kind {
            SensorKind::Motion => {
                if self.rng.gen_bool(self.motion_probability) { 1.0 } else { 0.0 }
            }
            _ => {
                let raw = self.rng.gen_range(sensor.min..=sensor.max);
                round_to(raw, sensor.precision).clamp(sensor.min, sensor.max)
            }
        }
    }

    /// one reading per sensor, all stamped `now`
    pub fn next_batch(&mut self, now: DateTime<Utc>) -> Vec<Reading> {
        let timestamp = now.to_rfc3339_opts(SecondsFormat::Secs, true);
        let sensors = self.sensors.clone();
        sensors
            .iter()
            .map(|s| Reading {
                sensor_id: s.id.clone(),
                kind: Some(s.kind.as_str().to_string()),
                value: self.sample(s),
                timestamp: timestamp.clone(),
            })
            .collect()
    }
}

fn round_to(value: f64, precision: usize) -> f64 {
    let factor = 10f64.powi(precision.min(15) as i32);
    (value * factor).round() / factor
}

/// where generated readings go
pub enum Sink {
    Direct(IngestGateway),
    Push { client: reqwest::Client, url: String },
}

impl Sink {
    pub fn from_config(config: &GeneratorConfig, gateway: IngestGateway) -> Self {
        match config.mode {
            GeneratorMode::Direct => Sink::Direct(gateway),
            GeneratorMode::Push => Sink::Push {
                client: reqwest::Client::new(),
                url: config.hub_url.clone(),
            },
        }
    }

    pub async fn deliver(&self, reading: Reading) -> Result<()> {
        match self {
            Sink::Direct(gateway) => {
                gateway.receive(Some(reading.into())).await?;
                Ok(())
            }
            Sink::Push { client, url } => {
                let resp = client
                    .post(url)
                    .json(&reading)
                    .timeout(Duration::from_secs(5))
                    .send()
                    .await?;
                if !resp.status().is_success() {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    return Err(anyhow!("hub returned {}: {}", status, body));
                }
                Ok(())
            }
        }
    }
}

/// produce a batch every `interval` until shutdown is signalled
///
/// a batch already being delivered is finished before the loop exits.
pub async fn run(
    mut generator: Generator,
    sink: Sink,
    interval: Duration,
    show_data: bool,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::info!("[GENERATOR] Starting ({}s interval)", interval.as_secs());
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown::wait(&mut shutdown) => break,
        }

        for reading in generator.next_batch(Utc::now()) {
            if show_data {
                tracing::info!(
                    "[GENERATOR] {} ({}) = {}",
                    reading.sensor_id,
                    reading.kind.as_deref().unwrap_or("-"),
                    reading.value
                );
            }
            let sensor_id = reading.sensor_id.clone();
            if let Err(e) = sink.deliver(reading).await {
                tracing::warn!("[GENERATOR] ⚠ {} not delivered: {:#}", sensor_id, e);
            }
        }
    }

    tracing::info!("[GENERATOR] Stopped");
}
