use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, warn};

use crate::cache::Cache;
use crate::config::Config;
use crate::connection::ConnectionRegistry;
use crate::database::queries;
use crate::race::RaceRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Healthy,
    Degraded,
    Critical,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub name: &'static str,
    pub status: Status,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub overall: Status,
    pub components: Vec<ComponentHealth>,
}

/// Periodic prober for the durable store, cache, process resources, and
/// in-process registries (C11, §4.10). Grounded in shape on the reference
/// server's `watchdog::spawn_watchdog` spawn-plus-interval pattern; the
/// probing logic itself has no direct analog there since that watchdog polls
/// scheduled races, not infrastructure health.
pub struct HealthMonitor {
    db: Option<Arc<PgPool>>,
    cache: Arc<dyn Cache>,
    connections: Arc<ConnectionRegistry>,
    races: Arc<RaceRegistry>,
    config: Arc<Config>,
    last_alerted: Mutex<HashMap<&'static str, Status>>,
}

impl HealthMonitor {
    pub fn new(
        db: Option<Arc<PgPool>>,
        cache: Arc<dyn Cache>,
        connections: Arc<ConnectionRegistry>,
        races: Arc<RaceRegistry>,
        config: Arc<Config>,
    ) -> Self {
        HealthMonitor {
            db,
            cache,
            connections,
            races,
            config,
            last_alerted: Mutex::new(HashMap::new()),
        }
    }

    pub fn spawn(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.config.health_check_interval);
            loop {
                interval.tick().await;
                let report = self.probe().await;
                self.alert_on_transitions(&report);
            }
        });
    }

    pub async fn probe(&self) -> HealthReport {
        let mut components = vec![
            self.probe_database().await,
            self.probe_cache().await,
            self.probe_memory(),
            self.probe_cpu().await,
        ];
        components.push(ComponentHealth {
            name: "connections",
            status: Status::Healthy,
            detail: Some(format!("{} active", self.connections.socket_count())),
        });
        components.push(ComponentHealth {
            name: "races",
            status: Status::Healthy,
            detail: Some(format!("{} active", self.races.list_active().len())),
        });

        let overall = components.iter().map(|c| c.status).max().unwrap_or(Status::Healthy);
        HealthReport { overall, components }
    }

    async fn probe_database(&self) -> ComponentHealth {
        let Some(pool) = &self.db else {
            return ComponentHealth { name: "database", status: Status::Critical, detail: Some("not configured".into()) };
        };
        let started = Instant::now();
        match queries::health_check(pool).await {
            Ok(()) => {
                let elapsed = started.elapsed();
                let status = if elapsed < self.config.db_latency_healthy { Status::Healthy } else { Status::Degraded };
                ComponentHealth { name: "database", status, detail: Some(format!("{}ms", elapsed.as_millis())) }
            }
            Err(err) => ComponentHealth { name: "database", status: Status::Critical, detail: Some(err.to_string()) },
        }
    }

    async fn probe_cache(&self) -> ComponentHealth {
        match self.cache.ping().await {
            Ok(()) => ComponentHealth { name: "cache", status: Status::Healthy, detail: None },
            Err(err) => ComponentHealth { name: "cache", status: Status::Degraded, detail: Some(err) },
        }
    }

    fn probe_memory(&self) -> ComponentHealth {
        let pct = read_memory_used_pct();
        let status = classify(pct, self.config.memory_warn_pct, self.config.memory_crit_pct);
        ComponentHealth { name: "memory", status, detail: Some(format!("{pct:.1}%")) }
    }

    async fn probe_cpu(&self) -> ComponentHealth {
        let pct = read_cpu_used_pct().await;
        let status = classify(pct, self.config.cpu_warn_pct, self.config.cpu_crit_pct);
        ComponentHealth { name: "cpu", status, detail: Some(format!("{pct:.1}%")) }
    }

    /// One alert per `(component, status)` transition; auto-resolves silently
    /// when a component returns to `healthy` (§4.10).
    fn alert_on_transitions(&self, report: &HealthReport) {
        let mut last = self.last_alerted.lock();
        for component in &report.components {
            let changed = last.get(component.name) != Some(&component.status);
            if changed {
                match component.status {
                    Status::Healthy => info!(component = component.name, "health probe recovered"),
                    Status::Degraded => warn!(component = component.name, detail = ?component.detail, "health probe degraded"),
                    Status::Critical => warn!(component = component.name, detail = ?component.detail, "health probe critical"),
                }
                last.insert(component.name, component.status);
            }
        }
    }
}

fn classify(pct: f32, warn_pct: f32, crit_pct: f32) -> Status {
    if pct >= crit_pct {
        Status::Critical
    } else if pct >= warn_pct {
        Status::Degraded
    } else {
        Status::Healthy
    }
}

/// Approximates process heap usage as a percentage of an assumed container
/// limit by reading `/proc/self/status`; returns 0.0 where unavailable
/// (non-Linux), which reads as healthy rather than blocking startup.
fn read_memory_used_pct() -> f32 {
    const ASSUMED_LIMIT_KB: f32 = 1_048_576.0; // 1 GiB default container budget
    std::fs::read_to_string("/proc/self/status")
        .ok()
        .and_then(|contents| {
            contents.lines().find_map(|line| {
                line.strip_prefix("VmRSS:").map(|rest| {
                    rest.trim().trim_end_matches(" kB").trim().parse::<f32>().unwrap_or(0.0)
                })
            })
        })
        .map(|rss_kb| (rss_kb / ASSUMED_LIMIT_KB) * 100.0)
        .unwrap_or(0.0)
}

/// 100ms-sampled CPU usage from `/proc/self/stat`; returns 0.0 where
/// unavailable.
async fn read_cpu_used_pct() -> f32 {
    let Some(before) = read_proc_cpu_ticks() else { return 0.0 };
    tokio::time::sleep(Duration::from_millis(100)).await;
    let Some(after) = read_proc_cpu_ticks() else { return 0.0 };
    let ticks_per_sec = 100.0; // typical Linux USER_HZ
    let delta_ticks = (after - before) as f32;
    let elapsed_secs = 0.1;
    (delta_ticks / ticks_per_sec / elapsed_secs) * 100.0
}

fn read_proc_cpu_ticks() -> Option<u64> {
    let contents = std::fs::read_to_string("/proc/self/stat").ok()?;
    let fields: Vec<&str> = contents.rsplit(')').next()?.split_whitespace().collect();
    let utime: u64 = fields.get(11)?.parse().ok()?;
    let stime: u64 = fields.get(12)?.parse().ok()?;
    Some(utime + stime)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::NullCache;
    use crate::models::{CarCatalog, TrackCatalog};
    use crate::race::RaceRegistry;
    use crate::recovery::RecoveryCoordinator;
    use crate::snapshot::SnapshotStore;

    fn test_monitor() -> HealthMonitor {
        let config = Arc::new(Config::from_env());
        let cars = Arc::new(CarCatalog::default());
        let tracks = Arc::new(TrackCatalog::default());
        let connections = Arc::new(ConnectionRegistry::new());
        let broadcast = Arc::new(crate::broadcast::BroadcastDispatcher::new(connections.clone()));
        let cache: Arc<dyn Cache> = Arc::new(NullCache);
        let snapshots = Arc::new(SnapshotStore::new(config.max_snapshots_per_race, config.snapshot_period, cache.clone()));
        let recovery = Arc::new(RecoveryCoordinator::new(snapshots.clone(), None));
        let races = RaceRegistry::new(cars, tracks, config.clone(), broadcast, snapshots, recovery, None);
        HealthMonitor::new(None, cache, connections, races, config)
    }

    #[test]
    fn classify_respects_warn_and_critical_thresholds() {
        assert_eq!(classify(10.0, 75.0, 90.0), Status::Healthy);
        assert_eq!(classify(80.0, 75.0, 90.0), Status::Degraded);
        assert_eq!(classify(95.0, 75.0, 90.0), Status::Critical);
    }

    #[test]
    fn status_ordering_treats_critical_as_most_severe() {
        assert!(Status::Critical > Status::Degraded);
        assert!(Status::Degraded > Status::Healthy);
    }

    #[tokio::test]
    async fn probe_without_a_database_reports_it_critical_but_reports_overall() {
        let monitor = test_monitor();
        let report = monitor.probe().await;
        let database = report.components.iter().find(|c| c.name == "database").unwrap();
        assert_eq!(database.status, Status::Critical);
        assert_eq!(report.overall, Status::Critical);
    }

    #[tokio::test]
    async fn probe_reports_connection_and_race_counts() {
        let monitor = test_monitor();
        let report = monitor.probe().await;
        let connections = report.components.iter().find(|c| c.name == "connections").unwrap();
        assert_eq!(connections.detail.as_deref(), Some("0 active"));
    }

    #[test]
    fn alert_on_transitions_only_logs_once_per_steady_state() {
        let monitor = test_monitor();
        let report = HealthReport {
            overall: Status::Degraded,
            components: vec![ComponentHealth { name: "cache", status: Status::Degraded, detail: None }],
        };
        monitor.alert_on_transitions(&report);
        assert_eq!(monitor.last_alerted.lock().get("cache"), Some(&Status::Degraded));
        monitor.alert_on_transitions(&report);
        assert_eq!(monitor.last_alerted.lock().len(), 1);
    }

    #[test]
    fn read_memory_used_pct_never_panics() {
        let pct = read_memory_used_pct();
        assert!(pct >= 0.0);
    }
}
