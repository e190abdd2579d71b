//! Host metric sampling and the system monitor's publish loop.
//!
//! Each cycle takes one [`SystemSample`] and publishes every metric as a
//! two-decimal string on its well-known `/msh/system/*` topic. The samples
//! re-enter the pipeline through the ingestor like any external sensor.

use std::time::Duration;

use sysinfo::{Disks, System};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::broker::Broker;

/// Window the CPU counters are diffed over.
const CPU_SAMPLE_WINDOW: Duration = Duration::from_secs(1);

const MB: f64 = 1024.0 * 1024.0;
const GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// One snapshot of host state.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SystemSample {
    /// Utilization percent, averaged over all cores.
    pub cpu_percent: f64,

    /// `total − available`, not the kernel's `used` — the latter counts the
    /// page cache and would read close to 100% on any busy Linux box.
    pub ram_used_mb: f64,

    pub ram_total_mb: f64,

    /// Summed resident memory of the processes matching the configured name
    /// substrings.
    pub app_ram_mb: f64,

    pub disk_used_gb: f64,
    pub disk_total_gb: f64,
}

impl SystemSample {
    /// The fixed topic for each metric, paired with its value.
    pub fn topic_values(&self) -> [(&'static str, f64); 6] {
        [
            ("/msh/system/cpu", self.cpu_percent),
            ("/msh/system/ram_used", self.ram_used_mb),
            ("/msh/system/ram_total", self.ram_total_mb),
            ("/msh/system/app_ram", self.app_ram_mb),
            ("/msh/system/disk_used", self.disk_used_gb),
            ("/msh/system/disk_total", self.disk_total_gb),
        ]
    }
}

/// Take one sample. Blocks for the CPU window (~1 s); call from a blocking
/// task. A metric that cannot be read logs a warning and stays at its zero
/// default so the rest of the cycle survives.
pub fn collect_sample(process_filters: &[String]) -> SystemSample {
    let mut sample = SystemSample::default();

    let mut sys = System::new_all();
    sys.refresh_all();
    std::thread::sleep(CPU_SAMPLE_WINDOW.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL));
    sys.refresh_all();

    let cpus = sys.cpus();
    if cpus.is_empty() {
        warn!("no CPU information available");
    } else {
        let total: f64 = cpus.iter().map(|cpu| f64::from(cpu.cpu_usage())).sum();
        sample.cpu_percent = total / cpus.len() as f64;
    }

    let total = sys.total_memory();
    let available = sys.available_memory();
    if total == 0 {
        warn!("no memory information available");
    } else {
        sample.ram_total_mb = total as f64 / MB;
        sample.ram_used_mb = total.saturating_sub(available) as f64 / MB;
    }

    let mut app_ram: u64 = 0;
    for process in sys.processes().values() {
        let name = process.name().to_string_lossy();
        if process_filters.iter().any(|filter| name.contains(filter)) {
            app_ram += process.memory();
        }
    }
    sample.app_ram_mb = app_ram as f64 / MB;

    let disks = Disks::new_with_refreshed_list();
    let root = disks
        .iter()
        .find(|disk| disk.mount_point() == std::path::Path::new("/"));
    match root {
        Some(disk) => {
            sample.disk_total_gb = disk.total_space() as f64 / GB;
            sample.disk_used_gb =
                disk.total_space().saturating_sub(disk.available_space()) as f64 / GB;
        }
        None => warn!("no root filesystem in disk list"),
    }

    sample
}

/// The system monitor's single main-loop task.
pub struct Monitor {
    broker: Broker,
    interval: Duration,
    process_filters: Vec<String>,
}

impl Monitor {
    pub fn new(broker: Broker, interval: Duration, process_filters: Vec<String>) -> Self {
        Self {
            broker,
            interval,
            process_filters,
        }
    }

    /// Sample and publish until `token` is cancelled.
    ///
    /// The first interval tick completes immediately, so the first sample
    /// goes out at startup instead of one full period later.
    pub async fn run(self, token: CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "system monitor running");

        let mut ticker = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    info!("system monitor stopping");
                    break;
                }
                _ = ticker.tick() => self.sample_and_publish().await,
            }
        }
    }

    async fn sample_and_publish(&self) {
        let filters = self.process_filters.clone();

        // collect_sample sleeps for the CPU window
        let sample = match tokio::task::spawn_blocking(move || collect_sample(&filters)).await {
            Ok(sample) => sample,
            Err(e) => {
                error!("sampling task panicked: {e}");
                return;
            }
        };

        debug!(?sample, "host sample collected");

        for (topic, value) in sample.topic_values() {
            let payload = format!("{value:.2}");
            if let Err(e) = self.broker.publish(topic, payload.into_bytes()).await {
                error!(topic, "failed to publish metric: {e}");
            }
        }
    }
}
