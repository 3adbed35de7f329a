//! Health endpoint probe for the ingest service

use crate::metrics::IngestMetrics;
use crate::registry::SensorRegistry;
use earshot_health_check::{HealthProbe, HealthStatus};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Live view over the registry and counters
pub struct IngestHealthProbe {
    registry: Arc<SensorRegistry>,
    metrics: Arc<IngestMetrics>,
}

impl IngestHealthProbe {
    pub fn new(registry: Arc<SensorRegistry>, metrics: Arc<IngestMetrics>) -> Self {
        Self { registry, metrics }
    }
}

impl HealthProbe for IngestHealthProbe {
    /// Healthy while the broker session is up, degraded while reconnecting
    fn status(&self) -> HealthStatus {
        if self.metrics.snapshot().broker_connected {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        }
    }

    fn metrics(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self.metrics.snapshot())
            .unwrap_or_else(|_| serde_json::json!({}));
        if let Some(map) = value.as_object_mut() {
            map.insert(
                "online_sensors".to_string(),
                serde_json::json!(self.registry.len()),
            );
        }
        value
    }

    fn details(&self) -> BTreeMap<String, String> {
        let sensors = self.registry.sensors();
        let listed = sensors
            .iter()
            .map(|s| s.inner().to_string())
            .collect::<Vec<_>>()
            .join(",");

        BTreeMap::from([
            ("online_sensors".to_string(), sensors.len().to_string()),
            ("sensor_ids".to_string(), listed),
            (
                "queue_capacity".to_string(),
                self.registry.queue_capacity().to_string(),
            ),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::SensorId;

    #[test]
    fn test_probe_reports_registry_and_link_state() {
        let registry = Arc::new(SensorRegistry::new(10));
        let metrics = IngestMetrics::new();
        let probe = IngestHealthProbe::new(Arc::clone(&registry), Arc::clone(&metrics));

        assert_eq!(probe.status(), HealthStatus::Degraded);
        metrics.set_broker_connected(true);
        assert_eq!(probe.status(), HealthStatus::Healthy);

        let _a = registry.register_if_absent(SensorId::new(4));
        let _b = registry.register_if_absent(SensorId::new(2));
        IngestMetrics::incr(&metrics.overload_drops);

        let value = probe.metrics();
        assert_eq!(value["online_sensors"], 2);
        assert_eq!(value["overload_drops"], 1);

        let details = probe.details();
        assert_eq!(details["sensor_ids"], "2,4");
        assert_eq!(details["queue_capacity"], "10");
    }
}
