//! Prometheus metrics for the reservation ledger.
//!
//! Everything is recorded through the `metrics` facade, so calls are no-ops until a recorder is
//! installed. The server installs a Prometheus recorder via [`get_or_install_prometheus_handle`]
//! when `enable_metrics` is set and renders it at `/metrics`.

pub mod reservations;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use parking_lot::Mutex;

static PROMETHEUS_HANDLE: Mutex<Option<PrometheusHandle>> = parking_lot::const_mutex(None);

/// Install the global Prometheus recorder once and hand out clones of its handle.
///
/// The recorder is process-global, so repeated calls (several test apps, restarts of the router)
/// must share the first installation.
pub fn get_or_install_prometheus_handle() -> anyhow::Result<PrometheusHandle> {
    let mut slot = PROMETHEUS_HANDLE.lock();
    if let Some(handle) = slot.as_ref() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    *slot = Some(handle.clone());
    Ok(handle)
}
