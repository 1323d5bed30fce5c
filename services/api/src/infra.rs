use leadflow::config::{AppConfig, DialerConfig};
use leadflow::error::AppError;
use leadflow::pipeline::{DispatchSettings, HttpDialerClient, LeadPipeline, MemoryLeadStore};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

pub(crate) type ServicePipeline = LeadPipeline<MemoryLeadStore, HttpDialerClient>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) fn dispatch_settings(config: &DialerConfig) -> DispatchSettings {
    DispatchSettings {
        agent_id: config.agent_id.clone(),
        phone_id: config.phone_id.clone(),
    }
}

/// Wires the pipeline over a fresh in-memory store with the default header mappings seeded.
pub(crate) fn build_pipeline(config: &AppConfig) -> Result<Arc<ServicePipeline>, AppError> {
    let store = Arc::new(MemoryLeadStore::new());
    let dialer = Arc::new(HttpDialerClient::from_config(&config.dialer)?);
    let pipeline = LeadPipeline::new(store, dialer, dispatch_settings(&config.dialer));

    let seeded = pipeline.importer().seed_default_mappings()?;
    info!(seeded, dialer = %config.dialer.endpoint, "lead pipeline initialised");
    Ok(Arc::new(pipeline))
}
