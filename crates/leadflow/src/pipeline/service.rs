use std::sync::Arc;

use super::dialer::DialerGateway;
use super::engine::WorkflowEngine;
use super::import::LeadImporter;
use super::scheduler::{CallQueueScheduler, DispatchSettings};
use super::store::LeadStore;

/// Service composing the workflow engine, CSV importer and call-queue scheduler over one
/// shared store.
pub struct LeadPipeline<S, D> {
    engine: WorkflowEngine<S>,
    importer: LeadImporter<S>,
    scheduler: CallQueueScheduler<S, D>,
}

impl<S, D> LeadPipeline<S, D>
where
    S: LeadStore + 'static,
    D: DialerGateway + 'static,
{
    pub fn new(store: Arc<S>, dialer: Arc<D>, settings: DispatchSettings) -> Self {
        Self {
            engine: WorkflowEngine::new(Arc::clone(&store)),
            importer: LeadImporter::new(Arc::clone(&store)),
            scheduler: CallQueueScheduler::new(store, dialer, settings),
        }
    }

    pub fn engine(&self) -> &WorkflowEngine<S> {
        &self.engine
    }

    pub fn importer(&self) -> &LeadImporter<S> {
        &self.importer
    }

    pub fn scheduler(&self) -> &CallQueueScheduler<S, D> {
        &self.scheduler
    }
}
