//! Business logic services

pub mod activity;
pub mod batches;
pub mod incidents;
pub mod inventory;
pub mod requests;

use std::sync::Arc;

use crate::{
    config::WorkflowConfig,
    models::batch::Ledger,
    repository::{IncidentSink, Repository},
};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub inventory: inventory::InventoryService,
    pub borrowed_tools: batches::BatchWorkflowService,
    pub withdrawals: batches::BatchWorkflowService,
    pub requests: requests::RequestService,
    pub incidents: incidents::IncidentService,
    pub activity: activity::ActivityService,
}

impl Services {
    /// Create all services over the given store
    pub fn new(
        repository: Repository,
        incident_sink: Arc<dyn IncidentSink>,
        policy: WorkflowConfig,
    ) -> Self {
        let policy = Arc::new(policy);
        Self {
            inventory: inventory::InventoryService::new(repository.clone()),
            borrowed_tools: batches::BatchWorkflowService::new(
                Ledger::BorrowedTools,
                repository.clone(),
                incident_sink.clone(),
                policy.clone(),
            ),
            withdrawals: batches::BatchWorkflowService::new(
                Ledger::Withdrawals,
                repository.clone(),
                incident_sink,
                policy.clone(),
            ),
            requests: requests::RequestService::new(repository.clone(), policy),
            incidents: incidents::IncidentService::new(repository.clone()),
            activity: activity::ActivityService::new(repository),
        }
    }

    pub fn ledger(&self, ledger: Ledger) -> &batches::BatchWorkflowService {
        match ledger {
            Ledger::BorrowedTools => &self.borrowed_tools,
            Ledger::Withdrawals => &self.withdrawals,
        }
    }
}
