//! Procurement request workflow service

use std::sync::Arc;

use chrono::Utc;
use validator::Validate;

use super::batches::page_window;
use crate::{
    config::WorkflowConfig,
    error::{AppError, AppResult},
    models::{
        activity::NewActivity,
        enums::Urgency,
        request::{CreateRequest, Request, RequestQuery},
        status::{Action, RequestStatus, Signoff, Signoffs},
        user::Actor,
    },
    repository::Repository,
    workflow::rules::MAKERS,
};

#[derive(Clone)]
pub struct RequestService {
    repository: Repository,
    policy: Arc<WorkflowConfig>,
}

impl RequestService {
    pub fn new(repository: Repository, policy: Arc<WorkflowConfig>) -> Self {
        Self { repository, policy }
    }

    /// Create a draft, or a submitted request when `submit` is set
    pub async fn create(&self, actor: &Actor, data: CreateRequest) -> AppResult<Request> {
        data.validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;
        actor.require_any(MAKERS, "create requests")?;

        let now = Utc::now();
        let mut signoffs = Signoffs::default();
        let status = if data.submit {
            signoffs.set(
                Action::Submit,
                Signoff {
                    by: actor.user_id,
                    at: now,
                },
            );
            RequestStatus::Submitted
        } else {
            RequestStatus::Draft
        };

        let draft = Request {
            id: 0,
            reference: String::new(),
            request_type: data.request_type,
            project_id: data.project_id,
            description: data.description,
            quantity: data.quantity,
            unit: data.unit,
            urgency: data.urgency.unwrap_or(Urgency::Normal),
            date_needed: data.date_needed,
            estimated_cost: data.estimated_cost,
            status,
            requested_by: actor.user_id,
            signoffs,
            remarks: None,
            created_at: now,
            updated_at: now,
            loaded_status: status,
        };

        let mut tx = self.repository.begin().await?;
        let request = tx.insert_request(&draft).await?;
        tx.log_activity(&NewActivity {
            user_id: actor.user_id,
            action: "request_created".to_string(),
            description: format!(
                "{} created by user {} as {}",
                request.label(),
                actor.user_id,
                request.status
            ),
            table_name: "requests",
            record_id: request.id,
        })
        .await?;
        tx.commit().await?;

        tracing::info!(reference = %request.reference, status = %request.status, "Request created");
        Ok(request)
    }

    pub async fn get(&self, id: i64) -> AppResult<Request> {
        let mut tx = self.repository.begin().await?;
        tx.load_request(id).await
    }

    pub async fn list(&self, query: &RequestQuery) -> AppResult<Vec<Request>> {
        let (limit, offset) = page_window(query.page, query.per_page, &self.policy);
        self.repository.list_requests(query, limit, offset).await
    }

    pub async fn submit(&self, actor: &Actor, id: i64) -> AppResult<Request> {
        self.transition(actor, id, Action::Submit, None).await
    }

    pub async fn verify(&self, actor: &Actor, id: i64) -> AppResult<Request> {
        self.transition(actor, id, Action::Verify, None).await
    }

    pub async fn approve(&self, actor: &Actor, id: i64) -> AppResult<Request> {
        self.transition(actor, id, Action::Approve, None).await
    }

    pub async fn decline(&self, actor: &Actor, id: i64, reason: String) -> AppResult<Request> {
        if reason.trim().is_empty() {
            return Err(AppError::Validation("A decline reason is required".to_string()));
        }
        self.transition(actor, id, Action::Decline, Some(reason)).await
    }

    pub async fn procure(&self, actor: &Actor, id: i64) -> AppResult<Request> {
        self.transition(actor, id, Action::Procure, None).await
    }

    pub async fn fulfill(&self, actor: &Actor, id: i64) -> AppResult<Request> {
        self.transition(actor, id, Action::Fulfill, None).await
    }

    pub async fn cancel(&self, actor: &Actor, id: i64, reason: Option<String>) -> AppResult<Request> {
        self.transition(actor, id, Action::Cancel, reason).await
    }

    async fn transition(
        &self,
        actor: &Actor,
        id: i64,
        action: Action,
        remarks: Option<String>,
    ) -> AppResult<Request> {
        let result = self.run_transition(actor, id, action, remarks).await;
        if let Err(e) = &result {
            tracing::warn!(
                request_id = id,
                action = %action,
                user_id = actor.user_id,
                "Request transition failed: {}",
                e
            );
        }
        result
    }

    async fn run_transition(
        &self,
        actor: &Actor,
        id: i64,
        action: Action,
        remarks: Option<String>,
    ) -> AppResult<Request> {
        let mut tx = self.repository.begin().await?;
        let mut request = tx.load_request(id).await?;

        request.apply(action, actor, Utc::now(), remarks.clone(), &self.policy)?;
        tx.save_request(&request).await?;

        let mut description = format!(
            "{} {} by user {}",
            request.label(),
            action.past_tense(),
            actor.user_id
        );
        if let Some(remarks) = remarks.as_deref().filter(|r| !r.trim().is_empty()) {
            description.push_str(&format!(": {}", remarks.trim()));
        }
        tx.log_activity(&NewActivity {
            user_id: actor.user_id,
            action: format!("request_{}", action.past_tense()),
            description,
            table_name: "requests",
            record_id: request.id,
        })
        .await?;
        tx.commit().await?;

        tracing::info!(
            reference = %request.reference,
            status = %request.status,
            "Request {}",
            action.past_tense()
        );
        Ok(request)
    }
}
