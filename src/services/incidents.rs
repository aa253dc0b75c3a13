//! Incident read side

use crate::{
    error::AppResult,
    models::incident::{Incident, IncidentQuery},
    repository::Repository,
};

#[derive(Clone)]
pub struct IncidentService {
    repository: Repository,
}

impl IncidentService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn list(&self, query: &IncidentQuery) -> AppResult<Vec<Incident>> {
        self.repository.list_incidents(query).await
    }

    pub async fn get(&self, id: i64) -> AppResult<Incident> {
        self.repository.get_incident(id).await
    }
}
