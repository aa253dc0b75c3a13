//! Incident model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{
    batch::Ledger,
    enums::{IncidentSeverity, IncidentType, ItemCondition},
};

/// Incident raised when goods come back in a bad condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Incident {
    pub id: i64,
    pub inventory_item_id: i64,
    pub source: Ledger,
    /// Line id in the source ledger
    pub source_id: i64,
    pub batch_id: Option<i64>,
    pub incident_type: IncidentType,
    pub severity: IncidentSeverity,
    pub quantity: i32,
    pub description: String,
    pub reported_by: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIncident {
    pub inventory_item_id: i64,
    pub source: Ledger,
    pub source_id: i64,
    pub batch_id: Option<i64>,
    pub incident_type: IncidentType,
    pub severity: IncidentSeverity,
    pub quantity: i32,
    pub description: String,
    pub reported_by: i32,
}

impl NewIncident {
    /// Builds the incident for a bad-condition return, `None` for good returns
    pub fn for_return(
        source: Ledger,
        report: &ConditionReport,
        reported_by: i32,
    ) -> Option<Self> {
        let (incident_type, severity) = report.condition.incident()?;
        let description = match &report.notes {
            Some(notes) if !notes.trim().is_empty() => format!(
                "{} returned {} ({} unit(s)): {}",
                source.line_label(),
                report.condition.as_str(),
                report.quantity,
                notes.trim()
            ),
            _ => format!(
                "{} returned {} ({} unit(s))",
                source.line_label(),
                report.condition.as_str(),
                report.quantity
            ),
        };
        Some(Self {
            inventory_item_id: report.inventory_item_id,
            source,
            source_id: report.line_id,
            batch_id: report.batch_id,
            incident_type,
            severity,
            quantity: report.quantity,
            description,
            reported_by,
        })
    }
}

/// Condition observed on one returned line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionReport {
    pub line_id: i64,
    pub batch_id: Option<i64>,
    pub inventory_item_id: i64,
    pub quantity: i32,
    pub condition: ItemCondition,
    pub notes: Option<String>,
}

/// Query parameters for incident listing
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct IncidentQuery {
    pub severity: Option<IncidentSeverity>,
    pub inventory_item_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(condition: ItemCondition) -> ConditionReport {
        ConditionReport {
            line_id: 3,
            batch_id: Some(1),
            inventory_item_id: 9,
            quantity: 2,
            condition,
            notes: Some("cracked housing ".to_string()),
        }
    }

    #[test]
    fn test_good_return_raises_nothing() {
        assert!(NewIncident::for_return(Ledger::BorrowedTools, &report(ItemCondition::Good), 4)
            .is_none());
    }

    #[test]
    fn test_damaged_return_is_major() {
        let incident =
            NewIncident::for_return(Ledger::BorrowedTools, &report(ItemCondition::Damaged), 4)
                .unwrap();
        assert_eq!(incident.severity, IncidentSeverity::Major);
        assert_eq!(incident.incident_type, IncidentType::Damage);
        assert_eq!(incident.source_id, 3);
        assert_eq!(
            incident.description,
            "Borrowed tool returned damaged (2 unit(s)): cracked housing"
        );
    }

    #[test]
    fn test_every_condition_maps_to_its_incident() {
        let expected = [
            (ItemCondition::Good, None),
            (
                ItemCondition::Damaged,
                Some((IncidentType::Damage, IncidentSeverity::Major)),
            ),
            (
                ItemCondition::Lost,
                Some((IncidentType::Lost, IncidentSeverity::Critical)),
            ),
            (
                ItemCondition::MissingParts,
                Some((IncidentType::MissingParts, IncidentSeverity::Minor)),
            ),
            (
                ItemCondition::Other,
                Some((IncidentType::Other, IncidentSeverity::Minor)),
            ),
        ];
        assert_eq!(expected.len(), ItemCondition::ALL.len());

        for condition in ItemCondition::ALL {
            let (_, want) = expected
                .iter()
                .find(|(c, _)| c == condition)
                .unwrap();
            let raised = NewIncident::for_return(Ledger::Withdrawals, &report(*condition), 4)
                .map(|i| (i.incident_type, i.severity));
            assert_eq!(raised, *want, "{:?}", condition);
        }
    }
}
