//! Shared domain enums

text_enum! {
    /// Staff roles taking part in the maker / verifier / authorizer chain
    Role {
        SystemAdmin => "system_admin",
        AssetDirector => "asset_director",
        FinanceDirector => "finance_director",
        ProjectManager => "project_manager",
        ProcurementOfficer => "procurement_officer",
        Warehouseman => "warehouseman",
        SiteInventoryClerk => "site_inventory_clerk",
    }
}

text_enum! {
    /// Condition reported when goods come back to the store
    ItemCondition {
        Good => "good",
        Damaged => "damaged",
        Lost => "lost",
        MissingParts => "missing_parts",
        Other => "other",
    }
}

text_enum! {
    IncidentType {
        Lost => "lost",
        Damage => "damage",
        MissingParts => "missing_parts",
        Other => "other",
    }
}

text_enum! {
    IncidentSeverity {
        Minor => "minor",
        Major => "major",
        Critical => "critical",
    }
}

text_enum! {
    /// Procurement request categories
    RequestType {
        Material => "material",
        Tool => "tool",
        Equipment => "equipment",
        Service => "service",
        PettyCash => "petty_cash",
        Other => "other",
    }
}

text_enum! {
    Urgency {
        Normal => "normal",
        Urgent => "urgent",
        Critical => "critical",
    }
}

impl ItemCondition {
    /// Incident to raise for this return condition, `None` when the goods came back fine
    pub fn incident(&self) -> Option<(IncidentType, IncidentSeverity)> {
        match self {
            ItemCondition::Good => None,
            ItemCondition::Lost => Some((IncidentType::Lost, IncidentSeverity::Critical)),
            ItemCondition::Damaged => Some((IncidentType::Damage, IncidentSeverity::Major)),
            ItemCondition::MissingParts => {
                Some((IncidentType::MissingParts, IncidentSeverity::Minor))
            }
            ItemCondition::Other => Some((IncidentType::Other, IncidentSeverity::Minor)),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Role::SystemAdmin => "System Admin",
            Role::AssetDirector => "Asset Director",
            Role::FinanceDirector => "Finance Director",
            Role::ProjectManager => "Project Manager",
            Role::ProcurementOfficer => "Procurement Officer",
            Role::Warehouseman => "Warehouseman",
            Role::SiteInventoryClerk => "Site Inventory Clerk",
        };
        write!(f, "{}", label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_condition_severity_mapping() {
        assert_eq!(
            ItemCondition::Lost.incident(),
            Some((IncidentType::Lost, IncidentSeverity::Critical))
        );
        assert_eq!(
            ItemCondition::Damaged.incident(),
            Some((IncidentType::Damage, IncidentSeverity::Major))
        );
        assert_eq!(
            ItemCondition::MissingParts.incident().map(|(_, s)| s),
            Some(IncidentSeverity::Minor)
        );
        assert_eq!(
            ItemCondition::Other.incident().map(|(_, s)| s),
            Some(IncidentSeverity::Minor)
        );
        assert_eq!(ItemCondition::Good.incident(), None);
    }

    #[test]
    fn test_text_round_trip_matches_serde() {
        for role in Role::ALL {
            let json = serde_json::to_string(role).unwrap();
            assert_eq!(json, format!("\"{}\"", role.as_str()));
            assert_eq!(Role::from_str(role.as_str()).unwrap(), *role);
        }
        assert!(ItemCondition::from_str("broken").is_err());
    }
}
