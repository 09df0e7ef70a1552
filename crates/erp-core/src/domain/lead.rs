// ============================================================================
// ERP Core - Lead Entity
// File: crates/erp-core/src/domain/lead.rs
// Description: CRM lead with status lifecycle and conversion
// ============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    #[default]
    New,
    Contacted,
    Qualified,
    Unqualified,
    Converted,
}

impl LeadStatus {
    pub const ALL: [LeadStatus; 5] = [
        LeadStatus::New,
        LeadStatus::Contacted,
        LeadStatus::Qualified,
        LeadStatus::Unqualified,
        LeadStatus::Converted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::New => "new",
            LeadStatus::Contacted => "contacted",
            LeadStatus::Qualified => "qualified",
            LeadStatus::Unqualified => "unqualified",
            LeadStatus::Converted => "converted",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "new" => Some(LeadStatus::New),
            "contacted" => Some(LeadStatus::Contacted),
            "qualified" => Some(LeadStatus::Qualified),
            "unqualified" => Some(LeadStatus::Unqualified),
            "converted" => Some(LeadStatus::Converted),
            _ => None,
        }
    }

    /// Manual status changes. `Converted` is only reachable through conversion.
    pub fn can_transition_to(&self, next: LeadStatus) -> bool {
        use LeadStatus::*;
        if *self == next {
            return true;
        }
        matches!(
            (self, next),
            (New, Contacted)
                | (New, Qualified)
                | (New, Unqualified)
                | (Contacted, Qualified)
                | (Contacted, Unqualified)
                | (Qualified, Unqualified)
                | (Unqualified, Contacted)
        )
    }

    pub fn is_convertible(&self) -> bool {
        matches!(self, LeadStatus::New | LeadStatus::Contacted | LeadStatus::Qualified)
    }
}

impl std::fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Lead {
    pub id: Uuid,
    pub tenant_id: Uuid,

    #[validate(length(min = 1, max = 200))]
    pub name: String,

    #[validate(email)]
    pub email: Option<String>,

    #[validate(length(max = 50))]
    pub phone: Option<String>,

    #[validate(length(max = 200))]
    pub company: Option<String>,

    #[validate(length(max = 100))]
    pub source: Option<String>,

    pub status: LeadStatus,
    pub owner_id: Option<Uuid>,

    #[validate(range(min = 0))]
    pub estimated_value: i64,

    pub notes: Option<String>,
    pub converted_deal_id: Option<Uuid>,
    pub converted_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub modified_at: Option<DateTime<Utc>>,
    pub modified_by: Option<Uuid>,
}

impl Lead {
    pub fn new(tenant_id: Uuid, name: String, created_by: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            name: name.trim().to_string(),
            email: None,
            phone: None,
            company: None,
            source: None,
            status: LeadStatus::New,
            owner_id: None,
            estimated_value: 0,
            notes: None,
            converted_deal_id: None,
            converted_at: None,
            created_at: Utc::now(),
            created_by,
            modified_at: None,
            modified_by: None,
        }
    }

    pub fn change_status(&mut self, next: LeadStatus) -> Result<(), DomainError> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::transition("Lead", self.status, next));
        }
        self.status = next;
        Ok(())
    }

    /// Returns true when the owner actually changed.
    pub fn assign(&mut self, owner_id: Option<Uuid>) -> bool {
        if self.owner_id == owner_id {
            return false;
        }
        self.owner_id = owner_id;
        true
    }

    pub fn mark_converted(&mut self, deal_id: Uuid) -> Result<(), DomainError> {
        if !self.status.is_convertible() {
            return Err(DomainError::transition("Lead", self.status, LeadStatus::Converted));
        }
        self.status = LeadStatus::Converted;
        self.converted_deal_id = Some(deal_id);
        self.converted_at = Some(Utc::now());
        Ok(())
    }

    pub fn ensure_editable(&self) -> Result<(), DomainError> {
        if self.status == LeadStatus::Converted {
            return Err(DomainError::Conflict("converted leads cannot be modified".into()));
        }
        Ok(())
    }

    pub fn touch(&mut self, by: Option<Uuid>) {
        self.modified_at = Some(Utc::now());
        self.modified_by = by;
    }

    /// Title used for the deal created on conversion.
    pub fn deal_title(&self) -> String {
        match &self.company {
            Some(company) if !company.trim().is_empty() => company.trim().to_string(),
            _ => self.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        let mut lead = Lead::new(Uuid::new_v4(), "Jane".into(), None);
        assert!(lead.change_status(LeadStatus::Contacted).is_ok());
        assert!(lead.change_status(LeadStatus::New).is_err());
        assert!(lead.change_status(LeadStatus::Converted).is_err());
        assert!(lead.change_status(LeadStatus::Unqualified).is_ok());
        assert!(lead.change_status(LeadStatus::Contacted).is_ok());
    }

    #[test]
    fn test_convert_is_terminal() {
        let mut lead = Lead::new(Uuid::new_v4(), "Jane".into(), None);
        let deal = Uuid::new_v4();
        lead.mark_converted(deal).unwrap();
        assert_eq!(lead.status, LeadStatus::Converted);
        assert_eq!(lead.converted_deal_id, Some(deal));
        assert!(lead.mark_converted(Uuid::new_v4()).is_err());
        assert!(lead.change_status(LeadStatus::Qualified).is_err());
        assert!(lead.ensure_editable().is_err());
    }

    #[test]
    fn test_unqualified_cannot_convert() {
        let mut lead = Lead::new(Uuid::new_v4(), "Jane".into(), None);
        lead.change_status(LeadStatus::Unqualified).unwrap();
        assert!(lead.mark_converted(Uuid::new_v4()).is_err());
    }

    #[test]
    fn test_assign_reports_change() {
        let mut lead = Lead::new(Uuid::new_v4(), "Jane".into(), None);
        let owner = Some(Uuid::new_v4());
        assert!(lead.assign(owner));
        assert!(!lead.assign(owner));
    }

    #[test]
    fn test_deal_title_prefers_company() {
        let mut lead = Lead::new(Uuid::new_v4(), "Jane".into(), None);
        assert_eq!(lead.deal_title(), "Jane");
        lead.company = Some(" Acme ".into());
        assert_eq!(lead.deal_title(), "Acme");
    }
}
