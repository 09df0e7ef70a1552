// ============================================================================
// ERP Core - Deal Entity
// File: crates/erp-core/src/domain/deal.rs
// Description: Sales pipeline deal with stage lifecycle
// ============================================================================

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DealStage {
    #[default]
    Prospecting,
    Qualification,
    Proposal,
    Negotiation,
    Won,
    Lost,
}

impl DealStage {
    pub const OPEN: [DealStage; 4] = [
        DealStage::Prospecting,
        DealStage::Qualification,
        DealStage::Proposal,
        DealStage::Negotiation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DealStage::Prospecting => "prospecting",
            DealStage::Qualification => "qualification",
            DealStage::Proposal => "proposal",
            DealStage::Negotiation => "negotiation",
            DealStage::Won => "won",
            DealStage::Lost => "lost",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "prospecting" => Some(DealStage::Prospecting),
            "qualification" => Some(DealStage::Qualification),
            "proposal" => Some(DealStage::Proposal),
            "negotiation" => Some(DealStage::Negotiation),
            "won" => Some(DealStage::Won),
            "lost" => Some(DealStage::Lost),
            _ => None,
        }
    }

    pub fn default_probability(&self) -> i32 {
        match self {
            DealStage::Prospecting => 10,
            DealStage::Qualification => 20,
            DealStage::Proposal => 50,
            DealStage::Negotiation => 75,
            DealStage::Won => 100,
            DealStage::Lost => 0,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, DealStage::Won | DealStage::Lost)
    }
}

impl std::fmt::Display for DealStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Deal {
    pub id: Uuid,
    pub tenant_id: Uuid,

    #[validate(length(min = 1, max = 200))]
    pub title: String,

    pub lead_id: Option<Uuid>,

    #[validate(length(max = 200))]
    pub contact_name: Option<String>,

    #[validate(email)]
    pub contact_email: Option<String>,

    #[validate(length(max = 200))]
    pub company: Option<String>,

    #[validate(range(min = 0))]
    pub value: i64,

    #[validate(length(equal = 3))]
    pub currency: String,

    pub stage: DealStage,

    #[validate(range(min = 0, max = 100))]
    pub probability: i32,

    pub expected_close_date: Option<NaiveDate>,
    pub owner_id: Option<Uuid>,
    pub lost_reason: Option<String>,
    pub closed_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub modified_at: Option<DateTime<Utc>>,
    pub modified_by: Option<Uuid>,
}

impl Deal {
    pub fn new(tenant_id: Uuid, title: String, currency: String, created_by: Option<Uuid>) -> Self {
        let stage = DealStage::Prospecting;
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            title: title.trim().to_string(),
            lead_id: None,
            contact_name: None,
            contact_email: None,
            company: None,
            value: 0,
            currency: currency.to_uppercase(),
            stage,
            probability: stage.default_probability(),
            expected_close_date: None,
            owner_id: None,
            lost_reason: None,
            closed_at: None,
            created_at: Utc::now(),
            created_by,
            modified_at: None,
            modified_by: None,
        }
    }

    /// Move to another stage. Closed deals are terminal; `Lost` needs a reason.
    pub fn move_to(&mut self, next: DealStage, lost_reason: Option<String>) -> Result<(), DomainError> {
        if self.stage == next {
            return Ok(());
        }
        if self.stage.is_closed() {
            return Err(DomainError::transition("Deal", self.stage, next));
        }
        if next == DealStage::Lost {
            let reason = lost_reason
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .ok_or_else(|| DomainError::ValidationError("lost_reason is required when a deal is lost".into()))?;
            self.lost_reason = Some(reason);
        }
        self.stage = next;
        self.probability = next.default_probability();
        if next.is_closed() {
            self.closed_at = Some(Utc::now());
        }
        Ok(())
    }

    pub fn ensure_open(&self) -> Result<(), DomainError> {
        if self.stage.is_closed() {
            return Err(DomainError::Conflict(format!("deal is already {}", self.stage)));
        }
        Ok(())
    }

    pub fn weighted_value(&self) -> i64 {
        (self.value as i128 * self.probability as i128 / 100) as i64
    }

    pub fn touch(&mut self, by: Option<Uuid>) {
        self.modified_at = Some(Utc::now());
        self.modified_by = by;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deal() -> Deal {
        let mut d = Deal::new(Uuid::new_v4(), "Big deal".into(), "usd".into(), None);
        d.value = 100_000;
        d
    }

    #[test]
    fn test_new_deal_defaults() {
        let d = deal();
        assert_eq!(d.currency, "USD");
        assert_eq!(d.stage, DealStage::Prospecting);
        assert_eq!(d.probability, 10);
    }

    #[test]
    fn test_stage_updates_probability() {
        let mut d = deal();
        d.move_to(DealStage::Negotiation, None).unwrap();
        assert_eq!(d.probability, 75);
        assert_eq!(d.weighted_value(), 75_000);
        assert!(d.closed_at.is_none());
    }

    #[test]
    fn test_won_is_terminal() {
        let mut d = deal();
        d.move_to(DealStage::Won, None).unwrap();
        assert!(d.closed_at.is_some());
        assert_eq!(d.probability, 100);
        assert!(d.move_to(DealStage::Proposal, None).is_err());
        assert!(d.ensure_open().is_err());
    }

    #[test]
    fn test_lost_requires_reason() {
        let mut d = deal();
        assert!(matches!(
            d.move_to(DealStage::Lost, Some("  ".into())),
            Err(DomainError::ValidationError(_))
        ));
        d.move_to(DealStage::Lost, Some("Budget".into())).unwrap();
        assert_eq!(d.lost_reason.as_deref(), Some("Budget"));
        assert_eq!(d.probability, 0);
    }
}
