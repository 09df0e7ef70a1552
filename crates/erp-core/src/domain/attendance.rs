// ============================================================================
// ERP Core - Attendance Entities
// File: crates/erp-core/src/domain/attendance.rs
// Description: Raw device punches, daily attendance and provider settings
// ============================================================================

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Device punch state for a check-in.
pub const PUNCH_STATE_CHECK_IN: &str = "0";
/// Device punch state for a check-out.
pub const PUNCH_STATE_CHECK_OUT: &str = "1";

/// Raw transaction as stored after sync. Unique by `(tenant_id, external_id)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttendancePunch {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub employee_id: Uuid,
    pub employee_code: String,
    pub external_id: i64,
    pub punch_time: NaiveDateTime,
    pub punch_state: String,
    pub verify_type: Option<i32>,
    pub terminal_sn: Option<String>,
    pub synced_at: DateTime<Utc>,
}

impl AttendancePunch {
    pub fn from_transaction(tenant_id: Uuid, employee_id: Uuid, tx: &ProviderTransaction) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            employee_id,
            employee_code: tx.emp_code.clone(),
            external_id: tx.id,
            punch_time: tx.punch_time,
            punch_state: tx.punch_state.clone(),
            verify_type: tx.verify_type,
            terminal_sn: tx.terminal_sn.clone(),
            synced_at: Utc::now(),
        }
    }

    pub fn work_date(&self) -> NaiveDate {
        self.punch_time.date()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Incomplete,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Incomplete => "incomplete",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "present" => Some(AttendanceStatus::Present),
            "incomplete" => Some(AttendanceStatus::Incomplete),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceSource {
    Device,
    Manual,
}

impl AttendanceSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceSource::Device => "device",
            AttendanceSource::Manual => "manual",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "device" => Some(AttendanceSource::Device),
            "manual" => Some(AttendanceSource::Manual),
            _ => None,
        }
    }
}

/// One record per employee and work date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attendance {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub employee_id: Uuid,
    pub work_date: NaiveDate,
    pub check_in: Option<NaiveDateTime>,
    pub check_out: Option<NaiveDateTime>,
    pub worked_minutes: i32,
    pub status: AttendanceStatus,
    pub source: AttendanceSource,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: Option<DateTime<Utc>>,
}

impl Attendance {
    fn blank(tenant_id: Uuid, employee_id: Uuid, work_date: NaiveDate, source: AttendanceSource) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            employee_id,
            work_date,
            check_in: None,
            check_out: None,
            worked_minutes: 0,
            status: AttendanceStatus::Incomplete,
            source,
            notes: None,
            created_at: Utc::now(),
            modified_at: None,
        }
    }

    /// Builds a device record from the punches of one day.
    pub fn from_punches(
        tenant_id: Uuid,
        employee_id: Uuid,
        work_date: NaiveDate,
        punches: &[AttendancePunch],
    ) -> Self {
        let mut attendance = Self::blank(tenant_id, employee_id, work_date, AttendanceSource::Device);
        attendance.apply_punches(punches);
        attendance
    }

    /// Check-in is the earliest `0` punch (else the earliest punch). Check-out is
    /// the latest `1` punch, else the latest punch when there is more than one.
    pub fn apply_punches(&mut self, punches: &[AttendancePunch]) {
        let mut sorted: Vec<&AttendancePunch> = punches.iter().collect();
        sorted.sort_by_key(|p| p.punch_time);

        let check_in = sorted
            .iter()
            .find(|p| p.punch_state == PUNCH_STATE_CHECK_IN)
            .or_else(|| sorted.first())
            .map(|p| p.punch_time);

        let check_out = sorted
            .iter()
            .rev()
            .find(|p| p.punch_state == PUNCH_STATE_CHECK_OUT)
            .map(|p| p.punch_time)
            .or_else(|| {
                if sorted.len() > 1 {
                    sorted.last().map(|p| p.punch_time)
                } else {
                    None
                }
            })
            .filter(|out| check_in.map_or(true, |inn| *out > inn));

        self.set_times(check_in, check_out);
        self.modified_at = Some(Utc::now());
    }

    pub fn manual(
        tenant_id: Uuid,
        employee_id: Uuid,
        work_date: NaiveDate,
        check_in: Option<NaiveDateTime>,
        check_out: Option<NaiveDateTime>,
        notes: Option<String>,
    ) -> Result<Self, DomainError> {
        let mut attendance = Self::blank(tenant_id, employee_id, work_date, AttendanceSource::Manual);
        attendance.notes = notes;
        attendance.update_manual(check_in, check_out)?;
        Ok(attendance)
    }

    /// Manual edit. Marks the record manual so sync leaves it alone.
    pub fn update_manual(
        &mut self,
        check_in: Option<NaiveDateTime>,
        check_out: Option<NaiveDateTime>,
    ) -> Result<(), DomainError> {
        if let (Some(inn), Some(out)) = (check_in, check_out) {
            if out <= inn {
                return Err(DomainError::ValidationError("check_out must be after check_in".into()));
            }
        }
        self.source = AttendanceSource::Manual;
        self.set_times(check_in, check_out);
        self.modified_at = Some(Utc::now());
        Ok(())
    }

    pub fn is_manual(&self) -> bool {
        self.source == AttendanceSource::Manual
    }

    fn set_times(&mut self, check_in: Option<NaiveDateTime>, check_out: Option<NaiveDateTime>) {
        self.check_in = check_in;
        self.check_out = check_out;
        match (check_in, check_out) {
            (Some(inn), Some(out)) => {
                self.worked_minutes = (out - inn).num_minutes().max(0) as i32;
                self.status = AttendanceStatus::Present;
            }
            _ => {
                self.worked_minutes = 0;
                self.status = AttendanceStatus::Incomplete;
            }
        }
    }
}

/// Per-tenant connection settings for the attendance device server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceIntegration {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub provider: String,
    pub base_url: String,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password: String,
    pub enabled: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub last_status: Option<String>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: Option<DateTime<Utc>>,
}

impl AttendanceIntegration {
    pub const PROVIDER_ZKBIOTIME: &'static str = "zkbiotime";

    pub fn new(tenant_id: Uuid, base_url: String, username: String, password: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            provider: Self::PROVIDER_ZKBIOTIME.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            username,
            password,
            enabled: true,
            last_synced_at: None,
            last_status: None,
            last_error: None,
            created_at: Utc::now(),
            modified_at: None,
        }
    }

    pub fn record_success(&mut self, synced_until: DateTime<Utc>) {
        self.last_synced_at = Some(synced_until);
        self.last_status = Some("success".to_string());
        self.last_error = None;
        self.modified_at = Some(Utc::now());
    }

    /// `last_synced_at` stays where it was so the next run retries the window.
    pub fn record_failure(&mut self, error: &str) {
        self.last_status = Some("failed".to_string());
        self.last_error = Some(error.to_string());
        self.modified_at = Some(Utc::now());
    }
}

/// A transaction as reported by the device server.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderTransaction {
    pub id: i64,
    pub emp_code: String,
    pub punch_time: NaiveDateTime,
    pub punch_state: String,
    pub verify_type: Option<i32>,
    pub terminal_sn: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TransactionPage {
    pub count: i64,
    pub has_next: bool,
    pub transactions: Vec<ProviderTransaction>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransactionQuery {
    pub page: u32,
    pub page_size: u32,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
}
