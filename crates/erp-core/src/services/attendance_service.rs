//! Daily attendance records, raw punches and integration settings

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use erp_shared::{Page, Pagination};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::{found, non_blank};
use crate::authorization::{Ability, ResourcePolicy};
use crate::context::RequestContext;
use crate::domain::{Attendance, AttendanceIntegration, AttendancePunch};
use crate::error::DomainError;
use crate::events::{DomainEvent, EventDispatcher, EventName};
use crate::repositories::{
    AttendanceFilter, AttendanceIntegrationRepository, AttendanceRepository, EmployeeRepository, PunchFilter,
};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateAttendanceInput {
    pub employee_id: Uuid,
    pub work_date: NaiveDate,
    pub check_in: Option<NaiveDateTime>,
    pub check_out: Option<NaiveDateTime>,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateAttendanceInput {
    pub check_in: Option<NaiveDateTime>,
    pub check_out: Option<NaiveDateTime>,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct IntegrationInput {
    #[validate(url)]
    pub base_url: String,
    #[validate(length(min = 1, max = 100))]
    pub username: String,
    /// Keeps the stored password when omitted.
    #[validate(length(min = 1))]
    pub password: Option<String>,
    #[serde(default = "enabled_default")]
    pub enabled: bool,
}

fn enabled_default() -> bool {
    true
}

pub struct AttendanceService {
    attendance: Arc<dyn AttendanceRepository>,
    employees: Arc<dyn EmployeeRepository>,
    integrations: Arc<dyn AttendanceIntegrationRepository>,
    events: EventDispatcher,
}

impl AttendanceService {
    pub fn new(
        attendance: Arc<dyn AttendanceRepository>,
        employees: Arc<dyn EmployeeRepository>,
        integrations: Arc<dyn AttendanceIntegrationRepository>,
        events: EventDispatcher,
    ) -> Self {
        Self {
            attendance,
            employees,
            integrations,
            events,
        }
    }

    pub async fn list(&self, ctx: &RequestContext, filter: AttendanceFilter, pagination: Pagination) -> Result<Page<Attendance>, DomainError> {
        ResourcePolicy::ATTENDANCE.authorize(&ctx.actor, Ability::View, ctx.scope.tenant_id())?;
        self.attendance.list(&ctx.scope, filter, pagination).await
    }

    pub async fn get(&self, ctx: &RequestContext, id: &Uuid) -> Result<Attendance, DomainError> {
        let record = found(self.attendance.find_by_id(&ctx.scope, id).await?, "Attendance", id)?;
        ResourcePolicy::ATTENDANCE.authorize(&ctx.actor, Ability::View, Some(record.tenant_id))?;
        Ok(record)
    }

    pub async fn list_punches(&self, ctx: &RequestContext, filter: PunchFilter, pagination: Pagination) -> Result<Page<AttendancePunch>, DomainError> {
        ResourcePolicy::ATTENDANCE.authorize(&ctx.actor, Ability::View, ctx.scope.tenant_id())?;
        self.attendance.list_punches(&ctx.scope, filter, pagination).await
    }

    /// Manual entry for a day without a record.
    pub async fn create(&self, ctx: &RequestContext, input: CreateAttendanceInput) -> Result<Attendance, DomainError> {
        let tenant_id = ctx.require_tenant()?;
        ResourcePolicy::ATTENDANCE.authorize(&ctx.actor, Ability::Create, Some(tenant_id))?;
        input.validate()?;

        let employee = found(
            self.employees.find_by_id(&ctx.scope, &input.employee_id).await?,
            "Employee",
            &input.employee_id,
        )?;
        if self
            .attendance
            .find_for_day(&tenant_id, &employee.id, input.work_date)
            .await?
            .is_some()
        {
            return Err(DomainError::Conflict(format!(
                "attendance for {} on {} already exists",
                employee.employee_code, input.work_date
            )));
        }

        let record = Attendance::manual(
            tenant_id,
            employee.id,
            input.work_date,
            input.check_in,
            input.check_out,
            non_blank(input.notes),
        )?;
        let record = self.attendance.save(&record).await?;
        info!(employee_id = %employee.id, work_date = %record.work_date, "Manual attendance recorded");
        self.events
            .dispatch(self.event(ctx, EventName::AttendanceCreated, &record).with_new(&record))
            .await;
        Ok(record)
    }

    /// Editing a device record turns it into a manual one, so later syncs keep it.
    pub async fn update(&self, ctx: &RequestContext, id: &Uuid, input: UpdateAttendanceInput) -> Result<Attendance, DomainError> {
        input.validate()?;
        let mut record = found(self.attendance.find_by_id(&ctx.scope, id).await?, "Attendance", id)?;
        ResourcePolicy::ATTENDANCE.authorize(&ctx.actor, Ability::Update, Some(record.tenant_id))?;
        let before = record.clone();

        let check_in = input.check_in.or(record.check_in);
        let check_out = input.check_out.or(record.check_out);
        record.update_manual(check_in, check_out)?;
        if input.notes.is_some() {
            record.notes = non_blank(input.notes);
        }

        let record = self.attendance.save(&record).await?;
        self.events
            .dispatch(self.event(ctx, EventName::AttendanceUpdated, &record).with_old(&before).with_new(&record))
            .await;
        Ok(record)
    }

    pub async fn get_integration(&self, ctx: &RequestContext) -> Result<AttendanceIntegration, DomainError> {
        let tenant_id = ctx.require_tenant()?;
        ResourcePolicy::ATTENDANCE.authorize(&ctx.actor, Ability::View, Some(tenant_id))?;
        found(
            self.integrations.find_by_tenant(&tenant_id).await?,
            "AttendanceIntegration",
            &tenant_id,
        )
    }

    pub async fn save_integration(&self, ctx: &RequestContext, input: IntegrationInput) -> Result<AttendanceIntegration, DomainError> {
        let tenant_id = ctx.require_tenant()?;
        ResourcePolicy::ATTENDANCE.authorize(&ctx.actor, Ability::Update, Some(tenant_id))?;
        input.validate()?;

        let integration = match self.integrations.find_by_tenant(&tenant_id).await? {
            Some(mut existing) => {
                existing.base_url = input.base_url.trim_end_matches('/').to_string();
                existing.username = input.username;
                if let Some(password) = input.password {
                    existing.password = password;
                }
                existing.enabled = input.enabled;
                existing.modified_at = Some(chrono::Utc::now());
                existing
            }
            None => {
                let password = input
                    .password
                    .ok_or_else(|| DomainError::ValidationError("password is required".into()))?;
                let mut integration = AttendanceIntegration::new(tenant_id, input.base_url, input.username, password);
                integration.enabled = input.enabled;
                integration
            }
        };

        let integration = self.integrations.save(&integration).await?;
        info!(tenant_id = %tenant_id, enabled = integration.enabled, "Attendance integration saved");
        Ok(integration)
    }

    fn event(&self, ctx: &RequestContext, name: EventName, record: &Attendance) -> DomainEvent {
        DomainEvent::from_context(ctx, name, Some(record.tenant_id), "Attendance", record.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::Actor;
    use crate::context::RequestMeta;
    use crate::domain::{AttendanceSource, AttendanceStatus, Employee};
    use crate::repositories::{
        MockAttendanceIntegrationRepository, MockAttendanceRepository, MockEmployeeRepository,
    };
    use crate::tenancy::TenantScope;

    fn ctx(tenant_id: Uuid) -> RequestContext {
        RequestContext::new(
            Actor::new(Uuid::new_v4(), Some(tenant_id), false, vec!["hr.attendance.*".into()]),
            TenantScope::Tenant(tenant_id),
            RequestMeta::default(),
        )
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 6).unwrap()
    }

    fn at(h: u32) -> NaiveDateTime {
        day().and_hms_opt(h, 0, 0).unwrap()
    }

    fn service(
        attendance: MockAttendanceRepository,
        employees: MockEmployeeRepository,
        integrations: MockAttendanceIntegrationRepository,
    ) -> AttendanceService {
        AttendanceService::new(Arc::new(attendance), Arc::new(employees), Arc::new(integrations), EventDispatcher::default())
    }

    #[tokio::test]
    async fn test_manual_entry_rejected_when_day_exists() {
        let tenant = Uuid::new_v4();
        let employee = Employee::new(tenant, "1001".into(), "Budi".into(), None).unwrap();
        let employee_id = employee.id;
        let mut employees = MockEmployeeRepository::new();
        employees.expect_find_by_id().returning(move |_, _| Ok(Some(employee.clone())));
        let mut attendance = MockAttendanceRepository::new();
        attendance
            .expect_find_for_day()
            .returning(move |t, e, d| Ok(Some(Attendance::from_punches(*t, *e, d, &[]))));
        attendance.expect_save().never();

        let svc = service(attendance, employees, MockAttendanceIntegrationRepository::new());
        let err = svc
            .create(
                &ctx(tenant),
                CreateAttendanceInput {
                    employee_id,
                    work_date: day(),
                    check_in: Some(at(9)),
                    check_out: Some(at(17)),
                    notes: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_editing_device_record_makes_it_manual() {
        let tenant = Uuid::new_v4();
        let record = Attendance::from_punches(tenant, Uuid::new_v4(), day(), &[]);
        let mut attendance = MockAttendanceRepository::new();
        attendance.expect_find_by_id().returning(move |_, _| Ok(Some(record.clone())));
        attendance.expect_save().returning(|a| Ok(a.clone()));

        let svc = service(attendance, MockEmployeeRepository::new(), MockAttendanceIntegrationRepository::new());
        let updated = svc
            .update(
                &ctx(tenant),
                &Uuid::new_v4(),
                UpdateAttendanceInput {
                    check_in: Some(at(8)),
                    check_out: Some(at(16)),
                    notes: Some("forgot badge".into()),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.source, AttendanceSource::Manual);
        assert_eq!(updated.status, AttendanceStatus::Present);
        assert_eq!(updated.worked_minutes, 480);
    }

    #[tokio::test]
    async fn test_new_integration_requires_password() {
        let tenant = Uuid::new_v4();
        let mut integrations = MockAttendanceIntegrationRepository::new();
        integrations.expect_find_by_tenant().returning(|_| Ok(None));
        integrations.expect_save().never();

        let svc = service(MockAttendanceRepository::new(), MockEmployeeRepository::new(), integrations);
        let err = svc
            .save_integration(
                &ctx(tenant),
                IntegrationInput {
                    base_url: "http://zk.local:8081".into(),
                    username: "admin".into(),
                    password: None,
                    enabled: true,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_update_integration_keeps_password_and_cursor() {
        let tenant = Uuid::new_v4();
        let mut existing = AttendanceIntegration::new(tenant, "http://old".into(), "admin".into(), "secret".into());
        let synced = chrono::Utc::now();
        existing.record_success(synced);
        let mut integrations = MockAttendanceIntegrationRepository::new();
        integrations.expect_find_by_tenant().returning(move |_| Ok(Some(existing.clone())));
        integrations.expect_save().returning(|i| Ok(i.clone()));

        let svc = service(MockAttendanceRepository::new(), MockEmployeeRepository::new(), integrations);
        let saved = svc
            .save_integration(
                &ctx(tenant),
                IntegrationInput {
                    base_url: "http://zk.local:8081/".into(),
                    username: "hr".into(),
                    password: None,
                    enabled: false,
                },
            )
            .await
            .unwrap();

        assert_eq!(saved.base_url, "http://zk.local:8081");
        assert_eq!(saved.password, "secret");
        assert_eq!(saved.last_synced_at, Some(synced));
        assert!(!saved.enabled);
    }
}
