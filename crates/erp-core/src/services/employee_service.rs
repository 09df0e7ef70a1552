//! Employees referenced by attendance records

use std::sync::Arc;

use chrono::NaiveDate;
use erp_shared::{Page, Pagination};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::{found, non_blank};
use crate::authorization::{Ability, ResourcePolicy};
use crate::context::RequestContext;
use crate::domain::Employee;
use crate::error::DomainError;
use crate::events::{DomainEvent, EventDispatcher, EventName};
use crate::repositories::{EmployeeFilter, EmployeeRepository, UserRepository};
use crate::tenancy::TenantScope;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateEmployeeInput {
    #[validate(length(min = 1, max = 50))]
    pub employee_code: String,
    #[validate(length(min = 1, max = 200))]
    pub full_name: String,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 100))]
    pub department: Option<String>,
    #[validate(length(max = 100))]
    pub position: Option<String>,
    pub hired_on: Option<NaiveDate>,
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateEmployeeInput {
    #[validate(length(min = 1, max = 50))]
    pub employee_code: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub full_name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 100))]
    pub department: Option<String>,
    #[validate(length(max = 100))]
    pub position: Option<String>,
    pub hired_on: Option<NaiveDate>,
    pub user_id: Option<Uuid>,
    pub is_active: Option<bool>,
}

pub struct EmployeeService {
    employees: Arc<dyn EmployeeRepository>,
    users: Arc<dyn UserRepository>,
    events: EventDispatcher,
}

impl EmployeeService {
    pub fn new(employees: Arc<dyn EmployeeRepository>, users: Arc<dyn UserRepository>, events: EventDispatcher) -> Self {
        Self {
            employees,
            users,
            events,
        }
    }

    pub async fn list(&self, ctx: &RequestContext, filter: EmployeeFilter, pagination: Pagination) -> Result<Page<Employee>, DomainError> {
        ResourcePolicy::EMPLOYEES.authorize(&ctx.actor, Ability::View, ctx.scope.tenant_id())?;
        self.employees.list(&ctx.scope, filter, pagination).await
    }

    pub async fn get(&self, ctx: &RequestContext, id: &Uuid) -> Result<Employee, DomainError> {
        self.load(ctx, id, Ability::View).await
    }

    pub async fn create(&self, ctx: &RequestContext, input: CreateEmployeeInput) -> Result<Employee, DomainError> {
        let tenant_id = ctx.require_tenant()?;
        ResourcePolicy::EMPLOYEES.authorize(&ctx.actor, Ability::Create, Some(tenant_id))?;
        input.validate()?;

        let mut employee = Employee::new(tenant_id, input.employee_code, input.full_name, ctx.actor_id())?;
        employee.email = non_blank(input.email).map(|e| e.to_lowercase());
        employee.department = non_blank(input.department);
        employee.position = non_blank(input.position);
        employee.hired_on = input.hired_on;
        self.ensure_user(tenant_id, input.user_id).await?;
        employee.user_id = input.user_id;
        self.ensure_code_free(&employee).await?;

        let employee = self.employees.create(&employee).await?;
        info!(tenant_id = %tenant_id, code = %employee.employee_code, "Employee created");
        self.events
            .dispatch(self.event(ctx, EventName::EmployeeCreated, &employee).with_new(&employee))
            .await;
        Ok(employee)
    }

    pub async fn update(&self, ctx: &RequestContext, id: &Uuid, input: UpdateEmployeeInput) -> Result<Employee, DomainError> {
        input.validate()?;
        let mut employee = self.load(ctx, id, Ability::Update).await?;
        let before = employee.clone();

        if let Some(code) = non_blank(input.employee_code) {
            employee.employee_code = code;
        }
        if let Some(name) = non_blank(input.full_name) {
            employee.full_name = name;
        }
        if input.email.is_some() {
            employee.email = non_blank(input.email).map(|e| e.to_lowercase());
        }
        if input.department.is_some() {
            employee.department = non_blank(input.department);
        }
        if input.position.is_some() {
            employee.position = non_blank(input.position);
        }
        if input.hired_on.is_some() {
            employee.hired_on = input.hired_on;
        }
        if input.user_id.is_some() {
            self.ensure_user(employee.tenant_id, input.user_id).await?;
            employee.user_id = input.user_id;
        }
        if let Some(active) = input.is_active {
            employee.is_active = active;
        }
        if employee.employee_code != before.employee_code {
            self.ensure_code_free(&employee).await?;
        }
        employee.touch(ctx.actor_id());
        employee.validate()?;

        let employee = self.employees.update(&employee).await?;
        self.events
            .dispatch(self.event(ctx, EventName::EmployeeUpdated, &employee).with_old(&before).with_new(&employee))
            .await;
        Ok(employee)
    }

    pub async fn delete(&self, ctx: &RequestContext, id: &Uuid) -> Result<(), DomainError> {
        let employee = self.load(ctx, id, Ability::Delete).await?;
        self.employees.delete(&employee.id).await?;
        info!(employee_id = %employee.id, "Employee deleted");
        self.events
            .dispatch(self.event(ctx, EventName::EmployeeDeleted, &employee).with_old(&employee))
            .await;
        Ok(())
    }

    async fn ensure_code_free(&self, employee: &Employee) -> Result<(), DomainError> {
        match self
            .employees
            .find_by_code(&employee.tenant_id, &employee.employee_code)
            .await?
        {
            Some(existing) if existing.id != employee.id => Err(DomainError::already_exists(
                "Employee",
                "employee_code",
                employee.employee_code.clone(),
            )),
            _ => Ok(()),
        }
    }

    async fn ensure_user(&self, tenant_id: Uuid, user_id: Option<Uuid>) -> Result<(), DomainError> {
        let Some(user_id) = user_id else {
            return Ok(());
        };
        found(
            self.users.find_by_id(&TenantScope::Tenant(tenant_id), &user_id).await?,
            "User",
            &user_id,
        )
        .map(|_| ())
    }

    async fn load(&self, ctx: &RequestContext, id: &Uuid, ability: Ability) -> Result<Employee, DomainError> {
        let employee = found(self.employees.find_by_id(&ctx.scope, id).await?, "Employee", id)?;
        ResourcePolicy::EMPLOYEES.authorize(&ctx.actor, ability, Some(employee.tenant_id))?;
        Ok(employee)
    }

    fn event(&self, ctx: &RequestContext, name: EventName, employee: &Employee) -> DomainEvent {
        DomainEvent::from_context(ctx, name, Some(employee.tenant_id), "Employee", employee.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::Actor;
    use crate::context::RequestMeta;
    use crate::repositories::{MockEmployeeRepository, MockUserRepository};

    fn ctx(tenant_id: Uuid) -> RequestContext {
        RequestContext::new(
            Actor::new(Uuid::new_v4(), Some(tenant_id), false, vec!["hr.*".into()]),
            TenantScope::Tenant(tenant_id),
            RequestMeta::default(),
        )
    }

    fn input(code: &str) -> CreateEmployeeInput {
        CreateEmployeeInput {
            employee_code: code.into(),
            full_name: "Budi Santoso".into(),
            email: None,
            department: Some("Warehouse".into()),
            position: None,
            hired_on: None,
            user_id: None,
        }
    }

    #[tokio::test]
    async fn test_employee_code_unique_per_tenant() {
        let tenant = Uuid::new_v4();
        let mut employees = MockEmployeeRepository::new();
        employees
            .expect_find_by_code()
            .returning(|t, code| Ok(Some(Employee::new(*t, code.to_string(), "Someone".into(), None).unwrap())));
        employees.expect_create().never();

        let svc = EmployeeService::new(Arc::new(employees), Arc::new(MockUserRepository::new()), EventDispatcher::default());
        let err = svc.create(&ctx(tenant), input("1001")).await.unwrap_err();
        assert!(matches!(err, DomainError::AlreadyExists { field: "employee_code", .. }));
    }

    #[tokio::test]
    async fn test_linked_user_must_be_in_tenant() {
        let tenant = Uuid::new_v4();
        let mut users = MockUserRepository::new();
        users.expect_find_by_id().returning(|_, _| Ok(None));

        let svc = EmployeeService::new(Arc::new(MockEmployeeRepository::new()), Arc::new(users), EventDispatcher::default());
        let mut req = input("1001");
        req.user_id = Some(Uuid::new_v4());
        let err = svc.create(&ctx(tenant), req).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "User", .. }));
    }

    #[tokio::test]
    async fn test_create_employee() {
        let tenant = Uuid::new_v4();
        let mut employees = MockEmployeeRepository::new();
        employees.expect_find_by_code().returning(|_, _| Ok(None));
        employees.expect_create().returning(|e| Ok(e.clone()));

        let svc = EmployeeService::new(Arc::new(employees), Arc::new(MockUserRepository::new()), EventDispatcher::default());
        let employee = svc.create(&ctx(tenant), input(" 1001 ")).await.unwrap();
        assert_eq!(employee.employee_code, "1001");
        assert_eq!(employee.department.as_deref(), Some("Warehouse"));
    }
}
