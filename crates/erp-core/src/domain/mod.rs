//! # ERP Core - Domain Module
//! 
//! Domain entities for the ERP application.

pub mod attendance;
pub mod audit_log;
pub mod deal;
pub mod employee;
pub mod invoice;
pub mod lead;
pub mod money;
pub mod notification;
pub mod payment;
pub mod product;
pub mod role;
pub mod tenant;
pub mod user;
pub mod webhook;
pub mod website;
pub mod workflow;

// Re-export all entities and enums
pub use attendance::{
    Attendance, AttendanceIntegration, AttendancePunch, AttendanceSource, AttendanceStatus,
    ProviderTransaction, TransactionPage, TransactionQuery,
};
pub use audit_log::AuditLog;
pub use deal::{Deal, DealStage};
pub use employee::Employee;
pub use invoice::{Invoice, InvoiceItem, InvoiceStatus, MAX_ITEM_QUANTITY, MAX_UNIT_PRICE};
pub use lead::{Lead, LeadStatus};
pub use notification::Notification;
pub use payment::{Payment, PaymentMethod};
pub use product::Product;
pub use role::{DefaultRole, Role};
pub use tenant::{SubscriptionPlan, Tenant};
pub use user::User;
pub use webhook::{WebhookDelivery, WebhookEndpoint};
pub use website::{WebsitePage, WebsiteSite};
pub use workflow::{Condition, ConditionOperator, Workflow, WorkflowAction};
