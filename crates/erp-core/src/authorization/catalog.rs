//! Static permission catalog.
//!
//! Keys follow `module.resource.action`. Roles may also grant wildcards:
//! `*`, `module.*` or `module.resource.*`.

use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct PermissionDef {
    pub key: &'static str,
    pub module: &'static str,
    pub description: &'static str,
}

const fn p(key: &'static str, module: &'static str, description: &'static str) -> PermissionDef {
    PermissionDef { key, module, description }
}

pub const PERMISSIONS: &[PermissionDef] = &[
    // core
    p("core.tenants.view", "core", "View tenants"),
    p("core.tenants.create", "core", "Create tenants"),
    p("core.tenants.update", "core", "Update, suspend and activate tenants"),
    p("core.tenants.delete", "core", "Delete tenants"),
    p("core.users.view", "core", "View users"),
    p("core.users.create", "core", "Create users"),
    p("core.users.update", "core", "Update users and their roles"),
    p("core.users.delete", "core", "Delete users"),
    p("core.roles.view", "core", "View roles"),
    p("core.roles.create", "core", "Create roles"),
    p("core.roles.update", "core", "Update roles and permissions"),
    p("core.roles.delete", "core", "Delete roles"),
    p("core.audit.view", "core", "View the audit trail"),
    p("core.webhooks.view", "core", "View webhooks"),
    p("core.webhooks.create", "core", "Create webhooks"),
    p("core.webhooks.update", "core", "Update and test webhooks"),
    p("core.webhooks.delete", "core", "Delete webhooks"),
    p("core.workflows.view", "core", "View workflows"),
    p("core.workflows.create", "core", "Create workflows"),
    p("core.workflows.update", "core", "Update and toggle workflows"),
    p("core.workflows.delete", "core", "Delete workflows"),
    // crm
    p("crm.leads.view", "crm", "View leads"),
    p("crm.leads.create", "crm", "Create leads"),
    p("crm.leads.update", "crm", "Update and assign leads"),
    p("crm.leads.delete", "crm", "Delete leads"),
    p("crm.leads.convert", "crm", "Convert leads to deals"),
    p("crm.deals.view", "crm", "View deals"),
    p("crm.deals.create", "crm", "Create deals"),
    p("crm.deals.update", "crm", "Update deals and move stages"),
    p("crm.deals.delete", "crm", "Delete deals"),
    // sales
    p("sales.products.view", "sales", "View products"),
    p("sales.products.create", "sales", "Create products"),
    p("sales.products.update", "sales", "Update products"),
    p("sales.products.delete", "sales", "Delete products"),
    p("sales.invoices.view", "sales", "View invoices"),
    p("sales.invoices.create", "sales", "Create invoices"),
    p("sales.invoices.update", "sales", "Update draft invoices"),
    p("sales.invoices.delete", "sales", "Delete draft invoices"),
    p("sales.invoices.issue", "sales", "Issue invoices"),
    p("sales.invoices.void", "sales", "Void invoices"),
    p("sales.payments.view", "sales", "View payments"),
    p("sales.payments.create", "sales", "Record payments"),
    p("sales.payments.delete", "sales", "Delete payments"),
    // hr
    p("hr.employees.view", "hr", "View employees"),
    p("hr.employees.create", "hr", "Create employees"),
    p("hr.employees.update", "hr", "Update employees"),
    p("hr.employees.delete", "hr", "Delete employees"),
    p("hr.attendance.view", "hr", "View attendance"),
    p("hr.attendance.create", "hr", "Create manual attendance"),
    p("hr.attendance.update", "hr", "Update attendance and integration settings"),
    p("hr.attendance.sync", "hr", "Trigger attendance device sync"),
    // website
    p("website.sites.view", "website", "View websites"),
    p("website.sites.create", "website", "Create websites"),
    p("website.sites.update", "website", "Update websites"),
    p("website.sites.delete", "website", "Delete websites"),
    p("website.pages.view", "website", "View pages"),
    p("website.pages.create", "website", "Create pages"),
    p("website.pages.update", "website", "Update pages"),
    p("website.pages.delete", "website", "Delete pages"),
    p("website.pages.publish", "website", "Publish and unpublish pages"),
    // reports
    p("reports.view", "reports", "View reports"),
];

/// Permissions only a super admin holds, never granted through wildcards.
pub const SUPER_ADMIN_PREFIX: &str = "core.tenants.";

pub fn is_known(key: &str) -> bool {
    PERMISSIONS.iter().any(|p| p.key == key)
}

/// A grant is valid if it is a catalog key or a wildcard that covers at least one key.
pub fn is_valid_grant(grant: &str) -> bool {
    if grant == "*" {
        return true;
    }
    match grant.strip_suffix(".*") {
        Some(prefix) if !prefix.is_empty() => PERMISSIONS
            .iter()
            .any(|p| p.key.starts_with(prefix) && p.key[prefix.len()..].starts_with('.')),
        Some(_) => false,
        None => is_known(grant),
    }
}

/// Whether `granted` (possibly a wildcard) covers `required`.
pub fn permission_matches(granted: &str, required: &str) -> bool {
    if required.starts_with(SUPER_ADMIN_PREFIX) {
        return granted == required;
    }
    if granted == "*" || granted == required {
        return true;
    }
    match granted.strip_suffix(".*") {
        Some(prefix) => required
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('.')),
        None => false,
    }
}

/// Every catalog key covered by the given grants, used by `/auth/me`.
pub fn expand(grants: &[String]) -> Vec<&'static str> {
    PERMISSIONS
        .iter()
        .filter(|p| grants.iter().any(|g| permission_matches(g, p.key)))
        .map(|p| p.key)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcards() {
        assert!(permission_matches("*", "crm.leads.view"));
        assert!(permission_matches("crm.*", "crm.deals.update"));
        assert!(permission_matches("crm.leads.*", "crm.leads.convert"));
        assert!(!permission_matches("crm.leads.*", "crm.deals.view"));
        assert!(!permission_matches("crm.lead.*", "crm.leads.view"));
        assert!(!permission_matches("sales.*", "crm.leads.view"));
    }

    #[test]
    fn test_tenant_permissions_never_wildcarded() {
        assert!(!permission_matches("*", "core.tenants.create"));
        assert!(!permission_matches("core.*", "core.tenants.view"));
        assert!(permission_matches("core.tenants.view", "core.tenants.view"));
    }

    #[test]
    fn test_valid_grants() {
        assert!(is_valid_grant("*"));
        assert!(is_valid_grant("crm.*"));
        assert!(is_valid_grant("crm.leads.*"));
        assert!(is_valid_grant("core.users.delete"));
        assert!(!is_valid_grant("crm.unknown.*"));
        assert!(!is_valid_grant("core.users.fly"));
        assert!(!is_valid_grant(".*"));
    }

    #[test]
    fn test_expand() {
        let keys = expand(&["crm.leads.*".to_string()]);
        assert_eq!(keys.len(), 5);
        assert!(keys.contains(&"crm.leads.convert"));

        let all = expand(&["*".to_string()]);
        assert!(!all.iter().any(|k| k.starts_with(SUPER_ADMIN_PREFIX)));
    }

    #[test]
    fn test_catalog_keys_unique() {
        let mut keys: Vec<_> = PERMISSIONS.iter().map(|p| p.key).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), PERMISSIONS.len());
    }
}
