use serde::Serialize;

use crate::registry::DataSourceDescriptor;

/// Column every tenant-owned table is scoped on.
pub const TENANT_SCOPE_COLUMN: &str = "tenant_id";

/// Identifier a tenant's rows carry inside its own data database.
///
/// `foreign_tenant_id` wins when present and non-blank; otherwise the registry
/// id is used unchanged.
pub fn map_to_data_source_id(tenant_id: &str, descriptor: &DataSourceDescriptor) -> String {
    mapped_id(tenant_id, descriptor.foreign_tenant_id.as_deref())
}

pub(crate) fn mapped_id(tenant_id: &str, foreign_tenant_id: Option<&str>) -> String {
    match foreign_tenant_id.map(str::trim) {
        Some(foreign) if !foreign.is_empty() => foreign.to_string(),
        _ => tenant_id.to_string(),
    }
}

/// Row-level scope for queries against a tenant data database.
///
/// Only constructible from a mapped id, so handlers cannot accidentally scope
/// on the registry identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TenantScope {
    column: &'static str,
    value: String,
}

impl TenantScope {
    pub(crate) fn new(data_source_tenant_id: impl Into<String>) -> Self {
        Self {
            column: TENANT_SCOPE_COLUMN,
            value: data_source_tenant_id.into(),
        }
    }

    pub fn column(&self) -> &'static str {
        self.column
    }

    /// Value to bind for the predicate.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// `tenant_id = $n` for a positional parameter.
    pub fn predicate(&self, param_index: usize) -> String {
        format!("{} = ${}", self.column, param_index)
    }
}
