//! The single local account the dashboard reports

/// Identity of the local operator
///
/// The gateway has no accounts of its own; the dashboard service reports this
/// fixed identity so clients written against hosted APIs keep working.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalIdentity {
    /// User identifier
    pub user_id: String,

    /// Contact address shown by clients
    pub email: String,

    /// Organization the user belongs to
    pub organization_id: String,

    /// Display name of the organization
    pub organization_name: String,

    /// Account creation time, seconds since the Unix epoch
    pub created_at: u64,
}

impl Default for LocalIdentity {
    fn default() -> Self {
        Self {
            user_id: "local".to_string(),
            email: "local@localhost".to_string(),
            organization_id: "local-org".to_string(),
            organization_name: "Local".to_string(),
            created_at: 0,
        }
    }
}
