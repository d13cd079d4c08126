use std::collections::BTreeSet;

use crate::error::AuthError;

pub const ADMIN_ROLE: &str = "admin";

/// Set of role names held by a user.
///
/// Stored as a comma-separated string in the `roles` column; conversion only
/// happens at the persistence boundary via [`RoleSet::from_column`] and
/// [`RoleSet::to_column`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleSet(BTreeSet<String>);

impl RoleSet {
    pub fn new<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            roles
                .into_iter()
                .map(|r| r.as_ref().trim().to_string())
                .filter(|r| !r.is_empty())
                .collect(),
        )
    }

    /// Blank segments are dropped, so `""` and `"admin,"` never yield `""`.
    pub fn from_column(column: Option<&str>) -> Self {
        match column {
            Some(raw) => Self::new(raw.split(',')),
            None => Self::default(),
        }
    }

    pub fn to_column(&self) -> Option<String> {
        if self.0.is_empty() {
            None
        } else {
            Some(self.0.iter().cloned().collect::<Vec<_>>().join(","))
        }
    }

    pub fn contains(&self, role: &str) -> bool {
        self.0.contains(role)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn insert(&mut self, role: &str) {
        let role = role.trim();
        if !role.is_empty() {
            self.0.insert(role.to_string());
        }
    }

    /// Succeeds only when every required role is held.
    pub fn require(&self, required: &[String]) -> Result<(), AuthError> {
        let missing: Vec<String> = required
            .iter()
            .filter(|r| !self.contains(r))
            .cloned()
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(AuthError::MissingRoles {
                required: required.to_vec(),
                missing,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_or_absent_column_is_empty_set() {
        assert!(RoleSet::from_column(None).is_empty());
        assert!(RoleSet::from_column(Some("")).is_empty());
        assert!(RoleSet::from_column(Some(" , ,")).is_empty());
    }

    #[test]
    fn column_is_split_on_commas() {
        let roles = RoleSet::from_column(Some("admin,editor, viewer"));
        assert!(roles.contains("admin"));
        assert!(roles.contains("editor"));
        assert!(roles.contains("viewer"));
        assert!(!roles.contains(""));
    }

    #[test]
    fn to_column_round_trips_and_empty_is_null() {
        let roles = RoleSet::new(["editor", "admin"]);
        assert_eq!(roles.to_column(), Some("admin,editor".to_string()));
        assert_eq!(RoleSet::from_column(roles.to_column().as_deref()), roles);
        assert_eq!(RoleSet::default().to_column(), None);
    }

    #[test]
    fn require_reports_only_missing_roles() {
        let roles = RoleSet::new(["admin"]);
        let required = vec!["admin".to_string(), "editor".to_string()];

        match roles.require(&required) {
            Err(AuthError::MissingRoles { missing, .. }) => {
                assert_eq!(missing, vec!["editor".to_string()]);
            }
            other => panic!("expected MissingRoles, got {:?}", other),
        }
        assert!(roles.require(&["admin".to_string()]).is_ok());
        assert!(RoleSet::default().require(&[]).is_ok());
    }
}
