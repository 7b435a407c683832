//! Deny-list to allow-list conversion for role access to statuses,
//! templates and upload destinations

use std::collections::{BTreeMap, BTreeSet};

/// Legacy deny rows grouped by entity: `entity_id -> roles denied`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DenyList {
    denied: BTreeMap<i64, BTreeSet<i64>>,
}

impl DenyList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deny(&mut self, entity_id: i64, role_id: i64) {
        self.denied.entry(entity_id).or_default().insert(role_id);
    }

    pub fn is_denied(&self, entity_id: i64, role_id: i64) -> bool {
        self.denied
            .get(&entity_id)
            .is_some_and(|roles| roles.contains(&role_id))
    }
}

impl FromIterator<(i64, i64)> for DenyList {
    /// Collect `(entity_id, role_id)` deny pairs
    fn from_iter<I: IntoIterator<Item = (i64, i64)>>(iter: I) -> Self {
        let mut list = DenyList::new();
        for (entity_id, role_id) in iter {
            list.deny(entity_id, role_id);
        }
        list
    }
}

/// Roles allowed to use an entity; presence of `(role_id, entity_id)` grants access
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    allowed: BTreeSet<(i64, i64)>,
}

impl AllowList {
    /// Every eligible role gets every entity unless the deny list says otherwise
    pub fn flip(eligible_roles: &BTreeSet<i64>, entities: &BTreeSet<i64>, deny: &DenyList) -> Self {
        let allowed = entities
            .iter()
            .flat_map(|&entity_id| {
                eligible_roles
                    .iter()
                    .filter(move |&&role_id| !deny.is_denied(entity_id, role_id))
                    .map(move |&role_id| (role_id, entity_id))
            })
            .collect();
        Self { allowed }
    }

    pub fn is_allowed(&self, role_id: i64, entity_id: i64) -> bool {
        self.allowed.contains(&(role_id, entity_id))
    }

    pub fn len(&self) -> usize {
        self.allowed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }

    /// `(role_id, entity_id)` pairs in ascending order
    pub fn pairs(&self) -> impl Iterator<Item = (i64, i64)> + '_ {
        self.allowed.iter().copied()
    }
}
