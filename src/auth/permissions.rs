//! Permission model and grant store.
//!
//! A grant is `(user, Scope, ActionScope)`. Scopes are either an exact
//! resource or a whole subject category; `Scope::covers` is the only place
//! resource matching happens.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::storage::StoreError;

/// Fixed resource categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subject {
    Proxies,
    Election,
    Roles,
}

impl Subject {
    pub fn as_str(&self) -> &'static str {
        match self {
            Subject::Proxies => "proxies",
            Subject::Election => "election",
            Subject::Roles => "roles",
        }
    }

    /// Actions that make sense on this category.
    pub fn actions(&self) -> &'static [Action] {
        match self {
            Subject::Proxies => &[Action::Post, Action::Put, Action::Delete],
            Subject::Election => &[Action::Create, Action::Own],
            Subject::Roles => &[Action::List, Action::Add, Action::Remove],
        }
    }
}

/// Privileged actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Own,
    Post,
    Put,
    Delete,
    List,
    Add,
    Remove,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Own => "own",
            Action::Post => "post",
            Action::Put => "put",
            Action::Delete => "delete",
            Action::List => "list",
            Action::Add => "add",
            Action::Remove => "remove",
        }
    }
}

/// The resource a request acts on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum ResourceId {
    Subject(Subject),
    Form(String),
}

impl ResourceId {
    pub fn form(id: impl Into<String>) -> Self {
        ResourceId::Form(id.into())
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceId::Subject(s) => f.write_str(s.as_str()),
            ResourceId::Form(id) => f.write_str(id),
        }
    }
}

/// What a grant applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Scope {
    Exact(ResourceId),
    Category(Subject),
}

impl Scope {
    /// `Category(Election)` also covers every individual form.
    pub fn covers(&self, resource: &ResourceId) -> bool {
        match (self, resource) {
            (Scope::Exact(expected), resource) => expected == resource,
            (Scope::Category(subject), ResourceId::Subject(other)) => subject == other,
            (Scope::Category(Subject::Election), ResourceId::Form(_)) => true,
            (Scope::Category(_), ResourceId::Form(_)) => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum ActionScope {
    Any,
    Only(Action),
}

impl ActionScope {
    pub fn permits(&self, action: Action) -> bool {
        match self {
            ActionScope::Any => true,
            ActionScope::Only(allowed) => *allowed == action,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Grant {
    pub scope: Scope,
    pub action: ActionScope,
}

impl Grant {
    pub fn new(scope: Scope, action: ActionScope) -> Self {
        Self { scope, action }
    }

    /// Ownership of a single election form.
    pub fn ownership(form_id: impl Into<String>) -> Self {
        Self::new(
            Scope::Exact(ResourceId::form(form_id)),
            ActionScope::Only(Action::Own),
        )
    }

    pub fn matches(&self, resource: &ResourceId, action: Action) -> bool {
        self.scope.covers(resource) && self.action.permits(action)
    }
}

/// Coarse roles; each expands to a fixed set of grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Operator,
    Voter,
}

impl Role {
    pub fn grants(&self) -> Vec<Grant> {
        let create_election = Grant::new(
            Scope::Exact(ResourceId::Subject(Subject::Election)),
            ActionScope::Only(Action::Create),
        );
        let manage_proxies = Grant::new(Scope::Category(Subject::Proxies), ActionScope::Any);
        match self {
            Role::Admin => vec![
                manage_proxies,
                create_election,
                Grant::new(Scope::Category(Subject::Roles), ActionScope::Any),
            ],
            Role::Operator => vec![manage_proxies, create_election],
            Role::Voter => Vec::new(),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "operator" => Ok(Role::Operator),
            "voter" => Ok(Role::Voter),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// Everything granted to one user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserPermissions {
    #[serde(default)]
    pub roles: BTreeSet<Role>,
    #[serde(default)]
    pub grants: BTreeSet<Grant>,
}

impl UserPermissions {
    fn effective(&self) -> impl Iterator<Item = Grant> + '_ {
        self.roles
            .iter()
            .flat_map(|role| role.grants())
            .chain(self.grants.iter().cloned())
    }
}

/// Concurrent grant store.
///
/// Grants are additive. Every mutation is saved to the persistence file when
/// one is configured.
#[derive(Default)]
pub struct PermissionStore {
    users: DashMap<u64, UserPermissions>,
    persistence_path: Option<PathBuf>,
    save_lock: Mutex<()>,
}

impl PermissionStore {
    pub fn new(persistence_path: Option<PathBuf>) -> Self {
        Self {
            users: DashMap::new(),
            persistence_path,
            save_lock: Mutex::new(()),
        }
    }

    /// Load from file if it exists; later mutations save back to it.
    pub fn load_from_file(path: &Path) -> std::io::Result<Self> {
        let store = Self::new(Some(path.to_path_buf()));
        if path.exists() {
            let reader = BufReader::new(File::open(path)?);
            let map: HashMap<u64, UserPermissions> = serde_json::from_reader(reader)?;
            for (user, perms) in map {
                store.users.insert(user, perms);
            }
            tracing::info!(users = store.users.len(), "Loaded permissions from file");
        }
        Ok(store)
    }

    /// True if any grant of `user` matches `(resource, action)`.
    pub fn is_authorized(&self, user: u64, resource: &ResourceId, action: Action) -> bool {
        self.users
            .get(&user)
            .map(|perms| perms.effective().any(|g| g.matches(resource, action)))
            .unwrap_or(false)
    }

    pub fn grant(&self, user: u64, grant: Grant) -> Result<(), StoreError> {
        self.update(user, |perms| {
            perms.grants.insert(grant);
        })
    }

    pub fn revoke(&self, user: u64, grant: &Grant) -> Result<(), StoreError> {
        if !self.users.contains_key(&user) {
            return Ok(());
        }
        self.update(user, |perms| {
            perms.grants.remove(grant);
        })
    }

    /// Make `user` the owner of `form_id`. Called when an election is created.
    pub fn grant_ownership(&self, user: u64, form_id: &str) -> Result<(), StoreError> {
        tracing::info!(user_id = user, form_id = %form_id, "Granting election ownership");
        self.grant(user, Grant::ownership(form_id))
    }

    /// Drop `user`'s ownership of `form_id`. Called when an election is deleted.
    pub fn revoke_ownership(&self, user: u64, form_id: &str) -> Result<(), StoreError> {
        tracing::info!(user_id = user, form_id = %form_id, "Revoking election ownership");
        self.revoke(user, &Grant::ownership(form_id))
    }

    pub fn assign_role(&self, user: u64, role: Role) -> Result<(), StoreError> {
        self.update(user, |perms| {
            perms.roles.insert(role);
        })
    }

    pub fn remove_role(&self, user: u64, role: Role) -> Result<(), StoreError> {
        if !self.users.contains_key(&user) {
            return Ok(());
        }
        self.update(user, |perms| {
            perms.roles.remove(&role);
        })
    }

    /// Apply `change` to `user` and persist it. A failed save restores the
    /// previous entry, so memory never holds a change the file lacks.
    fn update<F>(&self, user: u64, change: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut UserPermissions),
    {
        let _guard = self.save_lock.lock().unwrap_or_else(|e| e.into_inner());
        let previous = self.users.get(&user).map(|perms| perms.value().clone());
        change(&mut self.users.entry(user).or_default());

        if let Err(e) = self.persist() {
            match previous {
                Some(perms) => {
                    self.users.insert(user, perms);
                }
                None => {
                    self.users.remove(&user);
                }
            }
            return Err(e);
        }
        Ok(())
    }

    /// Users holding at least one role, ordered by id.
    pub fn users_with_roles(&self) -> Vec<(u64, Vec<Role>)> {
        let mut users: Vec<_> = self
            .users
            .iter()
            .filter(|r| !r.value().roles.is_empty())
            .map(|r| (*r.key(), r.value().roles.iter().copied().collect()))
            .collect();
        users.sort_by_key(|(id, _)| *id);
        users
    }

    /// Resource name → permitted action names, for the frontend.
    pub fn authorization_summary(&self, user: u64) -> BTreeMap<String, Vec<&'static str>> {
        let mut summary: BTreeMap<String, BTreeSet<Action>> = BTreeMap::new();
        if let Some(perms) = self.users.get(&user) {
            for grant in perms.effective() {
                let (name, candidates): (String, &[Action]) = match &grant.scope {
                    Scope::Category(subject) => (subject.as_str().to_string(), subject.actions()),
                    Scope::Exact(ResourceId::Subject(subject)) => {
                        (subject.as_str().to_string(), subject.actions())
                    }
                    Scope::Exact(ResourceId::Form(id)) => {
                        (id.clone(), Subject::Election.actions())
                    }
                };
                let entry = summary.entry(name).or_default();
                entry.extend(candidates.iter().copied().filter(|a| grant.action.permits(*a)));
            }
        }
        summary
            .into_iter()
            .map(|(name, actions)| (name, actions.iter().map(Action::as_str).collect()))
            .collect()
    }

    /// Write every user's grants to the persistence file, if configured.
    pub fn save(&self) -> Result<(), StoreError> {
        let _guard = self.save_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.persist()
    }

    /// Callers hold `save_lock`.
    fn persist(&self) -> Result<(), StoreError> {
        let Some(path) = &self.persistence_path else {
            return Ok(());
        };

        let map: HashMap<u64, UserPermissions> = self
            .users
            .iter()
            .map(|r| (*r.key(), r.value().clone()))
            .collect();

        let tmp = path.with_extension("tmp");
        let write = || -> std::io::Result<()> {
            let writer = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer(writer, &map)?;
            fs::rename(&tmp, path)
        };
        write().map_err(|e| {
            tracing::error!(error = %e, path = %path.display(), "Failed to save permissions");
            StoreError::Backend(e.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_grant_means_denied() {
        let store = PermissionStore::new(None);
        let resources = [
            ResourceId::Subject(Subject::Proxies),
            ResourceId::Subject(Subject::Election),
            ResourceId::form("f1"),
        ];
        for resource in &resources {
            for action in [Action::Create, Action::Own, Action::Post, Action::Delete] {
                assert!(!store.is_authorized(7, resource, action));
            }
        }
    }

    #[test]
    fn test_category_grant_covers_every_action() {
        let store = PermissionStore::new(None);
        store.assign_role(1, Role::Operator).unwrap();

        let proxies = ResourceId::Subject(Subject::Proxies);
        assert!(store.is_authorized(1, &proxies, Action::Post));
        assert!(store.is_authorized(1, &proxies, Action::Put));
        assert!(store.is_authorized(1, &proxies, Action::Delete));
        assert!(store.is_authorized(1, &ResourceId::Subject(Subject::Election), Action::Create));
        assert!(!store.is_authorized(1, &ResourceId::Subject(Subject::Roles), Action::List));
        assert!(!store.is_authorized(1, &ResourceId::form("f1"), Action::Own));
    }

    #[test]
    fn test_election_category_covers_forms() {
        let scope = Scope::Category(Subject::Election);
        assert!(scope.covers(&ResourceId::form("abc")));
        assert!(scope.covers(&ResourceId::Subject(Subject::Election)));
        assert!(!scope.covers(&ResourceId::Subject(Subject::Proxies)));
        assert!(!Scope::Category(Subject::Proxies).covers(&ResourceId::form("abc")));
    }

    #[test]
    fn test_ownership_lifecycle() {
        let store = PermissionStore::new(None);
        let form = ResourceId::form("deadbeef");

        store.grant_ownership(5, "deadbeef").unwrap();
        assert!(store.is_authorized(5, &form, Action::Own));
        assert!(!store.is_authorized(6, &form, Action::Own));
        assert!(!store.is_authorized(5, &ResourceId::form("other"), Action::Own));

        store.revoke_ownership(5, "deadbeef").unwrap();
        assert!(!store.is_authorized(5, &form, Action::Own));
    }

    #[test]
    fn test_authorization_summary() {
        let store = PermissionStore::new(None);
        store.assign_role(9, Role::Operator).unwrap();
        store.grant_ownership(9, "f1").unwrap();

        let summary = store.authorization_summary(9);
        assert_eq!(summary["proxies"], vec!["post", "put", "delete"]);
        assert_eq!(summary["election"], vec!["create"]);
        assert_eq!(summary["f1"], vec!["own"]);
        assert!(!summary.contains_key("roles"));
    }

    #[test]
    fn test_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("permissions.json");

        let store = PermissionStore::new(Some(path.clone()));
        store.assign_role(1, Role::Admin).unwrap();
        store.grant_ownership(2, "f2").unwrap();

        let loaded = PermissionStore::load_from_file(&path).unwrap();
        assert!(loaded.is_authorized(1, &ResourceId::Subject(Subject::Roles), Action::Add));
        assert!(loaded.is_authorized(2, &ResourceId::form("f2"), Action::Own));
        assert_eq!(loaded.users_with_roles(), vec![(1, vec![Role::Admin])]);
    }

    #[test]
    fn test_failed_save_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("permissions.json");
        let store = PermissionStore::new(Some(path));

        assert!(store.grant_ownership(1, "f1").is_err());
        assert!(!store.is_authorized(1, &ResourceId::form("f1"), Action::Own));
        assert!(store.authorization_summary(1).is_empty());

        assert!(store.assign_role(2, Role::Operator).is_err());
        assert!(store.users_with_roles().is_empty());
    }

    #[test]
    fn test_failed_save_keeps_previous_grants() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("permissions.json");
        let store = PermissionStore::new(Some(path.clone()));
        store.grant_ownership(1, "f1").unwrap();

        // A directory in place of the temp file makes the next write fail.
        fs::create_dir(path.with_extension("tmp")).unwrap();

        assert!(store.grant_ownership(1, "f2").is_err());
        assert!(!store.is_authorized(1, &ResourceId::form("f2"), Action::Own));
        assert!(store.revoke_ownership(1, "f1").is_err());
        assert!(store.is_authorized(1, &ResourceId::form("f1"), Action::Own));
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("Admin".parse::<Role>().unwrap(), Role::Admin);
        assert!("root".parse::<Role>().is_err());
    }
}
