/*
 * Responsibility
 * - Identity / Role types shared by the codec, middleware and policy
 * - IdentityLookup: the seam to whatever user directory backs the service
 * - IdentityDirectory: in-memory lookup seeded from configuration
 */
use std::collections::{BTreeSet, HashMap};
use std::{fmt, future::Future, pin::Pin};

use serde::{Deserialize, Serialize};

/// Trusted roles. Anything else found in a token stays opaque claim data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::User, Role::Admin];

    /// Case-insensitive.
    pub fn parse(s: &str) -> Option<Role> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s.trim()))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
    pub roles: BTreeSet<Role>,
}

impl Identity {
    pub fn new(username: impl Into<String>, roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            username: username.into(),
            roles: roles.into_iter().collect(),
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Role names in a stable order, as they go into the `roles` claim.
    pub fn role_names(&self) -> Vec<String> {
        self.roles.iter().map(|r| r.as_str().to_string()).collect()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("identity not found")]
    NotFound,

    #[error("identity backend unavailable: {0}")]
    Unavailable(String),
}

/// Resolve a token subject into a trusted identity.
///
/// Returns:
/// - Ok(identity)         => subject is known
/// - Err(NotFound)        => no such user
/// - Err(Unavailable(..)) => backend failure (caller proceeds unauthenticated)
pub trait IdentityLookup: Send + Sync {
    fn lookup<'a>(
        &'a self,
        subject: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Identity, LookupError>> + Send + 'a>>;
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DirectoryParseError {
    #[error("empty username in entry '{0}'")]
    EmptyUsername(String),

    #[error("unknown role '{role}' for user '{user}'")]
    UnknownRole { user: String, role: String },

    #[error("duplicate user '{0}'")]
    Duplicate(String),
}

/// In-memory user directory.
///
/// Seed format: `alice=USER;root=USER,ADMIN`. An entry without roles
/// (`bob` or `bob=`) gets `USER`.
#[derive(Debug, Clone, Default)]
pub struct IdentityDirectory {
    users: HashMap<String, Identity>,
}

impl IdentityDirectory {
    pub fn new(identities: impl IntoIterator<Item = Identity>) -> Self {
        let users = identities
            .into_iter()
            .map(|i| (i.username.clone(), i))
            .collect();
        Self { users }
    }

    pub fn parse(seed: &str) -> Result<Self, DirectoryParseError> {
        let mut users = HashMap::new();

        for entry in seed.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let (name, roles) = entry.split_once('=').unwrap_or((entry, ""));
            let name = name.trim();
            if name.is_empty() {
                return Err(DirectoryParseError::EmptyUsername(entry.to_string()));
            }

            let mut parsed = BTreeSet::new();
            for raw in roles.split(',').map(str::trim).filter(|r| !r.is_empty()) {
                let role = Role::parse(raw).ok_or_else(|| DirectoryParseError::UnknownRole {
                    user: name.to_string(),
                    role: raw.to_string(),
                })?;
                parsed.insert(role);
            }
            if parsed.is_empty() {
                parsed.insert(Role::User);
            }

            if users.contains_key(name) {
                return Err(DirectoryParseError::Duplicate(name.to_string()));
            }
            users.insert(name.to_string(), Identity::new(name, parsed));
        }

        Ok(Self { users })
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn get(&self, username: &str) -> Option<&Identity> {
        self.users.get(username)
    }
}

impl IdentityLookup for IdentityDirectory {
    fn lookup<'a>(
        &'a self,
        subject: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Identity, LookupError>> + Send + 'a>> {
        Box::pin(async move { self.get(subject).cloned().ok_or(LookupError::NotFound) })
    }
}
