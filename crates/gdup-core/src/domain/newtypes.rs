//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for domain identifiers and values.
//! Each newtype ensures data validity at construction time.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

// ============================================================================
// Session identifier
// ============================================================================

/// Identifier for one process lifetime
///
/// Every audit record produced by the process carries the same `SessionId`,
/// which lets a transaction log shared by several runs be split per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Create a new random SessionId
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a SessionId from an existing UUID
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID value
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Create a nil (all zeros) SessionId
    #[must_use]
    pub const fn nil() -> Self {
        Self(Uuid::nil())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::InvalidId(format!("Invalid SessionId: {e}")))
    }
}

impl From<Uuid> for SessionId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

// ============================================================================
// Remote store types
// ============================================================================

/// Remote object identifier as issued by the store
///
/// Drive IDs are URL-safe strings such as `0B9DmNepPcca_ZDJHQ1VOT21TTzQ`.
/// The alias `root` addresses the top of the user's drive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RemoteId(String);

impl RemoteId {
    /// Alias for the root folder of the remote store
    pub const ROOT_ALIAS: &'static str = "root";

    /// Create a new RemoteId
    ///
    /// # Errors
    /// Returns error if the ID is empty or contains characters outside
    /// `[A-Za-z0-9!_-]`
    pub fn new(id: String) -> Result<Self, DomainError> {
        if id.is_empty() {
            return Err(DomainError::InvalidRemoteId(
                "Remote ID cannot be empty".to_string(),
            ));
        }

        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '!' || c == '-' || c == '_')
        {
            return Err(DomainError::InvalidRemoteId(format!(
                "Remote ID contains invalid characters: {id}"
            )));
        }

        Ok(Self(id))
    }

    /// The `root` alias
    #[must_use]
    pub fn root() -> Self {
        Self(Self::ROOT_ALIAS.to_string())
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RemoteId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RemoteId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for RemoteId {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RemoteId> for String {
    fn from(id: RemoteId) -> Self {
        id.0
    }
}

/// Parent folder an operation is aimed at
///
/// `Broken` is used below a local directory whose remote `mkdir` failed.
/// It never aliases the store's root; operations against it fail with 404
/// without reaching the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TargetParent {
    /// A real remote folder
    Folder(RemoteId),
    /// The parent could not be created
    Broken,
}

impl TargetParent {
    /// Token used for the broken parent in audit lines
    ///
    /// The angle brackets keep it outside the set of valid [`RemoteId`]s.
    pub const BROKEN_TOKEN: &'static str = "<none>";

    /// Returns the folder id, if any
    pub fn id(&self) -> Option<&RemoteId> {
        match self {
            TargetParent::Folder(id) => Some(id),
            TargetParent::Broken => None,
        }
    }

    /// Returns true for the broken sentinel
    pub fn is_broken(&self) -> bool {
        matches!(self, TargetParent::Broken)
    }
}

impl From<RemoteId> for TargetParent {
    fn from(id: RemoteId) -> Self {
        TargetParent::Folder(id)
    }
}

impl Display for TargetParent {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TargetParent::Folder(id) => write!(f, "{id}"),
            TargetParent::Broken => f.write_str(Self::BROKEN_TOKEN),
        }
    }
}

impl FromStr for TargetParent {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == Self::BROKEN_TOKEN {
            Ok(TargetParent::Broken)
        } else {
            RemoteId::new(s.to_string()).map(TargetParent::Folder)
        }
    }
}

// ============================================================================
// Content hash
// ============================================================================

/// Hex-encoded MD5 digest of a file's content
///
/// This is the digest the Drive API reports as `md5Checksum`, so local and
/// remote content can be compared without downloading anything.
/// Stored lowercase; parsing accepts either case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    /// Length of a hex-encoded MD5 digest
    pub const HEX_LEN: usize = 32;

    /// Create a new ContentHash from a hex string
    ///
    /// # Errors
    /// Returns error if the string is not 32 hex characters
    pub fn new(hash: String) -> Result<Self, DomainError> {
        if hash.len() != Self::HEX_LEN || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(DomainError::InvalidHash(format!(
                "expected {} hex characters, got '{hash}'",
                Self::HEX_LEN
            )));
        }
        Ok(Self(hash.to_ascii_lowercase()))
    }

    /// Build a ContentHash from a raw 16-byte digest
    #[must_use]
    pub fn from_digest(digest: [u8; 16]) -> Self {
        let hex = digest.iter().map(|b| format!("{b:02x}")).collect();
        Self(hex)
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ContentHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ContentHash {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for ContentHash {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.0
    }
}

// ============================================================================
// Tests
// ============================================================================
