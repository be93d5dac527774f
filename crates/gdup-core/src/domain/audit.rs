//! Audit record domain entities
//!
//! One [`AuditRecord`] is written per attempted remote operation. Records
//! render as a single space-separated line in a fixed field order:
//!
//! ```text
//! startTimeMs hostIP pid sessionId status durationMs op bytes size md5 source parent child mimeType title
//! ```
//!
//! Unset string fields render as `-`, unset numeric fields as `0`. The title
//! is the last field and may itself contain spaces.
//!
//! Free-form text is escaped so a record never spans lines. Backslash,
//! newline, carriage return and tab are written `\\`, `\n`, `\r` and `\t`;
//! other control characters become `\xHH`. A value that is exactly `-` is
//! written `\-`. Inside `source` and `mimeType` a space is written `\s` so
//! it cannot shift the fields that follow.

use std::borrow::Cow;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::{ContentHash, RemoteId, SessionId, TargetParent};

/// Placeholder for unset string fields
const UNSET: &str = "-";

/// Number of fields in a rendered record
const FIELD_COUNT: usize = 15;

/// Remote operations that are recorded in the transaction log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOperation {
    /// Folder creation (idempotent)
    Mkdir,
    /// Lookup of an object by (parent, title)
    Stat,
    /// File upload that created a new remote file
    Insert,
    /// File upload against an existing title (replace, skip, or reject)
    Update,
    /// Local source that cannot be synchronized
    BadSource,
}

impl AuditOperation {
    /// All operations, in log order of appearance
    pub const ALL: [AuditOperation; 5] = [
        AuditOperation::Mkdir,
        AuditOperation::Stat,
        AuditOperation::Insert,
        AuditOperation::Update,
        AuditOperation::BadSource,
    ];

    /// The token used in the transaction log
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditOperation::Mkdir => "mkdir",
            AuditOperation::Stat => "stat",
            AuditOperation::Insert => "insert",
            AuditOperation::Update => "update",
            AuditOperation::BadSource => "bad_source",
        }
    }
}

impl Display for AuditOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditOperation {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AuditOperation::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| DomainError::InvalidAuditRecord(format!("unknown operation '{s}'")))
    }
}

/// HTTP-style status code recorded for an operation
///
/// Codes returned by the remote store are recorded verbatim; the constants
/// below are the ones gdup assigns itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusCode(u16);

impl StatusCode {
    /// Operation completed
    pub const SUCCESS: StatusCode = StatusCode(200);
    /// Target already matched; nothing was changed
    pub const NOT_MODIFIED: StatusCode = StatusCode(304);
    /// Expected remote object is missing
    pub const NOT_FOUND: StatusCode = StatusCode(404);
    /// A file and a folder would share the same (parent, title)
    pub const CONFLICT: StatusCode = StatusCode(409);
    /// Local entry type is not supported (symlink, missing source, ...)
    pub const UNSUPPORTED_SOURCE: StatusCode = StatusCode(417);
    /// Failure that no classification rule covers
    pub const UNHANDLED: StatusCode = StatusCode(500);

    /// Wrap a raw code
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// The raw code
    #[must_use]
    pub const fn as_u16(&self) -> u16 {
        self.0
    }

    /// Short human label for the well-known codes
    pub fn label(&self) -> &'static str {
        match *self {
            StatusCode::SUCCESS => "success",
            StatusCode::NOT_MODIFIED => "not-modified",
            StatusCode::NOT_FOUND => "not-found",
            StatusCode::CONFLICT => "conflict",
            StatusCode::UNSUPPORTED_SOURCE => "unsupported-source",
            StatusCode::UNHANDLED => "unhandled",
            _ => "remote-status",
        }
    }
}

impl Display for StatusCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for StatusCode {
    fn from(code: u16) -> Self {
        Self(code)
    }
}

/// A single transaction log record
///
/// Created when an audit span opens, filled in while the operation runs,
/// and written exactly once when the span finishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    start_time_ms: i64,
    host: String,
    pid: u32,
    session_id: SessionId,
    status: StatusCode,
    duration_ms: u64,
    operation: AuditOperation,
    bytes_transferred: u64,
    size: u64,
    content_hash: Option<ContentHash>,
    source: Option<String>,
    #[serde(with = "parent_serde")]
    parent: TargetParent,
    child: Option<RemoteId>,
    mime_type: Option<String>,
    title: Option<String>,
}

impl AuditRecord {
    /// Creates a record with status 200 and all optional fields unset
    pub fn new(
        operation: AuditOperation,
        parent: TargetParent,
        title: Option<String>,
        session_id: SessionId,
        host: impl Into<String>,
        pid: u32,
    ) -> Self {
        Self {
            start_time_ms: 0,
            host: host.into(),
            pid,
            session_id,
            status: StatusCode::SUCCESS,
            duration_ms: 0,
            operation,
            bytes_transferred: 0,
            size: 0,
            content_hash: None,
            source: None,
            parent,
            child: None,
            mime_type: None,
            title,
        }
    }

    pub fn start_time_ms(&self) -> i64 {
        self.start_time_ms
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn operation(&self) -> AuditOperation {
        self.operation
    }

    pub fn bytes_transferred(&self) -> u64 {
        self.bytes_transferred
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn content_hash(&self) -> Option<&ContentHash> {
        self.content_hash.as_ref()
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn parent(&self) -> &TargetParent {
        &self.parent
    }

    pub fn child(&self) -> Option<&RemoteId> {
        self.child.as_ref()
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn set_start_time_ms(&mut self, ms: i64) {
        self.start_time_ms = ms;
    }

    pub fn set_duration_ms(&mut self, ms: u64) {
        self.duration_ms = ms;
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn set_operation(&mut self, operation: AuditOperation) {
        self.operation = operation;
    }

    pub fn set_bytes_transferred(&mut self, bytes: u64) {
        self.bytes_transferred = bytes;
    }

    pub fn set_size(&mut self, size: u64) {
        self.size = size;
    }

    pub fn set_content_hash(&mut self, hash: ContentHash) {
        self.content_hash = Some(hash);
    }

    pub fn set_source(&mut self, source: impl Into<String>) {
        self.source = Some(source.into());
    }

    pub fn set_child(&mut self, child: RemoteId) {
        self.child = Some(child);
    }

    pub fn set_mime_type(&mut self, mime_type: impl Into<String>) {
        self.mime_type = Some(mime_type.into());
    }
}

fn or_unset(value: Option<&str>) -> &str {
    value.unwrap_or(UNSET)
}

/// Escapes one text field for the log line
fn escape_field(value: &str, escape_spaces: bool) -> Cow<'_, str> {
    let needs_escape = value == UNSET
        || value
            .chars()
            .any(|c| c == '\\' || c.is_ascii_control() || (escape_spaces && c == ' '));
    if !needs_escape {
        return Cow::Borrowed(value);
    }
    if value == UNSET {
        return Cow::Borrowed("\\-");
    }

    let mut out = String::with_capacity(value.len() + 8);
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            ' ' if escape_spaces => out.push_str("\\s"),
            c if c.is_ascii_control() => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Reverses [`escape_field`]
fn unescape_field(field: &str) -> Result<String, DomainError> {
    if !field.contains('\\') {
        return Ok(field.to_string());
    }
    let invalid = || DomainError::InvalidAuditRecord(format!("bad escape sequence in '{field}'"));

    let mut out = String::with_capacity(field.len());
    let mut chars = field.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next().ok_or_else(invalid)? {
            '\\' => out.push('\\'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            's' => out.push(' '),
            '-' => out.push('-'),
            'x' => {
                let hex: String = chars.by_ref().take(2).collect();
                let code = u8::from_str_radix(&hex, 16).map_err(|_| invalid())?;
                if hex.len() != 2 || !code.is_ascii() {
                    return Err(invalid());
                }
                out.push(char::from(code));
            }
            _ => return Err(invalid()),
        }
    }
    Ok(out)
}

fn render(value: Option<&str>, escape_spaces: bool) -> Cow<'_, str> {
    match value {
        Some(v) => escape_field(v, escape_spaces),
        None => Cow::Borrowed(UNSET),
    }
}

impl Display for AuditRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {} {} {} {} {} {} {} {} {} {}",
            self.start_time_ms,
            self.host,
            self.pid,
            self.session_id,
            self.status,
            self.duration_ms,
            self.operation,
            self.bytes_transferred,
            self.size,
            or_unset(self.content_hash.as_ref().map(ContentHash::as_str)),
            render(self.source.as_deref(), true),
            self.parent,
            or_unset(self.child.as_ref().map(RemoteId::as_str)),
            render(self.mime_type.as_deref(), true),
            render(self.title.as_deref(), false),
        )
    }
}

fn optional(field: &str) -> Option<String> {
    (field != UNSET).then(|| field.to_string())
}

fn optional_text(field: &str) -> Result<Option<String>, DomainError> {
    optional(field).map(|f| unescape_field(&f)).transpose()
}

fn number<T: FromStr>(field: &str, name: &str) -> Result<T, DomainError> {
    field
        .parse()
        .map_err(|_| DomainError::InvalidAuditRecord(format!("{name} is not a number: '{field}'")))
}

impl FromStr for AuditRecord {
    type Err = DomainError;

    /// Parses one transaction log line
    ///
    /// The first fourteen fields are split on single spaces; whatever
    /// remains is the title.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = line.trim_end_matches(['\r', '\n']).splitn(FIELD_COUNT, ' ').collect();
        if fields.len() != FIELD_COUNT {
            return Err(DomainError::InvalidAuditRecord(format!(
                "expected {FIELD_COUNT} fields, got {}",
                fields.len()
            )));
        }

        let content_hash = optional(fields[9]).map(ContentHash::new).transpose()?;
        let child = optional(fields[12]).map(RemoteId::new).transpose()?;

        Ok(Self {
            start_time_ms: number(fields[0], "start time")?,
            host: fields[1].to_string(),
            pid: number(fields[2], "pid")?,
            session_id: fields[3].parse()?,
            status: StatusCode(number(fields[4], "status")?),
            duration_ms: number(fields[5], "duration")?,
            operation: fields[6].parse()?,
            bytes_transferred: number(fields[7], "bytes")?,
            size: number(fields[8], "size")?,
            content_hash,
            source: optional_text(fields[10])?,
            parent: fields[11].parse()?,
            child,
            mime_type: optional_text(fields[13])?,
            title: optional_text(fields[14])?,
        })
    }
}

/// Serializes the parent as its log token (`<none>` for the broken sentinel)
mod parent_serde {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::domain::newtypes::TargetParent;

    pub fn serialize<S: Serializer>(parent: &TargetParent, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(parent)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<TargetParent, D::Error> {
        let raw = String::deserialize(d)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
