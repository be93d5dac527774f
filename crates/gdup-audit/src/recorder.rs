//! AuditRecorder - one record per remote operation
//!
//! A remote operation runs inside an [`AuditSpan`]. The span is opened
//! before the operation starts and finished with the operation's result;
//! finishing classifies the result, writes exactly one record to the sink
//! and hands the caller an [`Outcome`]. Errors never leave the span.
//!
//! Classification when a span finishes:
//!
//! | body result                          | recorded status                 |
//! |--------------------------------------|---------------------------------|
//! | `Ok(Some(_))` / `Ok(None)`           | whatever the body set (200 default) |
//! | `Err` wrapping `RemoteError::Status` | the store's code, verbatim      |
//! | `Err` wrapping `Missing`/`BrokenParent` | 404                          |
//! | any other `Err`                      | 500, logged at error level      |
//!
//! A span dropped without being finished (panic or cancellation) still
//! writes its record, with status 500.

use std::net::UdpSocket;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::Utc;
use gdup_core::{
    domain::{
        audit::{AuditOperation, AuditRecord, StatusCode},
        newtypes::{SessionId, TargetParent},
    },
    ports::{audit_sink::IAuditSink, remote_store::RemoteError},
};

use crate::tally::AuditTally;

// ============================================================================
// Session context
// ============================================================================

/// Fields shared by every record of one process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    session_id: SessionId,
    host: String,
    pid: u32,
}

impl SessionContext {
    pub fn new(session_id: SessionId, host: impl Into<String>, pid: u32) -> Self {
        Self {
            session_id,
            host: host.into(),
            pid,
        }
    }

    /// Fresh session id, this host's outbound address, this process id
    pub fn detect() -> Self {
        Self::new(SessionId::new(), local_ip(), std::process::id())
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }
}

/// Address of the interface used for outbound traffic
///
/// Connecting a UDP socket only selects a route; no packet is sent.
fn local_ip() -> String {
    UdpSocket::bind("0.0.0.0:0")
        .and_then(|socket| {
            socket.connect("8.8.8.8:80")?;
            socket.local_addr()
        })
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|e| {
            tracing::debug!(error = %e, "Could not determine host address");
            "127.0.0.1".to_string()
        })
}

// ============================================================================
// Outcome
// ============================================================================

/// What the caller of an audited operation gets back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome<T> {
    pub status: StatusCode,
    pub value: Option<T>,
}

impl<T> Outcome<T> {
    /// True when the operation produced a value
    pub fn is_ok(&self) -> bool {
        self.value.is_some()
    }

    pub fn into_value(self) -> Option<T> {
        self.value
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            status: self.status,
            value: self.value.map(f),
        }
    }
}

// ============================================================================
// Recorder
// ============================================================================

/// Writes audit records for one session to a shared sink
///
/// Sink failures are logged with `tracing::warn!` and never propagated.
pub struct AuditRecorder {
    sink: Arc<dyn IAuditSink>,
    session: SessionContext,
    tally: Mutex<AuditTally>,
}

impl AuditRecorder {
    pub fn new(sink: Arc<dyn IAuditSink>, session: SessionContext) -> Self {
        Self {
            sink,
            session,
            tally: Mutex::new(AuditTally::new()),
        }
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// Opens a span for one operation
    pub fn open(&self, operation: AuditOperation, parent: &TargetParent, title: Option<&str>) -> AuditSpan<'_> {
        let mut record = AuditRecord::new(
            operation,
            parent.clone(),
            title.map(str::to_string),
            self.session.session_id,
            self.session.host.clone(),
            self.session.pid,
        );
        record.set_start_time_ms(Utc::now().timestamp_millis());
        AuditSpan {
            recorder: self,
            record,
            started: Instant::now(),
            finished: false,
        }
    }

    /// Counts of every record written so far
    pub fn tally(&self) -> AuditTally {
        self.tally.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn write(&self, record: &AuditRecord) {
        self.tally
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .add(record);
        if let Err(e) = self.sink.append(record) {
            tracing::warn!(error = %e, operation = %record.operation(), "Failed to write audit record");
        }
    }
}

/// Status for an error raised inside a span
fn classify(error: &anyhow::Error) -> StatusCode {
    error
        .downcast_ref::<RemoteError>()
        .map(RemoteError::status)
        .unwrap_or(StatusCode::UNHANDLED)
}

// ============================================================================
// Span
// ============================================================================

/// One in-flight audited operation
///
/// Body code fills in the record through the setters, then calls
/// [`AuditSpan::finish`] with its result.
pub struct AuditSpan<'a> {
    recorder: &'a AuditRecorder,
    record: AuditRecord,
    started: Instant,
    finished: bool,
}

impl<'a> AuditSpan<'a> {
    /// Sets a business status (304, 409, 417, or 404 for a rejected lookup)
    pub fn set_status(&mut self, status: StatusCode) {
        self.record.set_status(status);
    }

    pub fn status(&self) -> StatusCode {
        self.record.status()
    }

    /// Mutable access to the record under construction
    pub fn record(&mut self) -> &mut AuditRecord {
        &mut self.record
    }

    /// Classifies `result`, writes the record, and returns the outcome
    ///
    /// `Ok(Some(v))` is a success, `Ok(None)` a rejection whose status the
    /// body already set, and `Err(e)` a failure classified from `e`.
    pub fn finish<T>(mut self, result: anyhow::Result<Option<T>>) -> Outcome<T> {
        let value = match result {
            Ok(value) => value,
            Err(e) => {
                let status = classify(&e);
                self.record.set_status(status);
                if status == StatusCode::UNHANDLED {
                    tracing::error!(
                        operation = %self.record.operation(),
                        parent = %self.record.parent(),
                        title = self.record.title().unwrap_or("-"),
                        error = %format!("{e:#}"),
                        "Unhandled failure in remote operation"
                    );
                } else {
                    tracing::debug!(
                        operation = %self.record.operation(),
                        status = %status,
                        error = %format!("{e:#}"),
                        "Remote operation failed"
                    );
                }
                None
            }
        };

        self.complete();
        Outcome {
            status: self.record.status(),
            value,
        }
    }

    fn complete(&mut self) {
        self.finished = true;
        let elapsed = self.started.elapsed().as_millis();
        self.record
            .set_duration_ms(u64::try_from(elapsed).unwrap_or(u64::MAX));
        self.recorder.write(&self.record);
    }
}

impl Drop for AuditSpan<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        self.record.set_status(StatusCode::UNHANDLED);
        tracing::error!(
            operation = %self.record.operation(),
            parent = %self.record.parent(),
            panicking = std::thread::panicking(),
            "Audit span dropped before finishing"
        );
        self.complete();
    }
}

#[cfg(test)]
mod tests {
    use gdup_core::domain::newtypes::RemoteId;

    use super::*;
    use crate::sink::MemoryAuditSink;

    fn recorder() -> (Arc<MemoryAuditSink>, AuditRecorder) {
        let sink = Arc::new(MemoryAuditSink::new());
        let session = SessionContext::new(SessionId::nil(), "10.1.2.3", 77);
        let recorder = AuditRecorder::new(Arc::clone(&sink) as Arc<dyn IAuditSink>, session);
        (sink, recorder)
    }

    fn root() -> TargetParent {
        TargetParent::from(RemoteId::root())
    }

    #[test]
    fn test_success_defaults_to_200() {
        let (sink, recorder) = recorder();
        let span = recorder.open(AuditOperation::Mkdir, &root(), Some("photos"));
        let outcome = span.finish(Ok(Some(42)));

        assert_eq!(outcome.status, StatusCode::SUCCESS);
        assert_eq!(outcome.value, Some(42));
        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].host(), "10.1.2.3");
        assert_eq!(records[0].pid(), 77);
        assert_eq!(records[0].title(), Some("photos"));
        assert!(records[0].start_time_ms() > 0);
    }

    #[test]
    fn test_business_status_is_kept() {
        let (sink, recorder) = recorder();
        let mut span = recorder.open(AuditOperation::Mkdir, &root(), Some("a"));
        span.set_status(StatusCode::CONFLICT);
        let outcome: Outcome<()> = span.finish(Ok(None));

        assert!(!outcome.is_ok());
        assert_eq!(outcome.status, StatusCode::CONFLICT);
        assert_eq!(sink.records()[0].status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_remote_status_is_copied() {
        let (sink, recorder) = recorder();
        let span = recorder.open(AuditOperation::Stat, &root(), Some("a"));
        let err = RemoteError::Status {
            code: 403,
            message: "forbidden".to_string(),
        };
        let outcome: Outcome<()> = span.finish(Err(err.into()));

        assert_eq!(outcome.status.as_u16(), 403);
        assert_eq!(sink.records()[0].status().as_u16(), 403);
    }

    #[test]
    fn test_missing_and_broken_parent_map_to_404() {
        let (sink, recorder) = recorder();
        let outcome: Outcome<()> = recorder
            .open(AuditOperation::Stat, &TargetParent::Broken, Some("a"))
            .finish(Err(RemoteError::BrokenParent.into()));
        assert_eq!(outcome.status, StatusCode::NOT_FOUND);

        let outcome: Outcome<()> = recorder
            .open(AuditOperation::Stat, &root(), Some("a"))
            .finish(Err(RemoteError::Missing("a".to_string()).into()));
        assert_eq!(outcome.status, StatusCode::NOT_FOUND);
        assert_eq!(sink.records()[0].parent().to_string(), "<none>");
    }

    #[test]
    fn test_other_errors_map_to_500() {
        let (_sink, recorder) = recorder();
        let outcome: Outcome<()> = recorder
            .open(AuditOperation::Insert, &root(), Some("a"))
            .finish(Err(anyhow::anyhow!("disk on fire")));
        assert_eq!(outcome.status, StatusCode::UNHANDLED);
        assert!(outcome.value.is_none());
    }

    #[test]
    fn test_dropped_span_writes_500() {
        let (sink, recorder) = recorder();
        {
            let mut span = recorder.open(AuditOperation::Update, &root(), Some("a"));
            span.record().set_source("/tmp/a");
        }
        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status(), StatusCode::UNHANDLED);
        assert_eq!(records[0].source(), Some("/tmp/a"));
    }

    #[test]
    fn test_panic_inside_span_still_writes_one_record() {
        let (sink, recorder) = recorder();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _span = recorder.open(AuditOperation::Insert, &root(), Some("boom"));
            panic!("transfer exploded");
        }));
        assert!(result.is_err());
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.records()[0].status(), StatusCode::UNHANDLED);
    }

    #[test]
    fn test_sink_failure_is_swallowed() {
        struct BrokenSink;
        impl IAuditSink for BrokenSink {
            fn append(&self, _record: &AuditRecord) -> anyhow::Result<()> {
                anyhow::bail!("disk full")
            }
        }

        let recorder = AuditRecorder::new(
            Arc::new(BrokenSink),
            SessionContext::new(SessionId::nil(), "127.0.0.1", 1),
        );
        let outcome = recorder
            .open(AuditOperation::Mkdir, &root(), Some("a"))
            .finish(Ok(Some(())));
        assert!(outcome.is_ok());
        assert_eq!(recorder.tally().total(), 1);
    }

    #[test]
    fn test_tally_tracks_written_records() {
        let (_sink, recorder) = recorder();
        let _: Outcome<()> = recorder
            .open(AuditOperation::BadSource, &root(), None)
            .finish(Ok(None));
        let _ = recorder.open(AuditOperation::Mkdir, &root(), Some("a")).finish(Ok(Some(())));

        let tally = recorder.tally();
        assert_eq!(tally.total(), 2);
        assert_eq!(tally.count(StatusCode::SUCCESS), 2);
    }

    #[test]
    fn test_detect_session() {
        let ctx = SessionContext::detect();
        assert_eq!(ctx.pid(), std::process::id());
        assert!(ctx.host().parse::<std::net::IpAddr>().is_ok());
    }

    #[test]
    fn test_outcome_map() {
        let outcome = Outcome {
            status: StatusCode::SUCCESS,
            value: Some(2),
        };
        assert_eq!(outcome.map(|v| v * 2).into_value(), Some(4));
    }
}
