//! Integration test: AuditRecorder → FileAuditSink → read_log
//!
//! Records are produced from many tokio tasks at once, written through the
//! file sink, then parsed back and compared with the recorder's own tally.

use std::sync::Arc;

use gdup_audit::{read_log, AuditRecorder, AuditTally, FileAuditSink, SessionContext};
use gdup_core::{
    domain::{
        audit::{AuditOperation, StatusCode},
        newtypes::{RemoteId, SessionId, TargetParent},
    },
    ports::{audit_sink::IAuditSink, remote_store::RemoteError},
};

#[tokio::test]
async fn test_recorder_writes_parseable_log_from_concurrent_tasks() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("transaction.log");
    let sink = Arc::new(FileAuditSink::open(&path).unwrap());
    let session_id = SessionId::new();
    let recorder = Arc::new(AuditRecorder::new(
        sink as Arc<dyn IAuditSink>,
        SessionContext::new(session_id, "192.168.1.20", 4711),
    ));

    let mut handles = Vec::new();
    for i in 0..20u16 {
        let recorder = Arc::clone(&recorder);
        handles.push(tokio::spawn(async move {
            let parent = TargetParent::from(RemoteId::root());
            let title = format!("file {i}.txt");
            let mut span = recorder.open(AuditOperation::Insert, &parent, Some(&title));
            span.record().set_source(format!("/data/file{i}.txt"));
            tokio::task::yield_now().await;
            match i % 4 {
                0 => span.finish(Ok(Some(()))),
                1 => {
                    span.set_status(StatusCode::NOT_MODIFIED);
                    span.finish(Ok(Some(())))
                }
                2 => span.finish(Err(RemoteError::Status {
                    code: 403,
                    message: "quota".to_string(),
                }
                .into())),
                _ => span.finish(Err(anyhow::anyhow!("connection reset"))),
            }
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    let contents = read_log(&path).unwrap();
    assert!(contents.malformed.is_empty());
    assert_eq!(contents.records.len(), 20);
    assert!(contents
        .records
        .iter()
        .all(|r| r.session_id() == &session_id && r.pid() == 4711));

    let from_file: AuditTally = contents.records.iter().collect();
    assert_eq!(from_file, recorder.tally());
    assert_eq!(from_file.count(StatusCode::SUCCESS), 5);
    assert_eq!(from_file.count(StatusCode::NOT_MODIFIED), 5);
    assert_eq!(from_file.count(StatusCode::new(403)), 5);
    assert_eq!(from_file.count(StatusCode::UNHANDLED), 5);

    let titled: Vec<_> = contents
        .records
        .iter()
        .filter(|r| r.title() == Some("file 7.txt"))
        .collect();
    assert_eq!(titled.len(), 1);
    assert_eq!(titled[0].source(), Some("/data/file7.txt"));
}
