//! Integration tests for admin uploads

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::TimeZone;
use chrono::Utc;
use common::{op, MockBackend};
use tokio_util::sync::CancellationToken;
use vybe_access::{
    AccessError, Grant, ManualClock, UploadFile, UploadForm, UploadPhase, Uploader,
};
use vybe_backend::BackendError;
use vybe_types::{Tier, UserId};

fn uploader(mock: &Arc<MockBackend>) -> Uploader {
    let backend = mock.backend();
    let clock = ManualClock::new(Utc.timestamp_millis_opt(1_700_000_000_000).unwrap());
    Uploader::new(backend.assets, backend.storage, Arc::new(clock))
}

fn admin() -> Grant {
    Grant {
        user_id: Some(UserId::new()),
        tier: None,
        is_admin: true,
    }
}

fn form(title: &str) -> UploadForm {
    UploadForm {
        title: title.to_string(),
        description: Some("Crunchy breaks".to_string()),
        required_tier: Tier::CreatorPlus,
        tags: "Drum, loop, drum".to_string(),
        file: Some(UploadFile::new("Alpha.WAV", b"RIFF".to_vec())),
    }
}

#[tokio::test]
async fn test_upload_stores_object_then_row() {
    let mock = MockBackend::new();
    let uploader = uploader(&mock);
    let progress = uploader.subscribe();

    let receipt = uploader
        .submit(form("Alpha Pack"), &admin(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(receipt.slug, "alpha-pack-1700000000000");
    assert_eq!(receipt.storage_object_path, "alpha-pack-1700000000000.wav");
    assert_eq!(mock.object(&receipt.storage_object_path), Some(b"RIFF".to_vec()));

    let row = mock.asset_titled("Alpha Pack").unwrap();
    assert_eq!(row.tags, ["drum", "loop"]);
    assert_eq!(row.required_tier, Tier::CreatorPlus);
    assert_eq!(row.description.as_deref(), Some("Crunchy breaks"));
    assert!(row.is_published);

    assert_eq!(
        *progress.borrow(),
        UploadPhase::Done {
            slug: receipt.slug.clone()
        }
    );
    assert!(!uploader.is_busy());
}

#[tokio::test]
async fn test_missing_title_or_file_rejected_before_remote_calls() {
    let mock = MockBackend::new();
    let uploader = uploader(&mock);
    let cancel = CancellationToken::new();

    let blank = UploadForm {
        title: "   ".to_string(),
        ..form("unused")
    };
    let err = uploader.submit(blank, &admin(), &cancel).await.unwrap_err();
    assert!(matches!(err, AccessError::Validation(ref m) if m == "Title and file are required."));

    let no_file = UploadForm {
        file: None,
        ..form("Alpha Pack")
    };
    let err = uploader.submit(no_file, &admin(), &cancel).await.unwrap_err();
    assert_eq!(err.error_code(), "VALIDATION_ERROR");

    assert_eq!(mock.total_calls(), 0);
    assert!(matches!(uploader.phase(), UploadPhase::Failed { .. }));
}

#[tokio::test]
async fn test_non_admin_cannot_upload() {
    let mock = MockBackend::new();
    let uploader = uploader(&mock);
    let member = Grant {
        user_id: Some(UserId::new()),
        tier: Some(Tier::CreatorPlusPlus),
        is_admin: false,
    };

    let err = uploader
        .submit(form("Alpha Pack"), &member, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "requires admin access");
    assert_eq!(mock.total_calls(), 0);
}

#[tokio::test]
async fn test_storage_failure_skips_row() {
    let mock = MockBackend::new();
    let uploader = uploader(&mock);
    mock.fail(op::UPLOAD_OBJECT, BackendError::Api("quota exceeded".into()));

    let err = uploader
        .submit(form("Alpha Pack"), &admin(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, AccessError::Storage(_)));
    assert_eq!(mock.calls(op::CREATE_ASSET), 0);
    assert!(!uploader.is_busy());
}

#[tokio::test]
async fn test_row_failure_reports_saved_file() {
    let mock = MockBackend::new();
    let uploader = uploader(&mock);
    mock.fail(op::CREATE_ASSET, BackendError::Api("duplicate slug".into()));

    let err = uploader
        .submit(form("Alpha Pack"), &admin(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.error_code(), "QUERY_ERROR");
    assert!(err.to_string().contains("Saved file"));
    assert!(mock.object("alpha-pack-1700000000000.wav").is_some());
}

#[tokio::test]
async fn test_existing_object_is_not_overwritten() {
    let mock = MockBackend::new();
    let uploader = uploader(&mock);
    let cancel = CancellationToken::new();

    uploader.submit(form("Alpha Pack"), &admin(), &cancel).await.unwrap();
    // Same clock reading, same slug
    let err = uploader
        .submit(form("Alpha Pack"), &admin(), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, AccessError::Storage(_)));
    assert_eq!(mock.calls(op::CREATE_ASSET), 1);
}

#[tokio::test(start_paused = true)]
async fn test_second_submission_while_busy_is_rejected() {
    let mock = MockBackend::new();
    let uploader = uploader(&mock);
    let cancel = CancellationToken::new();
    mock.set_delay(op::UPLOAD_OBJECT, Duration::from_secs(5));

    let admin_a = admin();
    let admin_b = admin();
    let (first, second) = tokio::join!(
        uploader.submit(form("Alpha Pack"), &admin_a, &cancel),
        uploader.submit(form("Beta Kit"), &admin_b, &cancel),
    );

    assert!(first.is_ok());
    assert!(matches!(second, Err(AccessError::Busy)));
    assert_eq!(mock.calls(op::UPLOAD_OBJECT), 1);

    // Flag released: a later submission goes through
    uploader
        .submit(form("Beta Kit"), &admin(), &cancel)
        .await
        .unwrap();
}
