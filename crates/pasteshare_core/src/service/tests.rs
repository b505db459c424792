use super::*;
use crate::models::paste::IncomingFile;
use crate::test_support::{entry_store, png_bytes, temp_database, MemoryBlobStore};
use crate::store::{InsertOutcome, KeyedStore};
use crate::Database;
use tempfile::TempDir;

const TTL: Duration = Duration::from_secs(300);

fn service_with(blobs: Arc<MemoryBlobStore>) -> (PasteService, Database, TempDir) {
    let (db, dir) = temp_database();
    let service = PasteService::new(entry_store(&db), blobs, Limits::default(), TTL);
    (service, db, dir)
}

fn text_request(content: &str) -> CreatePasteRequest {
    CreatePasteRequest {
        snippets: vec![Snippet::new("text", content)],
        ..CreatePasteRequest::default()
    }
}

fn image_request(count: u32) -> CreatePasteRequest {
    CreatePasteRequest {
        files: (1..=count)
            .map(|i| IncomingFile::new(format!("shot{i}.png"), png_bytes(i, 2)))
            .collect(),
        ..CreatePasteRequest::default()
    }
}

#[tokio::test]
async fn create_then_get_returns_same_snippets() {
    let (service, _db, _dir) = service_with(Arc::new(MemoryBlobStore::new()));

    let key = service.create(text_request("hello"), "1.2.3.4").await.unwrap();
    let content = service.get(&key, None).await.unwrap();

    assert_eq!(content.key, key);
    assert_eq!(content.snippets, vec![Snippet::new("text", "hello")]);
    assert!(content.attachments.is_empty());
    assert!(content.expire_at.is_none());
    assert!(!content.once);
}

#[tokio::test]
async fn once_entry_is_readable_exactly_once() {
    let (service, _db, _dir) = service_with(Arc::new(MemoryBlobStore::new()));
    let mut request = text_request("secret");
    request.once = true;

    let key = service.create(request, "origin").await.unwrap();
    assert_eq!(
        service.get(&key, None).await.unwrap().snippets[0].content,
        "secret"
    );
    assert!(matches!(
        service.get(&key, None).await,
        Err(AppError::NotFound)
    ));
}

#[tokio::test]
async fn password_protected_entry_survives_repeated_reads() {
    let (service, db, _dir) = service_with(Arc::new(MemoryBlobStore::new()));
    let mut request = text_request("guarded");
    request.password = Some("pw".to_string());

    let key = service.create(request, "origin").await.unwrap();
    let stored = db.entries.get(&key).unwrap().unwrap();
    assert_ne!(stored.password_hash.as_deref(), Some("pw"));

    for _ in 0..3 {
        assert!(service.get(&key, Some("pw")).await.is_ok());
    }
    assert!(matches!(
        service.get(&key, Some("nope")).await,
        Err(AppError::WrongPassword)
    ));
    assert!(matches!(
        service.get(&key, None).await,
        Err(AppError::WrongPassword)
    ));
}

#[tokio::test]
async fn expiry_is_stamped_from_expire_after() {
    let (service, _db, _dir) = service_with(Arc::new(MemoryBlobStore::new()));
    let mut request = text_request("soon");
    request.expire_after = Some(60);

    let before = Utc::now();
    let key = service.create(request, "origin").await.unwrap();
    let content = service.get(&key, None).await.unwrap();
    let deadline = content.expire_at.unwrap();
    assert!(deadline >= before + chrono::Duration::seconds(60));
    assert!(deadline <= Utc::now() + chrono::Duration::seconds(60));

    let mut never = text_request("forever");
    never.expire_after = Some(0);
    let key = service.create(never, "origin").await.unwrap();
    assert!(service.get(&key, None).await.unwrap().expire_at.is_none());
}

#[tokio::test]
async fn rejects_requests_without_exactly_one_payload_kind() {
    let blobs = Arc::new(MemoryBlobStore::new());
    let (service, db, _dir) = service_with(blobs.clone());

    let empty = service.create(CreatePasteRequest::default(), "o").await;
    assert!(matches!(empty, Err(AppError::BadRequest(_))));

    let mut both = image_request(1);
    both.snippets = vec![Snippet::new("text", "hi")];
    assert!(matches!(
        service.create(both, "o").await,
        Err(AppError::BadRequest(_))
    ));

    assert_eq!(blobs.upload_calls(), 0);
    assert!(db.entries.is_empty().unwrap());
}

#[tokio::test]
async fn snippet_limits_count_characters() {
    let (db, _dir) = temp_database();
    let limits = Limits {
        max_snippet_length: 3,
        max_snippet_count: 2,
        ..Limits::default()
    };
    let service = PasteService::new(
        entry_store(&db),
        Arc::new(MemoryBlobStore::new()),
        limits,
        TTL,
    );

    // Three characters, nine bytes.
    assert!(service.create(text_request("你好吗"), "o").await.is_ok());
    assert!(matches!(
        service.create(text_request("abcd"), "o").await,
        Err(AppError::BadRequest(_))
    ));
    assert!(matches!(
        service.create(text_request(""), "o").await,
        Err(AppError::BadRequest(_))
    ));

    let too_many = CreatePasteRequest {
        snippets: vec![Snippet::new("text", "a"); 3],
        ..CreatePasteRequest::default()
    };
    assert!(matches!(
        service.create(too_many, "o").await,
        Err(AppError::BadRequest(_))
    ));
}

#[tokio::test]
async fn blank_language_defaults_to_text() {
    let (service, _db, _dir) = service_with(Arc::new(MemoryBlobStore::new()));
    let request = CreatePasteRequest {
        snippets: vec![Snippet::new("  ", "body")],
        title: Some("  Title ".to_string()),
        ..CreatePasteRequest::default()
    };

    let key = service.create(request, "o").await.unwrap();
    let content = service.get(&key, None).await.unwrap();
    assert_eq!(content.snippets[0].language, "text");
    assert_eq!(content.title.as_deref(), Some("Title"));
}

#[tokio::test]
async fn attachments_are_listed_with_signed_urls() {
    let blobs = Arc::new(MemoryBlobStore::new());
    let (service, _db, _dir) = service_with(blobs.clone());

    let key = service.create(image_request(2), "o").await.unwrap();
    let content = service.get(&key, None).await.unwrap();

    assert_eq!(content.attachments.len(), 2);
    for view in &content.attachments {
        assert!(view.url.starts_with("memory://"));
        assert!(view.url.ends_with("?ttl=300"));
        assert!(view.inline.is_none());
        assert_eq!(view.height, 2);
    }
    assert_eq!(blobs.keys().len(), 2);
}

#[tokio::test]
async fn once_read_inlines_bytes_and_deletes_blobs() {
    let blobs = Arc::new(MemoryBlobStore::new());
    let (service, _db, _dir) = service_with(blobs.clone());
    let mut request = image_request(2);
    request.once = true;

    let key = service.create(request, "o").await.unwrap();
    let content = service.get(&key, None).await.unwrap();

    assert_eq!(content.attachments.len(), 2);
    for view in &content.attachments {
        let bytes = view.inline.as_ref().unwrap();
        assert_eq!(bytes.len() as u64, view.size_bytes);
    }
    assert!(blobs.keys().is_empty());
    assert!(matches!(
        service.get(&key, None).await,
        Err(AppError::NotFound)
    ));
}

#[tokio::test]
async fn rejected_once_read_still_releases_blobs() {
    let blobs = Arc::new(MemoryBlobStore::new());
    let (service, _db, _dir) = service_with(blobs.clone());
    let mut request = image_request(1);
    request.once = true;
    request.password = Some("pw".to_string());

    let key = service.create(request, "o").await.unwrap();
    assert!(matches!(
        service.get(&key, Some("bad")).await,
        Err(AppError::WrongPassword)
    ));
    assert!(blobs.keys().is_empty());
    assert!(matches!(
        service.get(&key, Some("pw")).await,
        Err(AppError::NotFound)
    ));
}

#[tokio::test]
async fn once_read_with_fetch_failure_leaves_blobs_for_sweeper() {
    let blobs = Arc::new(MemoryBlobStore::failing_fetch());
    let (service, _db, _dir) = service_with(blobs.clone());
    let mut request = image_request(1);
    request.once = true;

    let key = service.create(request, "o").await.unwrap();
    let content = service.get(&key, None).await.unwrap();

    assert!(content.attachments[0].inline.is_none());
    assert_eq!(blobs.keys().len(), 1);
}

#[tokio::test]
async fn upload_failure_leaves_no_entry_and_no_blobs() {
    let blobs = Arc::new(MemoryBlobStore::failing_upload(2));
    let (service, db, _dir) = service_with(blobs.clone());

    let result = service.create(image_request(3), "o").await;

    assert!(matches!(result, Err(AppError::Upload(_))));
    assert!(blobs.keys().is_empty());
    assert!(db.entries.is_empty().unwrap());
}

#[tokio::test]
async fn implausible_keys_are_not_found() {
    let (service, _db, _dir) = service_with(Arc::new(MemoryBlobStore::new()));
    assert!(matches!(
        service.get("../../etc", None).await,
        Err(AppError::NotFound)
    ));
    assert!(matches!(
        service.get("doesnotexist0000", None).await,
        Err(AppError::NotFound)
    ));
}

struct RejectingBackend;

impl KeyedStore for RejectingBackend {
    fn insert_unique(
        &self,
        _entry: &PasteEntry,
    ) -> Result<InsertOutcome, AppError> {
        Err(AppError::StorageMessage("disk full".to_string()))
    }

    fn get(&self, _key: &str) -> Result<Option<PasteEntry>, AppError> {
        Ok(None)
    }

    fn take(&self, _key: &str) -> Result<Option<PasteEntry>, AppError> {
        Ok(None)
    }

    fn remove(&self, _key: &str) -> Result<bool, AppError> {
        Ok(false)
    }

    fn scan_live(
        &self,
        _now: DateTime<Utc>,
        _on_entry: &mut dyn FnMut(&PasteEntry),
    ) -> Result<(), AppError> {
        Ok(())
    }

    fn purge_expired(&self, _now: DateTime<Utc>) -> Result<Vec<PasteEntry>, AppError> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn insert_failure_deletes_uploaded_attachments() {
    let blobs = Arc::new(MemoryBlobStore::new());
    let service = PasteService::new(
        EntryStore::new(Arc::new(RejectingBackend)),
        blobs.clone(),
        Limits::default(),
        TTL,
    );

    let result = service.create(image_request(2), "o").await;

    assert!(matches!(result, Err(AppError::StorageMessage(_))));
    assert_eq!(blobs.upload_calls(), 2);
    assert!(blobs.keys().is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn password_hashing_yields_to_other_tasks() {
    use std::sync::atomic::{AtomicBool, Ordering};

    let (service, _db, _dir) = service_with(Arc::new(MemoryBlobStore::new()));
    let mut request = text_request("guarded");
    request.password = Some("pw".to_string());

    // On a single-threaded runtime the spawned task only runs if the
    // service awaits something while hashing or verifying.
    let ticked = Arc::new(AtomicBool::new(false));
    let flag = ticked.clone();
    tokio::spawn(async move { flag.store(true, Ordering::SeqCst) });
    let key = service.create(request, "origin").await.unwrap();
    assert!(ticked.load(Ordering::SeqCst), "hashing ran on the async worker");

    ticked.store(false, Ordering::SeqCst);
    let flag = ticked.clone();
    tokio::spawn(async move { flag.store(true, Ordering::SeqCst) });
    let content = service.get(&key, Some("pw")).await.unwrap();
    assert_eq!(content.snippets[0].content, "guarded");
    assert!(ticked.load(Ordering::SeqCst), "verification ran on the async worker");
}
