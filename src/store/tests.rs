use super::*;
use tempfile::TempDir;

fn sample_documents(count: usize) -> Vec<Document> {
    (0..count)
        .map(|i| Document {
            subject: format!("Invoice #{}", i),
            sender: format!("billing{}@example.com", i),
            date: format!("2024-03-{:02}", i + 1),
            body: format!("Please find invoice {} attached.", i),
        })
        .collect()
}

fn sample_index(count: usize) -> FlatIndex {
    let vectors: Vec<Vec<f32>> = (0..count)
        .map(|i| vec![i as f32, 1.0, -(i as f32)])
        .collect();
    FlatIndex::from_vectors(vectors).expect("sample vectors are well formed")
}

#[test]
fn embedding_text_includes_headers_and_body() {
    let document = Document {
        subject: "Refund request".to_string(),
        sender: "alice@example.com".to_string(),
        date: "2024-05-01".to_string(),
        body: "I would like a refund for order 441.".to_string(),
    };

    assert_eq!(
        document.embedding_text(),
        "Subject: Refund request\nFrom: alice@example.com\nDate: 2024-05-01\n\n\
         I would like a refund for order 441."
    );
}

#[tokio::test]
async fn open_on_empty_directory_is_unloaded() {
    let dir = TempDir::new().expect("tempdir");
    let store = IndexStore::open(dir.path()).await;

    assert!(store.current().await.is_none());
}

#[tokio::test]
async fn open_does_not_create_directories() {
    let dir = TempDir::new().expect("tempdir");
    let root = dir.path().join("never-built");

    let store = IndexStore::open(&root).await;

    assert!(store.current().await.is_none());
    assert!(!root.exists());
}

#[tokio::test]
async fn publish_makes_generation_current() {
    let dir = TempDir::new().expect("tempdir");
    let store = IndexStore::open(dir.path()).await;

    let published = store
        .publish(sample_index(3), sample_documents(3), "nomic-embed-text:latest")
        .await
        .expect("publish succeeds");

    let current = store.current().await.expect("index is loaded");
    assert_eq!(current.id, published.id);
    assert_eq!(current.document_count(), 3);
    assert_eq!(current.dimension(), 3);
    assert_eq!(current.embedding_model, "nomic-embed-text:latest");
    assert_eq!(
        current.document(1).expect("ordinal 1 exists").subject,
        "Invoice #1"
    );
    assert!(current.document(3).is_none());
}

#[tokio::test]
async fn publish_survives_reopen() {
    let dir = TempDir::new().expect("tempdir");
    let published_id = {
        let store = IndexStore::open(dir.path()).await;
        store
            .publish(sample_index(2), sample_documents(2), "nomic-embed-text:latest")
            .await
            .expect("publish succeeds")
            .id
    };

    let reopened = IndexStore::open(dir.path()).await;
    let current = reopened.current().await.expect("index reloads from disk");

    assert_eq!(current.id, published_id);
    assert_eq!(current.document_count(), 2);
    assert_eq!(
        current.document(0).expect("ordinal 0 exists").sender,
        "billing0@example.com"
    );
}

#[tokio::test]
async fn publish_rejects_document_vector_mismatch() {
    let dir = TempDir::new().expect("tempdir");
    let store = IndexStore::open(dir.path()).await;

    let result = store
        .publish(sample_index(2), sample_documents(3), "nomic-embed-text:latest")
        .await;

    assert!(matches!(result, Err(RagError::Index(_))));
    assert!(store.current().await.is_none());
}

#[tokio::test]
async fn republish_replaces_current_and_prunes_retired() {
    let dir = TempDir::new().expect("tempdir");
    let store = IndexStore::open(dir.path()).await;

    let first = store
        .publish(sample_index(2), sample_documents(2), "nomic-embed-text:latest")
        .await
        .expect("first publish succeeds");
    let second = store
        .publish(sample_index(4), sample_documents(4), "nomic-embed-text:latest")
        .await
        .expect("second publish succeeds");

    let current = store.current().await.expect("index is loaded");
    assert_eq!(current.id, second.id);
    assert_eq!(current.document_count(), 4);

    let pointer = std::fs::read_to_string(dir.path().join("CURRENT")).expect("pointer exists");
    assert_eq!(pointer.trim(), second.id.to_string());
    assert!(!dir.path().join(format!("gen-{}", first.id)).exists());
    assert!(dir.path().join(format!("gen-{}", second.id)).exists());
}

#[tokio::test]
async fn inflight_handle_survives_republish() {
    let dir = TempDir::new().expect("tempdir");
    let store = IndexStore::open(dir.path()).await;

    store
        .publish(sample_index(2), sample_documents(2), "nomic-embed-text:latest")
        .await
        .expect("first publish succeeds");
    let held = store.current().await.expect("index is loaded");

    store
        .publish(sample_index(5), sample_documents(5), "nomic-embed-text:latest")
        .await
        .expect("second publish succeeds");

    // The retired generation stays fully usable through the held handle.
    assert_eq!(held.document_count(), 2);
    assert_eq!(
        held.document(1).expect("ordinal 1 exists").subject,
        "Invoice #1"
    );
    let hits = held.index.search(&[0.0, 1.0, 0.0], 1);
    assert_eq!(hits.len(), 1);

    let current = store.current().await.expect("index is loaded");
    assert_ne!(current.id, held.id);
    assert_eq!(current.document_count(), 5);
}

#[tokio::test]
async fn malformed_pointer_yields_unloaded_store() {
    let dir = TempDir::new().expect("tempdir");
    std::fs::write(dir.path().join("CURRENT"), "not-a-uuid").expect("write pointer");

    let store = IndexStore::open(dir.path()).await;

    assert!(store.current().await.is_none());
}

#[tokio::test]
async fn pointer_to_missing_generation_yields_unloaded_store() {
    let dir = TempDir::new().expect("tempdir");
    std::fs::write(
        dir.path().join("CURRENT"),
        Uuid::new_v4().to_string(),
    )
    .expect("write pointer");

    let store = IndexStore::open(dir.path()).await;

    assert!(store.current().await.is_none());
}

#[tokio::test]
async fn corrupt_vector_blob_yields_unloaded_store() {
    let dir = TempDir::new().expect("tempdir");
    let id = {
        let store = IndexStore::open(dir.path()).await;
        store
            .publish(sample_index(3), sample_documents(3), "nomic-embed-text:latest")
            .await
            .expect("publish succeeds")
            .id
    };

    let blob_path = dir.path().join(format!("gen-{}", id)).join("vectors.bin");
    let blob = std::fs::read(&blob_path).expect("blob exists");
    std::fs::write(&blob_path, &blob[..blob.len() / 2]).expect("truncate blob");

    let store = IndexStore::open(dir.path()).await;
    assert!(store.current().await.is_none());
}

#[tokio::test]
async fn load_rejects_broken_document_pairing() {
    let dir = TempDir::new().expect("tempdir");
    let id = {
        let store = IndexStore::open(dir.path()).await;
        store
            .publish(sample_index(3), sample_documents(3), "nomic-embed-text:latest")
            .await
            .expect("publish succeeds")
            .id
    };

    let documents_path = dir.path().join(format!("gen-{}", id)).join("documents.json");
    let shortened = serde_json::to_vec(&sample_documents(2)).expect("serialize");
    std::fs::write(&documents_path, shortened).expect("rewrite documents");

    let store = IndexStore::open(dir.path()).await;
    assert!(store.current().await.is_none());
}
