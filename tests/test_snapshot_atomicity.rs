//! A rebuild that lands mid-exchange must not change what that exchange sees

mod common;

use common::{engine_with, test_config, write_doc, GatedGenerator, HashEmbedder};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

#[tokio::test]
async fn test_in_flight_exchange_keeps_its_snapshot() {
    let temp = TempDir::new().unwrap();
    let mut config = test_config(temp.path());
    config.evaluation.enabled = false;

    let old_docs = temp.path().join("old");
    let new_docs = temp.path().join("new");
    write_doc(&old_docs, "sky.txt", "The sky is blue.");
    write_doc(&new_docs, "sky.txt", "The sky is green on this planet.");

    let gate = Arc::new(GatedGenerator::default());
    let engine = Arc::new(engine_with(
        config,
        Arc::new(HashEmbedder::default()),
        gate.clone(),
    ));
    let exts = vec![".txt".to_string()];

    let first = engine.build_index(&old_docs, &exts).await.unwrap();

    let asking = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.ask(&[], "What color is the sky?").await })
    };

    // Exchange has retrieved and is now blocked in generation
    tokio::time::timeout(Duration::from_secs(5), gate.entered.notified())
        .await
        .unwrap();

    let second = engine.build_index(&new_docs, &exts).await.unwrap();
    assert_ne!(first.version, second.version);
    assert_eq!(
        engine.store().current().unwrap().version(),
        second.version.as_deref().unwrap()
    );

    gate.release.notify_one();
    let exchange = tokio::time::timeout(Duration::from_secs(5), asking)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    assert_eq!(exchange.cited_chunks[0].text, "The sky is blue.");
    assert!(exchange.assistant_turn.content.contains("blue"));

    // The next exchange sees the rebuilt corpus
    let next = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.ask(&[], "What color is the sky?").await })
    };
    gate.entered.notified().await;
    gate.release.notify_one();
    let exchange = next.await.unwrap().unwrap();
    assert!(exchange.cited_chunks[0].text.contains("green"));
}
