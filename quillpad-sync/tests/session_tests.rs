//! End-to-end session tests against the in-process hub.
//!
//! Time is paused so the debounce window can be crossed deterministically.

use std::sync::Arc;
use std::time::Duration;

use quillpad_model::{BlockSpec, BlockType, Comment, Document, Position, Selection};
use quillpad_sync::{
    DocId, DocSession, FailingTransport, LocalHub, MemorySnapshotStore, SessionConfig,
    SessionState, SnapshotStore, StaticIdentity, UserInfo,
};

fn user(id: &str) -> UserInfo {
    UserInfo {
        id: id.to_string(),
        name: id.to_string(),
        email: format!("{id}@example.com"),
    }
}

async fn open_session(
    doc: &DocId,
    who: &str,
    hub: &Arc<LocalHub>,
    store: &Arc<MemorySnapshotStore>,
    config: SessionConfig,
) -> DocSession {
    DocSession::open(
        doc.clone(),
        Arc::new(StaticIdentity(user(who))),
        store.clone(),
        hub.clone(),
        config,
    )
    .await
    .unwrap()
}

/// Let spawned workers drain their queues without advancing time.
async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn debounce_coalesces_an_edit_burst_into_one_push() {
    let hub = Arc::new(LocalHub::new());
    let store = Arc::new(MemorySnapshotStore::new());
    let doc_id = DocId::new("doc");
    let session = open_session(&doc_id, "alice", &hub, &store, SessionConfig::default()).await;

    let doc = Document::new("Notes");
    let title = doc.blocks[0].key;
    let mut current = doc;
    for text in ["one", "two", "three"] {
        let outcome = current
            .insert_block_after(title, BlockSpec::text(BlockType::Paragraph, text))
            .unwrap();
        current = outcome.doc;
        session
            .edit(current.snapshot(), outcome.selection)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    // three edits inside the quiet window, one publish after it
    tokio::time::sleep(Duration::from_millis(600)).await;
    settle().await;
    assert_eq!(store.push_count(), 1);
    assert_eq!(store.fetch(&doc_id).await.unwrap(), Some(current.snapshot()));
    assert!(!session.view().dirty);
}

#[tokio::test(start_paused = true)]
async fn own_publish_echo_does_not_disturb_the_live_model() {
    let hub = Arc::new(LocalHub::new());
    let store = Arc::new(MemorySnapshotStore::new());
    let doc_id = DocId::new("doc");
    let session = open_session(&doc_id, "alice", &hub, &store, SessionConfig::default()).await;

    let doc = Document::new("Echo");
    let title = doc.blocks[0].key;
    let outcome = doc
        .insert_block_after(title, BlockSpec::text(BlockType::Paragraph, "body"))
        .unwrap();
    let snapshot = outcome.doc.snapshot();
    session.edit(snapshot.clone(), outcome.selection).await.unwrap();

    tokio::time::sleep(Duration::from_millis(600)).await;
    settle().await;

    // the hub fanned the publish back to its sender
    let echoed = hub.latest(&doc_id).await.unwrap();
    assert_eq!(echoed.publisher, "alice");

    let view = session.view();
    assert_eq!(view.snapshot, snapshot);
    assert_eq!(view.selection, outcome.selection);
    assert!(!view.dirty);
    assert_eq!(store.push_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn close_flushes_the_pending_edit_before_teardown() {
    let hub = Arc::new(LocalHub::new());
    let store = Arc::new(MemorySnapshotStore::new());
    let doc_id = DocId::new("doc");
    let session = open_session(&doc_id, "alice", &hub, &store, SessionConfig::default()).await;

    let doc = Document::new("Draft");
    let caret = Selection::caret(Position::new(doc.blocks[0].key, 5));
    session.edit(doc.snapshot(), caret).await.unwrap();

    // close well inside the debounce window
    session.close().await.unwrap();
    assert_eq!(store.push_count(), 1);
    assert_eq!(store.fetch(&doc_id).await.unwrap(), Some(doc.snapshot()));
}

#[tokio::test(start_paused = true)]
async fn failed_tokens_leave_the_session_idle_but_editable() {
    let store = Arc::new(MemorySnapshotStore::new());
    let doc_id = DocId::new("doc");
    let session = DocSession::open(
        doc_id.clone(),
        Arc::new(StaticIdentity(user("alice"))),
        store.clone(),
        Arc::new(FailingTransport),
        SessionConfig::default(),
    )
    .await
    .unwrap();

    assert_eq!(session.view().state, SessionState::Idle);

    let doc = Document::new("Offline");
    let caret = Selection::caret(Position::new(doc.blocks[0].key, 0));
    session.edit(doc.snapshot(), caret).await.unwrap();
    tokio::time::sleep(Duration::from_millis(600)).await;
    settle().await;

    // persistence still works without a live channel
    assert_eq!(store.fetch(&doc_id).await.unwrap(), Some(doc.snapshot()));
    assert_eq!(session.view().state, SessionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn edits_propagate_between_two_sessions() {
    let hub = Arc::new(LocalHub::new());
    let store = Arc::new(MemorySnapshotStore::new());
    let doc_id = DocId::new("doc");

    // seed the store so both sessions load identical block keys
    let doc = Document::new("Shared");
    store.push(&doc_id, &doc.snapshot()).await.unwrap();

    let alice = open_session(&doc_id, "alice", &hub, &store, SessionConfig::default()).await;
    let bob = open_session(&doc_id, "bob", &hub, &store, SessionConfig::default()).await;
    let mut bob_view = bob.watch();

    let title = doc.blocks[0].key;
    let outcome = doc
        .insert_block_after(title, BlockSpec::text(BlockType::Heading1, "Agenda"))
        .unwrap();
    alice
        .edit(outcome.doc.snapshot(), outcome.selection)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(600)).await;

    loop {
        bob_view.changed().await.unwrap();
        if bob_view.borrow().snapshot == outcome.doc.snapshot() {
            break;
        }
    }
    assert!(!bob.view().dirty);
    let _ = alice;
}

#[tokio::test(start_paused = true)]
async fn remote_snapshot_preserves_the_receivers_selection() {
    let hub = Arc::new(LocalHub::new());
    let store = Arc::new(MemorySnapshotStore::new());
    let doc_id = DocId::new("doc");

    let doc = Document::new("Shared title");
    let title = doc.blocks[0].key;
    store.push(&doc_id, &doc.snapshot()).await.unwrap();

    let alice = open_session(&doc_id, "alice", &hub, &store, SessionConfig::default()).await;
    let bob = open_session(&doc_id, "bob", &hub, &store, SessionConfig::default()).await;
    let mut bob_view = bob.watch();

    // bob parks a caret mid-title without editing
    let caret = Selection::caret(Position::new(title, 6));
    bob.edit(doc.snapshot(), caret).await.unwrap();
    settle().await;

    let outcome = doc
        .insert_block_after(title, BlockSpec::text(BlockType::Paragraph, "from alice"))
        .unwrap();
    let published = outcome.doc.snapshot();
    alice.edit(published.clone(), outcome.selection).await.unwrap();
    tokio::time::sleep(Duration::from_millis(600)).await;

    loop {
        bob_view.changed().await.unwrap();
        if bob_view.borrow().snapshot == published {
            break;
        }
    }
    // the title block survived the update, so the caret stays put
    assert_eq!(bob.view().selection, caret);
    let _ = alice;
}

#[tokio::test(start_paused = true)]
async fn concurrent_unflushed_edit_is_overwritten_by_the_remote_snapshot() {
    let hub = Arc::new(LocalHub::new());
    let store = Arc::new(MemorySnapshotStore::new());
    let doc_id = DocId::new("doc");

    let doc = Document::new("Contested");
    let title = doc.blocks[0].key;
    store.push(&doc_id, &doc.snapshot()).await.unwrap();

    let alice = open_session(&doc_id, "alice", &hub, &store, SessionConfig::default()).await;
    // bob debounces slowly so his edit is still pending when alice lands
    let bob = open_session(
        &doc_id,
        "bob",
        &hub,
        &store,
        SessionConfig {
            debounce: Duration::from_secs(10),
        },
    )
    .await;
    let mut bob_view = bob.watch();

    let bob_edit = doc
        .insert_block_after(title, BlockSpec::text(BlockType::Paragraph, "bob's take"))
        .unwrap();
    bob.edit(bob_edit.doc.snapshot(), bob_edit.selection)
        .await
        .unwrap();
    settle().await;
    assert!(bob.view().dirty);

    let alice_edit = doc
        .insert_block_after(title, BlockSpec::text(BlockType::Paragraph, "alice's take"))
        .unwrap();
    let published = alice_edit.doc.snapshot();
    alice
        .edit(published.clone(), alice_edit.selection)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(600)).await;

    // whole-snapshot replacement: bob's pending edit is gone, not merged
    loop {
        bob_view.changed().await.unwrap();
        if bob_view.borrow().snapshot == published {
            break;
        }
    }
    let view = bob.view();
    assert!(!view.dirty);
    let texts: Vec<&str> = view.snapshot.blocks.iter().map(|b| b.text.as_str()).collect();
    assert_eq!(texts, vec!["Contested", "alice's take"]);
}

#[tokio::test(start_paused = true)]
async fn entity_mutations_reach_peers_only_when_published() {
    let hub = Arc::new(LocalHub::new());
    let store = Arc::new(MemorySnapshotStore::new());
    let doc_id = DocId::new("doc");

    let doc = Document::new("Please review this");
    let title = doc.blocks[0].key;
    let caret = Selection::caret(Position::new(title, 13));
    let outcome = doc
        .create_or_append_comment(&caret, Comment::new("bob", "typo?"))
        .unwrap();
    let with_comment = outcome.doc;
    let comment_id = with_comment.comments_in_order()[0].1.id.clone();
    store.push(&doc_id, &with_comment.snapshot()).await.unwrap();

    let alice = open_session(&doc_id, "alice", &hub, &store, SessionConfig::default()).await;
    let bob = open_session(&doc_id, "bob", &hub, &store, SessionConfig::default()).await;
    let mut alice_view = alice.watch();

    // the deletion exists only in bob's local model until he publishes it
    let after_delete = with_comment.delete_comment(&comment_id).unwrap();
    settle().await;
    assert_eq!(alice.view().snapshot, with_comment.snapshot());

    bob.edit(after_delete.snapshot(), caret).await.unwrap();
    tokio::time::sleep(Duration::from_millis(600)).await;

    loop {
        alice_view.changed().await.unwrap();
        if alice_view.borrow().snapshot == after_delete.snapshot() {
            break;
        }
    }
    assert!(alice.view().snapshot.blocks[0].entity_ranges.is_empty());
}

#[tokio::test(start_paused = true)]
async fn pasted_markup_materializes_and_reaches_the_peer() {
    let hub = Arc::new(LocalHub::new());
    let store = Arc::new(MemorySnapshotStore::new());
    let doc_id = DocId::new("doc");

    let doc = Document::new("Minutes");
    let title = doc.blocks[0].key;
    store.push(&doc_id, &doc.snapshot()).await.unwrap();

    let alice = open_session(&doc_id, "alice", &hub, &store, SessionConfig::default()).await;
    let bob = open_session(&doc_id, "bob", &hub, &store, SessionConfig::default()).await;
    let mut bob_view = bob.watch();

    let markup = "<h2>Action items</h2><ul><li>ship it</li><li>tell everyone</li></ul>";
    let quillpad_ingest::IngestOutcome::Structured(content) =
        quillpad_ingest::ingest_markup(markup)
    else {
        panic!("expected structured content");
    };
    let caret = Selection::caret(Position::new(title, doc.blocks[0].len()));
    let outcome = quillpad_ingest::insert_mixed_content(&doc, &caret, &content).unwrap();

    alice
        .edit(outcome.doc.snapshot(), outcome.selection)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(600)).await;

    loop {
        bob_view.changed().await.unwrap();
        if bob_view.borrow().snapshot == outcome.doc.snapshot() {
            break;
        }
    }
    let types: Vec<BlockType> = bob
        .view()
        .snapshot
        .blocks
        .iter()
        .map(|b| b.block_type)
        .collect();
    assert_eq!(
        types,
        vec![
            BlockType::Title,
            BlockType::Heading2,
            BlockType::BulletListItem,
            BlockType::BulletListItem,
        ]
    );
}
