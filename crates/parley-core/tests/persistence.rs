//! Persistence tests - verify data survives database closure and reopening

use parley_core::{Database, Messenger};
use uuid::Uuid;

fn temp_db_path() -> std::path::PathBuf {
    let mut path = std::env::temp_dir();
    let filename = format!("parley-persistence-test-{}.db", Uuid::new_v4());
    path.push(filename);
    path
}

#[tokio::test]
async fn conversation_persists_across_reopen() {
    let db_path = temp_db_path();

    // Phase 1: Create and populate
    let sent = {
        let db = Database::open(&db_path).await.expect("open db");
        let messenger = Messenger::new(db.clone());

        messenger
            .send_direct_message(1, 2, "first")
            .await
            .expect("send");
        let sent = messenger
            .send_direct_message(1, 2, "second")
            .await
            .expect("send");

        db.close().await;
        sent
    };

    // Phase 2: Reopen and verify
    {
        let db = Database::open(&db_path).await.expect("reopen db");
        let messenger = Messenger::new(db.clone());

        let detail = messenger
            .load_thread_for_user(2, sent.thread.id)
            .await
            .expect("load")
            .expect("participant");

        assert_eq!(detail.thread, sent.thread);
        assert_eq!(detail.messages.len(), 2);
        assert_eq!(detail.messages[1], sent.message);
        assert_eq!(detail.viewer.unread_count, 2);

        db.close().await;
    }
}

#[tokio::test]
async fn read_state_persists_across_reopen() {
    let db_path = temp_db_path();

    let thread_id = {
        let db = Database::open(&db_path).await.expect("open db");
        let messenger = Messenger::new(db.clone());
        let sent = messenger
            .send_direct_message(7, 8, "ping")
            .await
            .expect("send");
        assert!(
            messenger
                .mark_thread_read(8, sent.thread.id)
                .await
                .expect("mark")
        );
        db.close().await;
        sent.thread.id
    };

    {
        let db = Database::open(&db_path).await.expect("reopen db");
        let messenger = Messenger::new(db.clone());
        let detail = messenger
            .load_thread_for_user(8, thread_id)
            .await
            .expect("load")
            .expect("participant");
        assert_eq!(detail.viewer.unread_count, 0);
        assert!(detail.viewer.last_read_at.is_some());

        // Reopening must not duplicate the thread.
        let again = messenger.ensure_direct_thread(8, 7).await.expect("ensure");
        assert_eq!(again.id, thread_id);
        assert_eq!(db.count_threads().await.expect("count"), 1);
        db.close().await;
    }
}

#[tokio::test]
async fn open_creates_missing_parent_directories() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("nested").join("deeper").join("messages.db");

    let db = Database::open(&db_path).await.expect("open db");
    assert!(db_path.exists());
    assert_eq!(db.count_threads().await.expect("count"), 0);
    db.close().await;
}
