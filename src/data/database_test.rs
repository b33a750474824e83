//! Database tests

use super::*;
use crate::data::models::NewUser;
use std::sync::Arc;
use tempfile::TempDir;

/// Helper to create a test database
async fn create_test_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let db = Database::connect(&db_path).await.unwrap();
    (db, temp_dir)
}

fn profile(user_id: i64) -> NewUser {
    NewUser {
        user_id,
        chat_id: user_id,
        first_name: format!("User{}", user_id),
        last_name: "Test".to_string(),
        username: Some(format!("user{}", user_id)),
    }
}

#[tokio::test]
async fn test_database_connection() {
    let (_db, _temp_dir) = create_test_db().await;
    // Connection successful if we get here without panicking
}

#[tokio::test]
async fn test_insert_and_get_user() {
    let (db, _temp_dir) = create_test_db().await;

    let user = profile(100).into_user(false, false);
    assert!(db.insert_user(&user).await.unwrap());

    let retrieved = db.get_user(100).await.unwrap().unwrap();
    assert_eq!(retrieved.first_name, "User100");
    assert_eq!(retrieved.username, Some("user100".to_string()));
    assert!(!retrieved.is_authorized);
    assert!(!retrieved.is_admin);

    // Second insert with the same id is a no-op
    assert!(!db.insert_user(&user).await.unwrap());
    assert_eq!(db.count_users().await.unwrap(), 1);
}

#[tokio::test]
async fn test_get_missing_user_is_none() {
    let (db, _temp_dir) = create_test_db().await;
    assert!(db.get_user(42).await.unwrap().is_none());
}

#[tokio::test]
async fn test_first_user_insert_grants_bootstrap_flags() {
    let (db, _temp_dir) = create_test_db().await;

    assert!(db.is_first_user().await.unwrap());

    let first = profile(1).into_user(false, false);
    assert!(db.insert_user_if_first(&first).await.unwrap());

    let stored = db.get_user(1).await.unwrap().unwrap();
    assert!(stored.is_authorized);
    assert!(stored.is_admin);

    // A second contender loses the insert-if-first race entirely
    let second = profile(2).into_user(false, false);
    assert!(!db.insert_user_if_first(&second).await.unwrap());
    assert!(db.get_user(2).await.unwrap().is_none());
    assert!(!db.is_first_user().await.unwrap());
}

#[tokio::test]
async fn test_concurrent_first_contact_grants_one_bootstrap_admin() {
    let (db, _temp_dir) = create_test_db().await;
    let db = Arc::new(db);

    let mut handles = Vec::new();
    for id in 1..=8i64 {
        let db = db.clone();
        handles.push(tokio::spawn(async move {
            let user = profile(id).into_user(false, false);
            db.insert_user_if_first(&user).await.unwrap()
        }));
    }

    let mut bootstrap_wins = 0;
    for handle in handles {
        if handle.await.unwrap() {
            bootstrap_wins += 1;
        }
    }

    assert_eq!(bootstrap_wins, 1);
    assert_eq!(db.list_admins().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_set_authorization() {
    let (db, _temp_dir) = create_test_db().await;

    let user = profile(7).into_user(false, false);
    db.insert_user(&user).await.unwrap();

    assert!(db.set_authorization(7, true, true).await.unwrap());
    let stored = db.get_user(7).await.unwrap().unwrap();
    assert!(stored.is_authorized);
    assert!(stored.is_admin);

    // Deauthorize clears both flags
    assert!(db.set_authorization(7, false, false).await.unwrap());
    let stored = db.get_user(7).await.unwrap().unwrap();
    assert!(!stored.is_authorized);
    assert!(!stored.is_admin);

    // Unknown target reports no row updated
    assert!(!db.set_authorization(999, true, false).await.unwrap());
}

#[tokio::test]
async fn test_list_users_pagination() {
    let (db, _temp_dir) = create_test_db().await;

    for id in 1..=15i64 {
        db.insert_user(&profile(id).into_user(false, false))
            .await
            .unwrap();
    }

    assert_eq!(db.count_users().await.unwrap(), 15);

    let first_page = db.list_users(0, 10).await.unwrap();
    assert_eq!(first_page.len(), 10);

    let second_page = db.list_users(10, 10).await.unwrap();
    assert_eq!(second_page.len(), 5);
}

#[tokio::test]
async fn test_list_admins() {
    let (db, _temp_dir) = create_test_db().await;

    db.insert_user(&profile(1).into_user(true, true))
        .await
        .unwrap();
    db.insert_user(&profile(2).into_user(true, false))
        .await
        .unwrap();
    db.insert_user(&profile(3).into_user(false, false))
        .await
        .unwrap();

    let admins = db.list_admins().await.unwrap();
    assert_eq!(admins.len(), 1);
    assert_eq!(admins[0].user_id, 1);
}
