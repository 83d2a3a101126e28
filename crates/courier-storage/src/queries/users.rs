// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! User lookups for authentication, plus provisioning for the seeder.

use courier_core::{CourierError, User};
use rusqlite::{params, OptionalExtension};

use crate::database::{map_tr_err, Database};

const USER_COLUMNS: &str =
    "id, email, api_key_hash, role, rate_limit_tier, is_active, created_at, updated_at";

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        api_key_hash: row.get(2)?,
        role: row.get(3)?,
        rate_limit_tier: row.get(4)?,
        is_active: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

/// Insert a user row. Used by the seed tool and tests; the service itself
/// only reads users.
pub async fn insert(db: &Database, user: &User) -> Result<(), CourierError> {
    let user = user.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO users (id, email, api_key_hash, role, rate_limit_tier, is_active, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    user.id,
                    user.email,
                    user.api_key_hash,
                    user.role,
                    user.rate_limit_tier,
                    user.is_active,
                    user.created_at,
                    user.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Look up a user by the SHA-256 hex digest of their API key.
pub async fn get_by_api_key_hash(db: &Database, hash: &str) -> Result<User, CourierError> {
    let hash = hash.to_string();
    db.connection()
        .call(move |conn| {
            let user = conn
                .query_row(
                    &format!("SELECT {USER_COLUMNS} FROM users WHERE api_key_hash = ?1"),
                    params![hash],
                    row_to_user,
                )
                .optional()?;
            Ok(user)
        })
        .await
        .map_err(map_tr_err)?
        .ok_or(CourierError::NotFound)
}

/// Look up a user by id.
pub async fn get_by_id(db: &Database, id: &str) -> Result<User, CourierError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let user = conn
                .query_row(
                    &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                    params![id],
                    row_to_user,
                )
                .optional()?;
            Ok(user)
        })
        .await
        .map_err(map_tr_err)?
        .ok_or(CourierError::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::types::now_timestamp;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn make_user(id: &str, hash: &str) -> User {
        User {
            id: id.to_string(),
            email: format!("{id}@example.com"),
            api_key_hash: hash.to_string(),
            role: "user".to_string(),
            rate_limit_tier: "free".to_string(),
            is_active: true,
            created_at: now_timestamp(),
            updated_at: now_timestamp(),
        }
    }

    #[tokio::test]
    async fn insert_and_get_by_hash() {
        let (db, _dir) = setup_db().await;
        insert(&db, &make_user("u-1", "abc123")).await.unwrap();

        let user = get_by_api_key_hash(&db, "abc123").await.unwrap();
        assert_eq!(user.id, "u-1");
        assert_eq!(user.email, "u-1@example.com");
        assert!(user.is_active);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn unknown_hash_is_not_found() {
        let (db, _dir) = setup_db().await;
        let err = get_by_api_key_hash(&db, "nope").await.unwrap_err();
        assert!(matches!(err, CourierError::NotFound));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn get_by_id_round_trips() {
        let (db, _dir) = setup_db().await;
        insert(&db, &make_user("u-2", "hash2")).await.unwrap();

        let user = get_by_id(&db, "u-2").await.unwrap();
        assert_eq!(user.rate_limit_tier, "free");

        let err = get_by_id(&db, "u-missing").await.unwrap_err();
        assert!(matches!(err, CourierError::NotFound));

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let (db, _dir) = setup_db().await;
        let mut a = make_user("u-3", "hash3");
        a.email = "same@example.com".to_string();
        let mut b = make_user("u-4", "hash4");
        b.email = "same@example.com".to_string();

        insert(&db, &a).await.unwrap();
        assert!(insert(&db, &b).await.is_err());

        db.close().await.unwrap();
    }
}
