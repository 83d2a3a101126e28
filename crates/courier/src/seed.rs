// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `courier seed` command implementation.
//!
//! Provisions a user row with a freshly generated API key. The key is
//! printed exactly once; only its SHA-256 hash is stored.

use courier_config::CourierConfig;
use courier_core::types::{now_timestamp, User};
use courier_core::{hash_api_key, CourierError};
use courier_storage::{Database, UserRepository};

pub async fn run_seed(
    config: CourierConfig,
    email: String,
    tier: String,
) -> Result<(), CourierError> {
    let db = Database::open(&config.storage.database_path).await?;
    let users = UserRepository::new(db.clone());

    let api_key = format!("courier_{}", uuid::Uuid::new_v4().simple());
    let now = now_timestamp();
    let user = User {
        id: uuid::Uuid::new_v4().to_string(),
        email,
        api_key_hash: hash_api_key(&api_key),
        role: "user".to_string(),
        rate_limit_tier: tier,
        is_active: true,
        created_at: now.clone(),
        updated_at: now,
    };
    users.insert(&user).await?;

    println!("user created");
    println!("  id:      {}", user.id);
    println!("  email:   {}", user.email);
    println!("  tier:    {}", user.rate_limit_tier);
    println!("  api key: {api_key}");
    println!("store the key now; only its hash is persisted.");

    db.close().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_config::model::StorageConfig;
    use tempfile::tempdir;

    #[tokio::test]
    async fn seed_creates_an_active_user() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("seed.db");
        let config = CourierConfig {
            storage: StorageConfig {
                database_path: db_path.to_str().unwrap().to_string(),
            },
            ..CourierConfig::default()
        };

        run_seed(config, "seeded@example.com".into(), "pro".into())
            .await
            .unwrap();

        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        let count: i64 = db
            .connection()
            .call(|conn| {
                let n = conn.query_row(
                    "SELECT COUNT(*) FROM users WHERE email = 'seeded@example.com'
                     AND is_active = 1 AND rate_limit_tier = 'pro'",
                    [],
                    |row| row.get(0),
                )?;
                Ok(n)
            })
            .await
            .unwrap();
        assert_eq!(count, 1);
        db.close().await.unwrap();
    }
}
