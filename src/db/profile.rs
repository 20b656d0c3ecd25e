use chrono::{DateTime, Utc};
use sqlx::Row;
use tracing::debug;

use super::core::Database;
use crate::types::UserProfile;
use crate::TARGET_DB;

impl Database {
    pub async fn get_profile(&self) -> Result<Option<UserProfile>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM user_profile WHERE id = 1")
            .fetch_optional(self.pool())
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let likes: String = row.try_get("likes")?;
        let dislikes: String = row.try_get("dislikes")?;
        let created_at: String = row.try_get("created_at")?;
        let last_updated: String = row.try_get("last_updated")?;

        Ok(Some(UserProfile {
            likes: decode_list(&likes)?,
            dislikes: decode_list(&dislikes)?,
            changelog: row.try_get("changelog")?,
            created_at: decode_timestamp(&created_at)?,
            last_updated: decode_timestamp(&last_updated)?,
        }))
    }

    /// Atomic overwrite of the singleton profile document: a single upsert
    /// statement, so a failure leaves the prior profile untouched.
    pub async fn put_profile(&self, profile: &UserProfile) -> Result<(), sqlx::Error> {
        debug!(target: TARGET_DB, "Writing user profile ({} likes, {} dislikes)",
            profile.likes.len(), profile.dislikes.len());

        let likes = serde_json::to_string(&profile.likes)
            .map_err(|e| sqlx::Error::Protocol(format!("failed to encode likes: {}", e)))?;
        let dislikes = serde_json::to_string(&profile.dislikes)
            .map_err(|e| sqlx::Error::Protocol(format!("failed to encode dislikes: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO user_profile (id, likes, dislikes, changelog, created_at, last_updated)
            VALUES (1, ?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                likes = excluded.likes,
                dislikes = excluded.dislikes,
                changelog = excluded.changelog,
                last_updated = excluded.last_updated
            "#,
        )
        .bind(likes)
        .bind(dislikes)
        .bind(&profile.changelog)
        .bind(profile.created_at.to_rfc3339())
        .bind(profile.last_updated.to_rfc3339())
        .execute(self.pool())
        .await?;

        Ok(())
    }
}

fn decode_list(json: &str) -> Result<Vec<String>, sqlx::Error> {
    serde_json::from_str(json)
        .map_err(|e| sqlx::Error::Protocol(format!("failed to decode preference list: {}", e)))
}

fn decode_timestamp(s: &str) -> Result<DateTime<Utc>, sqlx::Error> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| sqlx::Error::Protocol(format!("unexpected timestamp value: {}", s)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_profile() -> UserProfile {
        let now = Utc::now();
        UserProfile {
            likes: vec!["rust async runtimes".to_string()],
            dislikes: vec!["celebrity gossip".to_string()],
            changelog: "Initial profile from four ratings.".to_string(),
            created_at: now,
            last_updated: now,
        }
    }

    #[tokio::test]
    async fn profile_is_absent_until_written() {
        let db = Database::open_in_memory().await.unwrap();
        assert!(db.get_profile().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn profile_round_trip() {
        let db = Database::open_in_memory().await.unwrap();
        let profile = sample_profile();
        db.put_profile(&profile).await.unwrap();

        let loaded = db.get_profile().await.unwrap().unwrap();
        assert_eq!(loaded.likes, profile.likes);
        assert_eq!(loaded.dislikes, profile.dislikes);
        assert_eq!(loaded.changelog, profile.changelog);
    }

    #[tokio::test]
    async fn overwrite_replaces_whole_document() {
        let db = Database::open_in_memory().await.unwrap();
        db.put_profile(&sample_profile()).await.unwrap();

        let mut updated = sample_profile();
        updated.likes = vec!["distributed systems".to_string()];
        updated.changelog = "Dropped runtimes, added distributed systems.".to_string();
        db.put_profile(&updated).await.unwrap();

        let loaded = db.get_profile().await.unwrap().unwrap();
        assert_eq!(loaded.likes, vec!["distributed systems".to_string()]);
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_profile")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}
