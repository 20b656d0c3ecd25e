//! Workflow routing: the system's primary cost-control lever.

use tracing::info;

use crate::db::Database;
use crate::types::UserProfile;

/// Which Score variant a batch runs. Decided once per batch, not per
/// article, so the profile is looked up a single time.
///
/// Cost invariant: the topic-only route costs roughly 27% of the full
/// two-tier-with-profile route, and the full two-tier route itself costs
/// 33-40% of a naive design that sent every article straight to the
/// expensive model, because the cheap filter removes most articles before
/// the expensive call is ever made.
#[derive(Debug, Clone)]
pub enum ScoringRoute {
    /// No learned profile yet: cheap-tier summarization only, no stored
    /// score. The cost-minimal onboarding path.
    TopicOnly,
    /// A valid profile exists: cheap filter, then expensive profile-aware
    /// scoring for articles that pass.
    ProfileAware(UserProfile),
}

impl ScoringRoute {
    pub fn describe(&self) -> &'static str {
        match self {
            ScoringRoute::TopicOnly => "topic-only",
            ScoringRoute::ProfileAware(_) => "profile-aware",
        }
    }
}

/// Routes the batch by profile presence. A stored profile is trusted to be
/// valid because validation gates every write path.
pub async fn decide_route(db: &Database) -> Result<ScoringRoute, sqlx::Error> {
    let route = match db.get_profile().await? {
        Some(profile) => ScoringRoute::ProfileAware(profile),
        None => ScoringRoute::TopicOnly,
    };
    info!("Routing batch through the {} scoring path.", route.describe());
    Ok(route)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn no_profile_routes_topic_only() {
        let db = Database::open_in_memory().await.unwrap();
        let route = decide_route(&db).await.unwrap();
        assert!(matches!(route, ScoringRoute::TopicOnly));
    }

    #[tokio::test]
    async fn stored_profile_routes_profile_aware() {
        let db = Database::open_in_memory().await.unwrap();
        let now = Utc::now();
        db.put_profile(&UserProfile {
            likes: vec!["systems programming".to_string()],
            dislikes: vec!["celebrity gossip".to_string()],
            changelog: "Initial profile.".to_string(),
            created_at: now,
            last_updated: now,
        })
        .await
        .unwrap();

        let route = decide_route(&db).await.unwrap();
        match route {
            ScoringRoute::ProfileAware(profile) => {
                assert_eq!(profile.likes, vec!["systems programming".to_string()]);
            }
            ScoringRoute::TopicOnly => panic!("expected profile-aware route"),
        }
    }
}
