//! Profile learner: turns explicit binary ratings into a structured
//! preference profile via LLM summarization.
//!
//! State sequence: `CollectRatings → ValidateThreshold → {Abort |
//! LoadExisting} → Generate → Save`. Run-to-completion and single-flight;
//! the singleton profile document must never see concurrent writers.

use chrono::Utc;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::db::Database;
use crate::error::SiftError;
use crate::llm::{ModelInvoker, ModelTier};
use crate::prompt;
use crate::retry::attempt_with_feedback;
use crate::types::{validate_preference_list, Relevance, UserProfile};
use crate::TARGET_LLM_REQUEST;

/// Minimum ratings of each polarity before generation is permitted.
pub const MIN_RELEVANT_RATINGS: usize = 2;
pub const MIN_NOT_RELEVANT_RATINGS: usize = 2;

const MAX_GENERATION_ATTEMPTS: usize = 3;

/// Changelog recorded by the manual edit path; no model is involved in a
/// deterministic user action.
pub const MANUAL_EDIT_CHANGELOG: &str = "Manually edited by the user.";

/// Raw profile output from the model, before validation.
#[derive(Debug, Deserialize)]
struct ProfileDraft {
    #[serde(default)]
    likes: Vec<String>,
    #[serde(default)]
    dislikes: Vec<String>,
    #[serde(default)]
    changelog: String,
}

/// Below-threshold is an expected steady state for new users, reported
/// rather than raised.
#[derive(Debug)]
pub enum LearnOutcome {
    Updated(UserProfile),
    InsufficientData {
        relevant: usize,
        not_relevant: usize,
    },
}

pub struct ProfileLearner<'a, M> {
    db: &'a Database,
    gateway: &'a M,
    // Run-in-progress guard; concurrent invocations fail fast instead of
    // racing the singleton document.
    guard: Mutex<()>,
}

impl<'a, M: ModelInvoker> ProfileLearner<'a, M> {
    pub fn new(db: &'a Database, gateway: &'a M) -> Self {
        ProfileLearner {
            db,
            gateway,
            guard: Mutex::new(()),
        }
    }

    /// Generates or evolves the preference profile from accumulated
    /// ratings. Idempotent: running twice over the same ratings converges
    /// on the same profile rather than compounding it.
    pub async fn generate(&self) -> Result<LearnOutcome, SiftError> {
        let _running = self.guard.try_lock().map_err(|_| SiftError::LearnerBusy)?;

        // CollectRatings
        let rated = self.db.query_rated().await?;
        let relevant = rated
            .iter()
            .filter(|a| a.relevance == Relevance::Relevant)
            .count();
        let not_relevant = rated.len() - relevant;

        // ValidateThreshold
        if relevant < MIN_RELEVANT_RATINGS || not_relevant < MIN_NOT_RELEVANT_RATINGS {
            info!(
                "Not enough ratings to learn from: {} relevant, {} not-relevant (need {}+{}).",
                relevant, not_relevant, MIN_RELEVANT_RATINGS, MIN_NOT_RELEVANT_RATINGS
            );
            return Ok(LearnOutcome::InsufficientData {
                relevant,
                not_relevant,
            });
        }

        // LoadExisting, so the model revises instead of overwriting blindly.
        let existing = self.db.get_profile().await?;

        // Generate
        let base_prompt = prompt::profile_generation_prompt(&rated, existing.as_ref());
        let gateway = self.gateway;
        let draft: ProfileDraft = attempt_with_feedback(
            MAX_GENERATION_ATTEMPTS,
            &base_prompt,
            |p| async move { gateway.invoke(ModelTier::Expensive, &p).await },
            |_prompt, response| {
                let draft: ProfileDraft = parse_draft(response)?;
                let issues = draft_issues(&draft);
                if issues.is_empty() {
                    Ok(draft)
                } else {
                    Err(issues)
                }
            },
            prompt::with_issue_feedback,
        )
        .await
        .map_err(|e| {
            warn!(target: TARGET_LLM_REQUEST, "Profile generation failed: {}", e);
            e
        })?;

        // Save: whole-document overwrite, write-or-nothing.
        let now = Utc::now();
        let profile = UserProfile {
            likes: trimmed(draft.likes),
            dislikes: trimmed(draft.dislikes),
            changelog: draft.changelog.trim().to_string(),
            created_at: existing.map(|p| p.created_at).unwrap_or(now),
            last_updated: now,
        };
        self.db.put_profile(&profile).await?;

        info!(
            "Profile updated: {} likes, {} dislikes. {}",
            profile.likes.len(),
            profile.dislikes.len(),
            profile.changelog
        );
        Ok(LearnOutcome::Updated(profile))
    }

    /// Manual edit path: same per-item rules, fixed changelog, no model
    /// call. A validation failure leaves any prior profile unchanged.
    pub async fn set_manual(
        &self,
        likes: Vec<String>,
        dislikes: Vec<String>,
    ) -> Result<UserProfile, SiftError> {
        let _running = self.guard.try_lock().map_err(|_| SiftError::LearnerBusy)?;

        let likes = trimmed(likes);
        let dislikes = trimmed(dislikes);
        let mut issues = validate_preference_list("likes", &likes);
        issues.extend(validate_preference_list("dislikes", &dislikes));
        if !issues.is_empty() {
            return Err(SiftError::InvalidProfile { issues });
        }

        let now = Utc::now();
        let existing = self.db.get_profile().await?;
        let profile = UserProfile {
            likes,
            dislikes,
            changelog: MANUAL_EDIT_CHANGELOG.to_string(),
            created_at: existing.map(|p| p.created_at).unwrap_or(now),
            last_updated: now,
        };
        self.db.put_profile(&profile).await?;
        Ok(profile)
    }
}

fn parse_draft(response: &str) -> Result<ProfileDraft, Vec<String>> {
    crate::validate::parse_json_block(response).map_err(|e| vec![e])
}

fn draft_issues(draft: &ProfileDraft) -> Vec<String> {
    let mut issues = validate_preference_list("likes", &draft.likes);
    issues.extend(validate_preference_list("dislikes", &draft.dislikes));
    if draft.likes.is_empty() {
        issues.push("likes must contain at least one entry".to_string());
    }
    if draft.dislikes.is_empty() {
        issues.push("dislikes must contain at least one entry".to_string());
    }
    if draft.changelog.trim().is_empty() {
        issues.push("changelog must be a non-empty sentence".to_string());
    }
    issues
}

fn trimmed(entries: Vec<String>) -> Vec<String> {
    entries
        .into_iter()
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Article, ContentSource, ExtractionStatus};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use tokio::time::{sleep, Duration};

    struct ScriptedModel {
        replies: StdMutex<VecDeque<String>>,
        prompts: StdMutex<Vec<String>>,
        calls: AtomicUsize,
        delay: Option<Duration>,
    }

    impl ScriptedModel {
        fn new(replies: Vec<&str>) -> ScriptedModel {
            ScriptedModel {
                replies: StdMutex::new(replies.into_iter().map(str::to_string).collect()),
                prompts: StdMutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
                delay: None,
            }
        }

        fn slow(replies: Vec<&str>, delay: Duration) -> ScriptedModel {
            ScriptedModel {
                delay: Some(delay),
                ..ScriptedModel::new(replies)
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn last_prompt(&self) -> String {
            self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
        }
    }

    impl ModelInvoker for ScriptedModel {
        async fn invoke(&self, _tier: ModelTier, prompt: &str) -> Result<String, SiftError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_string());
            if let Some(delay) = self.delay {
                sleep(delay).await;
            }
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .expect("scripted model ran out of replies");
            Ok(reply)
        }
    }

    const VALID_DRAFT: &str = r#"{
        "likes": ["deep dives on systems programming"],
        "dislikes": ["celebrity gossip roundups"],
        "changelog": "Built an initial profile from four ratings."
    }"#;

    async fn seed_ratings(db: &Database, relevant: usize, not_relevant: usize) {
        for i in 0..relevant + not_relevant {
            let url = format!("https://example.com/{}", i);
            let article = Article {
                id: Article::id_for_url(&url).unwrap(),
                url,
                title: format!("Story {}", i),
                author: None,
                excerpt: "An excerpt that is long enough to matter.".to_string(),
                extracted_text: None,
                content_source: ContentSource::Excerpt,
                extraction_status: ExtractionStatus::Failed,
                content_length: 41,
                published_at: None,
                fetched_at: Utc::now(),
                ai_summary: Some(format!("Summary of story {}", i)),
                ai_score: None,
                ai_category: None,
                relevance: Relevance::Unrated,
                rated_at: None,
                topic_filtered: false,
                topic_filtered_at: None,
            };
            db.put_article(&article).await.unwrap();
            let rating = if i < relevant {
                Relevance::Relevant
            } else {
                Relevance::NotRelevant
            };
            db.rate_article(&article.id, rating).await.unwrap();
        }
    }

    #[tokio::test]
    async fn below_threshold_reports_without_model_call() {
        let db = Database::open_in_memory().await.unwrap();
        seed_ratings(&db, 2, 1).await;
        let model = ScriptedModel::new(vec![]);
        let learner = ProfileLearner::new(&db, &model);

        match learner.generate().await.unwrap() {
            LearnOutcome::InsufficientData {
                relevant,
                not_relevant,
            } => {
                assert_eq!((relevant, not_relevant), (2, 1));
            }
            other => panic!("expected InsufficientData, got {:?}", other),
        }
        assert_eq!(model.call_count(), 0);
        assert!(db.get_profile().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn threshold_met_generates_and_saves() {
        let db = Database::open_in_memory().await.unwrap();
        seed_ratings(&db, 2, 2).await;
        let model = ScriptedModel::new(vec![VALID_DRAFT]);
        let learner = ProfileLearner::new(&db, &model);

        match learner.generate().await.unwrap() {
            LearnOutcome::Updated(profile) => {
                assert!(!profile.likes.is_empty());
                assert!(!profile.dislikes.is_empty());
                assert!(!profile.changelog.is_empty());
            }
            other => panic!("expected Updated, got {:?}", other),
        }
        assert!(db.get_profile().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn existing_profile_is_offered_for_revision() {
        let db = Database::open_in_memory().await.unwrap();
        seed_ratings(&db, 2, 2).await;
        let now = Utc::now();
        db.put_profile(&UserProfile {
            likes: vec!["embedded firmware war stories".to_string()],
            dislikes: vec!["product launch coverage".to_string()],
            changelog: "Initial.".to_string(),
            created_at: now,
            last_updated: now,
        })
        .await
        .unwrap();

        let model = ScriptedModel::new(vec![VALID_DRAFT]);
        let learner = ProfileLearner::new(&db, &model);
        learner.generate().await.unwrap();

        assert!(model
            .last_prompt()
            .contains("embedded firmware war stories"));

        // created_at survives evolution.
        let stored = db.get_profile().await.unwrap().unwrap();
        assert_eq!(stored.created_at.timestamp(), now.timestamp());
    }

    #[tokio::test]
    async fn invalid_draft_is_retried_with_feedback() {
        let db = Database::open_in_memory().await.unwrap();
        seed_ratings(&db, 2, 2).await;
        let bad = r#"{"likes": ["ok"], "dislikes": [], "changelog": ""}"#;
        let model = ScriptedModel::new(vec![bad, VALID_DRAFT]);
        let learner = ProfileLearner::new(&db, &model);

        assert!(matches!(
            learner.generate().await.unwrap(),
            LearnOutcome::Updated(_)
        ));
        assert_eq!(model.call_count(), 2);
        assert!(model.last_prompt().contains("rejected"));
    }

    #[tokio::test]
    async fn exhausted_generation_leaves_profile_absent() {
        let db = Database::open_in_memory().await.unwrap();
        seed_ratings(&db, 2, 2).await;
        let model = ScriptedModel::new(vec!["nonsense", "nonsense", "nonsense"]);
        let learner = ProfileLearner::new(&db, &model);

        assert!(matches!(
            learner.generate().await,
            Err(SiftError::MalformedModelOutput { .. })
        ));
        assert!(db.get_profile().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn concurrent_generation_is_single_flight() {
        let db = Database::open_in_memory().await.unwrap();
        seed_ratings(&db, 2, 2).await;
        let model = ScriptedModel::slow(vec![VALID_DRAFT], Duration::from_millis(100));
        let learner = ProfileLearner::new(&db, &model);

        let (first, second) = tokio::join!(learner.generate(), learner.generate());
        let outcomes = [first, second];
        assert_eq!(
            outcomes
                .iter()
                .filter(|o| matches!(o, Err(SiftError::LearnerBusy)))
                .count(),
            1
        );
        assert_eq!(
            outcomes
                .iter()
                .filter(|o| matches!(o, Ok(LearnOutcome::Updated(_))))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn manual_edit_overwrites_with_fixed_changelog() {
        let db = Database::open_in_memory().await.unwrap();
        let model = ScriptedModel::new(vec![]);
        let learner = ProfileLearner::new(&db, &model);

        let profile = learner
            .set_manual(
                vec!["open source licensing".to_string()],
                vec!["quarterly earnings".to_string()],
            )
            .await
            .unwrap();

        assert_eq!(profile.changelog, MANUAL_EDIT_CHANGELOG);
        assert_eq!(model.call_count(), 0);
        assert!(db.get_profile().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn manual_edit_rejection_preserves_prior_profile() {
        let db = Database::open_in_memory().await.unwrap();
        let model = ScriptedModel::new(vec![]);
        let learner = ProfileLearner::new(&db, &model);

        learner
            .set_manual(vec!["open source licensing".to_string()], vec![])
            .await
            .unwrap();

        let result = learner
            .set_manual(vec!["ab".to_string()], vec![])
            .await;
        assert!(matches!(result, Err(SiftError::InvalidProfile { .. })));

        let stored = db.get_profile().await.unwrap().unwrap();
        assert_eq!(stored.likes, vec!["open source licensing".to_string()]);
    }
}
