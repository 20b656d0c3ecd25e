use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::{debug, error};

use super::core::Database;
use crate::types::{Article, Category, ContentSource, ExtractionStatus, Relevance};
use crate::TARGET_DB;

impl Database {
    /// Whole-document atomic overwrite, keyed by the content-addressed id.
    /// Writing the same article twice leaves a single record.
    pub async fn put_article(&self, article: &Article) -> Result<(), sqlx::Error> {
        debug!(target: TARGET_DB, "Adding/updating article: {}", article.url);

        sqlx::query(
            r#"
            INSERT INTO articles (
                id, url, title, author, excerpt, extracted_text,
                content_source, extraction_status, content_length,
                published_at, fetched_at, ai_summary, ai_score, ai_category,
                relevance, rated_at, topic_filtered, topic_filtered_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
            ON CONFLICT(id) DO UPDATE SET
                url = excluded.url,
                title = excluded.title,
                author = excluded.author,
                excerpt = excluded.excerpt,
                extracted_text = excluded.extracted_text,
                content_source = excluded.content_source,
                extraction_status = excluded.extraction_status,
                content_length = excluded.content_length,
                published_at = excluded.published_at,
                fetched_at = excluded.fetched_at,
                ai_summary = excluded.ai_summary,
                ai_score = excluded.ai_score,
                ai_category = excluded.ai_category,
                relevance = excluded.relevance,
                rated_at = excluded.rated_at,
                topic_filtered = excluded.topic_filtered,
                topic_filtered_at = excluded.topic_filtered_at
            "#,
        )
        .bind(&article.id)
        .bind(&article.url)
        .bind(&article.title)
        .bind(&article.author)
        .bind(&article.excerpt)
        .bind(&article.extracted_text)
        .bind(content_source_str(article.content_source))
        .bind(extraction_status_str(article.extraction_status))
        .bind(article.content_length as i64)
        .bind(article.published_at.map(|t| t.to_rfc3339()))
        .bind(article.fetched_at.to_rfc3339())
        .bind(&article.ai_summary)
        .bind(article.ai_score)
        .bind(article.ai_category.map(|c| c.as_str()))
        .bind(article.relevance.as_str())
        .bind(article.rated_at.map(|t| t.to_rfc3339()))
        .bind(article.topic_filtered)
        .bind(article.topic_filtered_at.map(|t| t.to_rfc3339()))
        .execute(self.pool())
        .await?;

        Ok(())
    }

    pub async fn has_article(&self, id: &str) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM articles WHERE id = ?1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(row.is_some())
    }

    pub async fn get_article(&self, id: &str) -> Result<Option<Article>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM articles WHERE id = ?1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;

        row.map(|r| article_from_row(&r)).transpose()
    }

    /// All explicitly rated articles, the learner's input set.
    pub async fn query_rated(&self) -> Result<Vec<Article>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT * FROM articles WHERE relevance IN ('relevant', 'not_relevant') ORDER BY rated_at",
        )
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(article_from_row).collect()
    }

    /// Explicit rating action; the only path that changes `relevance`.
    pub async fn rate_article(&self, id: &str, relevance: Relevance) -> Result<bool, sqlx::Error> {
        let rated_at = match relevance {
            Relevance::Unrated => None,
            _ => Some(Utc::now().to_rfc3339()),
        };

        let result = sqlx::query("UPDATE articles SET relevance = ?1, rated_at = ?2 WHERE id = ?3")
            .bind(relevance.as_str())
            .bind(rated_at)
            .bind(id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            error!(target: TARGET_DB, "Attempted to rate unknown article: {}", id);
            return Ok(false);
        }
        Ok(true)
    }
}

fn content_source_str(source: ContentSource) -> &'static str {
    match source {
        ContentSource::Excerpt => "excerpt",
        ContentSource::Extracted => "extracted",
        ContentSource::Failed => "failed",
    }
}

fn extraction_status_str(status: ExtractionStatus) -> &'static str {
    match status {
        ExtractionStatus::Pending => "pending",
        ExtractionStatus::Success => "success",
        ExtractionStatus::Failed => "failed",
    }
}

fn parse_content_source(s: &str) -> Result<ContentSource, sqlx::Error> {
    match s {
        "excerpt" => Ok(ContentSource::Excerpt),
        "extracted" => Ok(ContentSource::Extracted),
        "failed" => Ok(ContentSource::Failed),
        other => Err(decode_error("content_source", other)),
    }
}

fn parse_extraction_status(s: &str) -> Result<ExtractionStatus, sqlx::Error> {
    match s {
        "pending" => Ok(ExtractionStatus::Pending),
        "success" => Ok(ExtractionStatus::Success),
        "failed" => Ok(ExtractionStatus::Failed),
        other => Err(decode_error("extraction_status", other)),
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, sqlx::Error> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| decode_error("timestamp", s))
}

fn decode_error(field: &str, value: &str) -> sqlx::Error {
    sqlx::Error::Protocol(format!("unexpected {} value: {}", field, value))
}

fn article_from_row(row: &SqliteRow) -> Result<Article, sqlx::Error> {
    let content_source: String = row.try_get("content_source")?;
    let extraction_status: String = row.try_get("extraction_status")?;
    let relevance: String = row.try_get("relevance")?;
    let fetched_at: String = row.try_get("fetched_at")?;
    let published_at: Option<String> = row.try_get("published_at")?;
    let rated_at: Option<String> = row.try_get("rated_at")?;
    let topic_filtered_at: Option<String> = row.try_get("topic_filtered_at")?;
    let ai_category: Option<String> = row.try_get("ai_category")?;
    let content_length: i64 = row.try_get("content_length")?;

    Ok(Article {
        id: row.try_get("id")?,
        url: row.try_get("url")?,
        title: row.try_get("title")?,
        author: row.try_get("author")?,
        excerpt: row.try_get("excerpt")?,
        extracted_text: row.try_get("extracted_text")?,
        content_source: parse_content_source(&content_source)?,
        extraction_status: parse_extraction_status(&extraction_status)?,
        content_length: content_length as usize,
        published_at: published_at.as_deref().map(parse_timestamp).transpose()?,
        fetched_at: parse_timestamp(&fetched_at)?,
        ai_summary: row.try_get("ai_summary")?,
        ai_score: row.try_get("ai_score")?,
        ai_category: ai_category
            .as_deref()
            .map(|c| Category::parse(c).ok_or_else(|| decode_error("ai_category", c)))
            .transpose()?,
        relevance: Relevance::parse(&relevance)
            .ok_or_else(|| decode_error("relevance", &relevance))?,
        rated_at: rated_at.as_deref().map(parse_timestamp).transpose()?,
        topic_filtered: row.try_get("topic_filtered")?,
        topic_filtered_at: topic_filtered_at
            .as_deref()
            .map(parse_timestamp)
            .transpose()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_article(url: &str) -> Article {
        Article {
            id: Article::id_for_url(url).unwrap(),
            url: url.to_string(),
            title: "A sample story".to_string(),
            author: Some("Jane Doe".to_string()),
            excerpt: "A short excerpt of the story.".to_string(),
            extracted_text: None,
            content_source: ContentSource::Excerpt,
            extraction_status: ExtractionStatus::Failed,
            content_length: 29,
            published_at: None,
            fetched_at: Utc::now(),
            ai_summary: Some("A short machine summary.".to_string()),
            ai_score: None,
            ai_category: Some(Category::Technology),
            relevance: Relevance::Unrated,
            rated_at: None,
            topic_filtered: false,
            topic_filtered_at: None,
        }
    }

    #[tokio::test]
    async fn put_get_round_trip() {
        let db = Database::open_in_memory().await.unwrap();
        let article = sample_article("https://example.com/a");
        db.put_article(&article).await.unwrap();

        let loaded = db.get_article(&article.id).await.unwrap().unwrap();
        assert_eq!(loaded.url, article.url);
        assert_eq!(loaded.relevance, Relevance::Unrated);
        assert_eq!(loaded.ai_category, Some(Category::Technology));
        assert_eq!(loaded.ai_score, None);
    }

    #[tokio::test]
    async fn put_twice_keeps_single_record() {
        let db = Database::open_in_memory().await.unwrap();
        let article = sample_article("https://example.com/a");
        db.put_article(&article).await.unwrap();
        db.put_article(&article).await.unwrap();

        let (relevant, not_relevant) = db.count_ratings().await.unwrap();
        assert_eq!((relevant, not_relevant), (0, 0));
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM articles")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn rating_sets_and_clears_rated_at() {
        let db = Database::open_in_memory().await.unwrap();
        let article = sample_article("https://example.com/a");
        db.put_article(&article).await.unwrap();

        assert!(db
            .rate_article(&article.id, Relevance::Relevant)
            .await
            .unwrap());
        let rated = db.get_article(&article.id).await.unwrap().unwrap();
        assert_eq!(rated.relevance, Relevance::Relevant);
        assert!(rated.rated_at.is_some());

        assert!(db
            .rate_article(&article.id, Relevance::Unrated)
            .await
            .unwrap());
        let unrated = db.get_article(&article.id).await.unwrap().unwrap();
        assert_eq!(unrated.relevance, Relevance::Unrated);
        assert!(unrated.rated_at.is_none());
    }

    #[tokio::test]
    async fn rating_unknown_article_is_a_noop() {
        let db = Database::open_in_memory().await.unwrap();
        assert!(!db.rate_article("missing", Relevance::Relevant).await.unwrap());
    }

    #[tokio::test]
    async fn query_rated_returns_only_rated() {
        let db = Database::open_in_memory().await.unwrap();
        for (i, rating) in [
            Relevance::Relevant,
            Relevance::NotRelevant,
            Relevance::Unrated,
        ]
        .iter()
        .enumerate()
        {
            let article = sample_article(&format!("https://example.com/{}", i));
            db.put_article(&article).await.unwrap();
            if *rating != Relevance::Unrated {
                db.rate_article(&article.id, *rating).await.unwrap();
            }
        }

        let rated = db.query_rated().await.unwrap();
        assert_eq!(rated.len(), 2);
        assert_eq!(db.count_ratings().await.unwrap(), (1, 1));
    }
}
