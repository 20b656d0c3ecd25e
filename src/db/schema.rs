use super::core::Database;

impl Database {
    pub(crate) async fn initialize_schema(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS articles (
                id TEXT PRIMARY KEY,
                url TEXT NOT NULL,
                title TEXT NOT NULL,
                author TEXT,
                excerpt TEXT NOT NULL,
                extracted_text TEXT,
                content_source TEXT NOT NULL,
                extraction_status TEXT NOT NULL,
                content_length INTEGER NOT NULL,
                published_at TEXT,
                fetched_at TEXT NOT NULL,
                ai_summary TEXT,
                ai_score REAL,
                ai_category TEXT,
                relevance TEXT NOT NULL DEFAULT 'unrated',
                rated_at TEXT,
                topic_filtered BOOLEAN NOT NULL DEFAULT 0,
                topic_filtered_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_articles_relevance ON articles (relevance);
            CREATE INDEX IF NOT EXISTS idx_articles_topic_filtered ON articles (topic_filtered);

            -- Singleton preference profile; the CHECK keeps it singleton.
            CREATE TABLE IF NOT EXISTS user_profile (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                likes TEXT NOT NULL,
                dislikes TEXT NOT NULL,
                changelog TEXT NOT NULL,
                created_at TEXT NOT NULL,
                last_updated TEXT NOT NULL
            );
            "#,
        )
        .execute(self.pool())
        .await?;

        Ok(())
    }
}
