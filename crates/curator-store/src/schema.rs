use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA_VERSION: i64 = 1;

pub fn initialize(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    conn.pragma_update(None, "busy_timeout", 5000)?;

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS metadata (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS article_references (
            key          TEXT NOT NULL,
            urlname      TEXT NOT NULL,
            category     TEXT NOT NULL,
            title        TEXT,
            author       TEXT,
            thumbnail    TEXT,
            published_at TEXT,
            collected_at TEXT NOT NULL,
            is_processed INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (key, urlname)
        );

        CREATE TABLE IF NOT EXISTS articles (
            id              TEXT PRIMARY KEY,
            title           TEXT NOT NULL,
            url             TEXT NOT NULL,
            thumbnail       TEXT,
            published_at    TEXT,
            author          TEXT NOT NULL,
            content_preview TEXT NOT NULL DEFAULT '',
            category        TEXT NOT NULL,
            collected_at    TEXT NOT NULL,
            is_evaluated    INTEGER NOT NULL DEFAULT 0,
            created_at      TEXT NOT NULL,
            updated_at      TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS evaluations (
            id                     INTEGER PRIMARY KEY AUTOINCREMENT,
            article_id             TEXT NOT NULL UNIQUE,
            quality_score          INTEGER NOT NULL,
            originality_score      INTEGER NOT NULL,
            entertainment_score    INTEGER NOT NULL,
            total_score            INTEGER NOT NULL,
            ai_summary             TEXT NOT NULL,
            is_retry_evaluation    INTEGER NOT NULL DEFAULT 0,
            original_evaluation_id INTEGER,
            retry_reason           TEXT,
            evaluation_metadata    TEXT,
            evaluated_at           TEXT NOT NULL,
            created_at             TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_refs_unprocessed
            ON article_references(is_processed, collected_at);
        CREATE INDEX IF NOT EXISTS idx_articles_category ON articles(category);
        CREATE INDEX IF NOT EXISTS idx_eval_article ON evaluations(article_id);
        ",
    )?;

    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?1)",
        [SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}

pub fn get_schema_version(conn: &Connection) -> Result<Option<i64>> {
    let mut stmt = conn.prepare("SELECT value FROM metadata WHERE key = 'schema_version'")?;
    let version = stmt
        .query_row([], |row| {
            let v: String = row.get(0)?;
            Ok(v.parse::<i64>().unwrap_or(0))
        })
        .ok();
    Ok(version)
}
