//! Catalogue of OpenRouter models selectable with `/model`.

use rusqlite::{OptionalExtension, Row, params};
use tracing::info;

use super::types::LlmModel;
use super::{Database, Result, StoreError};

const DEFAULT_MODELS: &[(i64, &str, &str)] = &[
    (1, "openai/gpt-3.5-turbo", "GPT-3.5 Turbo"),
    (2, "openai/gpt-4o-mini", "GPT-4o mini"),
    (3, "anthropic/claude-3-haiku", "Claude 3 Haiku"),
    (4, "meta-llama/llama-3.1-8b-instruct", "Llama 3.1 8B Instruct"),
    (5, "mistralai/mistral-7b-instruct", "Mistral 7B Instruct"),
];

fn model_from_row(row: &Row<'_>) -> rusqlite::Result<LlmModel> {
    Ok(LlmModel {
        id: row.get(0)?,
        key: row.get(1)?,
        label: row.get(2)?,
        active: row.get::<_, i64>(3)? != 0,
    })
}

impl Database {
    /// Insert the default catalogue and make sure exactly one model is active.
    pub(super) fn seed_models(&self) -> Result<()> {
        let conn = self.conn();
        for (id, key, label) in DEFAULT_MODELS {
            conn.execute(
                "INSERT OR IGNORE INTO llm_models (id, key, label, is_active) VALUES (?1, ?2, ?3, 0)",
                params![id, key, label],
            )?;
        }

        let active: i64 =
            conn.query_row("SELECT COUNT(*) FROM llm_models WHERE is_active = 1", [], |row| row.get(0))?;
        if active == 0 {
            conn.execute(
                "UPDATE llm_models SET is_active = 1 WHERE id = (SELECT MIN(id) FROM llm_models)",
                [],
            )?;
        }
        Ok(())
    }

    pub fn list_models(&self) -> Result<Vec<LlmModel>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT id, key, label, is_active FROM llm_models ORDER BY id")?;
        let rows = stmt.query_map([], model_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn active_model(&self) -> Result<Option<LlmModel>> {
        let conn = self.conn();
        let model = conn
            .query_row(
                "SELECT id, key, label, is_active FROM llm_models WHERE is_active = 1 ORDER BY id LIMIT 1",
                [],
                model_from_row,
            )
            .optional()?;
        Ok(model)
    }

    pub fn model_by_id(&self, id: i64) -> Result<Option<LlmModel>> {
        let conn = self.conn();
        let model = conn
            .query_row(
                "SELECT id, key, label, is_active FROM llm_models WHERE id = ?1",
                params![id],
                model_from_row,
            )
            .optional()?;
        Ok(model)
    }

    /// Make `id` the only active model.
    pub fn set_active_model(&self, id: i64) -> Result<LlmModel> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let model = tx
            .query_row(
                "SELECT id, key, label, is_active FROM llm_models WHERE id = ?1",
                params![id],
                model_from_row,
            )
            .optional()?
            .ok_or(StoreError::NotFound { id })?;

        tx.execute("UPDATE llm_models SET is_active = CASE WHEN id = ?1 THEN 1 ELSE 0 END", params![id])?;
        tx.commit()?;

        info!("🤖 Active model: {}", model.key);
        Ok(LlmModel { active: true, ..model })
    }
}
