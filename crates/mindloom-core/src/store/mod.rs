//! SQLite-backed card store.

use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

use crate::error::{MindloomError, MindloomResult};
use crate::traits::{CardStore, ChangedBy};
use crate::types::{
    CardKind, CharacterCard, ChatMessage, EntityMention, MemoryCard, OperationMetric,
    OperationStatus, RelationshipCategory, SelfCard, SessionRecord, Speaker, WorldEventCard,
};

/// SQLite-based store for cards, mentions, transcripts, audit, and metrics.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

fn parse_ts(raw: String) -> MindloomResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| MindloomError::database(format!("Bad timestamp '{}': {}", raw, e)))
}

impl SqliteStore {
    /// Open (or create) a store at the given path. `:memory:` is supported
    /// for tests.
    pub fn new(db_path: impl AsRef<Path>) -> MindloomResult<Self> {
        if let Some(parent) = db_path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = if db_path.as_ref().to_str() == Some(":memory:") {
            Connection::open_in_memory()
        } else {
            Connection::open(db_path.as_ref())
        }
        .map_err(|e| MindloomError::database(e.to_string()))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.create_tables()?;
        Ok(store)
    }

    fn create_tables(&self) -> MindloomResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS self_cards (
                id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_id            INTEGER NOT NULL UNIQUE,
                payload             TEXT NOT NULL,
                auto_update_enabled INTEGER NOT NULL DEFAULT 1,
                is_pinned           INTEGER NOT NULL DEFAULT 0,
                created_at          TEXT NOT NULL,
                last_updated        TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS character_cards (
                id                    INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_id              INTEGER NOT NULL,
                display_name          TEXT NOT NULL,
                relationship_category TEXT NOT NULL,
                relationship_label    TEXT,
                payload               TEXT NOT NULL,
                auto_update_enabled   INTEGER NOT NULL DEFAULT 1,
                is_pinned             INTEGER NOT NULL DEFAULT 0,
                created_at            TEXT NOT NULL,
                last_updated          TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_character_cards_owner
                ON character_cards(owner_id);

            CREATE TABLE IF NOT EXISTS world_events (
                id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_id            INTEGER NOT NULL,
                title               TEXT NOT NULL,
                description         TEXT NOT NULL,
                keywords            TEXT NOT NULL,
                event_type          TEXT NOT NULL,
                resolved            INTEGER NOT NULL DEFAULT 0,
                auto_update_enabled INTEGER NOT NULL DEFAULT 1,
                is_pinned           INTEGER NOT NULL DEFAULT 0,
                created_at          TEXT NOT NULL,
                last_updated        TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_world_events_owner
                ON world_events(owner_id);

            CREATE TABLE IF NOT EXISTS entity_mentions (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_id        INTEGER NOT NULL,
                session_id      INTEGER NOT NULL,
                kind            TEXT NOT NULL,
                card_ref        TEXT NOT NULL,
                context_snippet TEXT NOT NULL,
                mentioned_at    TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_entity_mentions_owner
                ON entity_mentions(owner_id, mentioned_at);

            CREATE TABLE IF NOT EXISTS sessions (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_id     INTEGER NOT NULL,
                counselor_id INTEGER NOT NULL,
                created_at   TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS messages (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id INTEGER NOT NULL,
                role       TEXT NOT NULL,
                speaker    TEXT NOT NULL,
                content    TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_messages_session
                ON messages(session_id);

            CREATE TABLE IF NOT EXISTS card_audit (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                kind       TEXT NOT NULL,
                card_id    INTEGER NOT NULL,
                changed_by TEXT NOT NULL,
                changed_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_card_audit_card
                ON card_audit(kind, card_id);

            CREATE TABLE IF NOT EXISTS op_metrics (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                operation     TEXT NOT NULL,
                duration_ms   INTEGER NOT NULL,
                status        TEXT NOT NULL,
                error_message TEXT,
                metadata      TEXT NOT NULL,
                created_at    TEXT NOT NULL
            );
            "#,
        )
        .map_err(|e| MindloomError::database(e.to_string()))?;
        Ok(())
    }

    fn row_to_self_card(row: &Row<'_>) -> rusqlite::Result<(SelfCard, String, String)> {
        let payload: String = row.get(2)?;
        let created: String = row.get(5)?;
        let updated: String = row.get(6)?;
        Ok((
            SelfCard {
                id: row.get(0)?,
                owner_id: row.get(1)?,
                payload: serde_json::from_str(&payload).unwrap_or(serde_json::Value::Null),
                auto_update_enabled: row.get::<_, i32>(3)? != 0,
                is_pinned: row.get::<_, i32>(4)? != 0,
                created_at: Utc::now(),
                last_updated: Utc::now(),
            },
            created,
            updated,
        ))
    }

    fn finish_self_card(raw: (SelfCard, String, String)) -> MindloomResult<SelfCard> {
        let (mut card, created, updated) = raw;
        card.created_at = parse_ts(created)?;
        card.last_updated = parse_ts(updated)?;
        Ok(card)
    }

    fn row_to_character(row: &Row<'_>) -> rusqlite::Result<(CharacterCard, String, String, String)> {
        let category: String = row.get(3)?;
        let payload: String = row.get(5)?;
        let created: String = row.get(8)?;
        let updated: String = row.get(9)?;
        Ok((
            CharacterCard {
                id: row.get(0)?,
                owner_id: row.get(1)?,
                display_name: row.get(2)?,
                relationship_category: RelationshipCategory::Other,
                relationship_label: row.get(4)?,
                payload: serde_json::from_str(&payload).unwrap_or(serde_json::Value::Null),
                auto_update_enabled: row.get::<_, i32>(6)? != 0,
                is_pinned: row.get::<_, i32>(7)? != 0,
                created_at: Utc::now(),
                last_updated: Utc::now(),
            },
            category,
            created,
            updated,
        ))
    }

    fn finish_character(
        raw: (CharacterCard, String, String, String),
    ) -> MindloomResult<CharacterCard> {
        let (mut card, category, created, updated) = raw;
        card.relationship_category =
            RelationshipCategory::from_str(&category).unwrap_or(RelationshipCategory::Other);
        card.created_at = parse_ts(created)?;
        card.last_updated = parse_ts(updated)?;
        Ok(card)
    }

    fn row_to_event(row: &Row<'_>) -> rusqlite::Result<(WorldEventCard, String, String)> {
        let keywords: String = row.get(4)?;
        let created: String = row.get(9)?;
        let updated: String = row.get(10)?;
        Ok((
            WorldEventCard {
                id: row.get(0)?,
                owner_id: row.get(1)?,
                title: row.get(2)?,
                description: row.get(3)?,
                keywords: serde_json::from_str(&keywords).unwrap_or_default(),
                event_type: row.get(5)?,
                resolved: row.get::<_, i32>(6)? != 0,
                auto_update_enabled: row.get::<_, i32>(7)? != 0,
                is_pinned: row.get::<_, i32>(8)? != 0,
                created_at: Utc::now(),
                last_updated: Utc::now(),
            },
            created,
            updated,
        ))
    }

    fn finish_event(raw: (WorldEventCard, String, String)) -> MindloomResult<WorldEventCard> {
        let (mut card, created, updated) = raw;
        card.created_at = parse_ts(created)?;
        card.last_updated = parse_ts(updated)?;
        Ok(card)
    }

    fn append_audit(
        conn: &Connection,
        kind: CardKind,
        card_id: i64,
        changed_by: ChangedBy,
    ) -> MindloomResult<()> {
        conn.execute(
            "INSERT INTO card_audit (kind, card_id, changed_by, changed_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                kind.to_string(),
                card_id,
                changed_by.to_string(),
                Utc::now().to_rfc3339()
            ],
        )
        .map_err(|e| MindloomError::database(e.to_string()))?;
        Ok(())
    }

    // Seeding helpers for the session/message log. The core treats the
    // transcript as read-only; these exist for the chat layer and tests.

    pub fn create_session(&self, owner_id: i64, counselor_id: i64) -> MindloomResult<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO sessions (owner_id, counselor_id, created_at) VALUES (?1, ?2, ?3)",
            params![owner_id, counselor_id, Utc::now().to_rfc3339()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn add_message(
        &self,
        session_id: i64,
        role: &str,
        speaker: Speaker,
        content: &str,
    ) -> MindloomResult<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO messages (session_id, role, speaker, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                session_id,
                role,
                speaker.to_string(),
                content,
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Flip a card's pinned flag.
    pub fn set_pinned(&self, kind: CardKind, card_id: i64, pinned: bool) -> MindloomResult<()> {
        let table = table_for(kind);
        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!("UPDATE {} SET is_pinned = ?1 WHERE id = ?2", table),
            params![pinned as i32, card_id],
        )?;
        Ok(())
    }

    /// Flip a card's auto-update opt-in.
    pub fn set_auto_update(
        &self,
        kind: CardKind,
        card_id: i64,
        enabled: bool,
    ) -> MindloomResult<()> {
        let table = table_for(kind);
        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!("UPDATE {} SET auto_update_enabled = ?1 WHERE id = ?2", table),
            params![enabled as i32, card_id],
        )?;
        Ok(())
    }

    /// Read back recorded metrics for one operation, oldest first.
    pub fn metrics_for(&self, operation: &str) -> MindloomResult<Vec<OperationMetric>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT operation, duration_ms, status, error_message, metadata, created_at
             FROM op_metrics WHERE operation = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([operation], |row| {
            let status: String = row.get(2)?;
            let metadata: String = row.get(4)?;
            let created: String = row.get(5)?;
            Ok((
                OperationMetric {
                    operation: row.get(0)?,
                    duration_ms: row.get(1)?,
                    status: OperationStatus::from_str(&status)
                        .unwrap_or(OperationStatus::Error),
                    error_message: row.get(3)?,
                    metadata: serde_json::from_str(&metadata)
                        .unwrap_or(serde_json::Value::Null),
                    created_at: Utc::now(),
                },
                created,
            ))
        })?;

        let mut metrics = Vec::new();
        for row in rows {
            let (mut metric, created) = row?;
            metric.created_at = parse_ts(created)?;
            metrics.push(metric);
        }
        Ok(metrics)
    }
}

fn table_for(kind: CardKind) -> &'static str {
    match kind {
        CardKind::SelfCard => "self_cards",
        CardKind::Character => "character_cards",
        CardKind::World => "world_events",
    }
}

#[async_trait]
impl CardStore for SqliteStore {
    async fn get_self_card(&self, owner_id: i64) -> MindloomResult<Option<SelfCard>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, owner_id, payload, auto_update_enabled, is_pinned, created_at, last_updated
             FROM self_cards WHERE owner_id = ?1",
        )?;
        let raw = stmt
            .query_map([owner_id], Self::row_to_self_card)?
            .next()
            .transpose()?;
        raw.map(Self::finish_self_card).transpose()
    }

    async fn get_self_card_by_id(&self, card_id: i64) -> MindloomResult<Option<SelfCard>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, owner_id, payload, auto_update_enabled, is_pinned, created_at, last_updated
             FROM self_cards WHERE id = ?1",
        )?;
        let raw = stmt
            .query_map([card_id], Self::row_to_self_card)?
            .next()
            .transpose()?;
        raw.map(Self::finish_self_card).transpose()
    }

    async fn create_self_card(
        &self,
        owner_id: i64,
        payload: serde_json::Value,
        auto_update_enabled: bool,
    ) -> MindloomResult<SelfCard> {
        let now = Utc::now();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO self_cards
                 (owner_id, payload, auto_update_enabled, is_pinned, created_at, last_updated)
             VALUES (?1, ?2, ?3, 0, ?4, ?4)",
            params![
                owner_id,
                payload.to_string(),
                auto_update_enabled as i32,
                now.to_rfc3339()
            ],
        )?;
        let id = conn.last_insert_rowid();
        Ok(SelfCard {
            id,
            owner_id,
            payload,
            auto_update_enabled,
            is_pinned: false,
            created_at: now,
            last_updated: now,
        })
    }

    async fn update_self_card(
        &self,
        card_id: i64,
        payload: serde_json::Value,
        changed_by: ChangedBy,
    ) -> MindloomResult<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE self_cards SET payload = ?1, last_updated = ?2 WHERE id = ?3",
            params![payload.to_string(), Utc::now().to_rfc3339(), card_id],
        )?;
        if changed == 0 {
            return Err(MindloomError::not_found(card_id));
        }
        Self::append_audit(&conn, CardKind::SelfCard, card_id, changed_by)
    }

    async fn get_character_cards(&self, owner_id: i64) -> MindloomResult<Vec<CharacterCard>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, owner_id, display_name, relationship_category, relationship_label,
                    payload, auto_update_enabled, is_pinned, created_at, last_updated
             FROM character_cards WHERE owner_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([owner_id], Self::row_to_character)?;
        let mut cards = Vec::new();
        for raw in rows {
            cards.push(Self::finish_character(raw?)?);
        }
        Ok(cards)
    }

    async fn create_character_card(
        &self,
        owner_id: i64,
        display_name: &str,
        relationship_category: RelationshipCategory,
        relationship_label: Option<&str>,
        payload: serde_json::Value,
    ) -> MindloomResult<CharacterCard> {
        let now = Utc::now();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO character_cards
                 (owner_id, display_name, relationship_category, relationship_label, payload,
                  auto_update_enabled, is_pinned, created_at, last_updated)
             VALUES (?1, ?2, ?3, ?4, ?5, 1, 0, ?6, ?6)",
            params![
                owner_id,
                display_name,
                relationship_category.to_string(),
                relationship_label,
                payload.to_string(),
                now.to_rfc3339()
            ],
        )?;
        let id = conn.last_insert_rowid();
        Ok(CharacterCard {
            id,
            owner_id,
            display_name: display_name.to_string(),
            relationship_category,
            relationship_label: relationship_label.map(|l| l.to_string()),
            payload,
            auto_update_enabled: true,
            is_pinned: false,
            created_at: now,
            last_updated: now,
        })
    }

    async fn update_character_card(
        &self,
        card_id: i64,
        payload: serde_json::Value,
        changed_by: ChangedBy,
    ) -> MindloomResult<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE character_cards SET payload = ?1, last_updated = ?2 WHERE id = ?3",
            params![payload.to_string(), Utc::now().to_rfc3339(), card_id],
        )?;
        if changed == 0 {
            return Err(MindloomError::not_found(card_id));
        }
        Self::append_audit(&conn, CardKind::Character, card_id, changed_by)
    }

    async fn get_world_events(&self, owner_id: i64) -> MindloomResult<Vec<WorldEventCard>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, owner_id, title, description, keywords, event_type, resolved,
                    auto_update_enabled, is_pinned, created_at, last_updated
             FROM world_events WHERE owner_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([owner_id], Self::row_to_event)?;
        let mut events = Vec::new();
        for raw in rows {
            events.push(Self::finish_event(raw?)?);
        }
        Ok(events)
    }

    async fn create_world_event(&self, event: WorldEventCard) -> MindloomResult<WorldEventCard> {
        let now = Utc::now();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO world_events
                 (owner_id, title, description, keywords, event_type, resolved,
                  auto_update_enabled, is_pinned, created_at, last_updated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
            params![
                event.owner_id,
                event.title,
                event.description,
                serde_json::to_string(&event.keywords)?,
                event.event_type,
                event.resolved as i32,
                event.auto_update_enabled as i32,
                event.is_pinned as i32,
                now.to_rfc3339()
            ],
        )?;
        let id = conn.last_insert_rowid();
        Ok(WorldEventCard {
            id,
            created_at: now,
            last_updated: now,
            ..event
        })
    }

    async fn update_world_event(
        &self,
        card_id: i64,
        description: Option<&str>,
        keywords: Option<&[String]>,
        changed_by: ChangedBy,
    ) -> MindloomResult<()> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        let mut changed = 0;
        if let Some(description) = description {
            changed += conn.execute(
                "UPDATE world_events SET description = ?1, last_updated = ?2 WHERE id = ?3",
                params![description, now, card_id],
            )?;
        }
        if let Some(keywords) = keywords {
            changed += conn.execute(
                "UPDATE world_events SET keywords = ?1, last_updated = ?2 WHERE id = ?3",
                params![serde_json::to_string(keywords)?, now, card_id],
            )?;
        }
        if changed == 0 {
            return Err(MindloomError::not_found(card_id));
        }
        Self::append_audit(&conn, CardKind::World, card_id, changed_by)
    }

    async fn get_pinned_cards(&self, owner_id: i64) -> MindloomResult<Vec<MemoryCard>> {
        let mut cards: Vec<MemoryCard> = Vec::new();

        if let Some(card) = self.get_self_card(owner_id).await? {
            if card.is_pinned {
                cards.push(MemoryCard::SelfCard(card));
            }
        }
        for card in self.get_character_cards(owner_id).await? {
            if card.is_pinned {
                cards.push(MemoryCard::Character(card));
            }
        }
        for event in self.get_world_events(owner_id).await? {
            if event.is_pinned {
                cards.push(MemoryCard::World(event));
            }
        }
        Ok(cards)
    }

    async fn add_mention(
        &self,
        owner_id: i64,
        session_id: i64,
        kind: CardKind,
        card_ref: &str,
        context_snippet: &str,
        mentioned_at: DateTime<Utc>,
    ) -> MindloomResult<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO entity_mentions
                 (owner_id, session_id, kind, card_ref, context_snippet, mentioned_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                owner_id,
                session_id,
                kind.to_string(),
                card_ref,
                context_snippet,
                mentioned_at.to_rfc3339()
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    async fn get_mentions(
        &self,
        owner_id: i64,
        limit: usize,
    ) -> MindloomResult<Vec<EntityMention>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, owner_id, session_id, kind, card_ref, context_snippet, mentioned_at
             FROM entity_mentions WHERE owner_id = ?1
             ORDER BY mentioned_at DESC, id DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![owner_id, limit as i64], |row| {
            let kind: String = row.get(3)?;
            let mentioned: String = row.get(6)?;
            Ok((
                EntityMention {
                    id: row.get(0)?,
                    owner_id: row.get(1)?,
                    session_id: row.get(2)?,
                    kind: CardKind::from_str(&kind).unwrap_or(CardKind::Character),
                    card_ref: row.get(4)?,
                    context_snippet: row.get(5)?,
                    mentioned_at: Utc::now(),
                },
                mentioned,
            ))
        })?;

        let mut mentions = Vec::new();
        for row in rows {
            let (mut mention, mentioned) = row?;
            mention.mentioned_at = parse_ts(mentioned)?;
            mentions.push(mention);
        }
        Ok(mentions)
    }

    async fn get_session(&self, session_id: i64) -> MindloomResult<Option<SessionRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, owner_id, counselor_id, created_at FROM sessions WHERE id = ?1",
        )?;
        let raw = stmt
            .query_map([session_id], |row| {
                let created: String = row.get(3)?;
                Ok((
                    SessionRecord {
                        id: row.get(0)?,
                        owner_id: row.get(1)?,
                        counselor_id: row.get(2)?,
                        created_at: Utc::now(),
                    },
                    created,
                ))
            })?
            .next()
            .transpose()?;

        raw.map(|(mut session, created)| {
            session.created_at = parse_ts(created)?;
            Ok(session)
        })
        .transpose()
    }

    async fn get_session_messages(&self, session_id: i64) -> MindloomResult<Vec<ChatMessage>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, session_id, role, speaker, content, created_at
             FROM messages WHERE session_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([session_id], |row| {
            let speaker: String = row.get(3)?;
            let created: String = row.get(5)?;
            Ok((
                ChatMessage {
                    id: row.get(0)?,
                    session_id: row.get(1)?,
                    role: row.get(2)?,
                    speaker: Speaker::from_str(&speaker).unwrap_or(Speaker::Client),
                    content: row.get(4)?,
                    created_at: Utc::now(),
                },
                created,
            ))
        })?;

        let mut messages = Vec::new();
        for row in rows {
            let (mut message, created) = row?;
            message.created_at = parse_ts(created)?;
            messages.push(message);
        }
        Ok(messages)
    }

    async fn last_edit_by(
        &self,
        kind: CardKind,
        card_id: i64,
        changed_by: ChangedBy,
    ) -> MindloomResult<Option<DateTime<Utc>>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT changed_at FROM card_audit
             WHERE kind = ?1 AND card_id = ?2 AND changed_by = ?3
             ORDER BY changed_at DESC, id DESC LIMIT 1",
        )?;
        let raw: Option<String> = stmt
            .query_map(
                params![kind.to_string(), card_id, changed_by.to_string()],
                |row| row.get(0),
            )?
            .next()
            .transpose()?;
        raw.map(parse_ts).transpose()
    }

    async fn record_metric(&self, metric: &OperationMetric) -> MindloomResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO op_metrics
                 (operation, duration_ms, status, error_message, metadata, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                metric.operation,
                metric.duration_ms,
                metric.status.to_string(),
                metric.error_message,
                metric.metadata.to_string(),
                metric.created_at.to_rfc3339()
            ],
        )?;
        Ok(())
    }
}
