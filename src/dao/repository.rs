use std::sync::Arc;

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use uuid::Uuid;

use crate::dao::{
    models::{
        Board, BoardMessageEntity, CheerEntity, ConditionVoteEntity, ConflictVoteEntity, Emoji,
        ProblemKeywordEntity, SessionEntity, TeamMessageEntity, Timestamp,
    },
    remote_store::{ChangeStream, Filter, Query, RemoteStore, Row, Table},
    storage::{StorageError, StorageResult},
};

const CONDITION_VOTE_KEY: &[&str] = &["session_id", "voter_id"];
const CREATED_AT: &str = "created_at";

/// Data access object translating session entities to and from remote store rows.
#[derive(Clone)]
pub struct SessionRepository {
    store: Arc<dyn RemoteStore>,
}

impl SessionRepository {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self { store }
    }

    /// Underlying store handle, used for health probes and change feeds.
    pub fn store(&self) -> &Arc<dyn RemoteStore> {
        &self.store
    }

    /// Fetch a session row by id.
    pub async fn find_session(&self, id: &str) -> StorageResult<Option<SessionEntity>> {
        let rows = self
            .store
            .select(Table::Sessions, Query::filtered(by_id(id)).limit(1))
            .await?;
        decode_first(Table::Sessions, rows)
    }

    /// Write `current_step`, returning whether a session row was touched.
    pub async fn set_current_step(&self, id: &str, step: usize) -> StorageResult<bool> {
        let mut patch = Row::new();
        patch.insert("current_step".into(), Value::from(step as u64));
        let touched = self.store.update(Table::Sessions, by_id(id), patch).await?;
        Ok(touched > 0)
    }

    /// Write `timer_started_at`; `None` stores an explicit null.
    pub async fn set_timer_started_at(
        &self,
        id: &str,
        started_at: Option<Timestamp>,
    ) -> StorageResult<bool> {
        let value = serde_json::to_value(started_at).map_err(|source| StorageError::Malformed {
            table: Table::Sessions.name(),
            source,
        })?;
        let mut patch = Row::new();
        patch.insert("timer_started_at".into(), value);
        let touched = self.store.update(Table::Sessions, by_id(id), patch).await?;
        Ok(touched > 0)
    }

    /// Insert or overwrite the voter's mood for this session.
    pub async fn upsert_condition_vote(
        &self,
        session_id: &str,
        voter_id: Uuid,
        emoji: Emoji,
    ) -> StorageResult<ConditionVoteEntity> {
        let entity = ConditionVoteEntity {
            id: None,
            session_id: session_id.to_string(),
            emoji,
            voter_id: Some(voter_id),
            created_at: None,
        };
        let row = encode(Table::ConditionVotes, &entity)?;
        let stored = self
            .store
            .upsert(Table::ConditionVotes, row, CONDITION_VOTE_KEY)
            .await?;
        decode(Table::ConditionVotes, stored)
    }

    pub async fn list_condition_votes(
        &self,
        session_id: &str,
    ) -> StorageResult<Vec<ConditionVoteEntity>> {
        self.list(Table::ConditionVotes, Query::filtered(by_session(session_id)))
            .await
    }

    /// Read the stored vote of one voter, if any.
    pub async fn find_condition_vote(
        &self,
        session_id: &str,
        voter_id: Uuid,
    ) -> StorageResult<Option<ConditionVoteEntity>> {
        let filter = by_session(session_id).eq("voter_id", voter_id.to_string());
        let rows = self
            .store
            .select(Table::ConditionVotes, Query::filtered(filter).limit(1))
            .await?;
        decode_first(Table::ConditionVotes, rows)
    }

    pub async fn insert_conflict_vote(
        &self,
        session_id: &str,
        has_conflict: bool,
    ) -> StorageResult<ConflictVoteEntity> {
        let entity = ConflictVoteEntity {
            id: None,
            session_id: session_id.to_string(),
            has_conflict,
            created_at: None,
        };
        self.insert(Table::ConflictVotes, &entity).await
    }

    pub async fn list_conflict_votes(
        &self,
        session_id: &str,
    ) -> StorageResult<Vec<ConflictVoteEntity>> {
        self.list(Table::ConflictVotes, Query::filtered(by_session(session_id)))
            .await
    }

    pub async fn insert_board_message(
        &self,
        board: Board,
        entity: &BoardMessageEntity,
    ) -> StorageResult<BoardMessageEntity> {
        self.insert(board_table(board), entity).await
    }

    /// Every message of a board, newest first.
    pub async fn list_board_messages(
        &self,
        board: Board,
        session_id: &str,
    ) -> StorageResult<Vec<BoardMessageEntity>> {
        self.list(board_table(board), newest_first(session_id)).await
    }

    pub async fn insert_team_message(
        &self,
        entity: &TeamMessageEntity,
    ) -> StorageResult<TeamMessageEntity> {
        self.insert(Table::TeamMessages, entity).await
    }

    /// Every team message of the session, newest first.
    pub async fn list_team_messages(
        &self,
        session_id: &str,
    ) -> StorageResult<Vec<TeamMessageEntity>> {
        self.list(Table::TeamMessages, newest_first(session_id))
            .await
    }

    pub async fn insert_keyword(
        &self,
        session_id: &str,
        keyword: &str,
    ) -> StorageResult<ProblemKeywordEntity> {
        let entity = ProblemKeywordEntity {
            id: None,
            session_id: session_id.to_string(),
            keyword: keyword.to_string(),
            created_at: None,
        };
        self.insert(Table::ProblemKeywords, &entity).await
    }

    /// Every keyword of the session in submission order.
    pub async fn list_keywords(&self, session_id: &str) -> StorageResult<Vec<ProblemKeywordEntity>> {
        let query = Query::filtered(by_session(session_id)).oldest_first(CREATED_AT);
        self.list(Table::ProblemKeywords, query).await
    }

    /// The `limit` most recent keywords, newest first.
    pub async fn recent_keywords(
        &self,
        session_id: &str,
        limit: usize,
    ) -> StorageResult<Vec<ProblemKeywordEntity>> {
        self.list(Table::ProblemKeywords, newest_first(session_id).limit(limit))
            .await
    }

    pub async fn count_keywords(&self, session_id: &str) -> StorageResult<u64> {
        self.store
            .count(Table::ProblemKeywords, by_session(session_id))
            .await
    }

    pub async fn insert_cheer(&self, session_id: &str) -> StorageResult<CheerEntity> {
        let entity = CheerEntity {
            id: None,
            session_id: session_id.to_string(),
            created_at: None,
        };
        self.insert(Table::Cheers, &entity).await
    }

    pub async fn count_cheers(&self, session_id: &str) -> StorageResult<u64> {
        self.store.count(Table::Cheers, by_session(session_id)).await
    }

    /// Change feed of one table restricted to a session.
    pub fn subscribe(&self, table: Table, session_id: &str) -> ChangeStream {
        let filter = if table == Table::Sessions {
            by_id(session_id)
        } else {
            by_session(session_id)
        };
        self.store.subscribe(table, filter)
    }

    async fn insert<T>(&self, table: Table, entity: &T) -> StorageResult<T>
    where
        T: Serialize + DeserializeOwned,
    {
        let row = encode(table, entity)?;
        let stored = self.store.insert(table, row).await?;
        decode(table, stored)
    }

    async fn list<T: DeserializeOwned>(&self, table: Table, query: Query) -> StorageResult<Vec<T>> {
        let rows = self.store.select(table, query).await?;
        rows.into_iter().map(|row| decode(table, row)).collect()
    }
}

/// Table storing the given board's messages.
pub fn board_table(board: Board) -> Table {
    match board {
        Board::FirstMe => Table::FirstMeMessages,
        Board::Proud => Table::ProudMoments,
    }
}

fn by_id(id: &str) -> Filter {
    Filter::all().eq("id", id)
}

fn by_session(session_id: &str) -> Filter {
    Filter::all().eq("session_id", session_id)
}

fn newest_first(session_id: &str) -> Query {
    Query::filtered(by_session(session_id)).newest_first(CREATED_AT)
}

fn encode<T: Serialize>(table: Table, entity: &T) -> StorageResult<Row> {
    let malformed = |source| StorageError::Malformed {
        table: table.name(),
        source,
    };
    match serde_json::to_value(entity).map_err(malformed)? {
        Value::Object(row) => Ok(row),
        _ => Err(malformed(<serde_json::Error as serde::ser::Error>::custom(
            "entity did not serialize to an object",
        ))),
    }
}

fn decode<T: DeserializeOwned>(table: Table, row: Row) -> StorageResult<T> {
    serde_json::from_value(Value::Object(row)).map_err(|source| StorageError::Malformed {
        table: table.name(),
        source,
    })
}

fn decode_first<T: DeserializeOwned>(table: Table, rows: Vec<Row>) -> StorageResult<Option<T>> {
    rows.into_iter()
        .next()
        .map(|row| decode(table, row))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::remote_store::memory::MemoryStore;
    use serde_json::json;

    fn repository_with_session(id: &str) -> (MemoryStore, SessionRepository) {
        let store = MemoryStore::new();
        store
            .seed(
                Table::Sessions,
                json!({
                    "id": id,
                    "name": "Kickoff",
                    "created_at": "2025-03-01T09:00:00Z",
                    "is_active": true,
                }),
            )
            .unwrap();
        let repository = SessionRepository::new(Arc::new(store.clone()));
        (store, repository)
    }

    #[tokio::test]
    async fn second_mood_vote_replaces_the_first() {
        let (_store, repository) = repository_with_session("s1");
        let voter = Uuid::new_v4();

        repository
            .upsert_condition_vote("s1", voter, Emoji::Sleepy)
            .await
            .unwrap();
        repository
            .upsert_condition_vote("s1", voter, Emoji::Fire)
            .await
            .unwrap();

        let votes = repository.list_condition_votes("s1").await.unwrap();
        assert_eq!(votes.len(), 1);
        assert_eq!(votes[0].emoji, Emoji::Fire);

        let mine = repository.find_condition_vote("s1", voter).await.unwrap();
        assert_eq!(mine.map(|vote| vote.emoji), Some(Emoji::Fire));
    }

    #[tokio::test]
    async fn timer_reset_writes_explicit_null() {
        let (_store, repository) = repository_with_session("s1");

        assert!(
            repository
                .set_timer_started_at("s1", Some(Timestamp::now()))
                .await
                .unwrap()
        );
        let running = repository.find_session("s1").await.unwrap().unwrap();
        assert!(matches!(running.timer_started_at, Some(Some(_))));

        repository.set_timer_started_at("s1", None).await.unwrap();
        let idle = repository.find_session("s1").await.unwrap().unwrap();
        assert_eq!(idle.timer_started_at, Some(None));
    }

    #[tokio::test]
    async fn unknown_session_is_not_touched() {
        let (_store, repository) = repository_with_session("s1");
        assert!(!repository.set_current_step("missing", 2).await.unwrap());
        assert!(repository.find_session("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn boards_are_listed_newest_first_and_kept_apart() {
        let (_store, repository) = repository_with_session("s1");
        for text in ["first", "second"] {
            repository
                .insert_board_message(
                    Board::Proud,
                    &BoardMessageEntity {
                        id: None,
                        session_id: "s1".into(),
                        nickname: "mina".into(),
                        message: text.into(),
                        team_number: Some(2),
                        is_highlighted: None,
                        hearts: None,
                        created_at: None,
                    },
                )
                .await
                .unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }

        let proud = repository
            .list_board_messages(Board::Proud, "s1")
            .await
            .unwrap();
        let texts: Vec<_> = proud.iter().map(|m| m.message.as_str()).collect();
        assert_eq!(texts, vec!["second", "first"]);

        let first_me = repository
            .list_board_messages(Board::FirstMe, "s1")
            .await
            .unwrap();
        assert!(first_me.is_empty());
    }

    #[tokio::test]
    async fn offline_store_surfaces_unavailable() {
        let (store, repository) = repository_with_session("s1");
        store.set_offline(true);
        let err = repository.count_cheers("s1").await.unwrap_err();
        assert!(matches!(err, StorageError::Unavailable { .. }));
    }
}
