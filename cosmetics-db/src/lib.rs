mod error;
mod models;

pub use error::{DbError, Result, StoreErrorKind};
pub use models::{Cosmetic, PlayerWithCosmetics};

use std::path::Path;
use tokio_rusqlite::Connection;
use tokio_rusqlite::rusqlite::{self, OptionalExtension, params, types::Type};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Database wrapper for all cosmetics and player operations.
#[derive(Clone)]
pub struct Database {
  conn: Connection,
}

impl Database {
  /// Open or create a database at the given path.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = Connection::open(path).await?;
    let db = Self { conn };
    db.initialize().await?;
    Ok(db)
  }

  /// Create an in-memory database (useful for testing).
  pub async fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory().await?;
    let db = Self { conn };
    db.initialize().await?;
    Ok(db)
  }

  /// Initialize the database schema.
  async fn initialize(&self) -> Result<()> {
    self.conn
            .call(|conn| -> rusqlite::Result<()> {
                // Enable WAL mode for better concurrent read/write performance
                conn.pragma_update(None, "journal_mode", "WAL")?;

                // Enable foreign key constraints (must be set per-connection)
                conn.pragma_update(None, "foreign_keys", "ON")?;

                conn.execute_batch(
                    r#"
                    CREATE TABLE IF NOT EXISTS cosmetics (
                        id TEXT PRIMARY KEY,
                        version INTEGER NOT NULL CHECK (version > 0),
                        data TEXT NOT NULL
                    );

                    CREATE TABLE IF NOT EXISTS players (
                        id TEXT PRIMARY KEY,
                        data TEXT NOT NULL DEFAULT '{}'
                    );

                    -- Ownership pairs; removed together with either side
                    CREATE TABLE IF NOT EXISTS player_cosmetics (
                        player_id TEXT NOT NULL REFERENCES players(id) ON DELETE CASCADE,
                        cosmetic_id TEXT NOT NULL REFERENCES cosmetics(id) ON DELETE CASCADE,
                        PRIMARY KEY (player_id, cosmetic_id)
                    );

                    CREATE INDEX IF NOT EXISTS idx_player_cosmetics_cosmetic
                        ON player_cosmetics(cosmetic_id);

                    -- LEFT JOIN yields a single NULL for players without cosmetics
                    CREATE VIEW IF NOT EXISTS players_with_cosmetics AS
                    SELECT
                        p.id AS player_id,
                        p.data AS player_data,
                        CASE WHEN COUNT(pc.cosmetic_id) = 0 THEN '[]'
                             ELSE json_group_array(pc.cosmetic_id)
                        END AS cosmetics
                    FROM players p
                    LEFT JOIN player_cosmetics pc ON pc.player_id = p.id
                    GROUP BY p.id;
                    "#,
                )?;
                Ok(())
            })
            .await?;

    info!("database initialized");
    Ok(())
  }

  // ========================================================================
  // Cosmetics
  // ========================================================================

  /// Insert a new cosmetic.
  /// Returns `UniqueViolation` if the id is already taken.
  pub async fn create_cosmetic(&self, cosmetic: Cosmetic) -> Result<()> {
    let id_log = cosmetic.id.clone();

    self
      .conn
      .call(move |conn| -> rusqlite::Result<Result<()>> {
        let inserted = conn
          .prepare_cached("INSERT INTO cosmetics (id, version, data) VALUES (?1, ?2, ?3)")?
          .execute(params![&cosmetic.id, cosmetic.version, &cosmetic.data]);
        Ok(constrained(inserted)?.map(|_| ()))
      })
      .await??;

    debug!(cosmetic_id = %id_log, "created cosmetic");
    Ok(())
  }

  /// Insert a cosmetic, replacing version and data if the id already exists.
  pub async fn upsert_cosmetic(&self, cosmetic: Cosmetic) -> Result<()> {
    let id_log = cosmetic.id.clone();

    self
      .conn
      .call(move |conn| -> rusqlite::Result<()> {
        conn
          .prepare_cached(
            r#"
            INSERT INTO cosmetics (id, version, data) VALUES (?1, ?2, ?3)
            ON CONFLICT (id) DO UPDATE SET version = excluded.version, data = excluded.data
            "#,
          )?
          .execute(params![&cosmetic.id, cosmetic.version, &cosmetic.data])?;
        Ok(())
      })
      .await?;

    debug!(cosmetic_id = %id_log, "upserted cosmetic");
    Ok(())
  }

  /// Replace version and data of an existing cosmetic.
  /// Returns `NotFound` if no cosmetic has that id.
  pub async fn update_cosmetic(&self, cosmetic: Cosmetic) -> Result<()> {
    let id_log = cosmetic.id.clone();

    self
      .conn
      .call(move |conn| -> rusqlite::Result<Result<()>> {
        let updated = conn
          .prepare_cached("UPDATE cosmetics SET version = ?2, data = ?3 WHERE id = ?1")?
          .execute(params![&cosmetic.id, cosmetic.version, &cosmetic.data])?;

        if updated == 0 {
          return Ok(Err(DbError::NotFound));
        }

        Ok(Ok(()))
      })
      .await??;

    debug!(cosmetic_id = %id_log, "updated cosmetic");
    Ok(())
  }

  /// Get the stored JSON document of a cosmetic.
  /// Returns None if not found.
  pub async fn get_cosmetic(&self, id: String) -> Result<Option<String>> {
    let data = self
      .conn
      .call(move |conn| -> rusqlite::Result<Option<String>> {
        conn
          .prepare_cached("SELECT data FROM cosmetics WHERE id = ?1")?
          .query_row(params![&id], |row| row.get(0))
          .optional()
      })
      .await?;

    Ok(data)
  }

  /// Delete a cosmetic (and every ownership of it).
  pub async fn delete_cosmetic(&self, id: String) -> Result<()> {
    let id_log = id.clone();

    self
      .conn
      .call(move |conn| -> rusqlite::Result<Result<()>> {
        let deleted = conn
          .prepare_cached("DELETE FROM cosmetics WHERE id = ?1")?
          .execute(params![&id])?;

        if deleted == 0 {
          return Ok(Err(DbError::NotFound));
        }

        Ok(Ok(()))
      })
      .await??;

    debug!(cosmetic_id = %id_log, "deleted cosmetic");
    Ok(())
  }

  /// Get every cosmetic id, sorted.
  pub async fn list_cosmetic_ids(&self) -> Result<Vec<String>> {
    let ids = self
      .conn
      .call(|conn| -> rusqlite::Result<Vec<String>> {
        let mut stmt = conn.prepare_cached("SELECT id FROM cosmetics ORDER BY id")?;

        let ids = stmt
          .query_map([], |row| row.get(0))?
          .collect::<std::result::Result<Vec<String>, _>>()?;

        Ok(ids)
      })
      .await?;

    Ok(ids)
  }

  /// Get every cosmetic document, sorted by id.
  pub async fn list_cosmetics(&self) -> Result<Vec<String>> {
    let documents = self
      .conn
      .call(|conn| -> rusqlite::Result<Vec<String>> {
        let mut stmt = conn.prepare_cached("SELECT data FROM cosmetics ORDER BY id")?;

        let documents = stmt
          .query_map([], |row| row.get(0))?
          .collect::<std::result::Result<Vec<String>, _>>()?;

        Ok(documents)
      })
      .await?;

    Ok(documents)
  }

  // ========================================================================
  // Players
  // ========================================================================

  /// Grant a cosmetic to a player, creating the player on first grant.
  ///
  /// Returns `ForeignKeyViolation` if the cosmetic doesn't exist and
  /// `UniqueViolation` if the player already owns it.
  pub async fn add_player_cosmetic(&self, player_id: Uuid, cosmetic_id: String) -> Result<()> {
    let cosmetic_log = cosmetic_id.clone();

    self
      .conn
      .call(move |conn| -> rusqlite::Result<Result<()>> {
        let player = player_id.to_string();
        let tx = conn.transaction()?;

        tx.prepare_cached("INSERT INTO players (id) VALUES (?1) ON CONFLICT (id) DO NOTHING")?
          .execute(params![&player])?;

        let inserted = tx
          .prepare_cached(
            "INSERT INTO player_cosmetics (player_id, cosmetic_id) VALUES (?1, ?2) ON CONFLICT DO NOTHING",
          )?
          .execute(params![&player, &cosmetic_id]);

        // Returning early drops the transaction, which rolls back the player insert
        let inserted = match constrained(inserted)? {
          Ok(n) => n,
          Err(err) => return Ok(Err(err)),
        };
        if inserted == 0 {
          return Ok(Err(DbError::UniqueViolation));
        }

        tx.commit()?;
        Ok(Ok(()))
      })
      .await??;

    debug!(%player_id, cosmetic_id = %cosmetic_log, "added cosmetic to player");
    Ok(())
  }

  /// Revoke a cosmetic from a player.
  /// Returns `NotFound` if the player doesn't own it.
  pub async fn remove_player_cosmetic(&self, player_id: Uuid, cosmetic_id: String) -> Result<()> {
    let cosmetic_log = cosmetic_id.clone();

    self
      .conn
      .call(move |conn| -> rusqlite::Result<Result<()>> {
        let removed = conn
          .prepare_cached("DELETE FROM player_cosmetics WHERE player_id = ?1 AND cosmetic_id = ?2")?
          .execute(params![player_id.to_string(), &cosmetic_id])?;

        if removed == 0 {
          return Ok(Err(DbError::NotFound));
        }

        Ok(Ok(()))
      })
      .await??;

    debug!(%player_id, cosmetic_id = %cosmetic_log, "removed cosmetic from player");
    Ok(())
  }

  /// Store a player's custom data, creating the player if needed.
  /// The caller is responsible for `data` being a JSON object.
  pub async fn set_player_data(&self, player_id: Uuid, data: String) -> Result<()> {
    self
      .conn
      .call(move |conn| -> rusqlite::Result<()> {
        conn
          .prepare_cached(
            "INSERT INTO players (id, data) VALUES (?1, ?2) ON CONFLICT (id) DO UPDATE SET data = excluded.data",
          )?
          .execute(params![player_id.to_string(), &data])?;
        Ok(())
      })
      .await?;

    debug!(%player_id, "updated player data");
    Ok(())
  }

  /// Get a player's custom data.
  /// Returns None if the player doesn't exist.
  pub async fn get_player_data(&self, player_id: Uuid) -> Result<Option<String>> {
    let data = self
      .conn
      .call(move |conn| -> rusqlite::Result<Option<String>> {
        conn
          .prepare_cached("SELECT data FROM players WHERE id = ?1")?
          .query_row(params![player_id.to_string()], |row| row.get(0))
          .optional()
      })
      .await?;

    Ok(data)
  }

  /// Delete a player along with their ownerships.
  pub async fn delete_player(&self, player_id: Uuid) -> Result<()> {
    self
      .conn
      .call(move |conn| -> rusqlite::Result<Result<()>> {
        let deleted = conn
          .prepare_cached("DELETE FROM players WHERE id = ?1")?
          .execute(params![player_id.to_string()])?;

        if deleted == 0 {
          return Ok(Err(DbError::NotFound));
        }

        Ok(Ok(()))
      })
      .await??;

    debug!(%player_id, "deleted player");
    Ok(())
  }

  /// Get a player with their owned cosmetics.
  pub async fn get_player(&self, player_id: Uuid) -> Result<Option<PlayerWithCosmetics>> {
    let player = self
      .conn
      .call(move |conn| -> rusqlite::Result<Option<PlayerWithCosmetics>> {
        conn
          .prepare_cached(
            "SELECT player_id, player_data, cosmetics FROM players_with_cosmetics WHERE player_id = ?1",
          )?
          .query_row(params![player_id.to_string()], player_from_row)
          .optional()
      })
      .await?;

    Ok(player)
  }

  /// Get every player with their owned cosmetics, sorted by id.
  pub async fn list_players(&self) -> Result<Vec<PlayerWithCosmetics>> {
    let players = self
      .conn
      .call(|conn| -> rusqlite::Result<Vec<PlayerWithCosmetics>> {
        let mut stmt = conn.prepare_cached(
          "SELECT player_id, player_data, cosmetics FROM players_with_cosmetics ORDER BY player_id",
        )?;

        let players = stmt
          .query_map([], player_from_row)?
          .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(players)
      })
      .await?;

    Ok(players)
  }

  /// Get every player id, sorted.
  /// Rows that don't hold a valid UUID are skipped.
  pub async fn list_player_ids(&self) -> Result<Vec<Uuid>> {
    let raw = self
      .conn
      .call(|conn| -> rusqlite::Result<Vec<String>> {
        let mut stmt = conn.prepare_cached("SELECT id FROM players ORDER BY id")?;

        let ids = stmt
          .query_map([], |row| row.get(0))?
          .collect::<std::result::Result<Vec<String>, _>>()?;

        Ok(ids)
      })
      .await?;

    let ids = raw
      .into_iter()
      .filter_map(|id| match Uuid::parse_str(&id) {
        Ok(uuid) => Some(uuid),
        Err(err) => {
          warn!(%id, %err, "skipping player with malformed id");
          None
        }
      })
      .collect();

    Ok(ids)
  }
}

/// Split unique/foreign-key violations out of a statement result so they
/// reach the caller as classified errors instead of driver errors.
fn constrained<T>(result: rusqlite::Result<T>) -> rusqlite::Result<Result<T>> {
  match result {
    Ok(value) => Ok(Ok(value)),
    Err(err) => match DbError::from_constraint(&err) {
      Some(classified) => Ok(Err(classified)),
      None => Err(err),
    },
  }
}

fn player_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PlayerWithCosmetics> {
  let id: String = row.get(0)?;
  let cosmetics: String = row.get(2)?;

  let id = Uuid::parse_str(&id)
    .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;
  let mut cosmetics: Vec<String> = serde_json::from_str(&cosmetics)
    .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;
  // json_group_array has no defined order
  cosmetics.sort_unstable();

  Ok(PlayerWithCosmetics {
    id,
    data: row.get(1)?,
    cosmetics,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  fn cosmetic(id: &str, version: i64) -> Cosmetic {
    Cosmetic {
      id: id.to_string(),
      version,
      data: format!(r#"{{"id":"{id}","version":{version}}}"#),
    }
  }

  fn steve() -> Uuid {
    Uuid::parse_str("8667ba71-b85a-4004-af54-457a9734eed7").unwrap()
  }

  fn alex() -> Uuid {
    Uuid::parse_str("ec561538-f3fd-461d-aff5-086b22154bce").unwrap()
  }

  #[tokio::test]
  async fn test_cosmetic_lifecycle() {
    let db = Database::open_in_memory().await.unwrap();

    // Create a cosmetic
    db.create_cosmetic(cosmetic("torch", 1)).await.unwrap();

    // Get it
    let data = db.get_cosmetic("torch".to_string()).await.unwrap().unwrap();
    assert_eq!(data, r#"{"id":"torch","version":1}"#);

    // Update it
    db.update_cosmetic(cosmetic("torch", 2)).await.unwrap();
    let data = db.get_cosmetic("torch".to_string()).await.unwrap().unwrap();
    assert_eq!(data, r#"{"id":"torch","version":2}"#);

    // Delete it
    db.delete_cosmetic("torch".to_string()).await.unwrap();
    assert!(db.get_cosmetic("torch".to_string()).await.unwrap().is_none());
  }

  #[tokio::test]
  async fn test_create_duplicate_cosmetic() {
    let db = Database::open_in_memory().await.unwrap();

    db.create_cosmetic(cosmetic("torch", 1)).await.unwrap();
    let err = db.create_cosmetic(cosmetic("torch", 2)).await.unwrap_err();
    assert_eq!(err.kind(), StoreErrorKind::UniqueViolation);

    // The original row is untouched
    let data = db.get_cosmetic("torch".to_string()).await.unwrap().unwrap();
    assert!(data.contains(r#""version":1"#));
  }

  #[tokio::test]
  async fn test_upsert_cosmetic() {
    let db = Database::open_in_memory().await.unwrap();

    db.upsert_cosmetic(cosmetic("torch", 1)).await.unwrap();
    db.upsert_cosmetic(cosmetic("torch", 3)).await.unwrap();

    let data = db.get_cosmetic("torch".to_string()).await.unwrap().unwrap();
    assert!(data.contains(r#""version":3"#));
    assert_eq!(db.list_cosmetic_ids().await.unwrap(), vec!["torch"]);
  }

  #[tokio::test]
  async fn test_missing_cosmetic_is_not_found() {
    let db = Database::open_in_memory().await.unwrap();

    let err = db.update_cosmetic(cosmetic("ghost", 1)).await.unwrap_err();
    assert_eq!(err.kind(), StoreErrorKind::NotFound);

    let err = db.delete_cosmetic("ghost".to_string()).await.unwrap_err();
    assert_eq!(err.kind(), StoreErrorKind::NotFound);
  }

  #[tokio::test]
  async fn test_non_positive_version_is_rejected() {
    let db = Database::open_in_memory().await.unwrap();

    let err = db.upsert_cosmetic(cosmetic("torch", 0)).await.unwrap_err();
    assert_eq!(err.kind(), StoreErrorKind::Other);
  }

  #[tokio::test]
  async fn test_list_cosmetics_sorted() {
    let db = Database::open_in_memory().await.unwrap();

    db.create_cosmetic(cosmetic("wings", 1)).await.unwrap();
    db.create_cosmetic(cosmetic("hats.top_hat", 4)).await.unwrap();

    assert_eq!(
      db.list_cosmetic_ids().await.unwrap(),
      vec!["hats.top_hat", "wings"]
    );
    let documents = db.list_cosmetics().await.unwrap();
    assert_eq!(documents.len(), 2);
    assert!(documents[0].contains("hats.top_hat"));
  }

  #[tokio::test]
  async fn test_player_cosmetic_ownership() {
    let db = Database::open_in_memory().await.unwrap();

    db.create_cosmetic(cosmetic("torch", 1)).await.unwrap();
    db.create_cosmetic(cosmetic("cape", 1)).await.unwrap();

    // First grant creates the player
    db.add_player_cosmetic(steve(), "torch".to_string()).await.unwrap();
    db.add_player_cosmetic(steve(), "cape".to_string()).await.unwrap();

    let player = db.get_player(steve()).await.unwrap().unwrap();
    assert_eq!(player.id, steve());
    assert_eq!(player.data, "{}");
    assert_eq!(player.cosmetics, vec!["cape", "torch"]);

    // Granting twice is rejected without a duplicate row
    let err = db
      .add_player_cosmetic(steve(), "torch".to_string())
      .await
      .unwrap_err();
    assert_eq!(err.kind(), StoreErrorKind::UniqueViolation);
    let player = db.get_player(steve()).await.unwrap().unwrap();
    assert_eq!(player.cosmetics.len(), 2);

    // Revoke
    db.remove_player_cosmetic(steve(), "torch".to_string())
      .await
      .unwrap();
    let err = db
      .remove_player_cosmetic(steve(), "torch".to_string())
      .await
      .unwrap_err();
    assert_eq!(err.kind(), StoreErrorKind::NotFound);

    let player = db.get_player(steve()).await.unwrap().unwrap();
    assert_eq!(player.cosmetics, vec!["cape"]);
  }

  #[tokio::test]
  async fn test_grant_unknown_cosmetic() {
    let db = Database::open_in_memory().await.unwrap();

    let err = db
      .add_player_cosmetic(steve(), "nonexistent".to_string())
      .await
      .unwrap_err();
    assert_eq!(err.kind(), StoreErrorKind::ForeignKeyViolation);

    // The failed grant doesn't leave a player behind
    assert!(db.get_player(steve()).await.unwrap().is_none());
  }

  #[tokio::test]
  async fn test_player_data() {
    let db = Database::open_in_memory().await.unwrap();

    assert!(db.get_player_data(alex()).await.unwrap().is_none());

    db.set_player_data(alex(), r#"{"color":"red"}"#.to_string())
      .await
      .unwrap();
    db.set_player_data(alex(), r#"{"color":"blue"}"#.to_string())
      .await
      .unwrap();

    let data = db.get_player_data(alex()).await.unwrap().unwrap();
    assert_eq!(data, r#"{"color":"blue"}"#);

    let player = db.get_player(alex()).await.unwrap().unwrap();
    assert!(player.cosmetics.is_empty());
  }

  #[tokio::test]
  async fn test_delete_player_cascades() {
    let db = Database::open_in_memory().await.unwrap();

    db.create_cosmetic(cosmetic("torch", 1)).await.unwrap();
    db.add_player_cosmetic(steve(), "torch".to_string()).await.unwrap();

    db.delete_player(steve()).await.unwrap();
    assert!(db.get_player(steve()).await.unwrap().is_none());

    let err = db.delete_player(steve()).await.unwrap_err();
    assert_eq!(err.kind(), StoreErrorKind::NotFound);

    // The grant went with the player, so it can be re-added
    db.add_player_cosmetic(steve(), "torch".to_string()).await.unwrap();
  }

  #[tokio::test]
  async fn test_delete_cosmetic_revokes_ownership() {
    let db = Database::open_in_memory().await.unwrap();

    db.create_cosmetic(cosmetic("torch", 1)).await.unwrap();
    db.add_player_cosmetic(steve(), "torch".to_string()).await.unwrap();

    db.delete_cosmetic("torch".to_string()).await.unwrap();

    let player = db.get_player(steve()).await.unwrap().unwrap();
    assert!(player.cosmetics.is_empty());
  }

  #[tokio::test]
  async fn test_list_players() {
    let db = Database::open_in_memory().await.unwrap();

    db.create_cosmetic(cosmetic("torch", 1)).await.unwrap();
    db.add_player_cosmetic(steve(), "torch".to_string()).await.unwrap();
    db.set_player_data(alex(), r#"{"rank":"vip"}"#.to_string())
      .await
      .unwrap();

    let ids = db.list_player_ids().await.unwrap();
    assert_eq!(ids, vec![steve(), alex()]);

    let players = db.list_players().await.unwrap();
    assert_eq!(players.len(), 2);
    assert_eq!(players[0].cosmetics, vec!["torch"]);
    assert_eq!(players[1].data, r#"{"rank":"vip"}"#);
    assert!(players[1].cosmetics.is_empty());
  }
}
