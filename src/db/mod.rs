mod schema;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, OptionalExtension};

use crate::models::*;

/// Handle to the pet store and session registry.
///
/// All writes to `pet_states` and `pet_sessions` go through the methods on
/// this type; the per-pet session uniqueness is enforced by the store itself
/// (a native `ON CONFLICT` upsert), never by read-then-write.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_default() -> Result<Self> {
        let dirs = directories::ProjectDirs::from("", "", "islandpet")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        let db_path = dirs.data_dir().join("islandpet.db");
        Self::open(db_path)
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        schema::run_migrations(&conn)
    }

    // ============================================================
    // Pet state operations
    // ============================================================

    /// Create the pet's state row if it does not exist yet.
    ///
    /// New pets start at hunger 0, happiness 100. An existing row is left
    /// untouched, including its species.
    pub fn ensure_pet_state(&self, pet_id: &str, species_id: &str) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let now = Utc::now();

        conn.execute(
            "INSERT INTO pet_states (pet_id, species_id, hunger, happiness, last_updated)
             VALUES (?, ?, 0, 100, ?)
             ON CONFLICT(pet_id) DO NOTHING",
            (pet_id, species_id, now.to_rfc3339()),
        )?;

        Ok(())
    }

    pub fn get_pet_state(&self, pet_id: &str) -> Result<Option<PetState>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT pet_id, species_id, hunger, happiness, last_updated
             FROM pet_states WHERE pet_id = ?",
        )?;

        let state = stmt
            .query_row([pet_id], |row| {
                Ok(PetState {
                    pet_id: row.get(0)?,
                    species_id: row.get(1)?,
                    hunger: row.get(2)?,
                    happiness: row.get(3)?,
                    last_updated: parse_datetime(row.get::<_, String>(4)?),
                })
            })
            .optional()?;

        Ok(state)
    }

    /// Write new attribute values for a pet, clamped to `0..=100`.
    ///
    /// Returns `None` if no state row exists for `pet_id`.
    pub fn update_pet_state(
        &self,
        pet_id: &str,
        attributes: PetAttributes,
    ) -> Result<Option<PetState>> {
        let attributes = attributes.clamped();
        let conn = self.conn.lock().expect("database lock poisoned");
        let now = Utc::now();

        let rows = conn.execute(
            "UPDATE pet_states
             SET hunger = ?, happiness = ?, last_updated = ?
             WHERE pet_id = ?",
            (
                attributes.hunger,
                attributes.happiness,
                now.to_rfc3339(),
                pet_id,
            ),
        )?;
        if rows == 0 {
            return Ok(None);
        }

        let mut stmt = conn.prepare(
            "SELECT pet_id, species_id, hunger, happiness, last_updated
             FROM pet_states WHERE pet_id = ?",
        )?;
        let state = stmt
            .query_row([pet_id], |row| {
                Ok(PetState {
                    pet_id: row.get(0)?,
                    species_id: row.get(1)?,
                    hunger: row.get(2)?,
                    happiness: row.get(3)?,
                    last_updated: parse_datetime(row.get::<_, String>(4)?),
                })
            })
            .optional()?;

        Ok(state)
    }

    /// Age every pet whose `last_updated` is at least `staleness` in the
    /// past: hunger +1 (capped at 100), happiness -1 (floored at 0).
    ///
    /// Returns the decayed pets with their new attribute values.
    pub fn decay_stale(&self, staleness: Duration) -> Result<Vec<(String, PetAttributes)>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let now = Utc::now();
        let cutoff = now - staleness;

        let mut stmt = conn.prepare(
            "UPDATE pet_states
             SET hunger = MIN(100, hunger + 1),
                 happiness = MAX(0, happiness - 1),
                 last_updated = ?
             WHERE last_updated <= ?
             RETURNING pet_id, hunger, happiness",
        )?;

        let decayed = stmt
            .query_map((now.to_rfc3339(), cutoff.to_rfc3339()), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    PetAttributes {
                        hunger: row.get(1)?,
                        happiness: row.get(2)?,
                    },
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(decayed)
    }

    /// Delete a pet's state row. The session row, if any, cascades.
    pub fn delete_pet(&self, pet_id: &str) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute("DELETE FROM pet_states WHERE pet_id = ?", [pet_id])?;
        Ok(rows > 0)
    }

    // ============================================================
    // Session registry operations
    // ============================================================

    /// Insert or replace the session for a pet.
    ///
    /// Keyed by the pet's uniqueness constraint: if the pet already has a
    /// session, its activity id, species, token and creation time are all
    /// overwritten in place. This is what keeps "at most one session per
    /// pet" race-free under concurrent registration.
    pub fn upsert_session(&self, input: &RegisterInput) -> Result<Session> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let now = Utc::now();

        let mut stmt = conn.prepare(
            "INSERT INTO pet_sessions (activity_id, pet_id, species_id, token, created_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(pet_id) DO UPDATE
               SET activity_id = excluded.activity_id,
                   species_id  = excluded.species_id,
                   token       = excluded.token,
                   created_at  = excluded.created_at
             RETURNING activity_id, pet_id, species_id, token, created_at",
        )?;

        let session = stmt.query_row(
            (
                &input.activity_id,
                &input.pet_id,
                &input.species_id,
                &input.token,
                now.to_rfc3339(),
            ),
            |row| {
                Ok(Session {
                    activity_id: row.get(0)?,
                    pet_id: row.get(1)?,
                    species_id: row.get(2)?,
                    token: row.get(3)?,
                    created_at: parse_datetime(row.get::<_, String>(4)?),
                })
            },
        )?;

        Ok(session)
    }

    /// Update only the delivery token of an existing session.
    pub fn update_session_token(&self, activity_id: &str, token: &str) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute(
            "UPDATE pet_sessions SET token = ? WHERE activity_id = ?",
            (token, activity_id),
        )?;
        Ok(rows > 0)
    }

    /// Rename a session in place, preserving its pet binding and token.
    pub fn rename_session(&self, old_activity_id: &str, new_activity_id: &str) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute(
            "UPDATE pet_sessions SET activity_id = ? WHERE activity_id = ?",
            (new_activity_id, old_activity_id),
        )?;
        Ok(rows > 0)
    }

    pub fn delete_session(&self, activity_id: &str) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute(
            "DELETE FROM pet_sessions WHERE activity_id = ?",
            [activity_id],
        )?;
        Ok(rows > 0)
    }

    pub fn get_session_for_pet(&self, pet_id: &str) -> Result<Option<Session>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT activity_id, pet_id, species_id, token, created_at
             FROM pet_sessions WHERE pet_id = ?",
        )?;

        let session = stmt
            .query_row([pet_id], |row| {
                Ok(Session {
                    activity_id: row.get(0)?,
                    pet_id: row.get(1)?,
                    species_id: row.get(2)?,
                    token: row.get(3)?,
                    created_at: parse_datetime(row.get::<_, String>(4)?),
                })
            })
            .optional()?;

        Ok(session)
    }

    /// Every session joined with its pet's current attributes.
    ///
    /// The decay cycle pushes to all of these each pass, whether or not the
    /// pet just decayed, so a session that missed an earlier push converges
    /// on the next cycle.
    pub fn get_active_sessions(&self) -> Result<Vec<ActiveSession>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT ps.activity_id, ps.pet_id, ps.token, s.hunger, s.happiness
             FROM pet_sessions ps
             JOIN pet_states s ON s.pet_id = ps.pet_id",
        )?;

        let sessions = stmt
            .query_map([], |row| {
                Ok(ActiveSession {
                    activity_id: row.get(0)?,
                    pet_id: row.get(1)?,
                    token: row.get(2)?,
                    attributes: PetAttributes {
                        hunger: row.get(3)?,
                        happiness: row.get(4)?,
                    },
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(sessions)
    }
}

fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default()
}
