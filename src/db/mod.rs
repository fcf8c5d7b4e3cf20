use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

pub mod models;
use models::*;

/// Thread-safe SQLite connection pool (single connection with mutex)
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the SQLite database at the given path
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path).with_context(|| format!("opening {}", path))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        Self::from_connection(conn)
    }

    /// Fresh private database, used by tests
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Run schema migrations (idempotent)
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| anyhow!("database mutex poisoned"))
    }

    // ── Reference data ────────────────────────────────────────────────────────

    pub fn upsert_league(&self, league: &League) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO leagues (id, name, country, kind, logo, updated_at)
             VALUES (?1,?2,?3,?4,?5,?6)
             ON CONFLICT(id) DO UPDATE SET
                name=excluded.name,
                country=excluded.country,
                kind=excluded.kind,
                logo=excluded.logo,
                updated_at=excluded.updated_at",
            params![
                league.id,
                league.name,
                league.country,
                league.kind,
                league.logo,
                Utc::now(),
            ],
        )?;
        Ok(())
    }

    /// Upsert a set of teams in one transaction
    pub fn upsert_teams(&self, teams: &[Team]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO teams (id, name, country, founded, logo, updated_at)
                 VALUES (?1,?2,?3,?4,?5,?6)
                 ON CONFLICT(id) DO UPDATE SET
                    name=excluded.name,
                    country=excluded.country,
                    founded=excluded.founded,
                    logo=excluded.logo,
                    updated_at=excluded.updated_at",
            )?;
            let now = Utc::now();
            for team in teams {
                stmt.execute(params![
                    team.id,
                    team.name,
                    team.country,
                    team.founded,
                    team.logo,
                    now,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn league_ids(&self) -> Result<HashSet<i64>> {
        self.id_set("SELECT id FROM leagues")
    }

    pub fn team_ids(&self) -> Result<HashSet<i64>> {
        self.id_set("SELECT id FROM teams")
    }

    fn id_set(&self, sql: &str) -> Result<HashSet<i64>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<HashSet<i64>>>()?;
        Ok(ids)
    }

    // ── Players ───────────────────────────────────────────────────────────────

    /// Upsert a batch of players atomically: either every row lands or none does.
    pub fn upsert_players(&self, players: &[Player]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO players (
                    id, name, firstname, lastname, nationality, birthdate, photo,
                    height, weight, team_id, league_id, position, last_season,
                    created_at, updated_at
                 ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?14)
                 ON CONFLICT(id) DO UPDATE SET
                    name=excluded.name,
                    firstname=excluded.firstname,
                    lastname=excluded.lastname,
                    nationality=excluded.nationality,
                    birthdate=excluded.birthdate,
                    photo=excluded.photo,
                    height=excluded.height,
                    weight=excluded.weight,
                    team_id=excluded.team_id,
                    league_id=excluded.league_id,
                    position=excluded.position,
                    last_season=excluded.last_season,
                    updated_at=excluded.updated_at",
            )?;
            let now = Utc::now();
            for p in players {
                stmt.execute(params![
                    p.id,
                    p.name,
                    p.firstname,
                    p.lastname,
                    p.nationality,
                    p.birthdate,
                    p.photo,
                    p.height,
                    p.weight,
                    p.team_id,
                    p.league_id,
                    p.position,
                    p.last_season,
                    now,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn count_players(&self) -> Result<i64> {
        let conn = self.conn()?;
        let n = conn.query_row("SELECT COUNT(*) FROM players", [], |r| r.get(0))?;
        Ok(n)
    }

    pub fn get_player(&self, id: i64) -> Result<Option<Player>> {
        let conn = self.conn()?;
        let player = conn
            .query_row(
                "SELECT id, name, firstname, lastname, nationality, birthdate, photo,
                        height, weight, team_id, league_id, position, last_season
                 FROM players WHERE id = ?1",
                params![id],
                map_player,
            )
            .optional()?;
        Ok(player)
    }

    // ── Import checkpoints ────────────────────────────────────────────────────

    pub fn read_import_checkpoint(&self, import_type: &str) -> Result<Option<ImportCheckpoint>> {
        let conn = self.conn()?;
        let cp = conn
            .query_row(
                "SELECT import_type, last_batch, updated_at FROM import_state WHERE import_type = ?1",
                params![import_type],
                map_checkpoint,
            )
            .optional()?;
        Ok(cp)
    }

    /// Last writer wins
    pub fn write_import_checkpoint(&self, import_type: &str, last_batch: u32) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO import_state (import_type, last_batch, updated_at)
             VALUES (?1,?2,?3)
             ON CONFLICT(import_type) DO UPDATE SET
                last_batch=excluded.last_batch,
                updated_at=excluded.updated_at",
            params![import_type, last_batch, Utc::now()],
        )?;
        Ok(())
    }

    pub fn list_import_checkpoints(&self) -> Result<Vec<ImportCheckpoint>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT import_type, last_batch, updated_at FROM import_state ORDER BY import_type",
        )?;
        let rows = stmt
            .query_map([], map_checkpoint)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    // ── Historical leagues ────────────────────────────────────────────────────

    /// Insert a staging league and then its matches, in one transaction.
    ///
    /// The league row is written first so every match has its parent. A
    /// `(name, season)` that already exists yields `StageOutcome::Duplicate`
    /// and leaves the database untouched.
    pub fn stage_league(
        &self,
        name: &str,
        season: &str,
        source_file: &str,
        matches: &[HistoricalMatch],
    ) -> Result<StageOutcome> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let inserted = tx.execute(
            "INSERT INTO historical_leagues (name, season, source_file, status, created_at)
             VALUES (?1,?2,?3,?4,?5)",
            params![name, season, source_file, LeagueStatus::Staging, Utc::now()],
        );
        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                return Ok(StageOutcome::Duplicate);
            }
            Err(e) => return Err(e).context("inserting staging league"),
        }
        let league_id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare(
                "INSERT INTO historical_matches (
                    league_id, round, match_date, home_team_name, away_team_name,
                    home_score, away_score
                 ) VALUES (?1,?2,?3,?4,?5,?6,?7)",
            )?;
            for m in matches {
                stmt.execute(params![
                    league_id,
                    m.round,
                    m.match_date,
                    m.home_team_name,
                    m.away_team_name,
                    m.home_score,
                    m.away_score,
                ])
                .context("inserting historical matches")?;
            }
        }

        tx.commit()?;
        Ok(StageOutcome::Staged {
            league_id,
            match_count: matches.len(),
        })
    }

    /// Leagues awaiting promotion, newest first
    pub fn get_staged_leagues(&self) -> Result<Vec<StagedLeague>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT l.id, l.name, l.season, l.source_file, l.status, l.created_at,
                    (SELECT COUNT(*) FROM historical_matches m WHERE m.league_id = l.id)
             FROM historical_leagues l
             WHERE l.status = 'staging'
             ORDER BY l.created_at DESC, l.id DESC",
        )?;
        let rows = stmt
            .query_map([], map_staged_league)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn get_historical_league(&self, id: i64) -> Result<Option<StagedLeague>> {
        let conn = self.conn()?;
        let league = conn
            .query_row(
                "SELECT l.id, l.name, l.season, l.source_file, l.status, l.created_at,
                        (SELECT COUNT(*) FROM historical_matches m WHERE m.league_id = l.id)
                 FROM historical_leagues l WHERE l.id = ?1",
                params![id],
                map_staged_league,
            )
            .optional()?;
        Ok(league)
    }

    /// Flip a league (and with it, its matches) from staging to validated.
    pub fn promote_league_to_validated(&self, id: i64) -> Result<PromoteOutcome> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let status: Option<LeagueStatus> = tx
            .query_row(
                "SELECT status FROM historical_leagues WHERE id = ?1",
                params![id],
                |r| r.get(0),
            )
            .optional()?;
        let Some(status) = status else {
            return Ok(PromoteOutcome::NotFound);
        };
        let Some(next) = status.promote() else {
            return Ok(PromoteOutcome::AlreadyValidated);
        };

        tx.execute(
            "UPDATE historical_leagues SET status = ?1, validated_at = ?2
             WHERE id = ?3 AND status = ?4",
            params![next, Utc::now(), id, status],
        )?;
        tx.commit()?;
        Ok(PromoteOutcome::Promoted)
    }

    /// Validated meetings between two teams in either venue, most recent first
    pub fn head_to_head_history(&self, team_a: &str, team_b: &str) -> Result<Vec<HeadToHeadMatch>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT m.home_team_name, m.away_team_name, m.home_score, m.away_score
             FROM historical_matches m
             JOIN historical_leagues l ON l.id = m.league_id
             WHERE l.status = 'validated'
               AND ((m.home_team_name = ?1 AND m.away_team_name = ?2)
                 OR (m.home_team_name = ?2 AND m.away_team_name = ?1))
             ORDER BY m.match_date DESC, m.id DESC",
        )?;
        let rows = stmt
            .query_map(params![team_a, team_b], |row| {
                Ok(HeadToHeadMatch {
                    home_team_name: row.get(0)?,
                    away_team_name: row.get(1)?,
                    home_score: row.get(2)?,
                    away_score: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

// ── SQL helpers ────────────────────────────────────────────────────────────────

fn map_player(row: &rusqlite::Row) -> rusqlite::Result<Player> {
    Ok(Player {
        id: row.get(0)?,
        name: row.get(1)?,
        firstname: row.get(2)?,
        lastname: row.get(3)?,
        nationality: row.get(4)?,
        birthdate: row.get(5)?,
        photo: row.get(6)?,
        height: row.get(7)?,
        weight: row.get(8)?,
        team_id: row.get(9)?,
        league_id: row.get(10)?,
        position: row.get(11)?,
        last_season: row.get(12)?,
    })
}

fn map_checkpoint(row: &rusqlite::Row) -> rusqlite::Result<ImportCheckpoint> {
    Ok(ImportCheckpoint {
        import_type: row.get(0)?,
        last_batch: row.get(1)?,
        updated_at: row.get(2)?,
    })
}

fn map_staged_league(row: &rusqlite::Row) -> rusqlite::Result<StagedLeague> {
    Ok(StagedLeague {
        id: row.get(0)?,
        name: row.get(1)?,
        season: row.get(2)?,
        source_file: row.get(3)?,
        status: row.get(4)?,
        created_at: row.get(5)?,
        match_count: row.get(6)?,
    })
}

/// SQLite schema (idempotent CREATE IF NOT EXISTS)
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS leagues (
    id          INTEGER PRIMARY KEY,
    name        TEXT    NOT NULL,
    country     TEXT,
    kind        TEXT,
    logo        TEXT,
    updated_at  TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS teams (
    id          INTEGER PRIMARY KEY,
    name        TEXT    NOT NULL,
    country     TEXT,
    founded     INTEGER,
    logo        TEXT,
    updated_at  TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS players (
    id          INTEGER PRIMARY KEY,
    name        TEXT    NOT NULL,
    firstname   TEXT,
    lastname    TEXT,
    nationality TEXT,
    birthdate   TEXT,
    photo       TEXT,
    height      TEXT,
    weight      TEXT,
    team_id     INTEGER NOT NULL,
    league_id   INTEGER NOT NULL,
    position    TEXT,
    last_season INTEGER,
    created_at  TEXT    NOT NULL,
    updated_at  TEXT    NOT NULL,
    FOREIGN KEY (team_id) REFERENCES teams(id),
    FOREIGN KEY (league_id) REFERENCES leagues(id)
);

CREATE TABLE IF NOT EXISTS import_state (
    import_type TEXT    PRIMARY KEY,
    last_batch  INTEGER NOT NULL,
    updated_at  TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS historical_leagues (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    name         TEXT    NOT NULL,
    season       TEXT    NOT NULL,
    source_file  TEXT    NOT NULL,
    status       TEXT    NOT NULL DEFAULT 'staging'
                         CHECK (status IN ('staging', 'validated')),
    created_at   TEXT    NOT NULL,
    validated_at TEXT,
    UNIQUE (name, season)
);

CREATE TABLE IF NOT EXISTS historical_matches (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    league_id      INTEGER NOT NULL,
    round          TEXT,
    match_date     TEXT,
    home_team_name TEXT    NOT NULL,
    away_team_name TEXT    NOT NULL,
    home_score     INTEGER NOT NULL,
    away_score     INTEGER NOT NULL,
    FOREIGN KEY (league_id) REFERENCES historical_leagues(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_players_team ON players(team_id);
CREATE INDEX IF NOT EXISTS idx_historical_leagues_status ON historical_leagues(status);
CREATE INDEX IF NOT EXISTS idx_historical_matches_league ON historical_matches(league_id);
CREATE INDEX IF NOT EXISTS idx_historical_matches_teams
    ON historical_matches(home_team_name, away_team_name);
"#;
