//! SQLite-backed durable store for devices and tokens.
//!
//! Uniqueness lives in the schema: `UNIQUE(tenant_id, id_data)` makes
//! create-or-fetch safe under concurrent first sightings, and a partial unique
//! index allows at most one unrevoked token per device.

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tokio::sync::Mutex;
use tracing::{debug, info};

use devauth_core::{Device, DeviceRegistry, DeviceStatus, TenantId, Token, TokenStore};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS devices (
        id          TEXT PRIMARY KEY,
        tenant_id   TEXT NOT NULL,
        id_data     TEXT NOT NULL,
        pubkey      TEXT NOT NULL,
        status      TEXT NOT NULL,
        created_ts  TEXT NOT NULL,
        updated_ts  TEXT NOT NULL,
        UNIQUE(tenant_id, id_data)
    );
    CREATE INDEX IF NOT EXISTS idx_devices_tenant ON devices(tenant_id, id);
    CREATE TABLE IF NOT EXISTS tokens (
        id          TEXT PRIMARY KEY,
        tenant_id   TEXT NOT NULL,
        device_id   TEXT NOT NULL,
        token       TEXT NOT NULL,
        issued_at   TEXT NOT NULL,
        expires_at  TEXT NOT NULL,
        revoked     INTEGER NOT NULL DEFAULT 0
    );
    CREATE UNIQUE INDEX IF NOT EXISTS idx_tokens_live
        ON tokens(tenant_id, device_id) WHERE revoked = 0;";

const DEVICE_COLUMNS: &str = "id, tenant_id, id_data, pubkey, status, created_ts, updated_ts";
const TOKEN_COLUMNS: &str = "id, tenant_id, device_id, token, issued_at, expires_at, revoked";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).context("Failed to open SQLite database")?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .context("Failed to enable WAL journal")?;
        let store = Self::init(conn)?;
        info!(path = ?path.as_ref(), "Device store opened");
        Ok(store)
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory SQLite")?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA).context("Failed to initialize devauth schema")?;
        Ok(Self { conn: Mutex::new(conn) })
    }
}

#[async_trait]
impl DeviceRegistry for SqliteStore {
    async fn get_or_create(&self, candidate: Device) -> Result<(Device, bool)> {
        let conn = self.conn.lock().await;
        let inserted = conn.execute(
            "INSERT INTO devices (id, tenant_id, id_data, pubkey, status, created_ts, updated_ts)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(tenant_id, id_data) DO NOTHING",
            params![
                candidate.id,
                candidate.tenant_id.as_str(),
                candidate.identity_data,
                candidate.public_key,
                candidate.status.as_str(),
                candidate.created_ts.to_rfc3339(),
                candidate.updated_ts.to_rfc3339(),
            ],
        )?;
        let device = conn
            .query_row(
                &format!("SELECT {DEVICE_COLUMNS} FROM devices WHERE tenant_id = ?1 AND id_data = ?2"),
                params![candidate.tenant_id.as_str(), candidate.identity_data],
                row_to_device,
            )
            .context("Device vanished after create-or-fetch")?;
        if inserted > 0 {
            debug!(device_id = %device.id, "Stored new device");
        }
        Ok((device, inserted > 0))
    }

    async fn get_device(&self, tenant: &TenantId, id: &str) -> Result<Option<Device>> {
        let conn = self.conn.lock().await;
        let device = conn
            .query_row(
                &format!("SELECT {DEVICE_COLUMNS} FROM devices WHERE tenant_id = ?1 AND id = ?2"),
                params![tenant.as_str(), id],
                row_to_device,
            )
            .optional()?;
        Ok(device)
    }

    async fn list_devices(&self, tenant: &TenantId, skip: usize, limit: usize) -> Result<Vec<Device>> {
        let Ok(offset) = i64::try_from(skip) else {
            return Ok(Vec::new());
        };
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {DEVICE_COLUMNS} FROM devices WHERE tenant_id = ?1
             ORDER BY id ASC LIMIT ?2 OFFSET ?3"
        ))?;
        let devices = stmt
            .query_map(params![tenant.as_str(), limit, offset], row_to_device)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(devices)
    }

    async fn update_status(
        &self,
        tenant: &TenantId,
        id: &str,
        status: DeviceStatus,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            "UPDATE devices SET status = ?1, updated_ts = ?2 WHERE tenant_id = ?3 AND id = ?4",
            params![status.as_str(), now.to_rfc3339(), tenant.as_str(), id],
        )?;
        Ok(changed > 0)
    }

    async fn rotate_key(
        &self,
        tenant: &TenantId,
        id: &str,
        public_key: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            "UPDATE devices SET pubkey = ?1, updated_ts = ?2
             WHERE tenant_id = ?3 AND id = ?4 AND status = ?5",
            params![
                public_key,
                now.to_rfc3339(),
                tenant.as_str(),
                id,
                DeviceStatus::Accepted.as_str()
            ],
        )?;
        Ok(changed > 0)
    }
}

#[async_trait]
impl TokenStore for SqliteStore {
    async fn insert_or_get_live(&self, candidate: Token, now: DateTime<Utc>) -> Result<Token> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let live = tx
            .query_row(
                &format!(
                    "SELECT {TOKEN_COLUMNS} FROM tokens
                     WHERE tenant_id = ?1 AND device_id = ?2 AND revoked = 0"
                ),
                params![candidate.tenant_id.as_str(), candidate.device_id],
                row_to_token,
            )
            .optional()?;

        if let Some(existing) = live {
            if !existing.is_expired_at(now) {
                tx.commit()?;
                return Ok(existing);
            }
            tx.execute("UPDATE tokens SET revoked = 1 WHERE id = ?1", params![existing.id])?;
        }

        tx.execute(
            "INSERT INTO tokens (id, tenant_id, device_id, token, issued_at, expires_at, revoked)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)",
            params![
                candidate.id,
                candidate.tenant_id.as_str(),
                candidate.device_id,
                candidate.raw,
                candidate.issued_at.to_rfc3339(),
                candidate.expires_at.to_rfc3339(),
            ],
        )?;
        tx.commit()?;
        Ok(candidate)
    }

    async fn get_token(&self, tenant: &TenantId, id: &str) -> Result<Option<Token>> {
        let conn = self.conn.lock().await;
        let token = conn
            .query_row(
                &format!("SELECT {TOKEN_COLUMNS} FROM tokens WHERE tenant_id = ?1 AND id = ?2"),
                params![tenant.as_str(), id],
                row_to_token,
            )
            .optional()?;
        Ok(token)
    }

    async fn revoke_token(&self, tenant: &TenantId, id: &str) -> Result<bool> {
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            "UPDATE tokens SET revoked = 1 WHERE tenant_id = ?1 AND id = ?2",
            params![tenant.as_str(), id],
        )?;
        Ok(changed > 0)
    }

    async fn revoke_device_tokens(&self, tenant: &TenantId, device_id: &str) -> Result<usize> {
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            "UPDATE tokens SET revoked = 1 WHERE tenant_id = ?1 AND device_id = ?2 AND revoked = 0",
            params![tenant.as_str(), device_id],
        )?;
        Ok(changed)
    }
}

// ---------------------------------------------------------------------------
// Row deserialization helpers
// ---------------------------------------------------------------------------

fn row_to_device(row: &rusqlite::Row) -> rusqlite::Result<Device> {
    let status: String = row.get(4)?;
    Ok(Device {
        id: row.get(0)?,
        tenant_id: TenantId::new(row.get::<_, String>(1)?),
        identity_data: row.get(2)?,
        public_key: row.get(3)?,
        status: status
            .parse()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?,
        created_ts: parse_ts(row, 5)?,
        updated_ts: parse_ts(row, 6)?,
    })
}

fn row_to_token(row: &rusqlite::Row) -> rusqlite::Result<Token> {
    Ok(Token {
        id: row.get(0)?,
        tenant_id: TenantId::new(row.get::<_, String>(1)?),
        device_id: row.get(2)?,
        raw: row.get(3)?,
        issued_at: parse_ts(row, 4)?,
        expires_at: parse_ts(row, 5)?,
        revoked: row.get::<_, i64>(6)? != 0,
    })
}

fn parse_ts(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
