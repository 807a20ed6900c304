//! SQLite storage backend for incoming transaction state
//!
//! Transactions are stored as JSON payloads keyed by hash and inserted with
//! `INSERT OR IGNORE`, so a stored hash is never rewritten. Each merge is one
//! SQL transaction.

#[cfg(feature = "storage")]
use async_trait::async_trait;
#[cfg(feature = "storage")]
use rusqlite::{params, types::Type, OptionalExtension};
#[cfg(feature = "storage")]
use std::path::Path;
#[cfg(feature = "storage")]
use tokio_rusqlite::Connection;

#[cfg(feature = "storage")]
use crate::{
    data_structures::{IncomingTransaction, IncomingTxState, NetworkId},
    errors::{IncomingTxError, IncomingTxResult},
    storage::storage_trait::{IncomingTxStorage, StateUpdate},
};

/// SQLite backend
#[cfg(feature = "storage")]
pub struct SqliteIncomingTxStorage {
    connection: Connection,
}

#[cfg(feature = "storage")]
impl SqliteIncomingTxStorage {
    /// Open (or create) a database file
    pub async fn new<P: AsRef<Path>>(database_path: P) -> IncomingTxResult<Self> {
        let connection = Connection::open(database_path).await.map_err(|e| {
            IncomingTxError::Storage(format!("Failed to open SQLite database: {e}"))
        })?;
        Ok(Self { connection })
    }

    /// In-memory database (useful for testing)
    pub async fn new_in_memory() -> IncomingTxResult<Self> {
        let connection = Connection::open_in_memory().await.map_err(|e| {
            IncomingTxError::Storage(format!("Failed to create in-memory database: {e}"))
        })?;
        Ok(Self { connection })
    }

    /// Use an existing connection
    pub fn from_connection(connection: Connection) -> Self {
        Self { connection }
    }

    async fn create_schema(&self) -> IncomingTxResult<()> {
        let sql = r#"
            CREATE TABLE IF NOT EXISTS incoming_transactions (
                hash TEXT PRIMARY KEY NOT NULL,
                chain_id INTEGER NOT NULL,
                block_number INTEGER,
                time INTEGER NOT NULL,
                payload TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_incoming_transactions_chain_time
                ON incoming_transactions(chain_id, time);

            CREATE TABLE IF NOT EXISTS last_fetched_blocks (
                network TEXT PRIMARY KEY NOT NULL,
                block_number INTEGER,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );
        "#;

        self.connection
            .call(move |conn| Ok(conn.execute_batch(sql)?))
            .await
            .map_err(|e| IncomingTxError::Storage(format!("Failed to create schema: {e}")))
    }

    /// Stored block for a single network
    pub async fn last_fetched_block(&self, network: NetworkId) -> IncomingTxResult<Option<u64>> {
        let block: Option<Option<i64>> = self
            .connection
            .call(move |conn| {
                Ok(conn
                    .query_row(
                        "SELECT block_number FROM last_fetched_blocks WHERE network = ?",
                        params![network.as_str()],
                        |row| row.get(0),
                    )
                    .optional()?)
            })
            .await?;
        Ok(block.flatten().map(|b| b as u64))
    }

    /// Number of stored transactions
    pub async fn transaction_count(&self) -> IncomingTxResult<usize> {
        let count: i64 = self
            .connection
            .call(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM incoming_transactions", [], |row| {
                    row.get(0)
                })?)
            })
            .await?;
        Ok(count as usize)
    }
}

#[cfg(feature = "storage")]
#[async_trait]
impl IncomingTxStorage for SqliteIncomingTxStorage {
    async fn initialize(&self) -> IncomingTxResult<()> {
        self.create_schema().await
    }

    async fn load_state(&self) -> IncomingTxResult<Option<IncomingTxState>> {
        let (blocks, transactions) = self
            .connection
            .call(|conn| {
                let mut stmt =
                    conn.prepare("SELECT network, block_number FROM last_fetched_blocks")?;
                let blocks = stmt
                    .query_map([], |row| {
                        Ok((row.get::<_, String>(0)?, row.get::<_, Option<i64>>(1)?))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;

                let mut stmt = conn.prepare("SELECT payload FROM incoming_transactions")?;
                let transactions = stmt
                    .query_map([], |row| {
                        let payload: String = row.get(0)?;
                        serde_json::from_str::<IncomingTransaction>(&payload).map_err(|e| {
                            rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e))
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;

                Ok((blocks, transactions))
            })
            .await
            .map_err(|e| IncomingTxError::Storage(format!("Failed to load state: {e}")))?;

        if blocks.is_empty() && transactions.is_empty() {
            return Ok(None);
        }

        let mut state = IncomingTxState::default();
        for (network, block) in blocks {
            // rows for networks no longer supported are ignored
            if let Some(network) = NetworkId::resolve(&network) {
                state
                    .last_fetched_blocks
                    .insert(network, block.map(|b| b as u64));
            }
        }
        for tx in transactions {
            state.incoming_transactions.insert(tx.hash.clone(), tx);
        }
        Ok(Some(state))
    }

    async fn persist_merge(&self, update: &StateUpdate) -> IncomingTxResult<()> {
        let update = update.clone();
        self.connection
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    r#"
                    INSERT INTO last_fetched_blocks (network, block_number)
                    VALUES (?, ?)
                    ON CONFLICT(network) DO UPDATE SET
                        block_number = excluded.block_number,
                        updated_at = CURRENT_TIMESTAMP
                    "#,
                    params![
                        update.network.as_str(),
                        update.last_fetched_block.map(|b| b as i64)
                    ],
                )?;

                {
                    let mut stmt = tx.prepare(
                        r#"
                        INSERT OR IGNORE INTO incoming_transactions
                        (hash, chain_id, block_number, time, payload)
                        VALUES (?, ?, ?, ?, ?)
                        "#,
                    )?;
                    for incoming in &update.inserted {
                        let payload = serde_json::to_string(incoming)
                            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
                        stmt.execute(params![
                            incoming.hash,
                            incoming.metamask_network_id as i64,
                            incoming.block_number.map(|b| b as i64),
                            incoming.time,
                            payload,
                        ])?;
                    }
                }

                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(|e| IncomingTxError::Storage(format!("Failed to persist merge: {e}")))
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}
