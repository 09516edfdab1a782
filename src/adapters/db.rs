use rusqlite::{Connection, params};
use serde_json::Value;
use thiserror::Error;

pub const LATEST_SCHEMA_VERSION: u32 = 1;

/// Upper bound on documents written by one atomic `insert_documents` call.
pub const MAX_BATCH_WRITES: usize = 500;

const MIGRATIONS: &[(u32, &str)] = &[(
    1,
    r#"
CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    collection TEXT NOT NULL,
    payload TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE INDEX IF NOT EXISTS idx_documents_collection_created_at_desc
ON documents (collection, created_at DESC, id DESC);
"#,
)];

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database operation failed: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("unsupported schema version {current}; latest supported is {latest}")]
    UnsupportedSchemaVersion { current: u32, latest: u32 },
    #[error("batch of {size} documents exceeds the limit of {limit}")]
    BatchTooLarge { size: usize, limit: usize },
    #[error("stored document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn open_connection(path: &str) -> Result<Connection, DbError> {
    Connection::open(path).map_err(DbError::from)
}

pub fn run_migrations(connection: &mut Connection) -> Result<(), DbError> {
    let current_version = schema_version(connection)?;

    if current_version > LATEST_SCHEMA_VERSION {
        return Err(DbError::UnsupportedSchemaVersion {
            current: current_version,
            latest: LATEST_SCHEMA_VERSION,
        });
    }

    let transaction = connection.transaction()?;

    for (version, sql) in MIGRATIONS {
        if *version > current_version {
            transaction.execute_batch(sql)?;
            transaction.pragma_update(None, "user_version", version)?;
        }
    }

    transaction.commit()?;

    Ok(())
}

pub fn schema_version(connection: &Connection) -> Result<u32, DbError> {
    let version = connection.pragma_query_value(None, "user_version", |row| row.get(0))?;
    Ok(version)
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: i64,
    pub collection: String,
    pub created_at: String,
    pub payload: Value,
}

impl StoredDocument {
    /// Flattens the stored payload together with the store-assigned id and
    /// creation time. Non-object payloads are nested under `data`.
    pub fn into_json(self) -> Value {
        let mut object = match self.payload {
            Value::Object(map) => map,
            other => {
                let mut map = serde_json::Map::new();
                map.insert("data".to_string(), other);
                map
            }
        };
        object.insert("id".to_string(), Value::from(self.id));
        object.insert("created_at".to_string(), Value::from(self.created_at));
        Value::Object(object)
    }
}

pub fn insert_document(
    connection: &Connection,
    collection: &str,
    document: &Value,
) -> Result<i64, DbError> {
    connection.execute(
        "INSERT INTO documents (collection, payload) VALUES (?1, ?2)",
        params![collection, document.to_string()],
    )?;

    Ok(connection.last_insert_rowid())
}

pub fn insert_documents(
    connection: &mut Connection,
    collection: &str,
    documents: &[Value],
) -> Result<usize, DbError> {
    if documents.len() > MAX_BATCH_WRITES {
        return Err(DbError::BatchTooLarge {
            size: documents.len(),
            limit: MAX_BATCH_WRITES,
        });
    }

    let transaction = connection.transaction()?;
    {
        let mut statement =
            transaction.prepare("INSERT INTO documents (collection, payload) VALUES (?1, ?2)")?;
        for document in documents {
            statement.execute(params![collection, document.to_string()])?;
        }
    }
    transaction.commit()?;

    Ok(documents.len())
}

pub fn list_recent_documents(
    connection: &Connection,
    collection: &str,
    limit: u32,
) -> Result<Vec<StoredDocument>, DbError> {
    let mut statement = connection.prepare(
        "SELECT id, collection, created_at, payload
         FROM documents
         WHERE collection = ?1
         ORDER BY created_at DESC, id DESC
         LIMIT ?2",
    )?;

    let rows = statement.query_map(params![collection, i64::from(limit)], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
        ))
    })?;

    let mut documents = Vec::new();
    for row in rows {
        let (id, collection, created_at, payload) = row?;
        documents.push(StoredDocument {
            id,
            collection,
            created_at,
            payload: serde_json::from_str(&payload)?,
        });
    }

    Ok(documents)
}

pub fn count_documents(connection: &Connection, collection: &str) -> Result<i64, DbError> {
    let count = connection.query_row(
        "SELECT COUNT(*) FROM documents WHERE collection = ?1",
        params![collection],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Document totals per collection, ordered by collection name.
pub fn collection_counts(connection: &Connection) -> Result<Vec<(String, i64)>, DbError> {
    let mut statement = connection.prepare(
        "SELECT collection, COUNT(*) FROM documents GROUP BY collection ORDER BY collection",
    )?;
    let counts = statement
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(counts)
}
