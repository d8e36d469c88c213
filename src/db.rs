use log::info;
use scylla::transport::errors::{NewSessionError, QueryError};
use scylla::{Session, SessionBuilder};

use crate::config::ScyllaSettings;
use crate::store::Collection;

pub async fn create_session(settings: &ScyllaSettings) -> Result<Session, NewSessionError> {
    let session = SessionBuilder::new()
        .known_nodes(&settings.known_nodes)
        .build()
        .await?;

    Ok(session)
}

/// Creates the keyspace, one table per collection (indexed on `owner` and
/// `parent`), the unique-claims table and the edges table. Safe to run on
/// every start.
pub async fn ensure_schema(session: &Session, settings: &ScyllaSettings) -> Result<(), QueryError> {
    let keyspace = &settings.keyspace;
    session
        .query(
            format!(
                "CREATE KEYSPACE IF NOT EXISTS {keyspace} WITH replication = {{'class': 'SimpleStrategy', 'replication_factor': {}}}",
                settings.replication_factor
            ),
            (),
        )
        .await?;

    for collection in Collection::ALL {
        let table = collection.name();
        session
            .query(
                format!(
                    "CREATE TABLE IF NOT EXISTS {keyspace}.{table} (id text PRIMARY KEY, owner text, parent text, doc text)"
                ),
                (),
            )
            .await?;
        session
            .query(
                format!("CREATE INDEX IF NOT EXISTS {table}_owner_idx ON {keyspace}.{table} (owner)"),
                (),
            )
            .await?;
        session
            .query(
                format!("CREATE INDEX IF NOT EXISTS {table}_parent_idx ON {keyspace}.{table} (parent)"),
                (),
            )
            .await?;
    }

    session
        .query(
            format!(
                "CREATE TABLE IF NOT EXISTS {keyspace}.unique_claims (collection text, field text, value text, id text, PRIMARY KEY ((collection, field, value)))"
            ),
            (),
        )
        .await?;
    session
        .query(
            format!(
                "CREATE TABLE IF NOT EXISTS {keyspace}.edges (kind text, target text, source text, created_at bigint, PRIMARY KEY ((kind, target), source))"
            ),
            (),
        )
        .await?;
    session
        .query(
            format!("CREATE INDEX IF NOT EXISTS edges_source_idx ON {keyspace}.edges (source)"),
            (),
        )
        .await?;

    info!("Schema ready in keyspace {}", keyspace);
    Ok(())
}
