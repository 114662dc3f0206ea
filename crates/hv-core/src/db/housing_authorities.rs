use tokio_postgres::types::Json;
use tracing::instrument;

use crate::db::{PgPool, StorageError};
use crate::entities::AuthorityKind;

/// Lazily materialize a housing authority row for an organization on first
/// detection. Detection itself stays pure; this is the only side effect. The
/// profile snapshot records the policy in force at creation time.
#[instrument(skip(pool))]
pub async fn find_or_create(
    pool: &PgPool,
    organization_id: i64,
    kind: AuthorityKind,
) -> Result<i64, StorageError> {
    let client = pool.get().await?;
    let profile = serde_json::to_value(kind.profile())
        .map_err(|e| StorageError::Mapping(e.to_string()))?;

    let stmt = client
        .prepare(
            "WITH inserted AS (
                INSERT INTO haven.housing_authorities
                    (organization_id, authority_type, display_name, profile)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (organization_id, authority_type) DO NOTHING
                RETURNING id
            )
            SELECT id FROM inserted
            UNION ALL
            SELECT id FROM haven.housing_authorities
            WHERE organization_id = $1 AND authority_type = $2
            LIMIT 1",
        )
        .await?;
    let row = client
        .query_one(
            &stmt,
            &[
                &organization_id,
                &kind.as_str(),
                &kind.display_name(),
                &Json(&profile),
            ],
        )
        .await?;
    Ok(row.try_get("id")?)
}
