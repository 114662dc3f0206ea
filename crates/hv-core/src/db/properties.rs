use tokio_postgres::Row;
use tracing::instrument;

use crate::db::{PgPool, StorageError};
use crate::{OccupancyStatus, Property};

fn row_to_property(row: &Row) -> Result<Property, StorageError> {
    let status = row
        .try_get::<_, Option<String>>("status")?
        .map(|s| {
            OccupancyStatus::from_str(&s)
                .ok_or_else(|| StorageError::Mapping(format!("unknown property status: {s}")))
        })
        .transpose()?;

    Ok(Property {
        id: Some(row.try_get("id")?),
        organization_id: row.try_get("organization_id")?,
        address: row.try_get("address")?,
        unit_number: row.try_get("unit_number")?,
        city: row.try_get("city")?,
        state: row.try_get("state")?,
        zip_code: row.try_get("zip_code")?,
        status,
        tenant_name: row.try_get("tenant_name")?,
        rent_amount: row.try_get("rent_amount")?,
        housing_authority_id: row.try_get("housing_authority_id")?,
    })
}

/// Full property directory for one organization. Loaded once per batch and
/// treated as read-only by the matching pass.
#[instrument(skip(pool))]
pub async fn fetch_for_organization(
    pool: &PgPool,
    organization_id: i64,
) -> Result<Vec<Property>, StorageError> {
    let client = pool.get().await?;
    let stmt = client
        .prepare(
            "SELECT id, organization_id, address, unit_number, city, state, zip_code,
                    status, tenant_name, rent_amount, housing_authority_id
             FROM haven.properties
             WHERE organization_id = $1
             ORDER BY id",
        )
        .await?;
    let rows = client.query(&stmt, &[&organization_id]).await?;
    rows.iter().map(row_to_property).collect()
}

/// Point a property at its housing authority once one is detected.
#[instrument(skip(pool))]
pub async fn link_housing_authority(
    pool: &PgPool,
    property_id: i64,
    housing_authority_id: i64,
) -> Result<u64, StorageError> {
    let client = pool.get().await?;
    let rows = client
        .execute(
            "UPDATE haven.properties SET
                housing_authority_id = $2,
                updated_at = NOW()
             WHERE id = $1 AND housing_authority_id IS NULL",
            &[&property_id, &housing_authority_id],
        )
        .await?;
    Ok(rows)
}
