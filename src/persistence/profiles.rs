//! Profile persistence: upsert, paper balance, list for hydration.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::quiz::RiskProfile;
use crate::types::profile::Profile;

#[derive(Debug, FromRow)]
pub struct ProfileRow {
    pub user_id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub base_currency: String,
    pub risk_profile: Option<String>,
    pub paper_balance: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Convert a row to a Profile. Unknown risk profile strings read as unset.
pub fn profile_row_to_profile(row: &ProfileRow) -> Profile {
    Profile {
        user_id: row.user_id,
        username: row.username.clone(),
        display_name: row.display_name.clone(),
        base_currency: row.base_currency.clone(),
        risk_profile: row.risk_profile.as_deref().and_then(RiskProfile::parse),
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

/// Insert or update a profile. The paper balance is only written on insert;
/// use `update_paper_balance` afterwards.
pub async fn upsert_profile(
    pool: &PgPool,
    profile: &Profile,
    paper_balance: Decimal,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO profiles (user_id, username, display_name, base_currency, risk_profile, paper_balance, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         ON CONFLICT (user_id) DO UPDATE SET display_name = $3, base_currency = $4, risk_profile = $5, updated_at = $8",
    )
    .bind(profile.user_id)
    .bind(&profile.username)
    .bind(&profile.display_name)
    .bind(&profile.base_currency)
    .bind(profile.risk_profile.map(|r| r.as_str()))
    .bind(paper_balance)
    .bind(profile.created_at)
    .bind(profile.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn update_paper_balance(
    pool: &PgPool,
    user_id: Uuid,
    paper_balance: Decimal,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE profiles SET paper_balance = $1, updated_at = now() WHERE user_id = $2")
        .bind(paper_balance)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// List all profiles for hydration.
pub async fn list_profiles(pool: &PgPool) -> Result<Vec<ProfileRow>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ProfileRow>(
        "SELECT user_id, username, display_name, base_currency, risk_profile, paper_balance, created_at, updated_at \
         FROM profiles",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
