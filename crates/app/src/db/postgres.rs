//! `PostgreSQL` shop store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::instrument;

use product_merge_core::{Email, ShopDomain, ShopId, UserId};

use crate::models::{Credential, ShopProfile, ShopRecord, parse_scopes};

use super::{RepositoryError, ShopStore};

/// Shop store backed by the `app` schema.
#[derive(Clone)]
pub struct PgShopStore {
    pool: PgPool,
}

impl PgShopStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Resolve a contact email to a user, creating one on first sight.
    async fn resolve_user(
        tx: &mut Transaction<'_, Postgres>,
        email: &Email,
        name: Option<&str>,
    ) -> Result<UserId, RepositoryError> {
        let id: UserId = sqlx::query_scalar(
            r#"
            INSERT INTO app."user" AS u (email, name)
            VALUES ($1, $2)
            ON CONFLICT (email) DO UPDATE SET
                name = COALESCE(EXCLUDED.name, u.name),
                updated_at = NOW()
            RETURNING id
            "#,
        )
        .bind(email)
        .bind(name)
        .fetch_one(&mut **tx)
        .await?;

        Ok(id)
    }
}

/// Internal row type for credential lookups.
#[derive(Debug, sqlx::FromRow)]
struct CredentialRow {
    shop_domain: String,
    access_token: String,
    scope: String,
    issued_at: DateTime<Utc>,
}

impl TryFrom<CredentialRow> for Credential {
    type Error = RepositoryError;

    fn try_from(row: CredentialRow) -> Result<Self, Self::Error> {
        Ok(Self {
            shop: parse_stored_domain(&row.shop_domain)?,
            access_token: SecretString::from(row.access_token),
            scopes: parse_scopes(&row.scope),
            issued_at: row.issued_at,
        })
    }
}

/// Internal row type for shop listings.
#[derive(Debug, sqlx::FromRow)]
struct ShopRow {
    id: ShopId,
    shop_domain: String,
    scope: String,
    issued_at: DateTime<Utc>,
    owner_user_id: Option<UserId>,
    profile_fetched_at: Option<DateTime<Utc>>,
    contact_email: Option<String>,
    owner_name: Option<String>,
    display_name: Option<String>,
    domain: Option<String>,
    country: Option<String>,
    province: Option<String>,
    city: Option<String>,
    phone: Option<String>,
    currency: Option<String>,
    money_format: Option<String>,
    timezone: Option<String>,
    plan_name: Option<String>,
    shop_created_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ShopRow> for ShopRecord {
    type Error = RepositoryError;

    fn try_from(row: ShopRow) -> Result<Self, Self::Error> {
        let profile = row.profile_fetched_at.map(|_| ShopProfile {
            contact_email: row.contact_email,
            owner_name: row.owner_name,
            display_name: row.display_name,
            domain: row.domain,
            country: row.country,
            province: row.province,
            city: row.city,
            phone: row.phone,
            currency: row.currency,
            money_format: row.money_format,
            timezone: row.timezone,
            plan_name: row.plan_name,
            shop_created_at: row.shop_created_at,
        });

        Ok(Self {
            id: row.id,
            shop: parse_stored_domain(&row.shop_domain)?,
            scopes: parse_scopes(&row.scope),
            issued_at: row.issued_at,
            owner_user_id: row.owner_user_id,
            profile,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn parse_stored_domain(value: &str) -> Result<ShopDomain, RepositoryError> {
    ShopDomain::parse(value)
        .map_err(|e| RepositoryError::DataCorruption(format!("shop_domain {value:?}: {e}")))
}

const SHOP_COLUMNS: &str = r"
    id, shop_domain, scope, issued_at, owner_user_id, profile_fetched_at,
    contact_email, owner_name, display_name, domain, country, province, city,
    phone, currency, money_format, timezone, plan_name, shop_created_at,
    created_at, updated_at
";

#[async_trait]
impl ShopStore for PgShopStore {
    #[instrument(skip(self, credential, profile), fields(shop = %credential.shop))]
    async fn upsert_shop(
        &self,
        credential: &Credential,
        profile: Option<&ShopProfile>,
    ) -> Result<ShopId, RepositoryError> {
        let scope = credential.scope_string();
        let mut tx = self.pool.begin().await?;

        let Some(profile) = profile else {
            let id: ShopId = sqlx::query_scalar(
                r"
                INSERT INTO app.shop (shop_domain, access_token, scope, issued_at)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (shop_domain) DO UPDATE SET
                    access_token = EXCLUDED.access_token,
                    scope = EXCLUDED.scope,
                    issued_at = EXCLUDED.issued_at,
                    updated_at = NOW()
                RETURNING id
                ",
            )
            .bind(&credential.shop)
            .bind(credential.access_token.expose_secret())
            .bind(&scope)
            .bind(credential.issued_at)
            .fetch_one(&mut *tx)
            .await?;

            tx.commit().await?;
            return Ok(id);
        };

        let owner = match profile
            .contact_email
            .as_deref()
            .map(Email::parse)
            .transpose()
        {
            Ok(Some(email)) => {
                Some(Self::resolve_user(&mut tx, &email, profile.owner_name.as_deref()).await?)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unusable shop contact email");
                None
            }
        };

        let id: ShopId = sqlx::query_scalar(
            r"
            INSERT INTO app.shop (
                shop_domain, access_token, scope, issued_at, owner_user_id,
                profile_fetched_at, contact_email, owner_name, display_name, domain,
                country, province, city, phone, currency, money_format, timezone,
                plan_name, shop_created_at
            )
            VALUES ($1, $2, $3, $4, $5, NOW(), $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            ON CONFLICT (shop_domain) DO UPDATE SET
                access_token = EXCLUDED.access_token,
                scope = EXCLUDED.scope,
                issued_at = EXCLUDED.issued_at,
                owner_user_id = EXCLUDED.owner_user_id,
                profile_fetched_at = EXCLUDED.profile_fetched_at,
                contact_email = EXCLUDED.contact_email,
                owner_name = EXCLUDED.owner_name,
                display_name = EXCLUDED.display_name,
                domain = EXCLUDED.domain,
                country = EXCLUDED.country,
                province = EXCLUDED.province,
                city = EXCLUDED.city,
                phone = EXCLUDED.phone,
                currency = EXCLUDED.currency,
                money_format = EXCLUDED.money_format,
                timezone = EXCLUDED.timezone,
                plan_name = EXCLUDED.plan_name,
                shop_created_at = EXCLUDED.shop_created_at,
                updated_at = NOW()
            RETURNING id
            ",
        )
        .bind(&credential.shop)
        .bind(credential.access_token.expose_secret())
        .bind(&scope)
        .bind(credential.issued_at)
        .bind(owner)
        .bind(profile.contact_email.as_deref())
        .bind(profile.owner_name.as_deref())
        .bind(profile.display_name.as_deref())
        .bind(profile.domain.as_deref())
        .bind(profile.country.as_deref())
        .bind(profile.province.as_deref())
        .bind(profile.city.as_deref())
        .bind(profile.phone.as_deref())
        .bind(profile.currency.as_deref())
        .bind(profile.money_format.as_deref())
        .bind(profile.timezone.as_deref())
        .bind(profile.plan_name.as_deref())
        .bind(profile.shop_created_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(id)
    }

    #[instrument(skip(self), fields(shop = %shop))]
    async fn get_credential(
        &self,
        shop: &ShopDomain,
    ) -> Result<Option<Credential>, RepositoryError> {
        let row: Option<CredentialRow> = sqlx::query_as(
            r"
            SELECT shop_domain, access_token, scope, issued_at
            FROM app.shop
            WHERE shop_domain = $1
            ",
        )
        .bind(shop)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Credential::try_from).transpose()
    }

    #[instrument(skip(self), fields(shop = %shop))]
    async fn get_shop(&self, shop: &ShopDomain) -> Result<Option<ShopRecord>, RepositoryError> {
        let row: Option<ShopRow> = sqlx::query_as(&format!(
            "SELECT {SHOP_COLUMNS} FROM app.shop WHERE shop_domain = $1"
        ))
        .bind(shop)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ShopRecord::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn list_shops(&self) -> Result<Vec<ShopRecord>, RepositoryError> {
        let rows: Vec<ShopRow> = sqlx::query_as(&format!(
            "SELECT {SHOP_COLUMNS} FROM app.shop ORDER BY shop_domain"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ShopRecord::try_from).collect()
    }

    #[instrument(skip(self), fields(shop = %shop))]
    async fn delete_shop(&self, shop: &ShopDomain) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM app.shop WHERE shop_domain = $1")
            .bind(shop)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
