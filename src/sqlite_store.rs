//! SQLite-backed store.
//!
//! Each write is atomic: single-statement writes rely on SQLite's implicit
//! transaction, multi-statement writes (place inserts and updates, which
//! also maintain the `place_amenity` join table) run in an explicit
//! transaction that rolls back on failure, leaving the pre-operation state
//! intact.
//!
//! Reads hydrate the denormalized id lists (`place_ids`, `review_ids`,
//! `amenity_ids`) from relations, so `update_*` persists scalar columns
//! only. A storage failure on a read path degrades to an absent or empty
//! result after a warning; callers cannot distinguish a failed read from
//! "no rows", which matches this store's documented contract.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::error::StoreError;
use crate::model::{Amenity, Place, Review, User};
use crate::store::{AmenityStore, PlaceStore, ReviewStore, UserStore};
use crate::types::{AmenityId, PlaceId, ReviewId, UserId};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Store backed by a SQLite database through sqlx.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (creating if missing) a database at the given sqlx URL, enables
    /// WAL mode and foreign keys, and runs the embedded migrations.
    pub async fn open(url: &str) -> Result<Self, sqlx::Error> {
        Self::connect(url, SqlitePoolOptions::new()).await
    }

    /// Opens a private in-memory database, for tests and demos.
    ///
    /// Pinned to a single connection: every pooled connection would
    /// otherwise see its own empty in-memory database.
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        let options = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None);
        Self::connect("sqlite::memory:", options).await
    }

    async fn connect(url: &str, pool_options: SqlitePoolOptions) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);
        let pool = pool_options.connect_with(options).await?;
        MIGRATOR.run(&pool).await?;
        Ok(Self { pool })
    }

    /// Returns the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn parse_id<T: From<Uuid>>(value: &str) -> Result<T, sqlx::Error> {
    Uuid::parse_str(value)
        .map(T::from)
        .map_err(|err| sqlx::Error::Decode(Box::new(err)))
}

fn decode_count<T: TryFrom<i64>>(value: i64) -> Result<T, sqlx::Error>
where
    T::Error: std::error::Error + Send + Sync + 'static,
{
    T::try_from(value).map_err(|err| sqlx::Error::Decode(Box::new(err)))
}

fn user_from_row(row: &SqliteRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: parse_id(&row.try_get::<String, _>("id")?)?,
        email: row.try_get("email")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        password_hash: row.try_get("password_hash")?,
        is_admin: row.try_get("is_admin")?,
        place_ids: Vec::new(),
        review_ids: Vec::new(),
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

fn place_from_row(row: &SqliteRow) -> Result<Place, sqlx::Error> {
    Ok(Place {
        id: parse_id(&row.try_get::<String, _>("id")?)?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        address: row.try_get("address")?,
        city_id: row.try_get("city_id")?,
        latitude: row.try_get("latitude")?,
        longitude: row.try_get("longitude")?,
        host_id: parse_id(&row.try_get::<String, _>("host_id")?)?,
        rooms: decode_count(row.try_get::<i64, _>("rooms")?)?,
        bathrooms: decode_count(row.try_get::<i64, _>("bathrooms")?)?,
        price_per_night: row.try_get("price_per_night")?,
        max_guests: decode_count(row.try_get::<i64, _>("max_guests")?)?,
        amenity_ids: Vec::new(),
        review_ids: Vec::new(),
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

fn amenity_from_row(row: &SqliteRow) -> Result<Amenity, sqlx::Error> {
    Ok(Amenity {
        id: parse_id(&row.try_get::<String, _>("id")?)?,
        name: row.try_get("name")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

fn review_from_row(row: &SqliteRow) -> Result<Review, sqlx::Error> {
    Ok(Review {
        id: parse_id(&row.try_get::<String, _>("id")?)?,
        place_id: parse_id(&row.try_get::<String, _>("place_id")?)?,
        user_id: parse_id(&row.try_get::<String, _>("user_id")?)?,
        rating: decode_count(row.try_get::<i64, _>("rating")?)?,
        comment: row.try_get("comment")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

/// Converts a read failure into an absent/empty result after logging it.
fn degrade<T: Default>(context: &'static str, err: sqlx::Error) -> T {
    tracing::warn!(error = %err, context, "read degraded to empty result");
    T::default()
}

impl SqliteStore {
    async fn id_column<T: From<Uuid>>(
        &self,
        sql: &str,
        bind: String,
    ) -> Result<Vec<T>, sqlx::Error> {
        let rows = sqlx::query(sql).bind(bind).fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| parse_id(&row.try_get::<String, _>(0)?))
            .collect()
    }

    async fn hydrate_user(&self, mut user: User) -> Result<User, sqlx::Error> {
        user.place_ids = self
            .id_column(
                "SELECT id FROM places WHERE host_id = ?1 ORDER BY created_at, id",
                user.id.to_string(),
            )
            .await?;
        user.review_ids = self
            .id_column(
                "SELECT id FROM reviews WHERE user_id = ?1 ORDER BY created_at, id",
                user.id.to_string(),
            )
            .await?;
        Ok(user)
    }

    async fn hydrate_place(&self, mut place: Place) -> Result<Place, sqlx::Error> {
        place.amenity_ids = self
            .id_column(
                "SELECT amenity_id FROM place_amenity WHERE place_id = ?1 ORDER BY position",
                place.id.to_string(),
            )
            .await?;
        place.review_ids = self
            .id_column(
                "SELECT id FROM reviews WHERE place_id = ?1 ORDER BY created_at, id",
                place.id.to_string(),
            )
            .await?;
        Ok(place)
    }

    async fn try_user(&self, id: &UserId) -> Result<Option<User>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(self.hydrate_user(user_from_row(&row)?).await?)),
            None => Ok(None),
        }
    }

    async fn try_users(&self) -> Result<Vec<User>, sqlx::Error> {
        let rows = sqlx::query("SELECT * FROM users ORDER BY created_at, id")
            .fetch_all(&self.pool)
            .await?;
        let mut users = Vec::with_capacity(rows.len());
        for row in &rows {
            users.push(self.hydrate_user(user_from_row(row)?).await?);
        }
        Ok(users)
    }

    async fn try_user_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM users WHERE email = ?1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(self.hydrate_user(user_from_row(&row)?).await?)),
            None => Ok(None),
        }
    }

    async fn try_place(&self, id: &PlaceId) -> Result<Option<Place>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM places WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(self.hydrate_place(place_from_row(&row)?).await?)),
            None => Ok(None),
        }
    }

    async fn try_places_where(
        &self,
        sql: &str,
        bind: Option<String>,
    ) -> Result<Vec<Place>, sqlx::Error> {
        let query = sqlx::query(sql);
        let query = match bind {
            Some(value) => query.bind(value),
            None => query,
        };
        let rows = query.fetch_all(&self.pool).await?;
        let mut places = Vec::with_capacity(rows.len());
        for row in &rows {
            places.push(self.hydrate_place(place_from_row(row)?).await?);
        }
        Ok(places)
    }

    async fn try_reviews_where(
        &self,
        sql: &str,
        binds: Vec<String>,
    ) -> Result<Vec<Review>, sqlx::Error> {
        let mut query = sqlx::query(sql);
        for bind in binds {
            query = query.bind(bind);
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(review_from_row).collect()
    }
}

#[async_trait]
impl UserStore for SqliteStore {
    async fn add_user(&self, user: User) -> std::result::Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO users (id, email, first_name, last_name, password_hash, is_admin, \
             created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(user.id.to_string())
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.password_hash)
        .bind(user.is_admin)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn user(&self, id: &UserId) -> std::result::Result<Option<User>, StoreError> {
        Ok(self
            .try_user(id)
            .await
            .unwrap_or_else(|err| degrade("user", err)))
    }

    async fn users(&self) -> std::result::Result<Vec<User>, StoreError> {
        Ok(self
            .try_users()
            .await
            .unwrap_or_else(|err| degrade("users", err)))
    }

    async fn update_user(&self, mut user: User) -> std::result::Result<(), StoreError> {
        user.touch();
        sqlx::query(
            "UPDATE users SET email = ?2, first_name = ?3, last_name = ?4, password_hash = ?5, \
             is_admin = ?6, updated_at = ?7 WHERE id = ?1",
        )
        .bind(user.id.to_string())
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.password_hash)
        .bind(user.is_admin)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn user_by_email(&self, email: &str) -> std::result::Result<Option<User>, StoreError> {
        Ok(self
            .try_user_by_email(email)
            .await
            .unwrap_or_else(|err| degrade("user_by_email", err)))
    }
}

#[async_trait]
impl PlaceStore for SqliteStore {
    async fn add_place(&self, place: Place) -> std::result::Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO places (id, name, description, address, city_id, latitude, longitude, \
             host_id, rooms, bathrooms, price_per_night, max_guests, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        )
        .bind(place.id.to_string())
        .bind(&place.name)
        .bind(&place.description)
        .bind(&place.address)
        .bind(&place.city_id)
        .bind(place.latitude)
        .bind(place.longitude)
        .bind(place.host_id.to_string())
        .bind(i64::from(place.rooms))
        .bind(i64::from(place.bathrooms))
        .bind(place.price_per_night)
        .bind(i64::from(place.max_guests))
        .bind(place.created_at)
        .bind(place.updated_at)
        .execute(&mut *tx)
        .await?;

        for (position, amenity_id) in place.amenity_ids.iter().enumerate() {
            sqlx::query(
                "INSERT INTO place_amenity (place_id, amenity_id, position) VALUES (?1, ?2, ?3)",
            )
            .bind(place.id.to_string())
            .bind(amenity_id.to_string())
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn place(&self, id: &PlaceId) -> std::result::Result<Option<Place>, StoreError> {
        Ok(self
            .try_place(id)
            .await
            .unwrap_or_else(|err| degrade("place", err)))
    }

    async fn places(&self) -> std::result::Result<Vec<Place>, StoreError> {
        Ok(self
            .try_places_where("SELECT * FROM places ORDER BY created_at, id", None)
            .await
            .unwrap_or_else(|err| degrade("places", err)))
    }

    async fn update_place(&self, mut place: Place) -> std::result::Result<(), StoreError> {
        place.touch();
        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query(
            "UPDATE places SET name = ?2, description = ?3, address = ?4, city_id = ?5, \
             latitude = ?6, longitude = ?7, rooms = ?8, bathrooms = ?9, price_per_night = ?10, \
             max_guests = ?11, updated_at = ?12 WHERE id = ?1",
        )
        .bind(place.id.to_string())
        .bind(&place.name)
        .bind(&place.description)
        .bind(&place.address)
        .bind(&place.city_id)
        .bind(place.latitude)
        .bind(place.longitude)
        .bind(i64::from(place.rooms))
        .bind(i64::from(place.bathrooms))
        .bind(place.price_per_night)
        .bind(i64::from(place.max_guests))
        .bind(place.updated_at)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        // Missing row: silent no-op, matching the store contract.
        if updated > 0 {
            sqlx::query("DELETE FROM place_amenity WHERE place_id = ?1")
                .bind(place.id.to_string())
                .execute(&mut *tx)
                .await?;
            for (position, amenity_id) in place.amenity_ids.iter().enumerate() {
                sqlx::query(
                    "INSERT INTO place_amenity (place_id, amenity_id, position) \
                     VALUES (?1, ?2, ?3)",
                )
                .bind(place.id.to_string())
                .bind(amenity_id.to_string())
                .bind(position as i64)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn places_by_host(
        &self,
        host_id: &UserId,
    ) -> std::result::Result<Vec<Place>, StoreError> {
        Ok(self
            .try_places_where(
                "SELECT * FROM places WHERE host_id = ?1 ORDER BY created_at, id",
                Some(host_id.to_string()),
            )
            .await
            .unwrap_or_else(|err| degrade("places_by_host", err)))
    }
}

#[async_trait]
impl AmenityStore for SqliteStore {
    async fn add_amenity(&self, amenity: Amenity) -> std::result::Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO amenities (id, name, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(amenity.id.to_string())
        .bind(&amenity.name)
        .bind(amenity.created_at)
        .bind(amenity.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn amenity(&self, id: &AmenityId) -> std::result::Result<Option<Amenity>, StoreError> {
        let fetched = async {
            let row = sqlx::query("SELECT * FROM amenities WHERE id = ?1")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?;
            row.as_ref().map(amenity_from_row).transpose()
        }
        .await;
        Ok(fetched.unwrap_or_else(|err| degrade("amenity", err)))
    }

    async fn amenities(&self) -> std::result::Result<Vec<Amenity>, StoreError> {
        let fetched = async {
            let rows = sqlx::query("SELECT * FROM amenities ORDER BY created_at, id")
                .fetch_all(&self.pool)
                .await?;
            rows.iter()
                .map(amenity_from_row)
                .collect::<Result<Vec<Amenity>, sqlx::Error>>()
        }
        .await;
        Ok(fetched.unwrap_or_else(|err| degrade("amenities", err)))
    }

    async fn update_amenity(&self, mut amenity: Amenity) -> std::result::Result<(), StoreError> {
        amenity.touch();
        sqlx::query("UPDATE amenities SET name = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(amenity.id.to_string())
            .bind(&amenity.name)
            .bind(amenity.updated_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn amenity_by_name(
        &self,
        name: &str,
    ) -> std::result::Result<Option<Amenity>, StoreError> {
        let fetched = async {
            let row = sqlx::query("SELECT * FROM amenities WHERE name = ?1")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
            row.as_ref().map(amenity_from_row).transpose()
        }
        .await;
        Ok(fetched.unwrap_or_else(|err| degrade("amenity_by_name", err)))
    }
}

#[async_trait]
impl ReviewStore for SqliteStore {
    async fn add_review(&self, review: Review) -> std::result::Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO reviews (id, place_id, user_id, rating, comment, created_at, \
             updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(review.id.to_string())
        .bind(review.place_id.to_string())
        .bind(review.user_id.to_string())
        .bind(i64::from(review.rating))
        .bind(&review.comment)
        .bind(review.created_at)
        .bind(review.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn review(&self, id: &ReviewId) -> std::result::Result<Option<Review>, StoreError> {
        let fetched = async {
            let row = sqlx::query("SELECT * FROM reviews WHERE id = ?1")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?;
            row.as_ref().map(review_from_row).transpose()
        }
        .await;
        Ok(fetched.unwrap_or_else(|err| degrade("review", err)))
    }

    async fn reviews(&self) -> std::result::Result<Vec<Review>, StoreError> {
        Ok(self
            .try_reviews_where("SELECT * FROM reviews ORDER BY created_at, id", Vec::new())
            .await
            .unwrap_or_else(|err| degrade("reviews", err)))
    }

    async fn update_review(&self, mut review: Review) -> std::result::Result<(), StoreError> {
        review.touch();
        sqlx::query("UPDATE reviews SET rating = ?2, comment = ?3, updated_at = ?4 WHERE id = ?1")
            .bind(review.id.to_string())
            .bind(i64::from(review.rating))
            .bind(&review.comment)
            .bind(review.updated_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_review(&self, id: &ReviewId) -> std::result::Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM reviews WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn reviews_by_place(
        &self,
        place_id: &PlaceId,
    ) -> std::result::Result<Vec<Review>, StoreError> {
        Ok(self
            .try_reviews_where(
                "SELECT * FROM reviews WHERE place_id = ?1 ORDER BY created_at, id",
                vec![place_id.to_string()],
            )
            .await
            .unwrap_or_else(|err| degrade("reviews_by_place", err)))
    }

    async fn review_by_place_and_user(
        &self,
        place_id: &PlaceId,
        user_id: &UserId,
    ) -> std::result::Result<Option<Review>, StoreError> {
        let fetched = async {
            let row = sqlx::query("SELECT * FROM reviews WHERE place_id = ?1 AND user_id = ?2")
                .bind(place_id.to_string())
                .bind(user_id.to_string())
                .fetch_optional(&self.pool)
                .await?;
            row.as_ref().map(review_from_row).transpose()
        }
        .await;
        Ok(fetched.unwrap_or_else(|err| degrade("review_by_place_and_user", err)))
    }
}
