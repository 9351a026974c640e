use crate::error::{Error, Result};
use crate::types::{AmenityId, PlaceId, ReviewId, UserId};
use chrono::{DateTime, Utc};

const MAX_AMENITY_NAME_LEN: usize = 50;
const MIN_PASSWORD_LEN: usize = 6;
const MIN_RATING: u8 = 1;
const MAX_RATING: u8 = 5;

fn validate_required(value: &str, field: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}

fn validate_email(value: &str) -> Result<String> {
    let trimmed = value.trim();
    if !is_valid_email(trimmed) {
        return Err(Error::Validation(format!("invalid email: {trimmed}")));
    }
    Ok(trimmed.to_string())
}

fn is_valid_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || !local.chars().all(is_local_char) {
        return false;
    }
    if domain.contains('@') {
        return false;
    }
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    if host.is_empty() || !host.chars().all(is_host_char) {
        return false;
    }
    tld.len() >= 2 && tld.chars().all(|ch| ch.is_ascii_alphabetic())
}

fn is_local_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '%' | '+' | '-')
}

fn is_host_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-')
}

/// Validates a plaintext password before it is hashed.
///
/// Kept beside the entity gates so every password path (create, explicit
/// password change) enforces the same rule.
pub fn validate_password(password: &str) -> Result<()> {
    if password.trim().is_empty() {
        return Err(Error::Validation("password must not be empty".to_string()));
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Err(Error::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_rating(rating: u8) -> Result<u8> {
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(Error::Validation(format!(
            "rating must be between {MIN_RATING} and {MAX_RATING}"
        )));
    }
    Ok(rating)
}

fn validate_latitude(latitude: f64) -> Result<f64> {
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err(Error::Validation(
            "latitude must be between -90 and 90".to_string(),
        ));
    }
    Ok(latitude)
}

fn validate_longitude(longitude: f64) -> Result<f64> {
    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return Err(Error::Validation(
            "longitude must be between -180 and 180".to_string(),
        ));
    }
    Ok(longitude)
}

fn validate_price(price: f64) -> Result<f64> {
    if !price.is_finite() || price < 0.0 {
        return Err(Error::Validation(
            "price per night must not be negative".to_string(),
        ));
    }
    Ok(price)
}

fn validate_amenity_name(value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation(
            "amenity name must not be empty".to_string(),
        ));
    }
    if trimmed.len() > MAX_AMENITY_NAME_LEN {
        return Err(Error::Validation(format!(
            "amenity name length must be <= {MAX_AMENITY_NAME_LEN}"
        )));
    }
    Ok(trimmed.to_string())
}

/// A marketplace user: host, reviewer, or administrator.
///
/// `place_ids` and `review_ids` are denormalized views kept in sync by the
/// facade; the review and place records remain the source of truth.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// One-way digest; the plaintext is never stored or serialized.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub password_hash: Option<String>,
    pub is_admin: bool,
    pub place_ids: Vec<PlaceId>,
    pub review_ids: Vec<ReviewId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a user. The password arrives in plaintext and is
/// hashed by the facade before the entity is built.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
pub struct NewUser {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub password: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub is_admin: bool,
}

/// Allow-listed partial update for [`User`].
///
/// There is deliberately no password field: the generic update path can
/// never touch the stored hash.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
pub struct UserPatch {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_admin: Option<bool>,
}

impl User {
    /// Validation gate for new users. `password_hash` must already be a
    /// digest; plaintext rules live in [`validate_password`].
    pub fn new(
        email: impl AsRef<str>,
        first_name: impl AsRef<str>,
        last_name: impl AsRef<str>,
        password_hash: Option<String>,
        is_admin: bool,
    ) -> Result<Self> {
        let now = Utc::now();
        Ok(Self {
            id: UserId::generate(),
            email: validate_email(email.as_ref())?,
            first_name: validate_required(first_name.as_ref(), "first name")?,
            last_name: validate_required(last_name.as_ref(), "last name")?,
            password_hash,
            is_admin,
            place_ids: Vec::new(),
            review_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Applies a patch, validating every supplied field before mutating any.
    pub fn apply(&mut self, patch: UserPatch) -> Result<()> {
        let email = patch.email.as_deref().map(validate_email).transpose()?;
        let first_name = patch
            .first_name
            .as_deref()
            .map(|value| validate_required(value, "first name"))
            .transpose()?;
        let last_name = patch
            .last_name
            .as_deref()
            .map(|value| validate_required(value, "last name"))
            .transpose()?;

        if let Some(email) = email {
            self.email = email;
        }
        if let Some(first_name) = first_name {
            self.first_name = first_name;
        }
        if let Some(last_name) = last_name {
            self.last_name = last_name;
        }
        if let Some(is_admin) = patch.is_admin {
            self.is_admin = is_admin;
        }
        Ok(())
    }

    /// Refreshes the update timestamp. Called by store update paths.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// A rentable place listed by a host.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Place {
    pub id: PlaceId,
    pub name: String,
    pub description: String,
    pub address: String,
    /// Opaque city reference; there is no city entity in this core.
    pub city_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub host_id: UserId,
    pub rooms: u32,
    pub bathrooms: u32,
    pub price_per_night: f64,
    pub max_guests: u32,
    pub amenity_ids: Vec<AmenityId>,
    pub review_ids: Vec<ReviewId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a place. Amenity ids are resolved by the facade
/// before the entity is stored.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
pub struct NewPlace {
    pub name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub description: String,
    pub address: String,
    pub city_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub host_id: UserId,
    pub rooms: u32,
    pub bathrooms: u32,
    pub price_per_night: f64,
    pub max_guests: u32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub amenity_ids: Vec<AmenityId>,
}

/// Allow-listed partial update for [`Place`]. A supplied amenity list
/// replaces the previous one wholesale.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
pub struct PlacePatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub address: Option<String>,
    pub city_id: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub rooms: Option<u32>,
    pub bathrooms: Option<u32>,
    pub price_per_night: Option<f64>,
    pub max_guests: Option<u32>,
    pub amenity_ids: Option<Vec<AmenityId>>,
}

impl Place {
    /// Validation gate for new places. Referential checks (host, amenities)
    /// belong to the facade; this validates the fields themselves.
    pub fn new(input: NewPlace) -> Result<Self> {
        let now = Utc::now();
        Ok(Self {
            id: PlaceId::generate(),
            name: validate_required(&input.name, "place name")?,
            description: input.description,
            address: input.address,
            city_id: input.city_id,
            latitude: validate_latitude(input.latitude)?,
            longitude: validate_longitude(input.longitude)?,
            host_id: input.host_id,
            rooms: input.rooms,
            bathrooms: input.bathrooms,
            price_per_night: validate_price(input.price_per_night)?,
            max_guests: input.max_guests,
            amenity_ids: input.amenity_ids,
            review_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Applies a patch, validating every supplied field before mutating any.
    pub fn apply(&mut self, patch: PlacePatch) -> Result<()> {
        let name = patch
            .name
            .as_deref()
            .map(|value| validate_required(value, "place name"))
            .transpose()?;
        let latitude = patch.latitude.map(validate_latitude).transpose()?;
        let longitude = patch.longitude.map(validate_longitude).transpose()?;
        let price_per_night = patch.price_per_night.map(validate_price).transpose()?;

        if let Some(name) = name {
            self.name = name;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(address) = patch.address {
            self.address = address;
        }
        if let Some(city_id) = patch.city_id {
            self.city_id = city_id;
        }
        if let Some(latitude) = latitude {
            self.latitude = latitude;
        }
        if let Some(longitude) = longitude {
            self.longitude = longitude;
        }
        if let Some(rooms) = patch.rooms {
            self.rooms = rooms;
        }
        if let Some(bathrooms) = patch.bathrooms {
            self.bathrooms = bathrooms;
        }
        if let Some(price_per_night) = price_per_night {
            self.price_per_night = price_per_night;
        }
        if let Some(max_guests) = patch.max_guests {
            self.max_guests = max_guests;
        }
        if let Some(amenity_ids) = patch.amenity_ids {
            self.amenity_ids = amenity_ids;
        }
        Ok(())
    }

    /// Refreshes the update timestamp. Called by store update paths.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// A feature a place can offer. Names are stored trimmed and are unique.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Amenity {
    pub id: AmenityId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Allow-listed partial update for [`Amenity`].
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
pub struct AmenityPatch {
    pub name: Option<String>,
}

impl Amenity {
    /// Validation gate for new amenities.
    pub fn new(name: impl AsRef<str>) -> Result<Self> {
        let now = Utc::now();
        Ok(Self {
            id: AmenityId::generate(),
            name: validate_amenity_name(name.as_ref())?,
            created_at: now,
            updated_at: now,
        })
    }

    /// Applies a patch, validating every supplied field before mutating any.
    pub fn apply(&mut self, patch: AmenityPatch) -> Result<()> {
        let name = patch
            .name
            .as_deref()
            .map(validate_amenity_name)
            .transpose()?;
        if let Some(name) = name {
            self.name = name;
        }
        Ok(())
    }

    /// Refreshes the update timestamp. Called by store update paths.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// A user's review of a place. At most one review exists per
/// (place, user) pair; the facade enforces the pairing.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Review {
    pub id: ReviewId,
    pub place_id: PlaceId,
    pub user_id: UserId,
    pub rating: u8,
    pub comment: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Allow-listed partial update for [`Review`]. Only the rating and the
/// comment are mutable; everything else is fixed at creation.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
pub struct ReviewPatch {
    pub rating: Option<u8>,
    pub comment: Option<String>,
}

impl Review {
    /// Validation gate for new reviews.
    pub fn new(
        place_id: PlaceId,
        user_id: UserId,
        rating: u8,
        comment: impl AsRef<str>,
    ) -> Result<Self> {
        let now = Utc::now();
        Ok(Self {
            id: ReviewId::generate(),
            place_id,
            user_id,
            rating: validate_rating(rating)?,
            comment: validate_required(comment.as_ref(), "review comment")?,
            created_at: now,
            updated_at: now,
        })
    }

    /// Applies a patch, validating every supplied field before mutating any.
    pub fn apply(&mut self, patch: ReviewPatch) -> Result<()> {
        let rating = patch.rating.map(validate_rating).transpose()?;
        let comment = patch
            .comment
            .as_deref()
            .map(|value| validate_required(value, "review comment"))
            .transpose()?;

        if let Some(rating) = rating {
            self.rating = rating;
        }
        if let Some(comment) = comment {
            self.comment = comment;
        }
        Ok(())
    }

    /// Refreshes the update timestamp. Called by store update paths.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
