use crate::error::StoreError;
use crate::model::{Amenity, Place, Review, User};
use crate::types::{AmenityId, PlaceId, ReviewId, UserId};
use async_trait::async_trait;

/// Store interface for users.
///
/// Id lookups return `Ok(None)` for absence; they never fail for a missing
/// row. `update_user` refreshes the entity's update timestamp, persists the
/// new field values, and is a silent no-op when the row no longer exists.
#[async_trait]
pub trait UserStore {
    /// Inserts a new user keyed by its id.
    async fn add_user(&self, user: User) -> std::result::Result<(), StoreError>;

    /// Returns the user with the given id, if any.
    async fn user(&self, id: &UserId) -> std::result::Result<Option<User>, StoreError>;

    /// Returns all users.
    async fn users(&self) -> std::result::Result<Vec<User>, StoreError>;

    /// Persists new field values for an existing user.
    async fn update_user(&self, user: User) -> std::result::Result<(), StoreError>;

    /// Returns the user with the given email (exact, case-sensitive match).
    async fn user_by_email(&self, email: &str) -> std::result::Result<Option<User>, StoreError>;
}

/// Store interface for places.
#[async_trait]
pub trait PlaceStore {
    /// Inserts a new place keyed by its id.
    async fn add_place(&self, place: Place) -> std::result::Result<(), StoreError>;

    /// Returns the place with the given id, if any.
    async fn place(&self, id: &PlaceId) -> std::result::Result<Option<Place>, StoreError>;

    /// Returns all places.
    async fn places(&self) -> std::result::Result<Vec<Place>, StoreError>;

    /// Persists new field values for an existing place.
    async fn update_place(&self, place: Place) -> std::result::Result<(), StoreError>;

    /// Returns all places hosted by the given user.
    async fn places_by_host(&self, host_id: &UserId)
    -> std::result::Result<Vec<Place>, StoreError>;
}

/// Store interface for amenities.
#[async_trait]
pub trait AmenityStore {
    /// Inserts a new amenity keyed by its id.
    async fn add_amenity(&self, amenity: Amenity) -> std::result::Result<(), StoreError>;

    /// Returns the amenity with the given id, if any.
    async fn amenity(&self, id: &AmenityId) -> std::result::Result<Option<Amenity>, StoreError>;

    /// Returns all amenities.
    async fn amenities(&self) -> std::result::Result<Vec<Amenity>, StoreError>;

    /// Persists new field values for an existing amenity.
    async fn update_amenity(&self, amenity: Amenity) -> std::result::Result<(), StoreError>;

    /// Returns the amenity with the given name (exact, case-sensitive match).
    async fn amenity_by_name(&self, name: &str)
    -> std::result::Result<Option<Amenity>, StoreError>;
}

/// Store interface for reviews. The only entity kind with a delete path.
#[async_trait]
pub trait ReviewStore {
    /// Inserts a new review keyed by its id.
    async fn add_review(&self, review: Review) -> std::result::Result<(), StoreError>;

    /// Returns the review with the given id, if any.
    async fn review(&self, id: &ReviewId) -> std::result::Result<Option<Review>, StoreError>;

    /// Returns all reviews.
    async fn reviews(&self) -> std::result::Result<Vec<Review>, StoreError>;

    /// Persists new field values for an existing review.
    async fn update_review(&self, review: Review) -> std::result::Result<(), StoreError>;

    /// Removes the review if present, reporting whether removal occurred.
    async fn delete_review(&self, id: &ReviewId) -> std::result::Result<bool, StoreError>;

    /// Returns all reviews for a place.
    async fn reviews_by_place(
        &self,
        place_id: &PlaceId,
    ) -> std::result::Result<Vec<Review>, StoreError>;

    /// Returns the review a user wrote for a place, if any.
    async fn review_by_place_and_user(
        &self,
        place_id: &PlaceId,
        user_id: &UserId,
    ) -> std::result::Result<Option<Review>, StoreError>;
}

/// Composite store trait.
pub trait Store: UserStore + PlaceStore + AmenityStore + ReviewStore + Send + Sync {}

impl<T> Store for T where T: UserStore + PlaceStore + AmenityStore + ReviewStore + Send + Sync {}
