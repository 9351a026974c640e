use crate::error::{EntityKind, Error, Result};
use crate::model::{
    Amenity, AmenityPatch, NewPlace, NewUser, Place, PlacePatch, Review, ReviewPatch, User,
    UserPatch, validate_password,
};
use crate::password::PasswordHasher;
use crate::store::Store;
use crate::types::{AmenityId, PlaceId, ReviewId, UserId};

/// Service facade over a pluggable [`Store`].
///
/// This is the single entry point for every mutation and the only component
/// allowed to orchestrate multi-entity invariants: uniqueness, referential
/// existence, the one-review-per-(place, user) rule, and the upkeep of the
/// denormalized review and place id lists. HTTP layers call this and nothing
/// below it.
///
/// Multi-step mutations are sequential store calls, not one transaction.
/// Where a delete path exists ([`Facade::create_review`]) a failure after the
/// insert triggers compensating cleanup; elsewhere the sequence is
/// best-effort and documented on the method.
pub struct Facade<S> {
    store: S,
    hasher: Box<dyn PasswordHasher>,
}

impl<S: Store> Facade<S> {
    /// Creates a facade over a store, with the hasher used for every
    /// password path.
    pub fn new(store: S, hasher: impl PasswordHasher + 'static) -> Self {
        Self {
            store,
            hasher: Box::new(hasher),
        }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    // User operations

    /// Creates a user, enforcing email uniqueness and hashing the password.
    pub async fn create_user(&self, input: NewUser) -> Result<User> {
        let email = input.email.trim();
        if self
            .store
            .user_by_email(email)
            .await
            .map_err(Error::from)?
            .is_some()
        {
            return Err(Error::Duplicate(format!(
                "user with email {email} already exists"
            )));
        }

        let password_hash = match input.password.as_deref() {
            Some(password) => {
                validate_password(password)?;
                Some(self.hasher.hash(password)?)
            }
            None => None,
        };

        let user = User::new(
            &input.email,
            &input.first_name,
            &input.last_name,
            password_hash,
            input.is_admin,
        )?;
        self.store
            .add_user(user.clone())
            .await
            .map_err(Error::from)?;
        Ok(user)
    }

    /// Returns a user by id.
    pub async fn user(&self, id: &UserId) -> Result<User> {
        self.store
            .user(id)
            .await
            .map_err(Error::from)?
            .ok_or_else(|| Error::not_found(EntityKind::User, id))
    }

    /// Returns all users.
    pub async fn users(&self) -> Result<Vec<User>> {
        self.store.users().await.map_err(Error::from)
    }

    /// Returns the user with the given email, if any. Absence is not an
    /// error here; login flows decide what a miss means.
    pub async fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.store.user_by_email(email).await.map_err(Error::from)
    }

    /// Applies a partial update to a user.
    ///
    /// The patch type carries no password field, so this path can never
    /// change the stored hash; see [`Facade::set_user_password`].
    pub async fn update_user(&self, id: &UserId, patch: UserPatch) -> Result<User> {
        let mut user = self.user(id).await?;

        if let Some(new_email) = patch.email.as_deref() {
            let new_email = new_email.trim();
            if new_email != user.email
                && let Some(existing) = self
                    .store
                    .user_by_email(new_email)
                    .await
                    .map_err(Error::from)?
                && existing.id != *id
            {
                return Err(Error::Duplicate(format!(
                    "email {new_email} already in use"
                )));
            }
        }

        user.apply(patch)?;
        self.store.update_user(user).await.map_err(Error::from)?;
        self.user(id).await
    }

    /// Explicit password change path: validates, hashes, persists.
    pub async fn set_user_password(&self, id: &UserId, password: &str) -> Result<()> {
        let mut user = self.user(id).await?;
        validate_password(password)?;
        user.password_hash = Some(self.hasher.hash(password)?);
        self.store.update_user(user).await.map_err(Error::from)
    }

    /// Checks an email/password pair, returning the user on success and
    /// `None` on unknown email, missing digest, or mismatch.
    pub async fn verify_credentials(&self, email: &str, password: &str) -> Result<Option<User>> {
        let Some(user) = self
            .store
            .user_by_email(email.trim())
            .await
            .map_err(Error::from)?
        else {
            return Ok(None);
        };
        let Some(digest) = user.password_hash.as_deref() else {
            return Ok(None);
        };
        if self.hasher.verify(password, digest) {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }

    // Place operations

    /// Creates a place after resolving its host and every referenced
    /// amenity. Nothing is persisted when any reference is unresolved.
    ///
    /// The place insert and the host's `place_ids` registration are two
    /// store calls; a failure between them leaves the host list stale.
    pub async fn create_place(&self, input: NewPlace) -> Result<Place> {
        let mut host = self.user(&input.host_id).await?;
        for amenity_id in &input.amenity_ids {
            self.amenity(amenity_id).await?;
        }

        let place = Place::new(input)?;
        self.store
            .add_place(place.clone())
            .await
            .map_err(Error::from)?;

        host.place_ids.push(place.id);
        self.store.update_user(host).await.map_err(Error::from)?;
        Ok(place)
    }

    /// Returns a place by id.
    pub async fn place(&self, id: &PlaceId) -> Result<Place> {
        self.store
            .place(id)
            .await
            .map_err(Error::from)?
            .ok_or_else(|| Error::not_found(EntityKind::Place, id))
    }

    /// Returns all places.
    pub async fn places(&self) -> Result<Vec<Place>> {
        self.store.places().await.map_err(Error::from)
    }

    /// Returns all places hosted by a user.
    pub async fn places_by_host(&self, host_id: &UserId) -> Result<Vec<Place>> {
        self.store
            .places_by_host(host_id)
            .await
            .map_err(Error::from)
    }

    /// Applies a partial update to a place. A supplied amenity list replaces
    /// the previous one wholesale and every id must resolve.
    pub async fn update_place(&self, id: &PlaceId, patch: PlacePatch) -> Result<Place> {
        let mut place = self.place(id).await?;

        if let Some(amenity_ids) = &patch.amenity_ids {
            for amenity_id in amenity_ids {
                self.amenity(amenity_id).await?;
            }
        }

        place.apply(patch)?;
        self.store.update_place(place).await.map_err(Error::from)?;
        self.place(id).await
    }

    // Review operations

    /// Creates a review, enforcing the one-review-per-(place, user) rule and
    /// registering the review id in both denormalized lists. If registration
    /// fails the freshly inserted review is deleted again.
    pub async fn create_review(
        &self,
        place_id: PlaceId,
        user_id: UserId,
        rating: u8,
        comment: &str,
    ) -> Result<Review> {
        let mut place = self.place(&place_id).await?;
        let mut author = self.user(&user_id).await?;

        if self
            .store
            .review_by_place_and_user(&place_id, &user_id)
            .await
            .map_err(Error::from)?
            .is_some()
        {
            return Err(Error::Conflict(
                "user has already reviewed this place".to_string(),
            ));
        }

        let review = Review::new(place_id, user_id, rating, comment)?;
        self.store
            .add_review(review.clone())
            .await
            .map_err(Error::from)?;

        place.review_ids.push(review.id);
        author.review_ids.push(review.id);
        if let Err(err) = self.register_review(place, author).await {
            if let Err(cleanup_err) = self.delete_review(&review.id).await {
                tracing::warn!(
                    review_id = %review.id,
                    error = %cleanup_err,
                    "compensating review delete failed; review left unregistered"
                );
            }
            return Err(err);
        }
        Ok(review)
    }

    async fn register_review(&self, place: Place, author: User) -> Result<()> {
        self.store.update_place(place).await.map_err(Error::from)?;
        self.store.update_user(author).await.map_err(Error::from)
    }

    /// Returns a review by id.
    pub async fn review(&self, id: &ReviewId) -> Result<Review> {
        self.store
            .review(id)
            .await
            .map_err(Error::from)?
            .ok_or_else(|| Error::not_found(EntityKind::Review, id))
    }

    /// Returns all reviews.
    pub async fn reviews(&self) -> Result<Vec<Review>> {
        self.store.reviews().await.map_err(Error::from)
    }

    /// Returns all reviews for a place.
    pub async fn reviews_by_place(&self, place_id: &PlaceId) -> Result<Vec<Review>> {
        self.store
            .reviews_by_place(place_id)
            .await
            .map_err(Error::from)
    }

    /// Applies a partial update to a review. Only the rating and the comment
    /// are mutable; an invalid rating is rejected before any mutation.
    pub async fn update_review(&self, id: &ReviewId, patch: ReviewPatch) -> Result<Review> {
        let mut review = self.review(id).await?;
        review.apply(patch)?;
        self.store.update_review(review).await.map_err(Error::from)?;
        self.review(id).await
    }

    /// Deletes a review, removing its id from the place's and the author's
    /// denormalized lists first. Absence of the id in either list, or of the
    /// place or author record itself, is tolerated.
    pub async fn delete_review(&self, id: &ReviewId) -> Result<bool> {
        let review = self.review(id).await?;

        if let Some(mut place) = self
            .store
            .place(&review.place_id)
            .await
            .map_err(Error::from)?
            && place.review_ids.contains(id)
        {
            place.review_ids.retain(|existing| existing != id);
            self.store.update_place(place).await.map_err(Error::from)?;
        }

        if let Some(mut author) = self.store.user(&review.user_id).await.map_err(Error::from)?
            && author.review_ids.contains(id)
        {
            author.review_ids.retain(|existing| existing != id);
            self.store.update_user(author).await.map_err(Error::from)?;
        }

        self.store.delete_review(id).await.map_err(Error::from)
    }

    // Amenity operations

    /// Creates an amenity, enforcing name uniqueness.
    pub async fn create_amenity(&self, name: &str) -> Result<Amenity> {
        let trimmed = name.trim();
        if self
            .store
            .amenity_by_name(trimmed)
            .await
            .map_err(Error::from)?
            .is_some()
        {
            return Err(Error::Duplicate(format!(
                "amenity with name '{trimmed}' already exists"
            )));
        }

        let amenity = Amenity::new(name)?;
        self.store
            .add_amenity(amenity.clone())
            .await
            .map_err(Error::from)?;
        Ok(amenity)
    }

    /// Returns an amenity by id.
    pub async fn amenity(&self, id: &AmenityId) -> Result<Amenity> {
        self.store
            .amenity(id)
            .await
            .map_err(Error::from)?
            .ok_or_else(|| Error::not_found(EntityKind::Amenity, id))
    }

    /// Returns all amenities.
    pub async fn amenities(&self) -> Result<Vec<Amenity>> {
        self.store.amenities().await.map_err(Error::from)
    }

    /// Applies a partial update to an amenity, enforcing name uniqueness
    /// exactly like user email uniqueness.
    pub async fn update_amenity(&self, id: &AmenityId, patch: AmenityPatch) -> Result<Amenity> {
        let mut amenity = self.amenity(id).await?;

        if let Some(new_name) = patch.name.as_deref() {
            let new_name = new_name.trim();
            if new_name != amenity.name
                && let Some(existing) = self
                    .store
                    .amenity_by_name(new_name)
                    .await
                    .map_err(Error::from)?
                && existing.id != *id
            {
                return Err(Error::Duplicate(format!(
                    "amenity with name '{new_name}' already exists"
                )));
            }
        }

        amenity.apply(patch)?;
        self.store
            .update_amenity(amenity)
            .await
            .map_err(Error::from)?;
        self.amenity(id).await
    }
}

#[cfg(all(test, feature = "memory-store"))]
mod tests {
    use super::*;
    use crate::memory_store::MemoryStore;
    use crate::store::UserStore;
    use futures::executor::block_on;

    struct PlainHasher;

    impl PasswordHasher for PlainHasher {
        fn hash(&self, password: &str) -> Result<String> {
            Ok(format!("digest:{password}"))
        }

        fn verify(&self, password: &str, digest: &str) -> bool {
            digest == format!("digest:{password}")
        }
    }

    fn facade() -> Facade<MemoryStore> {
        Facade::new(MemoryStore::new(), PlainHasher)
    }

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            password: Some("hunter22".to_string()),
            is_admin: false,
        }
    }

    /// Delegating store that refuses selected write paths, for exercising
    /// the multi-step failure branches.
    struct FlakyStore {
        inner: MemoryStore,
        fail_update_place: bool,
        fail_delete_review: bool,
    }

    fn write_refused() -> crate::error::StoreError {
        "write refused".into()
    }

    #[async_trait::async_trait]
    impl crate::store::UserStore for FlakyStore {
        async fn add_user(&self, user: User) -> std::result::Result<(), crate::error::StoreError> {
            self.inner.add_user(user).await
        }

        async fn user(
            &self,
            id: &UserId,
        ) -> std::result::Result<Option<User>, crate::error::StoreError> {
            self.inner.user(id).await
        }

        async fn users(&self) -> std::result::Result<Vec<User>, crate::error::StoreError> {
            self.inner.users().await
        }

        async fn update_user(
            &self,
            user: User,
        ) -> std::result::Result<(), crate::error::StoreError> {
            self.inner.update_user(user).await
        }

        async fn user_by_email(
            &self,
            email: &str,
        ) -> std::result::Result<Option<User>, crate::error::StoreError> {
            self.inner.user_by_email(email).await
        }
    }

    #[async_trait::async_trait]
    impl crate::store::PlaceStore for FlakyStore {
        async fn add_place(
            &self,
            place: Place,
        ) -> std::result::Result<(), crate::error::StoreError> {
            self.inner.add_place(place).await
        }

        async fn place(
            &self,
            id: &PlaceId,
        ) -> std::result::Result<Option<Place>, crate::error::StoreError> {
            self.inner.place(id).await
        }

        async fn places(&self) -> std::result::Result<Vec<Place>, crate::error::StoreError> {
            self.inner.places().await
        }

        async fn update_place(
            &self,
            place: Place,
        ) -> std::result::Result<(), crate::error::StoreError> {
            if self.fail_update_place {
                return Err(write_refused());
            }
            self.inner.update_place(place).await
        }

        async fn places_by_host(
            &self,
            host_id: &UserId,
        ) -> std::result::Result<Vec<Place>, crate::error::StoreError> {
            self.inner.places_by_host(host_id).await
        }
    }

    #[async_trait::async_trait]
    impl crate::store::AmenityStore for FlakyStore {
        async fn add_amenity(
            &self,
            amenity: Amenity,
        ) -> std::result::Result<(), crate::error::StoreError> {
            self.inner.add_amenity(amenity).await
        }

        async fn amenity(
            &self,
            id: &AmenityId,
        ) -> std::result::Result<Option<Amenity>, crate::error::StoreError> {
            self.inner.amenity(id).await
        }

        async fn amenities(&self) -> std::result::Result<Vec<Amenity>, crate::error::StoreError> {
            self.inner.amenities().await
        }

        async fn update_amenity(
            &self,
            amenity: Amenity,
        ) -> std::result::Result<(), crate::error::StoreError> {
            self.inner.update_amenity(amenity).await
        }

        async fn amenity_by_name(
            &self,
            name: &str,
        ) -> std::result::Result<Option<Amenity>, crate::error::StoreError> {
            self.inner.amenity_by_name(name).await
        }
    }

    #[async_trait::async_trait]
    impl crate::store::ReviewStore for FlakyStore {
        async fn add_review(
            &self,
            review: Review,
        ) -> std::result::Result<(), crate::error::StoreError> {
            self.inner.add_review(review).await
        }

        async fn review(
            &self,
            id: &ReviewId,
        ) -> std::result::Result<Option<Review>, crate::error::StoreError> {
            self.inner.review(id).await
        }

        async fn reviews(&self) -> std::result::Result<Vec<Review>, crate::error::StoreError> {
            self.inner.reviews().await
        }

        async fn update_review(
            &self,
            review: Review,
        ) -> std::result::Result<(), crate::error::StoreError> {
            self.inner.update_review(review).await
        }

        async fn delete_review(
            &self,
            id: &ReviewId,
        ) -> std::result::Result<bool, crate::error::StoreError> {
            if self.fail_delete_review {
                return Err(write_refused());
            }
            self.inner.delete_review(id).await
        }

        async fn reviews_by_place(
            &self,
            place_id: &PlaceId,
        ) -> std::result::Result<Vec<Review>, crate::error::StoreError> {
            self.inner.reviews_by_place(place_id).await
        }

        async fn review_by_place_and_user(
            &self,
            place_id: &PlaceId,
            user_id: &UserId,
        ) -> std::result::Result<Option<Review>, crate::error::StoreError> {
            self.inner.review_by_place_and_user(place_id, user_id).await
        }
    }

    fn new_place(host_id: UserId, amenity_ids: Vec<AmenityId>) -> NewPlace {
        NewPlace {
            name: "Canal House".to_string(),
            description: "Quiet flat by the water".to_string(),
            address: "1 Canal St".to_string(),
            city_id: "amsterdam".to_string(),
            latitude: 52.37,
            longitude: 4.89,
            host_id,
            rooms: 2,
            bathrooms: 1,
            price_per_night: 120.0,
            max_guests: 4,
            amenity_ids,
        }
    }

    #[test]
    fn create_user_rejects_duplicate_email() {
        let facade = facade();
        block_on(facade.create_user(new_user("a@x.com"))).unwrap();

        let err = block_on(facade.create_user(new_user("a@x.com"))).expect_err("must reject");
        assert!(matches!(err, Error::Duplicate(_)));
        assert_eq!(block_on(facade.users()).unwrap().len(), 1);
    }

    #[test]
    fn create_user_hashes_and_never_stores_plaintext() {
        let facade = facade();
        let user = block_on(facade.create_user(new_user("a@x.com"))).unwrap();
        assert_eq!(user.password_hash.as_deref(), Some("digest:hunter22"));
    }

    #[test]
    fn create_user_rejects_short_password() {
        let facade = facade();
        let mut input = new_user("a@x.com");
        input.password = Some("12345".to_string());
        let err = block_on(facade.create_user(input)).expect_err("must reject");
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn update_user_rejects_taken_email() {
        let facade = facade();
        let user = block_on(facade.create_user(new_user("a@x.com"))).unwrap();
        block_on(facade.create_user(new_user("b@x.com"))).unwrap();

        let err = block_on(facade.update_user(
            &user.id,
            UserPatch {
                email: Some("b@x.com".to_string()),
                ..UserPatch::default()
            },
        ))
        .expect_err("must reject");
        assert!(matches!(err, Error::Duplicate(_)));
    }

    #[test]
    fn update_user_allows_keeping_own_email() {
        let facade = facade();
        let user = block_on(facade.create_user(new_user("a@x.com"))).unwrap();

        let updated = block_on(facade.update_user(
            &user.id,
            UserPatch {
                email: Some("a@x.com".to_string()),
                first_name: Some("Grace".to_string()),
                ..UserPatch::default()
            },
        ))
        .unwrap();
        assert_eq!(updated.first_name, "Grace");
    }

    #[test]
    fn generic_update_never_touches_the_password_hash() {
        let facade = facade();
        let user = block_on(facade.create_user(new_user("a@x.com"))).unwrap();
        let digest = user.password_hash.clone();

        let updated = block_on(facade.update_user(
            &user.id,
            UserPatch {
                first_name: Some("Grace".to_string()),
                ..UserPatch::default()
            },
        ))
        .unwrap();
        assert_eq!(updated.password_hash, digest);
    }

    #[test]
    fn set_user_password_replaces_the_digest() {
        let facade = facade();
        let user = block_on(facade.create_user(new_user("a@x.com"))).unwrap();

        block_on(facade.set_user_password(&user.id, "changed-it")).unwrap();
        let reloaded = block_on(facade.user(&user.id)).unwrap();
        assert_eq!(reloaded.password_hash.as_deref(), Some("digest:changed-it"));

        let err = block_on(facade.set_user_password(&user.id, "short")).expect_err("must reject");
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn verify_credentials_matches_and_rejects() {
        let facade = facade();
        block_on(facade.create_user(new_user("a@x.com"))).unwrap();

        assert!(
            block_on(facade.verify_credentials("a@x.com", "hunter22"))
                .unwrap()
                .is_some()
        );
        assert!(
            block_on(facade.verify_credentials("a@x.com", "wrong"))
                .unwrap()
                .is_none()
        );
        assert!(
            block_on(facade.verify_credentials("nobody@x.com", "hunter22"))
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn verify_credentials_rejects_user_without_digest() {
        let facade = facade();
        let mut input = new_user("a@x.com");
        input.password = None;
        block_on(facade.create_user(input)).unwrap();

        assert!(
            block_on(facade.verify_credentials("a@x.com", "anything"))
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn create_place_requires_existing_host() {
        let facade = facade();
        let err = block_on(facade.create_place(new_place(UserId::generate(), Vec::new())))
            .expect_err("must reject");
        assert!(matches!(
            err,
            Error::NotFound {
                kind: EntityKind::User,
                ..
            }
        ));
    }

    #[test]
    fn create_place_registers_id_with_host() {
        let facade = facade();
        let host = block_on(facade.create_user(new_user("host@x.com"))).unwrap();
        let place = block_on(facade.create_place(new_place(host.id, Vec::new()))).unwrap();

        let reloaded = block_on(facade.user(&host.id)).unwrap();
        assert_eq!(reloaded.place_ids, vec![place.id]);
    }

    #[test]
    fn create_place_with_missing_amenity_persists_nothing() {
        let facade = facade();
        let host = block_on(facade.create_user(new_user("host@x.com"))).unwrap();
        let wifi = block_on(facade.create_amenity("WiFi")).unwrap();

        let err = block_on(
            facade.create_place(new_place(host.id, vec![wifi.id, AmenityId::generate()])),
        )
        .expect_err("must reject");
        assert!(matches!(
            err,
            Error::NotFound {
                kind: EntityKind::Amenity,
                ..
            }
        ));
        assert!(block_on(facade.places()).unwrap().is_empty());
        assert!(
            block_on(facade.user(&host.id))
                .unwrap()
                .place_ids
                .is_empty()
        );
    }

    #[test]
    fn update_place_replaces_amenity_list_wholesale() {
        let facade = facade();
        let host = block_on(facade.create_user(new_user("host@x.com"))).unwrap();
        let wifi = block_on(facade.create_amenity("WiFi")).unwrap();
        let sauna = block_on(facade.create_amenity("Sauna")).unwrap();
        let place = block_on(facade.create_place(new_place(host.id, vec![wifi.id]))).unwrap();

        let updated = block_on(facade.update_place(
            &place.id,
            PlacePatch {
                amenity_ids: Some(vec![sauna.id]),
                ..PlacePatch::default()
            },
        ))
        .unwrap();
        assert_eq!(updated.amenity_ids, vec![sauna.id]);
    }

    #[test]
    fn update_place_rejects_unresolved_replacement_amenity() {
        let facade = facade();
        let host = block_on(facade.create_user(new_user("host@x.com"))).unwrap();
        let place = block_on(facade.create_place(new_place(host.id, Vec::new()))).unwrap();

        let err = block_on(facade.update_place(
            &place.id,
            PlacePatch {
                amenity_ids: Some(vec![AmenityId::generate()]),
                ..PlacePatch::default()
            },
        ))
        .expect_err("must reject");
        assert!(matches!(
            err,
            Error::NotFound {
                kind: EntityKind::Amenity,
                ..
            }
        ));
    }

    #[test]
    fn create_review_appends_to_both_denormalized_lists() {
        let facade = facade();
        let host = block_on(facade.create_user(new_user("host@x.com"))).unwrap();
        let guest = block_on(facade.create_user(new_user("guest@x.com"))).unwrap();
        let place = block_on(facade.create_place(new_place(host.id, Vec::new()))).unwrap();

        let review = block_on(facade.create_review(place.id, guest.id, 4, "lovely")).unwrap();

        assert_eq!(
            block_on(facade.place(&place.id)).unwrap().review_ids,
            vec![review.id]
        );
        assert_eq!(
            block_on(facade.user(&guest.id)).unwrap().review_ids,
            vec![review.id]
        );
    }

    #[test]
    fn second_review_for_same_pair_conflicts() {
        let facade = facade();
        let host = block_on(facade.create_user(new_user("host@x.com"))).unwrap();
        let guest = block_on(facade.create_user(new_user("guest@x.com"))).unwrap();
        let place = block_on(facade.create_place(new_place(host.id, Vec::new()))).unwrap();

        block_on(facade.create_review(place.id, guest.id, 4, "lovely")).unwrap();
        let err = block_on(facade.create_review(place.id, guest.id, 2, "changed my mind"))
            .expect_err("must reject");
        assert!(matches!(err, Error::Conflict(_)));
        assert_eq!(block_on(facade.reviews()).unwrap().len(), 1);
    }

    #[test]
    fn review_rating_bounds_are_inclusive() {
        let facade = facade();
        let host = block_on(facade.create_user(new_user("host@x.com"))).unwrap();
        let low = block_on(facade.create_user(new_user("low@x.com"))).unwrap();
        let high = block_on(facade.create_user(new_user("high@x.com"))).unwrap();
        let place = block_on(facade.create_place(new_place(host.id, Vec::new()))).unwrap();

        assert!(block_on(facade.create_review(place.id, low.id, 1, "rough")).is_ok());
        assert!(block_on(facade.create_review(place.id, high.id, 5, "superb")).is_ok());
    }

    #[test]
    fn review_rating_out_of_range_fails_validation() {
        let facade = facade();
        let host = block_on(facade.create_user(new_user("host@x.com"))).unwrap();
        let guest = block_on(facade.create_user(new_user("guest@x.com"))).unwrap();
        let place = block_on(facade.create_place(new_place(host.id, Vec::new()))).unwrap();

        for rating in [0, 6] {
            let err = block_on(facade.create_review(place.id, guest.id, rating, "hm"))
                .expect_err("must reject");
            assert!(matches!(err, Error::Validation(_)), "accepted {rating}");
        }
        assert!(block_on(facade.reviews()).unwrap().is_empty());
    }

    #[test]
    fn update_review_rejects_bad_rating_before_any_mutation() {
        let facade = facade();
        let host = block_on(facade.create_user(new_user("host@x.com"))).unwrap();
        let guest = block_on(facade.create_user(new_user("guest@x.com"))).unwrap();
        let place = block_on(facade.create_place(new_place(host.id, Vec::new()))).unwrap();
        let review = block_on(facade.create_review(place.id, guest.id, 4, "lovely")).unwrap();

        let err = block_on(facade.update_review(
            &review.id,
            ReviewPatch {
                rating: Some(6),
                comment: Some("even better".to_string()),
            },
        ))
        .expect_err("must reject");
        assert!(matches!(err, Error::Validation(_)));

        let reloaded = block_on(facade.review(&review.id)).unwrap();
        assert_eq!(reloaded.rating, 4);
        assert_eq!(reloaded.comment, "lovely");
    }

    #[test]
    fn delete_review_scrubs_both_lists_and_the_record() {
        let facade = facade();
        let host = block_on(facade.create_user(new_user("host@x.com"))).unwrap();
        let guest = block_on(facade.create_user(new_user("guest@x.com"))).unwrap();
        let place = block_on(facade.create_place(new_place(host.id, Vec::new()))).unwrap();
        let review = block_on(facade.create_review(place.id, guest.id, 4, "lovely")).unwrap();

        assert!(block_on(facade.delete_review(&review.id)).unwrap());

        assert!(
            block_on(facade.place(&place.id))
                .unwrap()
                .review_ids
                .is_empty()
        );
        assert!(
            block_on(facade.user(&guest.id))
                .unwrap()
                .review_ids
                .is_empty()
        );
        let err = block_on(facade.review(&review.id)).expect_err("must be gone");
        assert!(matches!(
            err,
            Error::NotFound {
                kind: EntityKind::Review,
                ..
            }
        ));
    }

    #[test]
    fn delete_review_tolerates_missing_list_entries() {
        let facade = facade();
        let host = block_on(facade.create_user(new_user("host@x.com"))).unwrap();
        let guest = block_on(facade.create_user(new_user("guest@x.com"))).unwrap();
        let place = block_on(facade.create_place(new_place(host.id, Vec::new()))).unwrap();
        let review = block_on(facade.create_review(place.id, guest.id, 4, "lovely")).unwrap();

        // Simulate a drifted list: scrub the author's entry out of band.
        let mut drifted = block_on(facade.user(&guest.id)).unwrap();
        drifted.review_ids.clear();
        block_on(facade.store().update_user(drifted)).unwrap();

        assert!(block_on(facade.delete_review(&review.id)).unwrap());
    }

    #[test]
    fn amenity_names_are_unique_and_renameable() {
        let facade = facade();
        let wifi = block_on(facade.create_amenity("WiFi")).unwrap();

        let err = block_on(facade.create_amenity("WiFi")).expect_err("must reject");
        assert!(matches!(err, Error::Duplicate(_)));

        let renamed = block_on(facade.update_amenity(
            &wifi.id,
            AmenityPatch {
                name: Some("Fiber".to_string()),
            },
        ))
        .unwrap();
        assert_eq!(renamed.name, "Fiber");

        let sauna = block_on(facade.create_amenity("Sauna")).unwrap();
        let err = block_on(facade.update_amenity(
            &sauna.id,
            AmenityPatch {
                name: Some("Fiber".to_string()),
            },
        ))
        .expect_err("must reject");
        assert!(matches!(err, Error::Duplicate(_)));
    }

    #[test]
    fn lookups_for_unknown_ids_fail_with_not_found() {
        let facade = facade();
        assert!(matches!(
            block_on(facade.user(&UserId::generate())),
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(
            block_on(facade.place(&PlaceId::generate())),
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(
            block_on(facade.amenity(&AmenityId::generate())),
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(
            block_on(facade.review(&ReviewId::generate())),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn list_accessors_return_empty_rather_than_failing() {
        let facade = facade();
        assert!(block_on(facade.users()).unwrap().is_empty());
        assert!(block_on(facade.places()).unwrap().is_empty());
        assert!(block_on(facade.amenities()).unwrap().is_empty());
        assert!(block_on(facade.reviews()).unwrap().is_empty());
        assert!(
            block_on(facade.places_by_host(&UserId::generate()))
                .unwrap()
                .is_empty()
        );
        assert!(
            block_on(facade.reviews_by_place(&PlaceId::generate()))
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn create_review_cleans_up_when_registration_fails() {
        let store = MemoryStore::new();
        let seed = Facade::new(store.clone(), PlainHasher);
        let host = block_on(seed.create_user(new_user("host@x.com"))).unwrap();
        let guest = block_on(seed.create_user(new_user("guest@x.com"))).unwrap();
        let place = block_on(seed.create_place(new_place(host.id, Vec::new()))).unwrap();

        let flaky = Facade::new(
            FlakyStore {
                inner: store.clone(),
                fail_update_place: true,
                fail_delete_review: false,
            },
            PlainHasher,
        );
        let err = block_on(flaky.create_review(place.id, guest.id, 4, "Nice"))
            .expect_err("registration must fail");
        assert!(matches!(err, Error::Store(_)));

        // The inserted review was deleted again; nothing is half-registered.
        assert!(block_on(seed.reviews()).unwrap().is_empty());
        assert!(
            block_on(seed.place(&place.id))
                .unwrap()
                .review_ids
                .is_empty()
        );
        assert!(
            block_on(seed.user(&guest.id))
                .unwrap()
                .review_ids
                .is_empty()
        );
    }

    #[test]
    fn create_review_reports_registration_failure_when_cleanup_also_fails() {
        let store = MemoryStore::new();
        let seed = Facade::new(store.clone(), PlainHasher);
        let host = block_on(seed.create_user(new_user("host@x.com"))).unwrap();
        let guest = block_on(seed.create_user(new_user("guest@x.com"))).unwrap();
        let place = block_on(seed.create_place(new_place(host.id, Vec::new()))).unwrap();

        let flaky = Facade::new(
            FlakyStore {
                inner: store.clone(),
                fail_update_place: true,
                fail_delete_review: true,
            },
            PlainHasher,
        );
        let err = block_on(flaky.create_review(place.id, guest.id, 4, "Nice"))
            .expect_err("registration must fail");
        assert!(matches!(err, Error::Store(_)));

        // The failed cleanup does not mask the original error; the orphaned
        // review row stays behind for operators to reconcile.
        assert_eq!(block_on(seed.reviews()).unwrap().len(), 1);
    }
}
