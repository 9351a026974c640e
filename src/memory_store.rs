use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::error::StoreError;
use crate::model::{Amenity, Place, Review, User};
use crate::store::{AmenityStore, PlaceStore, ReviewStore, UserStore};
use crate::types::{AmenityId, PlaceId, ReviewId, UserId};

/// In-process store for tests, demos, and single-worker deployments.
///
/// Mutation is synchronous and unconditional, so there is no rollback
/// concept. The per-table locks keep individual operations consistent, but
/// racing writers are last-write-wins; this backend assumes a single-worker
/// deployment and does not try to be more than that.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    users: RwLock<Table<UserId, User>>,
    places: RwLock<Table<PlaceId, Place>>,
    amenities: RwLock<Table<AmenityId, Amenity>>,
    reviews: RwLock<Table<ReviewId, Review>>,
}

/// Keyed rows plus an insertion-order index, so listing preserves the order
/// in which entities were added.
#[derive(Debug)]
struct Table<K, V> {
    rows: HashMap<K, V>,
    order: Vec<K>,
}

impl<K, V> Default for Table<K, V> {
    fn default() -> Self {
        Self {
            rows: HashMap::new(),
            order: Vec::new(),
        }
    }
}

impl<K: Copy + Eq + Hash, V: Clone> Table<K, V> {
    fn insert(&mut self, key: K, value: V) {
        if !self.rows.contains_key(&key) {
            self.order.push(key);
        }
        self.rows.insert(key, value);
    }

    fn replace(&mut self, key: &K, value: V) {
        if let Some(slot) = self.rows.get_mut(key) {
            *slot = value;
        }
    }

    fn get(&self, key: &K) -> Option<V> {
        self.rows.get(key).cloned()
    }

    fn remove(&mut self, key: &K) -> bool {
        if self.rows.remove(key).is_some() {
            self.order.retain(|existing| existing != key);
            true
        } else {
            false
        }
    }

    fn all(&self) -> Vec<V> {
        self.order
            .iter()
            .filter_map(|key| self.rows.get(key))
            .cloned()
            .collect()
    }
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn add_user(&self, user: User) -> std::result::Result<(), StoreError> {
        let mut guard = self.inner.users.write().expect("poisoned lock");
        guard.insert(user.id, user);
        Ok(())
    }

    async fn user(&self, id: &UserId) -> std::result::Result<Option<User>, StoreError> {
        let guard = self.inner.users.read().expect("poisoned lock");
        Ok(guard.get(id))
    }

    async fn users(&self) -> std::result::Result<Vec<User>, StoreError> {
        let guard = self.inner.users.read().expect("poisoned lock");
        Ok(guard.all())
    }

    async fn update_user(&self, mut user: User) -> std::result::Result<(), StoreError> {
        user.touch();
        let mut guard = self.inner.users.write().expect("poisoned lock");
        let id = user.id;
        guard.replace(&id, user);
        Ok(())
    }

    async fn user_by_email(&self, email: &str) -> std::result::Result<Option<User>, StoreError> {
        let guard = self.inner.users.read().expect("poisoned lock");
        Ok(guard
            .rows
            .values()
            .find(|user| user.email == email)
            .cloned())
    }
}

#[async_trait]
impl PlaceStore for MemoryStore {
    async fn add_place(&self, place: Place) -> std::result::Result<(), StoreError> {
        let mut guard = self.inner.places.write().expect("poisoned lock");
        guard.insert(place.id, place);
        Ok(())
    }

    async fn place(&self, id: &PlaceId) -> std::result::Result<Option<Place>, StoreError> {
        let guard = self.inner.places.read().expect("poisoned lock");
        Ok(guard.get(id))
    }

    async fn places(&self) -> std::result::Result<Vec<Place>, StoreError> {
        let guard = self.inner.places.read().expect("poisoned lock");
        Ok(guard.all())
    }

    async fn update_place(&self, mut place: Place) -> std::result::Result<(), StoreError> {
        place.touch();
        let mut guard = self.inner.places.write().expect("poisoned lock");
        let id = place.id;
        guard.replace(&id, place);
        Ok(())
    }

    async fn places_by_host(
        &self,
        host_id: &UserId,
    ) -> std::result::Result<Vec<Place>, StoreError> {
        let guard = self.inner.places.read().expect("poisoned lock");
        Ok(guard
            .all()
            .into_iter()
            .filter(|place| place.host_id == *host_id)
            .collect())
    }
}

#[async_trait]
impl AmenityStore for MemoryStore {
    async fn add_amenity(&self, amenity: Amenity) -> std::result::Result<(), StoreError> {
        let mut guard = self.inner.amenities.write().expect("poisoned lock");
        guard.insert(amenity.id, amenity);
        Ok(())
    }

    async fn amenity(&self, id: &AmenityId) -> std::result::Result<Option<Amenity>, StoreError> {
        let guard = self.inner.amenities.read().expect("poisoned lock");
        Ok(guard.get(id))
    }

    async fn amenities(&self) -> std::result::Result<Vec<Amenity>, StoreError> {
        let guard = self.inner.amenities.read().expect("poisoned lock");
        Ok(guard.all())
    }

    async fn update_amenity(&self, mut amenity: Amenity) -> std::result::Result<(), StoreError> {
        amenity.touch();
        let mut guard = self.inner.amenities.write().expect("poisoned lock");
        let id = amenity.id;
        guard.replace(&id, amenity);
        Ok(())
    }

    async fn amenity_by_name(
        &self,
        name: &str,
    ) -> std::result::Result<Option<Amenity>, StoreError> {
        let guard = self.inner.amenities.read().expect("poisoned lock");
        Ok(guard
            .rows
            .values()
            .find(|amenity| amenity.name == name)
            .cloned())
    }
}

#[async_trait]
impl ReviewStore for MemoryStore {
    async fn add_review(&self, review: Review) -> std::result::Result<(), StoreError> {
        let mut guard = self.inner.reviews.write().expect("poisoned lock");
        guard.insert(review.id, review);
        Ok(())
    }

    async fn review(&self, id: &ReviewId) -> std::result::Result<Option<Review>, StoreError> {
        let guard = self.inner.reviews.read().expect("poisoned lock");
        Ok(guard.get(id))
    }

    async fn reviews(&self) -> std::result::Result<Vec<Review>, StoreError> {
        let guard = self.inner.reviews.read().expect("poisoned lock");
        Ok(guard.all())
    }

    async fn update_review(&self, mut review: Review) -> std::result::Result<(), StoreError> {
        review.touch();
        let mut guard = self.inner.reviews.write().expect("poisoned lock");
        let id = review.id;
        guard.replace(&id, review);
        Ok(())
    }

    async fn delete_review(&self, id: &ReviewId) -> std::result::Result<bool, StoreError> {
        let mut guard = self.inner.reviews.write().expect("poisoned lock");
        Ok(guard.remove(id))
    }

    async fn reviews_by_place(
        &self,
        place_id: &PlaceId,
    ) -> std::result::Result<Vec<Review>, StoreError> {
        let guard = self.inner.reviews.read().expect("poisoned lock");
        Ok(guard
            .all()
            .into_iter()
            .filter(|review| review.place_id == *place_id)
            .collect())
    }

    async fn review_by_place_and_user(
        &self,
        place_id: &PlaceId,
        user_id: &UserId,
    ) -> std::result::Result<Option<Review>, StoreError> {
        let guard = self.inner.reviews.read().expect("poisoned lock");
        Ok(guard
            .rows
            .values()
            .find(|review| review.place_id == *place_id && review.user_id == *user_id)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    fn user(email: &str) -> User {
        User::new(email, "Ada", "Lovelace", None, false).expect("valid user")
    }

    #[test]
    fn listing_preserves_insertion_order() {
        let store = MemoryStore::new();
        let first = user("first@example.com");
        let second = user("second@example.com");
        let third = user("third@example.com");

        block_on(store.add_user(first.clone())).unwrap();
        block_on(store.add_user(second.clone())).unwrap();
        block_on(store.add_user(third.clone())).unwrap();

        let emails: Vec<String> = block_on(store.users())
            .unwrap()
            .into_iter()
            .map(|u| u.email)
            .collect();
        assert_eq!(
            emails,
            vec![first.email, second.email, third.email],
            "insertion order lost"
        );
    }

    #[test]
    fn update_refreshes_timestamp_and_keeps_order() {
        let store = MemoryStore::new();
        let first = user("first@example.com");
        let mut second = user("second@example.com");

        block_on(store.add_user(first.clone())).unwrap();
        block_on(store.add_user(second.clone())).unwrap();

        let before = second.updated_at;
        second.first_name = "Grace".to_string();
        block_on(store.update_user(second.clone())).unwrap();

        let listed = block_on(store.users()).unwrap();
        assert_eq!(listed[0].id, first.id);
        assert_eq!(listed[1].first_name, "Grace");
        assert!(listed[1].updated_at >= before);
    }

    #[test]
    fn update_of_missing_row_is_a_no_op() {
        let store = MemoryStore::new();
        block_on(store.update_user(user("ghost@example.com"))).unwrap();
        assert!(block_on(store.users()).unwrap().is_empty());
    }

    #[test]
    fn user_by_email_is_exact_match() {
        let store = MemoryStore::new();
        block_on(store.add_user(user("Ada@Example.com"))).unwrap();

        assert!(
            block_on(store.user_by_email("ada@example.com"))
                .unwrap()
                .is_none()
        );
        assert!(
            block_on(store.user_by_email("Ada@Example.com"))
                .unwrap()
                .is_some()
        );
    }

    #[test]
    fn delete_review_reports_removal() {
        let store = MemoryStore::new();
        let review =
            Review::new(PlaceId::generate(), UserId::generate(), 4, "nice").expect("valid review");
        let id = review.id;

        block_on(store.add_review(review)).unwrap();
        assert!(block_on(store.delete_review(&id)).unwrap());
        assert!(!block_on(store.delete_review(&id)).unwrap());
        assert!(block_on(store.review(&id)).unwrap().is_none());
    }

    #[test]
    fn review_finders_filter_by_place_and_user() {
        let store = MemoryStore::new();
        let place = PlaceId::generate();
        let other_place = PlaceId::generate();
        let reviewer = UserId::generate();

        let ours = Review::new(place, reviewer, 4, "nice").expect("valid review");
        let other = Review::new(other_place, reviewer, 2, "loud").expect("valid review");
        block_on(store.add_review(ours.clone())).unwrap();
        block_on(store.add_review(other)).unwrap();

        let for_place = block_on(store.reviews_by_place(&place)).unwrap();
        assert_eq!(for_place.len(), 1);
        assert_eq!(for_place[0].id, ours.id);

        let pair = block_on(store.review_by_place_and_user(&place, &reviewer)).unwrap();
        assert_eq!(pair.map(|r| r.id), Some(ours.id));
        assert!(
            block_on(store.review_by_place_and_user(&place, &UserId::generate()))
                .unwrap()
                .is_none()
        );
    }
}
