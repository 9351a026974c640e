//! Service core for a short-term-rental marketplace.
//!
//! This crate provides strong-typed identifiers, validated entities for
//! users, places, amenities and reviews, a pluggable async store interface,
//! and a [`Facade`] that enforces the cross-entity rules: unique emails and
//! amenity names, referential checks on creation, one review per
//! (place, user) pair, and the denormalized id lists kept on users and
//! places.
//!
//! # Examples
//!
//! Basic flow using the in-memory store (enable `memory-store`):
//! ```no_run
//! use lodgekit::{Facade, NewUser, PasswordHasher};
//! # #[cfg(all(feature = "memory-store", feature = "bcrypt"))]
//! # {
//! use lodgekit::{BcryptHasher, MemoryStore};
//! # let _ = futures::executor::block_on(async {
//! let facade = Facade::new(MemoryStore::new(), BcryptHasher::default());
//! let user = facade
//!     .create_user(NewUser {
//!         email: "ada@example.com".into(),
//!         first_name: "Ada".into(),
//!         last_name: "Lovelace".into(),
//!         password: Some("correct horse".into()),
//!         is_admin: false,
//!     })
//!     .await?;
//! let _ = facade.user(&user.id).await?;
//! # Ok::<(), lodgekit::Error>(())
//! # });
//! # }
//! ```
//!
//! Ownership checks are pure and live next to the entities:
//! ```
//! use lodgekit::{Actor, UserId};
//! let owner = UserId::generate();
//! let caller = Actor::new(owner, false);
//! assert!(caller.may_modify(&owner).is_allowed());
//! ```
#![forbid(unsafe_code)]

mod authz;
mod error;
mod facade;
mod model;
mod password;
mod store;
mod types;

#[cfg(feature = "memory-store")]
mod memory_store;

#[cfg(feature = "sqlite-store")]
mod sqlite_store;

#[cfg(feature = "axum")]
pub mod axum;

pub use crate::authz::{Actor, Decision};
pub use crate::error::{EntityKind, Error, Result, StoreError};
pub use crate::facade::Facade;
pub use crate::model::{
    Amenity, AmenityPatch, NewPlace, NewUser, Place, PlacePatch, Review, ReviewPatch, User,
    UserPatch,
};
pub use crate::password::PasswordHasher;
pub use crate::store::{AmenityStore, PlaceStore, ReviewStore, Store, UserStore};
pub use crate::types::{AmenityId, PlaceId, ReviewId, UserId};

#[cfg(feature = "bcrypt")]
pub use crate::password::BcryptHasher;

#[cfg(feature = "memory-store")]
pub use crate::memory_store::MemoryStore;

#[cfg(feature = "sqlite-store")]
pub use crate::sqlite_store::SqliteStore;
