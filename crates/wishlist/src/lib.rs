//! `velora-wishlist` — per-customer wishlist domain.

pub mod wishlist;

pub use wishlist::{
    ToggleEntry, ToggleOutcome, Wishlist, WishlistCommand, WishlistEvent, WishlistId,
};
