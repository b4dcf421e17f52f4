//! Storefront client for a mobile phone catalog.
//!
//! Product data comes from the remote API through a read-through cache with a
//! one hour TTL. The cart is kept locally and updated optimistically; a failed
//! sync to the server rolls the change back.

pub mod api;
pub mod cache;
pub mod cancel;
pub mod cart;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod debounce;
pub mod logging;
pub mod query;
pub mod storage;
