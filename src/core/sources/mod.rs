//! Event source adapters.
//!
//! Each adapter turns its channel's native event into a [`RawEvent`]
//! (or drops it) without touching any store.
//!
//! [`RawEvent`]: crate::core::model::RawEvent

pub mod notification;
pub mod push;
