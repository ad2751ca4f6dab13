// Alert classification for incoming notifications and push messages.
//
// Architecture:
// - model.rs: Filter configuration (producers, keywords, push defaults)
// - triggers.rs: Source and keyword filter predicates
// - classifier.rs: Maps a RawEvent to an AlertDecision

pub mod classifier;
pub mod model;
pub mod triggers;
