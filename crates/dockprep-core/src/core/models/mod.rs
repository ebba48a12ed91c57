//! Plain data models produced and consumed by the file codecs.

pub mod pose;
pub mod score;
pub mod sphere;
