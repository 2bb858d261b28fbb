//! Meetup point computation and points of interest.

pub mod map;
pub mod service;
