//! Data models for the outreach pairing application.
//!
//! Records have a fixed shape; optional values are `Option` fields serialized as `null`.

mod dashboard;
mod pairing;
mod team;
mod user;

pub use dashboard::*;
pub use pairing::*;
pub use team::*;
pub use user::*;
