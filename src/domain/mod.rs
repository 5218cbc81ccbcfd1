//! Domain layer - core business logic and entities

pub mod alert;
pub mod feed;
pub mod portfolio;
pub mod price;
