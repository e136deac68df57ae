pub mod auth;
pub mod containers;
pub mod dashboard;
pub mod materials;
pub mod social;
pub mod units;
