pub mod auth;
pub mod container_service;
pub mod dashboard_service;
pub mod forecast;
pub mod ledger;
pub mod material_service;
pub mod report_service;
pub mod social_service;
pub mod storage;
pub mod sync;
pub mod unit_service;
