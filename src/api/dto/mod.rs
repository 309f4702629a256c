//! Data Transfer Objects for REST request/response serialization.

pub mod admin_dto;
pub mod alert_dto;
pub mod common_dto;
pub mod history_dto;
pub mod notification_dto;
pub mod rates_dto;

pub use admin_dto::*;
pub use alert_dto::*;
pub use common_dto::*;
pub use history_dto::*;
pub use notification_dto::*;
pub use rates_dto::*;
