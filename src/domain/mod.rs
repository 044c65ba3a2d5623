pub mod notification;
pub mod vehicle;
