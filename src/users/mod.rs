pub mod dto;
pub mod handlers;
pub(crate) mod password;
pub mod repo;
pub mod service;
pub(crate) mod validate;
