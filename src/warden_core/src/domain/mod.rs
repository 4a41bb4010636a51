pub mod authentication;
pub mod credential;
pub mod failure;
pub mod handler_map;
pub mod handler_result;
pub mod principal;
