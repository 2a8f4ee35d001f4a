pub mod handlers;
pub mod input;
#[cfg(test)]
pub mod memory;
pub mod repository;
pub mod upload;
pub mod workflow;
