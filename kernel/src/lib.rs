pub mod clock;
pub mod gateway;
pub mod model;
pub mod notifier;
pub mod repository;
pub mod service;
