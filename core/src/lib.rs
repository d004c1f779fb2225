pub mod db;
pub mod event;
pub mod models;
pub mod router;
pub mod seed;
