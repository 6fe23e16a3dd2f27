pub mod auction;
pub mod bidding;
pub mod config;
pub mod dashboard;
pub mod database;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod identity;
pub mod images;
pub mod live;
pub mod message_broker;
pub mod notification;
pub mod payment;
pub mod query;
pub mod scheduler;
pub mod state;
pub mod store;
