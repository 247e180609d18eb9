//! Reservation consistency engine for a car-rental fleet.
//!
//! [`engine::Engine::reserve`] books a date range on a car, guaranteeing
//! that no two committed reservations on the same car overlap even under
//! concurrent requests. History is kept by a [`store::ResourceStore`]; the
//! durable one ([`store::WalStore`]) is an fsynced, CRC-checked event log.

pub mod compactor;
pub mod config;
pub mod engine;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod store;
pub mod wal;
