//! Partner click attribution for DinElportal: the embeddable tracker SDK
//! (`tracker`) plus the collection service the beacons report to.

pub mod db;
pub mod handlers;
pub mod middlewares;
pub mod models;
pub mod routes;
pub mod state;
pub mod structs;
pub mod tracker;
pub mod utils;
