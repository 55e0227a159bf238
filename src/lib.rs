//! # Crewcall API
//!
//! The backend for the crewcall event staffing marketplace.

pub mod auth;
pub mod email;
pub mod error;
pub mod file;
pub mod geo;
pub mod models;
pub mod otp;
pub mod relay;
pub mod routes;
pub mod util;

#[cfg(test)]
pub mod tests;
