//! Core library for the Smart Clinic client.
//!
//! Holds session storage, role-based login with endpoint discovery, and a
//! typed client for the clinic REST API. Frontends (the `clinic` CLI) drive
//! these through [`login::LoginUi`].

pub mod api;
pub mod config;
pub mod http;
pub mod login;
pub mod role;
pub mod session;
