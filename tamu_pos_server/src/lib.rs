//! # Tamu POS server
//! This crate hosts the HTTP server for the Tamu POS. It is responsible for:
//! * Order management for the till: creating orders, editing their lines and moving them through their lifecycle.
//! * Sending M-Pesa STK push requests on behalf of each restaurant.
//! * Receiving the M-Pesa result callback and applying it to the order.
//! * Answering payment status queries, which reconcile orders whose callback never arrived.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/api/payments/callback`: The M-Pesa result webhook. Unauthenticated, optionally IP-whitelisted.
//! * `/api/payments/orders/{id}/status`: The public payment status of an order.
//! * Everything else under `/api` requires a bearer token and is scoped to the restaurant named in it.

pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;

pub mod helpers;
pub mod integrations;
pub mod routes;
pub mod server;
