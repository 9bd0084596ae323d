// handlers/public/mod.rs - Handlers reachable without a primary session
//
// Public handlers that touch data run under the service scope and must
// narrow their queries themselves (by user id, by form token hash).
pub mod auth;
pub mod bpa;
pub mod pages;
