//! Core of the keeper object cache: store ports, access tracking, the
//! reclamation engine (control plane) and the GET/PUT service (data plane).

pub mod auth;
pub mod domain;
pub mod inventory;
pub mod pagination;
pub mod planes;
pub mod ports;
pub mod tracker;

#[cfg(test)]
mod testing;
