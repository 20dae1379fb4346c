// src/server/handlers/mod.rs
//! HTTP request handlers for the listing service

pub mod changelog;
pub mod download;
pub mod listing;
pub mod search;
pub mod stats;
pub mod webhook;
