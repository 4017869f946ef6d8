//! Core business logic for Tally.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! All domain types, validation rules, and funds decisions live here.
//!
//! # Modules
//!
//! - `ledger` - Double-entry posting rules: validation, balances, funds checks

pub mod ledger;
