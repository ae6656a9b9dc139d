//! SQLite implementation of the gateway storage traits.
//!
//! The low-level row operations live in [`db`] and always take a
//! `&mut SqliteConnection`, so the trait implementations in `sqlite_impl` can
//! compose them inside a single transaction.

pub mod db;
mod sqlite_impl;

pub use sqlite_impl::SqliteDatabase;
