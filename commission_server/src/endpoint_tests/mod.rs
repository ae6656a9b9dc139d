//! Endpoint tests run the full actix service stack, middleware included, against mocked backends.
//! No database or network is involved, so they exercise routing, extraction, auth gates and
//! response shapes, not SQL.

mod helpers;
mod mocks;
mod operator;
mod webhook;
