//! Route handlers for the form server.

pub mod form;
pub mod health;
