//! Domain logic: accounts, transactions, monthly totals, and the event
//! propagation that keeps the three consistent.

pub mod account;
pub mod commands;
pub mod events;
pub mod ident;
pub mod money;
pub mod monthly;
pub mod propagator;
pub mod transaction;

pub use money::Money;
