//! SeaORM entities backing [`crate::account::DbAccountStore`].

pub mod account;
pub mod account_provider;
