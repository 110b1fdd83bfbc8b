//! mail2bug core library: turns inbound webhook emails into tracker work items.
//! Used by the CLI gateway.

pub mod anonymize;
pub mod audit;
pub mod config;
pub mod email;
pub mod error;
pub mod filter;
pub mod gateway;
pub mod init;
pub mod pipeline;
pub mod report;
pub mod resolver;
pub mod ticket;
pub mod tracker;
