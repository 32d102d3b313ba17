//! Puzzle - stitch independently served html fragments into one page.
//!
//! A page template references fragments of upstream gateways. At compile
//! time every fragment is classified (primary, static, waited, chunked or
//! left to the browser) and the template becomes a [`compose::CompiledHandler`]
//! that answers requests buffered or streamed.

pub mod cli;
pub mod compose;
pub mod config;
pub mod core;
pub mod dom;
pub mod fragment;
pub mod gateway;
pub mod logger;
pub mod page;
pub mod template;
pub mod utils;
