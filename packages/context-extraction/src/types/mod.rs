//! Data types shared by every pipeline stage.

pub mod block;
pub mod config;
pub mod record;
pub mod run;
pub mod source;
