pub mod db;
pub mod engine;
pub mod processor;

mod cycles;
mod ledger;
mod reward_queue;
mod staged;

pub use db::StateDb;
pub use engine::StateEngine;
