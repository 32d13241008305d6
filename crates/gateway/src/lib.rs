pub mod clients;
pub mod dispatch;
pub mod handlers;
pub mod health;
pub mod orchestrator;
pub mod startup;
