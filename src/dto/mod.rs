pub mod board;
pub mod health;
pub mod recap;
pub mod session;
pub mod sse;
pub mod validation;
pub mod vote;
