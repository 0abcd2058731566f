pub mod chat;
pub mod health;
pub mod stop;
pub mod web;
