pub mod auth;
pub mod config;
pub mod connection;
pub mod credentials;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod export;
pub mod history;
pub mod lockfile;
pub mod model;
pub mod protocol;
pub mod provider;
pub mod publisher;
pub mod registry;
pub mod runner;
pub mod session;
pub mod validator;

#[cfg(test)]
mod test_support;
