pub mod builder;
pub mod create_user;
pub mod db;
pub mod error;
pub mod ident;
pub mod middleware;
pub mod orm;
pub mod respond;
pub mod session;
pub mod web;
