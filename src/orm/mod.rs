pub mod forms;
pub mod options;
pub mod questions;
pub mod responders;
pub mod responses;
pub mod users;
