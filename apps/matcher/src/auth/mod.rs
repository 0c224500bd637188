// Credential store and the register / login / logout endpoints.

pub mod handlers;
pub mod store;
