mod handler;
mod model;

pub use handler::register;
pub use model::{CreateRegisteredUserRequest, CreateUserResponse, User, UserRegistry};
