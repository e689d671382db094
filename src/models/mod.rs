mod auth;
mod checkout;
mod product;
mod response;
mod user;

pub use auth::*;
pub use checkout::*;
pub use product::*;
pub use response::*;
pub use user::*;
