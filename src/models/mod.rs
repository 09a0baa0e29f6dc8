mod dead_letter;
mod membership;
mod organization;
mod user;

pub use dead_letter::*;
pub use membership::*;
pub use organization::*;
pub use user::*;
