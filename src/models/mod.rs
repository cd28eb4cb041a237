pub mod appointment;
pub mod doctor;
pub mod enums;
pub mod filters;
pub mod prescription;
pub mod user;

pub use appointment::*;
pub use doctor::*;
pub use enums::*;
pub use filters::*;
pub use prescription::*;
pub use user::*;
