pub mod application;
pub mod delivery;
pub mod error;
pub mod fifo;
pub mod grant;
pub mod inbox;
pub mod intake;
pub mod ports;
pub mod processes;
pub mod transition;
pub mod util;

pub type DomainResult<T> = Result<T, error::DomainError>;
