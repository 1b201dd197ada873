use std::future::Future;
use std::pin::Pin;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub mod applications;
pub mod bus;
pub mod db;
pub mod dedup;
pub mod delivery;
pub mod fifo;
pub mod grants;
