//! Built-in components

mod cinder;
mod nova;
mod os_brick;

pub use cinder::Cinder;
pub use nova::Nova;
pub use os_brick::OsBrick;
