pub mod book;
pub mod common;
pub mod engagement;
pub mod log;
pub mod media;
pub mod message;
pub mod post;
pub mod product;
pub mod tag;
pub mod user;

pub use book::*;
pub use common::*;
pub use engagement::*;
pub use log::*;
pub use media::*;
pub use message::*;
pub use post::*;
pub use product::*;
pub use tag::*;
pub use user::*;
