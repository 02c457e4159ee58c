pub mod auth;
pub mod book;
pub mod catalog;
pub mod engagement;
pub mod export;
pub mod listing;
pub mod log;
pub mod media;
pub mod message;
pub mod post;
pub mod product;
pub mod publish;
pub mod reading_time;
pub mod slug;
pub mod tag;
pub mod user;

pub use auth::AuthService;
pub use book::BookService;
pub use catalog::CatalogService;
pub use engagement::EngagementService;
pub use log::LogService;
pub use media::MediaService;
pub use message::MessageService;
pub use post::PostService;
pub use product::ProductService;
pub use tag::TagService;
pub use user::UserService;
