pub mod gnews;
pub mod newsapi;

pub use gnews::GNewsSource;
pub use newsapi::NewsApiSource;
