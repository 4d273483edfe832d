pub mod traits;
pub mod tvdb;
pub mod youtube;
