pub mod admin;
pub mod audio;
pub mod health;
