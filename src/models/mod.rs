pub mod activity;
pub mod admin;
pub mod agency;
pub mod contact;
pub mod message;
pub mod plan;
pub mod project;
pub mod response;
pub mod reveal;
pub mod review;
pub mod settings;
pub mod ticket;
pub mod user_override;
