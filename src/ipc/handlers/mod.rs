pub mod admin;
pub mod core;
pub mod map;
pub mod notifications;
pub mod onboarding;
pub mod recommendations;
pub mod scoring;
pub mod session;
