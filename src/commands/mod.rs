pub mod chat;
pub mod cleanup;
pub mod convert;
pub mod lifecycle;
pub mod run;
pub mod score;
pub mod status;
