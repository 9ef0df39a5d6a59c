pub mod ai_reply;
pub mod greeter;
