// Reply generation: the Responder capability and its OpenAI-backed client.

pub mod client;
pub mod prompt;

pub use client::{OpenAiResponder, Responder, ResponderClient, ResponderError};
