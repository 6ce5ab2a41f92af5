pub mod client;

pub use client::ComfyUIClient;
