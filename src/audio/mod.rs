pub mod chunk;
pub mod decode;
pub mod peaks;
