pub mod persistence;
pub mod push;
pub mod transport;
