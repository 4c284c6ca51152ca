pub mod config;
pub mod elements;
pub mod notify;
pub mod predict;
pub mod shared;
pub mod source;
pub mod web;
