pub mod elements;
pub mod error;
pub mod passes;
pub mod reminders;
pub mod settings;
