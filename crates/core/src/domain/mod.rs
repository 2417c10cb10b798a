pub mod history;
pub mod listing;
pub mod result;
