pub mod certification;
pub mod grading;
pub mod lot;
pub mod price;
