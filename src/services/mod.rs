pub mod audit;
pub mod boards;
pub mod members;
pub mod visibility;
