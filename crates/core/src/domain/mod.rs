pub mod agent;
pub mod lead;
