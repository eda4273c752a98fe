pub mod cli;
pub mod naming;
pub mod paths;
pub mod size;
pub mod state;
pub mod validation;
