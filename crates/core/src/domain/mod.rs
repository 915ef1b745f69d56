pub mod approval;
pub mod employee;
pub mod leave;
