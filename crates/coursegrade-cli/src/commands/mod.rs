pub mod check;
pub mod compare;
pub mod grade;
pub mod init;
pub mod questions;
pub mod validate;
