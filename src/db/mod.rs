pub mod access;
pub mod principals;
pub mod records;
