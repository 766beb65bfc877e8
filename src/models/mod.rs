pub mod access;
pub mod pagination;
pub mod principals;
pub mod records;
