//! Controller firmware protocols

pub mod grbl;
