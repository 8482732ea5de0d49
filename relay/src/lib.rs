#[cfg(not(unix))]
compile_error!("Only unix targets are currently supported");

pub mod controller;
