pub mod capture;
pub mod check;
pub mod crop;
pub mod init_config;
pub mod simulate;
