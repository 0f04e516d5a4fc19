pub mod decrypt;
pub mod gzip;
pub mod trusted_subnet;
