pub mod gpx;
pub mod samples;
