pub mod clock_time;

pub mod config;

pub mod display;

pub mod feed;

pub mod logging;

pub mod tenths {
    pub const TENTHS_PER_SEC: u64 = 10;
    pub const MILLIS_PER_TENTH: u64 = 100;
    pub const MAX_EDITABLE_SECS: u64 = 99;
}
