mod files;
pub mod live;
pub mod report;
