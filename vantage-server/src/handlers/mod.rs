pub mod exports;
pub mod logs;
pub mod records;
pub mod scans;
pub mod schedules;
