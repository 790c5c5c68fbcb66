pub mod layouts;
pub mod pdf;
pub mod record;
pub mod rules;

pub use layouts::ReportLayout;
pub use record::ReportRecord;
