use serde::{Deserialize, Serialize};

/// Stamped onto every record regardless of layout.
pub const REPORT_SOURCE: &str = "varian";

/// Every slot a layout rule table can fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    WorkOrderId,
    MachineId,
    Subject,
    Description,
    MalfunctionStart,
    MachineRelease,
    TimeIn,
    TimeOut,
    DownTimeHours,
    SiteHours,
    TravelHours,
    TotalWorkHours,
}

/// One row per source document, immutable once extracted. Field order is the
/// CSV column order. Extracted fields are `Option<String>` because the
/// layouts disagree on their fallback: the work-order layout leaves missing
/// fields null, the other two use an empty string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportRecord {
    pub work_order_id: Option<String>,
    pub machine_id: Option<String>,
    pub subject: Option<String>,
    pub description: Option<String>,
    pub malfunction_start: Option<String>,
    pub machine_release: Option<String>,
    pub time_in: Option<String>,
    pub time_out: Option<String>,
    pub down_time_hours: Option<String>,
    pub site_hours: Option<String>,
    pub travel_hours: Option<String>,
    pub total_work_hours: Option<String>,
    pub report_source: String,
    pub file_name: String,
}

impl ReportRecord {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            report_source: REPORT_SOURCE.to_string(),
            file_name: file_name.into(),
            ..Default::default()
        }
    }

    pub fn set(&mut self, field: Field, value: Option<String>) {
        match field {
            Field::WorkOrderId => self.work_order_id = value,
            Field::MachineId => self.machine_id = value,
            Field::Subject => self.subject = value,
            Field::Description => self.description = value,
            Field::MalfunctionStart => self.malfunction_start = value,
            Field::MachineRelease => self.machine_release = value,
            Field::TimeIn => self.time_in = value,
            Field::TimeOut => self.time_out = value,
            Field::DownTimeHours => self.down_time_hours = value,
            Field::SiteHours => self.site_hours = value,
            Field::TravelHours => self.travel_hours = value,
            Field::TotalWorkHours => self.total_work_hours = value,
        }
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        let value = match field {
            Field::WorkOrderId => &self.work_order_id,
            Field::MachineId => &self.machine_id,
            Field::Subject => &self.subject,
            Field::Description => &self.description,
            Field::MalfunctionStart => &self.malfunction_start,
            Field::MachineRelease => &self.machine_release,
            Field::TimeIn => &self.time_in,
            Field::TimeOut => &self.time_out,
            Field::DownTimeHours => &self.down_time_hours,
            Field::SiteHours => &self.site_hours,
            Field::TravelHours => &self.travel_hours,
            Field::TotalWorkHours => &self.total_work_hours,
        };
        value.as_deref()
    }
}
