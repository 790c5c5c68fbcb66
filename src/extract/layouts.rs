use chrono::NaiveDateTime;
use clap::ValueEnum;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

use crate::extract::record::{Field, ReportRecord};
use crate::extract::rules::{FieldRule, apply_rules};

/// The three vendor report layouts in circulation. V1 is the older
/// work-order form, V2 the notification form with a service-time table,
/// V3 the current form with one combined timestamp block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportLayout {
    VarianV1,
    VarianV2,
    VarianV3,
}

// Work-order form. Every field is a labeled single capture; missing
// fields stay null.
static V1_RULES: Lazy<Vec<FieldRule>> = Lazy::new(|| {
    vec![
        FieldRule::new(Field::WorkOrderId, r"Work Order\s+WO-(\d+)", None).prefix("WO-"),
        FieldRule::new(Field::MachineId, r"Asset\s+(\S+)", None),
        FieldRule::new(Field::Subject, r"Subject\s+(.+)", None),
        FieldRule::new(
            Field::Description,
            r"Closure Summary\s+([\s\S]+?)\nWork Order Times",
            None,
        ),
        FieldRule::new(
            Field::MalfunctionStart,
            r"Malfunction Start\s*:\s*([\d/]+ [\d:]+ [APM]+)",
            None,
        ),
        FieldRule::new(
            Field::MachineRelease,
            r"Machine Release\s*([\d/]+ [\d:]+ [APM]+)",
            None,
        ),
        FieldRule::new(Field::TimeIn, r"Time In\s*([\d/]+ [\d:]+ [APM]+)", None),
        FieldRule::new(Field::TimeOut, r"Time Out\s*([\d/]+ [\d:]+ [APM]+)", None),
        FieldRule::new(Field::DownTimeHours, r"Agreed Downtime\s*(\d+\.?\d*)", None),
        FieldRule::new(Field::SiteHours, r"Site Hours\s*(\d+\.?\d*)", None),
        FieldRule::new(Field::TravelHours, r"Travel Hours\s*(\d+\.?\d*)", None),
        FieldRule::new(
            Field::TotalWorkHours,
            r"Total Work Hours\s*(\d+\.?\d*)",
            None,
        ),
    ]
});

// Notification form metadata. Times and hours come from table derivations
// below, not labeled fields.
static V2_RULES: Lazy<Vec<FieldRule>> = Lazy::new(|| {
    vec![
        FieldRule::new(Field::WorkOrderId, r"Notification No\.\s+(\d+)", Some("")),
        FieldRule::new(
            Field::MachineId,
            r"Equipment ID\s+Equipment Name\s+([A-Z0-9]+)",
            Some(""),
        ),
        FieldRule::new(Field::Subject, r"Reason for Call\s+([^\n]+)", Some("")),
        FieldRule::new(
            Field::Description,
            r"(?s)Corrective Action Comments(.*?)Times on site",
            Some(""),
        ),
        FieldRule::new(
            Field::MalfunctionStart,
            r"Event Date\s+([\d/]+\s+\d+:\d+:\d+\s+[AP]M?)",
            Some(""),
        ),
        FieldRule::new(
            Field::MachineRelease,
            r"Equipment Released\s+Customer Signature\s+(\d{1,2}/\d{1,2}/\d{4}\s+\d{1,2}:\d{2}\s+[AP]M)",
            Some(""),
        ),
    ]
});

// Service-time table rows: date, start clock, end clock.
static V2_TIME_TABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{1,2}/\d{1,2}/\d{4})\s+(\d{1,2}:\d{2}\s+[AP]M)\s+(\d{1,2}:\d{2}\s+[AP]M)")
        .unwrap()
});

// Totals line order: travel, work, site.
static V2_HOURS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Total [^\n]*?\s+([\d.]+)\s+([\d.]+)\s+([\d.]+)").unwrap());

// Current form metadata. All four timestamps live in one header block.
static V3_RULES: Lazy<Vec<FieldRule>> = Lazy::new(|| {
    vec![
        FieldRule::new(Field::WorkOrderId, r"Work Order Number\s+(WO-\d+)", Some("")),
        FieldRule::new(
            Field::MachineId,
            r"Installed Product\s+([A-Z0-9]+)",
            Some(""),
        ),
        FieldRule::new(
            Field::Subject,
            r"(?s)Problem Description\s+(.+?)(?:\n|Work Performed Comments)",
            Some(""),
        ),
        FieldRule::new(
            Field::Description,
            r"(?s)Work Performed Comments\s+(.+?)(?:\nFollow Up Comments|\n\n)",
            Some(""),
        ),
    ]
});

static V3_TIMES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"Time In\s+Time Out\s+Malfunction Start\s+Machine Release Time\s+(\d{2}/\d{2}/\d{4} \d{2}:\d{2})\s+(\d{2}/\d{2}/\d{4} \d{2}:\d{2})\s+(\d{2}/\d{2}/\d{4} \d{2}:\d{2})\s+(\d{2}/\d{2}/\d{4} \d{2}:\d{2})",
    )
    .unwrap()
});

static V3_HOURS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"Total Travel Hours\s+Total Work Hours\s+Total Site Hours\s+Agreed Downtime\s*\n([0-9.]+)\s+([0-9.]+)\s+([0-9.]+)",
    )
    .unwrap()
});

impl ReportLayout {
    /// Pure function: full document text to one record. Absence is silent —
    /// a text matching nothing still yields a complete record at the
    /// layout's fallbacks.
    pub fn extract(self, text: &str, file_name: &str) -> ReportRecord {
        let mut record = ReportRecord::new(file_name);
        match self {
            Self::VarianV1 => apply_rules(&V1_RULES, text, &mut record),
            Self::VarianV2 => extract_v2(text, &mut record),
            Self::VarianV3 => extract_v3(text, &mut record),
        }
        record
    }

    /// What goes in the record's `file_name` column. The work-order form
    /// keeps the full file name; the other two use the stem.
    pub fn file_label(self, path: &Path) -> String {
        let name = match self {
            Self::VarianV1 => path.file_name(),
            Self::VarianV2 | Self::VarianV3 => path.file_stem(),
        };
        name.map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

fn extract_v2(text: &str, record: &mut ReportRecord) {
    apply_rules(&V2_RULES, text, record);

    // First row's start time, last row's end time.
    let entries: Vec<_> = V2_TIME_TABLE.captures_iter(text).collect();
    let time_in = entries
        .first()
        .map(|caps| format!("{} {}", &caps[1], &caps[2]))
        .unwrap_or_default();
    let time_out = entries
        .last()
        .map(|caps| format!("{} {}", &caps[1], &caps[3]))
        .unwrap_or_default();
    record.set(Field::TimeIn, Some(time_in));
    record.set(Field::TimeOut, Some(time_out));

    set_hours(&V2_HOURS, text, record);
    set_down_time(record);
}

fn extract_v3(text: &str, record: &mut ReportRecord) {
    apply_rules(&V3_RULES, text, record);

    if let Some(caps) = V3_TIMES.captures(text) {
        record.set(Field::TimeIn, Some(caps[1].to_string()));
        record.set(Field::TimeOut, Some(caps[2].to_string()));
        record.set(Field::MalfunctionStart, Some(caps[3].to_string()));
        record.set(Field::MachineRelease, Some(caps[4].to_string()));
    } else {
        for field in [
            Field::TimeIn,
            Field::TimeOut,
            Field::MalfunctionStart,
            Field::MachineRelease,
        ] {
            record.set(field, Some(String::new()));
        }
    }

    set_hours(&V3_HOURS, text, record);
    set_down_time(record);
}

fn set_hours(pattern: &Regex, text: &str, record: &mut ReportRecord) {
    if let Some(caps) = pattern.captures(text) {
        record.set(Field::TravelHours, Some(caps[1].to_string()));
        record.set(Field::TotalWorkHours, Some(caps[2].to_string()));
        record.set(Field::SiteHours, Some(caps[3].to_string()));
    } else {
        record.set(Field::TravelHours, Some(String::new()));
        record.set(Field::TotalWorkHours, Some(String::new()));
        record.set(Field::SiteHours, Some(String::new()));
    }
}

/// Down time is not a labeled field on the V2/V3 forms; when both event
/// timestamps parse, derive it as their difference in hours.
fn set_down_time(record: &mut ReportRecord) {
    let derived = derive_down_time(
        record.malfunction_start.as_deref(),
        record.machine_release.as_deref(),
    );
    record.set(Field::DownTimeHours, Some(derived.unwrap_or_default()));
}

const TIMESTAMP_FORMATS: [&str; 3] = [
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
    "%m/%d/%Y %H:%M",
];

fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value.trim(), fmt).ok())
}

fn derive_down_time(start: Option<&str>, release: Option<&str>) -> Option<String> {
    let start = parse_timestamp(start?)?;
    let release = parse_timestamp(release?)?;
    let minutes = (release - start).num_minutes();
    (minutes >= 0).then(|| format!("{:.2}", minutes as f64 / 60.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    const V1_TEXT: &str = "Work Order WO-12345\n\
        Asset H191234\n\
        Subject MLC is failing and secondary feedback\n\
        Closure Summary\nReplaced the leaf motor and verified operation.\n\
        Work Order Times\n\
        Malfunction Start : 06/29/2012 07:30 AM\n\
        Machine Release 06/30/2012 04:15 PM\n\
        Time In 06/29/2012 08:00 AM\n\
        Time Out 06/30/2012 04:00 PM\n\
        Agreed Downtime 32.75\n\
        Site Hours 16.0\n\
        Travel Hours 2.5\n\
        Total Work Hours 18.5\n";

    #[test]
    fn test_v1_work_order_id() {
        let record = ReportLayout::VarianV1.extract(V1_TEXT, "wo_12345.pdf");
        assert_eq!(record.work_order_id.as_deref(), Some("WO-12345"));
        assert_eq!(record.machine_id.as_deref(), Some("H191234"));
        assert_eq!(
            record.description.as_deref(),
            Some("Replaced the leaf motor and verified operation.")
        );
        assert_eq!(record.down_time_hours.as_deref(), Some("32.75"));
        assert_eq!(record.report_source, "varian");
        assert_eq!(record.file_name, "wo_12345.pdf");
    }

    #[test]
    fn test_v1_missing_fields_stay_null() {
        let record = ReportLayout::VarianV1.extract("nothing matches here", "x.pdf");
        assert_eq!(record.work_order_id, None);
        assert_eq!(record.subject, None);
        assert_eq!(record.total_work_hours, None);
    }

    #[test]
    fn test_v2_time_table_first_start_last_end() {
        let text = "Notification No. 400123\n\
            Times on site\n\
            6/29/2012 8:00 AM 5:30 PM\n\
            6/30/2012 7:45 AM 4:15 PM\n";
        let record = ReportLayout::VarianV2.extract(text, "report");
        assert_eq!(record.time_in.as_deref(), Some("6/29/2012 8:00 AM"));
        assert_eq!(record.time_out.as_deref(), Some("6/30/2012 4:15 PM"));
        assert_eq!(record.work_order_id.as_deref(), Some("400123"));
    }

    #[test]
    fn test_v2_missing_fields_fall_back_to_empty() {
        let record = ReportLayout::VarianV2.extract("nothing matches here", "x");
        assert_eq!(record.work_order_id.as_deref(), Some(""));
        assert_eq!(record.time_in.as_deref(), Some(""));
        assert_eq!(record.travel_hours.as_deref(), Some(""));
        assert_eq!(record.down_time_hours.as_deref(), Some(""));
    }

    #[test]
    fn test_v2_hours_totals_line() {
        let text = "Total hours for notification 2.50 18.50 16.00\n";
        let record = ReportLayout::VarianV2.extract(text, "r");
        assert_eq!(record.travel_hours.as_deref(), Some("2.50"));
        assert_eq!(record.total_work_hours.as_deref(), Some("18.50"));
        assert_eq!(record.site_hours.as_deref(), Some("16.00"));
    }

    #[test]
    fn test_v3_combined_timestamp_block() {
        let text = "Work Order Number WO-54321\n\
            Installed Product H192222\n\
            Time In Time Out Malfunction Start Machine Release Time\n\
            06/29/2020 08:00 06/29/2020 16:00 06/29/2020 07:30 06/29/2020 16:30\n";
        let record = ReportLayout::VarianV3.extract(text, "r");
        assert_eq!(record.time_in.as_deref(), Some("06/29/2020 08:00"));
        assert_eq!(record.time_out.as_deref(), Some("06/29/2020 16:00"));
        assert_eq!(record.malfunction_start.as_deref(), Some("06/29/2020 07:30"));
        assert_eq!(record.machine_release.as_deref(), Some("06/29/2020 16:30"));
        // Derived from the two event timestamps.
        assert_eq!(record.down_time_hours.as_deref(), Some("9.00"));
    }

    #[test]
    fn test_down_time_derivation_formats() {
        assert_eq!(
            derive_down_time(Some("6/29/2012 7:30:00 AM"), Some("6/29/2012 10:00 AM")),
            Some("2.50".to_string())
        );
        // Release before start is nonsense, left blank.
        assert_eq!(
            derive_down_time(Some("06/29/2020 16:00"), Some("06/29/2020 08:00")),
            None
        );
        assert_eq!(derive_down_time(Some(""), Some("06/29/2020 08:00")), None);
    }

    #[test]
    fn test_file_label_per_layout() {
        let path = Path::new("/reports/wo_1.pdf");
        assert_eq!(ReportLayout::VarianV1.file_label(path), "wo_1.pdf");
        assert_eq!(ReportLayout::VarianV2.file_label(path), "wo_1");
        assert_eq!(ReportLayout::VarianV3.file_label(path), "wo_1");
    }
}
