/// The twelve failure-type categories the classifier prompt defines. The
/// model may answer with one label or a comma-separated combination.
pub const FAILURE_CATEGORIES: [&str; 12] = [
    "Beam Generation",
    "Collimation System",
    "Gantry Motion/Structure",
    "Imaging System (KV/MV)",
    "Treatment Couch",
    "Control Hardware",
    "System Networks",
    "Cooling System",
    "Power System/Distribution",
    "Ancillary Room Systems",
    "Safety Systems",
    "Operator Console/UI",
];

/// True when every comma-separated label in `value` is one of the twelve
/// categories. The model output is not validated against this set; it only
/// drives a warning in the batch summary.
pub fn is_known_labels(value: &str) -> bool {
    !value.trim().is_empty()
        && value
            .split(',')
            .all(|label| FAILURE_CATEGORIES.contains(&label.trim()))
}
