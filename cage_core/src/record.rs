//! Per-animal dosing and weight state, one row of the registry table.
use std::fmt;

use cage_traits::TagId;

/// Treatment column of the registry. `DRUG` puts the animal on drug solution;
/// any other label is a control group and is written back unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Treatment {
    Drug,
    Control(String),
}

impl Treatment {
    pub fn parse(label: &str) -> Self {
        match label.trim() {
            "DRUG" => Treatment::Drug,
            other => Treatment::Control(other.to_string()),
        }
    }
}

impl fmt::Display for Treatment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Treatment::Drug => f.write_str("DRUG"),
            Treatment::Control(label) => f.write_str(label),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnimalRecord {
    pub tag: TagId,
    pub name: String,
    pub treatment: Treatment,
    /// Day of month the record was last rolled over on (not a full date).
    pub last_seen_day: u32,
    /// Completed experiment days.
    pub day_index: u32,
    pub drug_drops_today: u32,
    pub water_drops_today: u32,
    pub required_drug_drops_today: u32,
    pub reference_weight_g: f32,
    /// Columns past the ninth, written back unchanged.
    pub extra: Vec<String>,
}

impl AnimalRecord {
    /// Fresh registration: everything zeroed, rolled over on `today`.
    pub fn new(tag: TagId, name: impl Into<String>, treatment: Treatment, today: u32) -> Self {
        Self {
            tag,
            name: name.into(),
            treatment,
            last_seen_day: today,
            day_index: 0,
            drug_drops_today: 0,
            water_drops_today: 0,
            required_drug_drops_today: 0,
            reference_weight_g: 0.0,
            extra: Vec::new(),
        }
    }

    pub fn on_treatment(&self) -> bool {
        self.treatment == Treatment::Drug
    }

    /// Troubleshooting tags carry `TEST` in their name and skip daily bookkeeping.
    pub fn is_test_tag(&self) -> bool {
        self.name.contains("TEST")
    }

    pub fn drops_today(&self) -> u32 {
        self.drug_drops_today + self.water_drops_today
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn treatment_labels_round_trip() {
        assert_eq!(Treatment::parse("DRUG"), Treatment::Drug);
        let ctrl = Treatment::parse("SALINE");
        assert_eq!(ctrl.to_string(), "SALINE");
        assert!(!AnimalRecord::new(TagId(1), "m1", ctrl, 1).on_treatment());
    }

    #[test]
    fn test_tags_are_recognized_by_name() {
        let r = AnimalRecord::new(TagId(9), "TEST_card", Treatment::Drug, 1);
        assert!(r.is_test_tag());
    }
}
