//! Step definitions and the prompt contract handed to the presentation layer.
//!
//! A step is a tagged variant carrying whatever index it needs, so the step
//! list never captures outer state. Rendering a step produces a [`Prompt`];
//! the presentation layer answers it with an [`Answer`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::answers::{AnswerStore, fields};
use crate::vehicles::DecodedVehicle;

pub const HOME_STATUS_OPTIONS: &[&str] = &["Rent", "Own"];
pub const COVERAGE_OPTIONS: &[&str] = &["Liability", "Full"];
pub const DEDUCTIBLE_OPTIONS: &[&str] = &["$250", "$500", "$1000"];
pub const DRIVER_COUNT_OPTIONS: &[&str] = &["1", "2", "3"];
pub const GENDER_OPTIONS: &[&str] = &["Male", "Female", "Other"];
pub const MARITAL_OPTIONS: &[&str] = &["Single", "Married"];
pub const YES_NO_OPTIONS: &[&str] = &["Yes", "No"];
pub const COMPANY_OPTIONS: &[&str] = &["Geico", "Progressive", "Allstate", "Other"];
pub const DURATION_OPTIONS: &[&str] = &["1", "2", "3", "4", "5+"];
pub const BILLING_OPTIONS: &[&str] = &["Monthly", "Every 6 Months"];
pub const LIMIT_OPTIONS: &[&str] = &["25/50", "50/100", "100/300", "Greater"];

pub const US_STATES: &[&str] = &[
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "FL", "GA", "HI", "ID", "IL", "IN", "IA", "KS",
    "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH", "NJ", "NM", "NY",
    "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VT", "VA", "WA", "WV",
    "WI", "WY",
];

/// Youngest and oldest allowed driver age, used for date-of-birth year options.
const MIN_DRIVER_AGE: i32 = 18;
const MAX_DRIVER_AGE: i32 = 100;

/// One entry of the step list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "index", rename_all = "snake_case")]
pub enum StepKind {
    Personal,
    Contact,
    Address,
    HomeStatus,
    Vehicles,
    VehicleCoverage(usize),
    VehicleDeductible(usize),
    DriverCount,
    DriverName(usize),
    DriverLicense(usize),
    DriverGender(usize),
    DriverMarital(usize),
    DriverViolations(usize),
    DriverDefensive(usize),
    CurrentlyInsured,
    CurrentCompany,
    CurrentDuration,
    CurrentPremium,
    BillingFrequency,
    DesiredLimits,
}

/// The step list a flow starts with once the entry gate passes.
pub fn base_steps() -> Vec<StepKind> {
    vec![
        StepKind::Personal,
        StepKind::Contact,
        StepKind::Address,
        StepKind::HomeStatus,
        StepKind::Vehicles,
        StepKind::DriverCount,
    ]
}

impl StepKind {
    /// Fixed option set for single-choice steps, `None` for everything else.
    pub fn options(&self) -> Option<&'static [&'static str]> {
        use StepKind::*;
        match self {
            HomeStatus => Some(HOME_STATUS_OPTIONS),
            VehicleCoverage(_) => Some(COVERAGE_OPTIONS),
            VehicleDeductible(_) => Some(DEDUCTIBLE_OPTIONS),
            DriverCount => Some(DRIVER_COUNT_OPTIONS),
            DriverGender(_) => Some(GENDER_OPTIONS),
            DriverMarital(_) => Some(MARITAL_OPTIONS),
            DriverViolations(_) | DriverDefensive(_) | CurrentlyInsured => Some(YES_NO_OPTIONS),
            CurrentCompany => Some(COMPANY_OPTIONS),
            CurrentDuration => Some(DURATION_OPTIONS),
            BillingFrequency => Some(BILLING_OPTIONS),
            DesiredLimits => Some(LIMIT_OPTIONS),
            Personal | Contact | Address | Vehicles | DriverName(_) | DriverLicense(_)
            | CurrentPremium => None,
        }
    }

    /// Whether rendering this step needs the offline vehicle catalog.
    pub fn needs_catalog(&self) -> bool {
        matches!(self, Self::Vehicles)
    }

    pub fn title(&self) -> String {
        use StepKind::*;
        match self {
            Personal => "Your Name".into(),
            Contact => "Contact Details".into(),
            Address => "Your Address".into(),
            HomeStatus => "Do you rent or own your home?".into(),
            Vehicles => "Your Vehicles".into(),
            VehicleCoverage(i) => format!("Vehicle {} - Coverage type", i + 1),
            VehicleDeductible(i) => format!("Vehicle {} - Deductible", i + 1),
            DriverCount => "How many drivers?".into(),
            DriverName(i) => format!("Driver {} - Name & DOB", i + 1),
            DriverLicense(i) => format!("Driver {} - License Number", i + 1),
            DriverGender(i) => format!("Driver {} - Gender", i + 1),
            DriverMarital(i) => format!("Driver {} - Marital Status", i + 1),
            DriverViolations(i) => format!("Driver {} - Any violations in 36 months?", i + 1),
            DriverDefensive(i) => format!("Driver {} - Defensive driver course?", i + 1),
            CurrentlyInsured => "Are you currently insured?".into(),
            CurrentCompany => "Current company?".into(),
            CurrentDuration => "How long with current company?".into(),
            CurrentPremium => "Current premium ($)".into(),
            BillingFrequency => "Billing frequency?".into(),
            DesiredLimits => "Desired coverage limits?".into(),
        }
    }

    /// Build the presentable question for this step.
    ///
    /// `catalog_years` is only consulted by [`StepKind::Vehicles`]; it is
    /// empty when the catalog could not be loaded.
    pub fn prompt(&self, ctx: &PromptContext<'_>) -> Prompt {
        let input = match self {
            Self::Personal | Self::DriverName(_) => PromptInput::Form {
                fields: identity_fields(ctx.current_year),
            },
            Self::Contact => PromptInput::Form {
                fields: vec![
                    FormField::text("email", "Email", FieldKind::Email),
                    FormField::text("phone", "Phone", FieldKind::Tel),
                ],
            },
            Self::Address => PromptInput::Form {
                fields: vec![
                    FormField::text("street", "Street address", FieldKind::Text),
                    FormField::text("city", "City", FieldKind::Text),
                    FormField::select("state", "State", US_STATES.iter().map(|s| s.to_string())),
                    FormField::text("zip", "ZIP", FieldKind::Text)
                        .with_default(ctx.answers.text(fields::ZIP)),
                ],
            },
            Self::DriverLicense(_) => PromptInput::Form {
                fields: vec![FormField::text("license", "License number", FieldKind::Text)],
            },
            Self::CurrentPremium => PromptInput::Form {
                fields: vec![FormField::text("premium", "Current premium", FieldKind::Text)],
            },
            Self::Vehicles => PromptInput::VehicleEntry {
                years: ctx.catalog_years.to_vec(),
                vehicles: recorded_vehicles(ctx.answers),
                decoded: ctx.decoded.cloned(),
            },
            other => PromptInput::Choice {
                options: other
                    .options()
                    .unwrap_or_default()
                    .iter()
                    .map(|o| o.to_string())
                    .collect(),
            },
        };

        Prompt {
            step: *self,
            title: self.title(),
            input,
            can_go_back: ctx.position > 0 && *self != Self::Personal,
        }
    }
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use StepKind::*;
        match self {
            Personal => write!(f, "personal"),
            Contact => write!(f, "contact"),
            Address => write!(f, "address"),
            HomeStatus => write!(f, "home_status"),
            Vehicles => write!(f, "vehicles"),
            VehicleCoverage(i) => write!(f, "vehicle_coverage_{i}"),
            VehicleDeductible(i) => write!(f, "vehicle_deductible_{i}"),
            DriverCount => write!(f, "driver_count"),
            DriverName(i) => write!(f, "driver_name_{i}"),
            DriverLicense(i) => write!(f, "driver_license_{i}"),
            DriverGender(i) => write!(f, "driver_gender_{i}"),
            DriverMarital(i) => write!(f, "driver_marital_{i}"),
            DriverViolations(i) => write!(f, "driver_violations_{i}"),
            DriverDefensive(i) => write!(f, "driver_defensive_{i}"),
            CurrentlyInsured => write!(f, "currently_insured"),
            CurrentCompany => write!(f, "current_company"),
            CurrentDuration => write!(f, "current_duration"),
            CurrentPremium => write!(f, "current_premium"),
            BillingFrequency => write!(f, "billing_frequency"),
            DesiredLimits => write!(f, "desired_limits"),
        }
    }
}

/// Everything a step needs to render itself.
pub struct PromptContext<'a> {
    pub answers: &'a AnswerStore,
    pub catalog_years: &'a [String],
    pub decoded: Option<&'a DecodedVehicle>,
    pub position: usize,
    pub current_year: i32,
}

/// A presentable question. Each render starts from the step's own defaults;
/// previously recorded answers are not pre-filled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    pub step: StepKind,
    pub title: String,
    pub input: PromptInput,
    pub can_go_back: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PromptInput {
    /// One button per option; picking one completes the step.
    Choice { options: Vec<String> },
    /// Free inputs submitted together.
    Form { fields: Vec<FormField> },
    /// Repeatable vehicle entry by VIN or catalog year/make/model.
    VehicleEntry {
        years: Vec<String>,
        vehicles: Vec<VehicleSummary>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        decoded: Option<DecodedVehicle>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormField {
    pub name: String,
    pub label: String,
    pub kind: FieldKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl FormField {
    fn text(name: &str, label: &str, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            kind,
            options: Vec::new(),
            default: None,
        }
    }

    fn select(name: &str, label: &str, options: impl IntoIterator<Item = String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            kind: FieldKind::Select,
            options: options.into_iter().collect(),
            default: None,
        }
    }

    fn with_default(mut self, value: String) -> Self {
        if !value.is_empty() {
            self.default = Some(value);
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Email,
    Tel,
    Select,
}

/// One already-added vehicle, as listed under the vehicle entry step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleSummary {
    pub index: usize,
    pub year: String,
    pub make: String,
    pub model: String,
}

impl std::fmt::Display for VehicleSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.year, self.make, self.model)
    }
}

/// What the presentation layer sends back to complete (or act on) a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Answer {
    /// A single option picked on a choice step.
    Choice { value: String },
    /// Input values of a form step keyed by field name.
    Form {
        #[serde(default)]
        values: BTreeMap<String, String>,
    },
    /// Add one vehicle on the vehicle entry step.
    AddVehicle {
        year: String,
        make: String,
        model: String,
        #[serde(default)]
        vin: String,
    },
    /// Leave the vehicle entry step.
    Continue,
}

fn identity_fields(current_year: i32) -> Vec<FormField> {
    let months = (1..=12).map(|m| m.to_string());
    let days = (1..=31).map(|d| d.to_string());
    let years = ((current_year - MAX_DRIVER_AGE)..=(current_year - MIN_DRIVER_AGE))
        .rev()
        .map(|y| y.to_string());
    vec![
        FormField::text("firstName", "First name", FieldKind::Text),
        FormField::text("lastName", "Last name", FieldKind::Text),
        FormField::select("dobMonth", "MM", months),
        FormField::select("dobDay", "DD", days),
        FormField::select("dobYear", "YYYY", years),
    ]
}

fn recorded_vehicles(answers: &AnswerStore) -> Vec<VehicleSummary> {
    (0..answers.count(fields::VEHICLE_COUNT))
        .map(|i| VehicleSummary {
            index: i,
            year: answers.text(&fields::indexed(fields::VEHICLE_YEAR, i)),
            make: answers.text(&fields::indexed(fields::VEHICLE_MAKE, i)),
            model: answers.text(&fields::indexed(fields::VEHICLE_MODEL, i)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>(answers: &'a AnswerStore, years: &'a [String], position: usize) -> PromptContext<'a> {
        PromptContext {
            answers,
            catalog_years: years,
            decoded: None,
            position,
            current_year: 2026,
        }
    }

    #[test]
    fn base_steps_end_with_driver_count() {
        let steps = base_steps();
        assert_eq!(steps.len(), 6);
        assert_eq!(steps[0], StepKind::Personal);
        assert_eq!(steps[4], StepKind::Vehicles);
        assert_eq!(steps[5], StepKind::DriverCount);
    }

    #[test]
    fn choice_steps_render_their_options() {
        let answers = AnswerStore::new();
        let prompt = StepKind::VehicleCoverage(1).prompt(&ctx(&answers, &[], 3));
        assert_eq!(prompt.title, "Vehicle 2 - Coverage type");
        assert_eq!(
            prompt.input,
            PromptInput::Choice {
                options: vec!["Liability".into(), "Full".into()]
            }
        );
        assert!(prompt.can_go_back);
    }

    #[test]
    fn personal_step_hides_back_and_bounds_birth_years() {
        let answers = AnswerStore::new();
        let prompt = StepKind::Personal.prompt(&ctx(&answers, &[], 0));
        assert!(!prompt.can_go_back);

        let PromptInput::Form { fields } = prompt.input else {
            panic!("expected form input");
        };
        let years = &fields.iter().find(|f| f.name == "dobYear").unwrap().options;
        assert_eq!(years.first().map(String::as_str), Some("2008"));
        assert_eq!(years.last().map(String::as_str), Some("1926"));
        assert_eq!(years.len(), 83);
    }

    #[test]
    fn address_prefills_gate_zip() {
        let mut answers = AnswerStore::new();
        answers.set(fields::ZIP, "10001");
        let prompt = StepKind::Address.prompt(&ctx(&answers, &[], 2));
        let PromptInput::Form { fields } = prompt.input else {
            panic!("expected form input");
        };
        let zip = fields.iter().find(|f| f.name == "zip").unwrap();
        assert_eq!(zip.default.as_deref(), Some("10001"));
        let state = fields.iter().find(|f| f.name == "state").unwrap();
        assert_eq!(state.options.len(), 50);
    }

    #[test]
    fn vehicle_entry_lists_recorded_vehicles() {
        let mut answers = AnswerStore::new();
        answers.set(fields::indexed(fields::VEHICLE_YEAR, 0), "2019");
        answers.set(fields::indexed(fields::VEHICLE_MAKE, 0), "HONDA");
        answers.set(fields::indexed(fields::VEHICLE_MODEL, 0), "Civic");
        answers.set(fields::VEHICLE_COUNT, 1usize);
        let years = vec!["2019".to_string(), "2020".to_string()];

        let prompt = StepKind::Vehicles.prompt(&ctx(&answers, &years, 4));
        let PromptInput::VehicleEntry { years, vehicles, decoded } = prompt.input else {
            panic!("expected vehicle entry");
        };
        assert_eq!(years.len(), 2);
        assert_eq!(vehicles.len(), 1);
        assert_eq!(vehicles[0].to_string(), "2019 HONDA Civic");
        assert!(decoded.is_none());
    }

    #[test]
    fn step_kind_serde_carries_index() {
        let json = serde_json::to_value(StepKind::DriverLicense(2)).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "driver_license", "index": 2}));
        let parsed: StepKind = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, StepKind::DriverLicense(2));
    }

    #[test]
    fn answer_deserializes_from_tagged_json() {
        let answer: Answer =
            serde_json::from_str(r#"{"type": "choice", "value": "Own"}"#).unwrap();
        assert_eq!(answer, Answer::Choice { value: "Own".into() });

        let answer: Answer = serde_json::from_str(
            r#"{"type": "add_vehicle", "year": "2020", "make": "FORD", "model": "F-150"}"#,
        )
        .unwrap();
        assert!(matches!(answer, Answer::AddVehicle { ref vin, .. } if vin.is_empty()));

        let answer: Answer = serde_json::from_str(r#"{"type": "continue"}"#).unwrap();
        assert_eq!(answer, Answer::Continue);
    }
}
