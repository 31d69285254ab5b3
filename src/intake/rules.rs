//! Branching rules — what completing each step records and how it moves
//! the engine.
//!
//! Every handler either leaves the cursor where it is (rejecting the answer,
//! or recording a vehicle on the repeatable vehicle step) or performs exactly
//! one transition. Steps that grow the list insert before advancing.

use std::collections::BTreeMap;

use serde::Serialize;

use super::answers::{AnswerStore, fields};
use super::engine::{StepEngine, Transition};
use super::step::{Answer, StepKind};
use crate::error::EngineError;

/// Number of insurance-history steps that follow "currently insured".
const HISTORY_STEP_COUNT: usize = 4;

/// Outcome of answering the current step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outcome {
    /// The engine moved (advance, skip, or completion).
    Moved { transition: Transition },
    /// A vehicle was recorded; the vehicle step stays current.
    VehicleAdded { index: usize, count: usize },
    /// The answer was not accepted; nothing was recorded or moved.
    Rejected { reason: Rejection },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum Rejection {
    #[error("Answer type does not match step {step}")]
    UnexpectedAnswer { step: String },

    #[error("{value:?} is not one of the options for {step}")]
    InvalidChoice { step: String, value: String },

    #[error("Year, make and model are all required")]
    IncompleteVehicle,

    #[error("Add at least one vehicle before continuing")]
    NoVehicles,
}

/// Apply `answer` to `step`, the step currently under the cursor.
///
/// Rejections are outcomes, not errors; only engine invariant violations
/// come back as `Err`.
pub fn complete(
    step: StepKind,
    answer: Answer,
    answers: &mut AnswerStore,
    engine: &mut StepEngine,
) -> Result<Outcome, EngineError> {
    match dispatch(step, answer, answers, engine) {
        Ok(outcome) => Ok(outcome),
        Err(Halt::Reject(reason)) => {
            tracing::debug!(step = %step, %reason, "Answer rejected");
            Ok(Outcome::Rejected { reason })
        }
        Err(Halt::Engine(e)) => {
            debug_assert!(false, "engine invariant violated: {e}");
            Err(e)
        }
    }
}

/// Why a handler stopped before moving the cursor.
enum Halt {
    Reject(Rejection),
    Engine(EngineError),
}

impl From<Rejection> for Halt {
    fn from(r: Rejection) -> Self {
        Self::Reject(r)
    }
}

impl From<EngineError> for Halt {
    fn from(e: EngineError) -> Self {
        Self::Engine(e)
    }
}

fn dispatch(
    step: StepKind,
    answer: Answer,
    answers: &mut AnswerStore,
    engine: &mut StepEngine,
) -> Result<Outcome, Halt> {
    use StepKind::*;

    match step {
        Vehicles => return vehicle_entry(answer, answers, engine),
        Personal => {
            let values = form(step, answer)?;
            record_identity(answers, &values, IdentityKeys::applicant());
        }
        DriverName(i) => {
            let values = form(step, answer)?;
            record_identity(answers, &values, IdentityKeys::driver(i));
        }
        Contact => {
            let values = form(step, answer)?;
            answers.set(fields::EMAIL, value(&values, "email"));
            answers.set(fields::PHONE, value(&values, "phone"));
        }
        Address => {
            let values = form(step, answer)?;
            answers.set(fields::STREET, value(&values, "street"));
            answers.set(fields::CITY, value(&values, "city"));
            answers.set(fields::STATE, value(&values, "state"));
            if values.contains_key("zip") {
                answers.set(fields::ZIP, value(&values, "zip"));
            }
        }
        DriverLicense(i) => {
            let values = form(step, answer)?;
            answers.set(
                fields::indexed(fields::DRIVER_LICENSE, i),
                value(&values, "license"),
            );
        }
        CurrentPremium => {
            let values = form(step, answer)?;
            answers.set(fields::CURRENT_PREMIUM, value(&values, "premium"));
        }
        VehicleCoverage(i) => {
            let choice = choice(step, answer)?;
            answers.set(fields::indexed(fields::VEHICLE_COVERAGE, i), choice.as_str());
            if choice == "Liability" {
                answers.set(fields::indexed(fields::VEHICLE_DEDUCTIBLE, i), "");
                return moved(engine.skip(1)?);
            }
        }
        DriverCount => {
            let choice = choice(step, answer)?;
            let count: usize = choice.parse().unwrap_or(1);
            answers.set(fields::DRIVER_COUNT, count);
            copy_applicant_into_first_driver(answers);
            engine.insert_steps(driver_block(count))?;
        }
        CurrentlyInsured => {
            let choice = choice(step, answer)?;
            answers.set(fields::CURRENTLY_INSURED, choice.as_str());
            if choice == "No" {
                for key in [
                    fields::CURRENT_COMPANY,
                    fields::CURRENT_DURATION,
                    fields::CURRENT_PREMIUM,
                    fields::BILLING_FREQ,
                ] {
                    answers.set(key, "");
                }
                return moved(engine.skip(HISTORY_STEP_COUNT)?);
            }
        }
        other => {
            let choice = choice(other, answer)?;
            answers.set(choice_key(other), choice);
        }
    }

    moved(engine.advance()?)
}

/// Steps inserted once the number of drivers is known: a block per driver
/// (the first driver reuses the applicant's identity, so gets no name step),
/// then insurance history and desired limits.
pub fn driver_block(count: usize) -> Vec<StepKind> {
    use StepKind::*;

    let mut steps = Vec::with_capacity(count * 6 + 6);
    for i in 0..count {
        if i > 0 {
            steps.push(DriverName(i));
        }
        steps.extend([
            DriverLicense(i),
            DriverGender(i),
            DriverMarital(i),
            DriverViolations(i),
            DriverDefensive(i),
        ]);
    }
    steps.extend([
        CurrentlyInsured,
        CurrentCompany,
        CurrentDuration,
        CurrentPremium,
        BillingFrequency,
        DesiredLimits,
    ]);
    steps
}

/// Coverage and deductible steps for each recorded vehicle.
pub fn vehicle_block(count: usize) -> Vec<StepKind> {
    (0..count)
        .flat_map(|i| [StepKind::VehicleCoverage(i), StepKind::VehicleDeductible(i)])
        .collect()
}

fn vehicle_entry(
    answer: Answer,
    answers: &mut AnswerStore,
    engine: &mut StepEngine,
) -> Result<Outcome, Halt> {
    match answer {
        Answer::AddVehicle {
            year,
            make,
            model,
            vin,
        } => {
            let (year, make, model) = (year.trim(), make.trim(), model.trim());
            if year.is_empty() || make.is_empty() || model.is_empty() {
                return Err(Rejection::IncompleteVehicle.into());
            }
            let index = answers.count(fields::VEHICLE_COUNT);
            answers.set(fields::indexed(fields::VEHICLE_YEAR, index), year);
            answers.set(fields::indexed(fields::VEHICLE_MAKE, index), make);
            answers.set(fields::indexed(fields::VEHICLE_MODEL, index), model);
            answers.set(fields::indexed(fields::VEHICLE_VIN, index), vin.trim());
            answers.set(fields::VEHICLE_COUNT, index + 1);
            // The entry form starts over for the next vehicle.
            engine.renew();
            tracing::debug!(index, "Vehicle recorded");
            Ok(Outcome::VehicleAdded {
                index,
                count: index + 1,
            })
        }
        Answer::Continue => {
            let count = answers.count(fields::VEHICLE_COUNT);
            if count == 0 {
                return Err(Rejection::NoVehicles.into());
            }
            engine.insert_steps(vehicle_block(count))?;
            moved(engine.advance()?)
        }
        _ => Err(Rejection::UnexpectedAnswer {
            step: StepKind::Vehicles.to_string(),
        }
        .into()),
    }
}

/// Store keys for a person's name and date of birth.
struct IdentityKeys {
    first: String,
    last: String,
    month: String,
    day: String,
    year: String,
}

impl IdentityKeys {
    fn applicant() -> Self {
        Self {
            first: fields::FIRST_NAME.into(),
            last: fields::LAST_NAME.into(),
            month: fields::DOB_MONTH.into(),
            day: fields::DOB_DAY.into(),
            year: fields::DOB_YEAR.into(),
        }
    }

    fn driver(i: usize) -> Self {
        Self {
            first: fields::indexed(fields::DRIVER_FIRST, i),
            last: fields::indexed(fields::DRIVER_LAST, i),
            month: fields::indexed(fields::DRIVER_DOB_MONTH, i),
            day: fields::indexed(fields::DRIVER_DOB_DAY, i),
            year: fields::indexed(fields::DRIVER_DOB_YEAR, i),
        }
    }
}

fn record_identity(
    answers: &mut AnswerStore,
    values: &BTreeMap<String, String>,
    keys: IdentityKeys,
) {
    answers.set(keys.first, value(values, "firstName"));
    answers.set(keys.last, value(values, "lastName"));
    answers.set(keys.month, value(values, "dobMonth"));
    answers.set(keys.day, value(values, "dobDay"));
    answers.set(keys.year, value(values, "dobYear"));
}

fn copy_applicant_into_first_driver(answers: &mut AnswerStore) {
    let from = IdentityKeys::applicant();
    let to = IdentityKeys::driver(0);
    for (src, dst) in [
        (from.first, to.first),
        (from.last, to.last),
        (from.month, to.month),
        (from.day, to.day),
        (from.year, to.year),
    ] {
        let v = answers.text(&src);
        answers.set(dst, v);
    }
}

/// Store key for plain single-choice steps.
fn choice_key(step: StepKind) -> String {
    use StepKind::*;
    match step {
        HomeStatus => fields::HOME_STATUS.into(),
        VehicleDeductible(i) => fields::indexed(fields::VEHICLE_DEDUCTIBLE, i),
        DriverGender(i) => fields::indexed(fields::DRIVER_GENDER, i),
        DriverMarital(i) => fields::indexed(fields::DRIVER_MARITAL, i),
        DriverViolations(i) => fields::indexed(fields::DRIVER_VIOLATIONS, i),
        DriverDefensive(i) => fields::indexed(fields::DRIVER_DEFENSIVE, i),
        CurrentCompany => fields::CURRENT_COMPANY.into(),
        CurrentDuration => fields::CURRENT_DURATION.into(),
        BillingFrequency => fields::BILLING_FREQ.into(),
        DesiredLimits => fields::DESIRED_LIMITS.into(),
        other => {
            debug_assert!(false, "{other} is not a plain choice step");
            other.to_string()
        }
    }
}

fn choice(step: StepKind, answer: Answer) -> Result<String, Rejection> {
    let Answer::Choice { value } = answer else {
        return Err(Rejection::UnexpectedAnswer {
            step: step.to_string(),
        });
    };
    let options = step.options().unwrap_or_default();
    if options.contains(&value.as_str()) {
        Ok(value)
    } else {
        Err(Rejection::InvalidChoice {
            step: step.to_string(),
            value,
        })
    }
}

fn form(step: StepKind, answer: Answer) -> Result<BTreeMap<String, String>, Rejection> {
    match answer {
        Answer::Form { values } => Ok(values),
        _ => Err(Rejection::UnexpectedAnswer {
            step: step.to_string(),
        }),
    }
}

fn value(values: &BTreeMap<String, String>, name: &str) -> String {
    values.get(name).map(|v| v.trim().to_string()).unwrap_or_default()
}

fn moved(transition: Transition) -> Result<Outcome, Halt> {
    Ok(Outcome::Moved { transition })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::engine::EngineState;
    use crate::intake::step::base_steps;

    struct Flow {
        engine: StepEngine,
        answers: AnswerStore,
    }

    impl Flow {
        fn start() -> Self {
            let mut engine = StepEngine::new();
            engine.initialize(base_steps()).unwrap();
            engine.advance().unwrap();
            Self {
                engine,
                answers: AnswerStore::new(),
            }
        }

        fn answer(&mut self, answer: Answer) -> Outcome {
            let step = self.engine.current().expect("engine should be on a step");
            complete(step, answer, &mut self.answers, &mut self.engine).unwrap()
        }

        fn pick(&mut self, value: &str) -> Outcome {
            self.answer(Answer::Choice {
                value: value.into(),
            })
        }

        fn fill(&mut self, pairs: &[(&str, &str)]) -> Outcome {
            self.answer(Answer::Form {
                values: pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            })
        }

        fn add_vehicle(&mut self, year: &str, make: &str, model: &str) -> Outcome {
            self.answer(Answer::AddVehicle {
                year: year.into(),
                make: make.into(),
                model: model.into(),
                vin: String::new(),
            })
        }

        fn current(&self) -> StepKind {
            self.engine.current().unwrap()
        }

        /// Answer the base steps up to (not including) the driver count.
        fn through_vehicles(&mut self, vehicles: usize) {
            self.fill(&[
                ("firstName", " Ada "),
                ("lastName", "Lovelace"),
                ("dobMonth", "12"),
                ("dobDay", "10"),
                ("dobYear", "1985"),
            ]);
            self.fill(&[("email", "ada@example.com"), ("phone", "555-0100")]);
            self.fill(&[("street", "1 Main St"), ("city", "Springfield"), ("state", "IL")]);
            self.pick("Own");
            for i in 0..vehicles {
                let outcome = self.add_vehicle("2020", "HONDA", &format!("Model{i}"));
                assert_eq!(
                    outcome,
                    Outcome::VehicleAdded {
                        index: i,
                        count: i + 1
                    }
                );
            }
            self.answer(Answer::Continue);
        }
    }

    #[test]
    fn identity_is_trimmed_and_recorded() {
        let mut flow = Flow::start();
        flow.through_vehicles(1);
        assert_eq!(flow.answers.text(fields::FIRST_NAME), "Ada");
        assert_eq!(flow.answers.text(fields::DOB_YEAR), "1985");
        assert_eq!(flow.answers.text(fields::STATE), "IL");
        assert_eq!(flow.current(), StepKind::VehicleCoverage(0));
    }

    #[test]
    fn address_without_zip_keeps_gate_zip() {
        let mut flow = Flow::start();
        flow.answers.set(fields::ZIP, "62701");
        flow.fill(&[]);
        flow.fill(&[]);
        flow.fill(&[("street", "1 Main St")]);
        assert_eq!(flow.answers.text(fields::ZIP), "62701");
        assert_eq!(flow.current(), StepKind::HomeStatus);
    }

    #[test]
    fn vehicle_step_requires_complete_vehicle_and_at_least_one() {
        let mut flow = Flow::start();
        flow.fill(&[]);
        flow.fill(&[]);
        flow.fill(&[]);
        flow.pick("Rent");
        assert_eq!(flow.current(), StepKind::Vehicles);

        assert_eq!(
            flow.answer(Answer::Continue),
            Outcome::Rejected {
                reason: Rejection::NoVehicles
            }
        );
        assert_eq!(
            flow.add_vehicle("2020", "", "Civic"),
            Outcome::Rejected {
                reason: Rejection::IncompleteVehicle
            }
        );
        assert_eq!(flow.current(), StepKind::Vehicles);
        assert!(!flow.answers.contains(fields::VEHICLE_COUNT));
    }

    #[test]
    fn vehicle_count_drives_coverage_steps() {
        let mut flow = Flow::start();
        flow.through_vehicles(2);

        let steps = flow.engine.steps();
        assert_eq!(
            &steps[4..9],
            &[
                StepKind::Vehicles,
                StepKind::VehicleCoverage(0),
                StepKind::VehicleDeductible(0),
                StepKind::VehicleCoverage(1),
                StepKind::VehicleDeductible(1),
            ]
        );
        assert_eq!(steps[9], StepKind::DriverCount);
        assert_eq!(flow.answers.count(fields::VEHICLE_COUNT), 2);
        assert_eq!(flow.answers.text("vehicleModel1"), "Model1");
    }

    #[test]
    fn liability_skips_deductible_and_leaves_it_empty() {
        let mut flow = Flow::start();
        flow.through_vehicles(2);

        let outcome = flow.pick("Liability");
        assert!(matches!(
            outcome,
            Outcome::Moved {
                transition: Transition::Entered {
                    step: StepKind::VehicleCoverage(1),
                    ..
                }
            }
        ));
        assert_eq!(flow.answers.text("vehicleDeductible0"), "");
        assert!(flow.answers.contains("vehicleDeductible0"));

        flow.pick("Full");
        assert_eq!(flow.current(), StepKind::VehicleDeductible(1));
        flow.pick("$500");
        assert_eq!(flow.answers.text("vehicleDeductible1"), "$500");
        assert_eq!(flow.current(), StepKind::DriverCount);
    }

    #[test]
    fn two_drivers_insert_one_name_step_for_the_second() {
        let mut flow = Flow::start();
        flow.through_vehicles(1);
        flow.pick("Full");
        flow.pick("$250");
        assert_eq!(flow.current(), StepKind::DriverCount);
        let before = flow.engine.len();

        flow.pick("2");
        let steps = flow.engine.steps();
        let position = flow.engine.cursor().unwrap();
        assert_eq!(steps[position], StepKind::DriverLicense(0));

        let names: Vec<_> = steps
            .iter()
            .filter(|s| matches!(s, StepKind::DriverName(_)))
            .collect();
        assert_eq!(names, vec![&StepKind::DriverName(1)]);

        let second: Vec<_> = steps
            .iter()
            .filter(|s| {
                matches!(
                    s,
                    StepKind::DriverName(1)
                        | StepKind::DriverLicense(1)
                        | StepKind::DriverGender(1)
                        | StepKind::DriverMarital(1)
                        | StepKind::DriverViolations(1)
                        | StepKind::DriverDefensive(1)
                )
            })
            .collect();
        assert_eq!(second.len(), 6);

        // 5 for driver 0, 6 for driver 1, 6 history + limits.
        assert_eq!(flow.engine.len(), before + 17);

        assert_eq!(flow.answers.text("driverFirst0"), "Ada");
        assert_eq!(flow.answers.text("driverLast0"), "Lovelace");
        assert_eq!(flow.answers.text("driverDobYear0"), "1985");
        assert_eq!(flow.answers.count(fields::DRIVER_COUNT), 2);
    }

    #[test]
    fn not_insured_skips_history_and_blanks_fields() {
        let mut flow = Flow::start();
        flow.through_vehicles(1);
        flow.pick("Liability");
        flow.pick("1");
        flow.fill(&[("license", "D123")]);
        for choice in ["Female", "Single", "No", "Yes"] {
            flow.pick(choice);
        }
        assert_eq!(flow.current(), StepKind::CurrentlyInsured);

        flow.pick("No");
        assert_eq!(flow.current(), StepKind::DesiredLimits);
        for key in [
            fields::CURRENT_COMPANY,
            fields::CURRENT_DURATION,
            fields::CURRENT_PREMIUM,
            fields::BILLING_FREQ,
        ] {
            assert!(flow.answers.contains(key));
            assert_eq!(flow.answers.text(key), "");
        }

        let outcome = flow.pick("100/300");
        assert_eq!(
            outcome,
            Outcome::Moved {
                transition: Transition::Completed { progress: 1.0 }
            }
        );
        assert_eq!(flow.engine.state(), EngineState::Completed);
        assert_eq!(flow.answers.text(fields::DESIRED_LIMITS), "100/300");
    }

    #[test]
    fn insured_walks_every_history_step() {
        let mut flow = Flow::start();
        flow.through_vehicles(1);
        flow.pick("Liability");
        flow.pick("1");
        flow.fill(&[("license", "D123")]);
        for choice in ["Male", "Married", "Yes", "No", "Yes", "Geico", "5+"] {
            flow.pick(choice);
        }
        flow.fill(&[("premium", " 120 ")]);
        flow.pick("Monthly");
        assert_eq!(flow.current(), StepKind::DesiredLimits);
        assert_eq!(flow.answers.text(fields::CURRENT_COMPANY), "Geico");
        assert_eq!(flow.answers.text(fields::CURRENT_DURATION), "5+");
        assert_eq!(flow.answers.text(fields::CURRENT_PREMIUM), "120");
        assert_eq!(flow.answers.text(fields::BILLING_FREQ), "Monthly");
    }

    #[test]
    fn invalid_choice_and_wrong_answer_type_do_not_move() {
        let mut flow = Flow::start();
        flow.fill(&[]);
        flow.fill(&[]);
        flow.fill(&[]);
        assert_eq!(flow.current(), StepKind::HomeStatus);

        let outcome = flow.pick("Lease");
        assert!(matches!(
            outcome,
            Outcome::Rejected {
                reason: Rejection::InvalidChoice { .. }
            }
        ));
        let outcome = flow.fill(&[("homeStatus", "Own")]);
        assert!(matches!(
            outcome,
            Outcome::Rejected {
                reason: Rejection::UnexpectedAnswer { .. }
            }
        ));
        assert_eq!(flow.current(), StepKind::HomeStatus);
        assert!(!flow.answers.contains(fields::HOME_STATUS));
    }

    #[test]
    fn recompleting_driver_count_rebuilds_instead_of_duplicating() {
        let mut flow = Flow::start();
        flow.through_vehicles(1);
        flow.pick("Liability");
        flow.pick("3");
        let with_three = flow.engine.len();

        flow.engine.retreat().unwrap();
        assert_eq!(flow.current(), StepKind::DriverCount);
        flow.pick("1");

        assert_eq!(flow.engine.len(), with_three - 12);
        let steps = flow.engine.steps();
        assert_eq!(
            steps
                .iter()
                .filter(|s| **s == StepKind::CurrentlyInsured)
                .count(),
            1
        );
        assert!(!steps.contains(&StepKind::DriverLicense(1)));
    }

    #[test]
    fn blocks_have_expected_shape() {
        assert_eq!(driver_block(1).len(), 11);
        assert_eq!(driver_block(3).len(), 5 + 6 + 6 + 6);
        assert_eq!(
            vehicle_block(1),
            vec![StepKind::VehicleCoverage(0), StepKind::VehicleDeductible(0)]
        );
        assert!(vehicle_block(0).is_empty());
    }
}
