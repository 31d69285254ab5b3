//! Flattening the answer store into the submitted form.

use serde::Serialize;

use crate::intake::answers::AnswerStore;

/// Frozen copy of every answer as field/value text pairs, ordered by field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubmissionPayload {
    fields: Vec<(String, String)>,
}

impl SubmissionPayload {
    pub fn from_answers(answers: &AnswerStore) -> Self {
        Self {
            fields: answers
                .get_all()
                .iter()
                .map(|(k, v)| (k.clone(), v.as_wire()))
                .collect(),
        }
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Multipart form carrying one text part per field.
    pub fn to_form(&self) -> reqwest::multipart::Form {
        self.fields
            .iter()
            .fold(reqwest::multipart::Form::new(), |form, (k, v)| {
                form.text(k.clone(), v.clone())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::answers::fields;

    #[test]
    fn flattens_every_answer_as_text() {
        let mut answers = AnswerStore::new();
        answers.set(fields::ZIP, "90210");
        answers.set(fields::VEHICLE_COUNT, 2usize);
        answers.set(fields::CURRENT_COMPANY, "");

        let payload = SubmissionPayload::from_answers(&answers);
        assert_eq!(payload.len(), 3);
        assert_eq!(payload.get("vehicleCount"), Some("2"));
        assert_eq!(payload.get("currentCompany"), Some(""));
        assert_eq!(payload.get("zip"), Some("90210"));
        assert!(payload.get("email").is_none());

        let keys: Vec<_> = payload.fields().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["currentCompany", "vehicleCount", "zip"]);
    }

    #[test]
    fn payload_is_a_snapshot() {
        let mut answers = AnswerStore::new();
        answers.set(fields::EMAIL, "a@example.com");
        let payload = SubmissionPayload::from_answers(&answers);
        answers.set(fields::EMAIL, "b@example.com");
        assert_eq!(payload.get("email"), Some("a@example.com"));
    }
}
