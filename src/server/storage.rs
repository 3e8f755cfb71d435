//! In-memory, session-scoped medication storage for the stand-in backend.

use crate::common::messages::{MedicationInfo, StorageResponse, StoredMedication};

/// Header row of the CSV export.
pub const CSV_HEADER: &str =
    "Nom,Laboratoire,Date péremption,Numéro de lot,Unités,Confiance (%),Horodatage";

#[derive(Debug, Default)]
pub struct MedicationStore {
    medications: Vec<StoredMedication>,
}

impl MedicationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a medication under `session_id` and returns the stored record.
    pub fn add(&mut self, session_id: &str, info: MedicationInfo) -> StoredMedication {
        let stored = StoredMedication {
            id: uuid::Uuid::new_v4().to_string(),
            info,
            timestamp: chrono::Local::now().to_rfc3339(),
            session_id: session_id.to_string(),
        };
        self.medications.push(stored.clone());
        stored
    }

    /// Medications of one session, in insertion order.
    pub fn session(&self, session_id: &str) -> Vec<StoredMedication> {
        self.medications
            .iter()
            .filter(|m| m.session_id == session_id)
            .cloned()
            .collect()
    }

    pub fn summary(&self, session_id: &str) -> StorageResponse {
        let medications = self.session(session_id);
        StorageResponse {
            total_count: medications.len(),
            total_units: medications.iter().map(|m| m.info.unit_count).sum(),
            medications,
        }
    }

    /// Removes every medication of `session_id`; returns how many were removed.
    pub fn clear_session(&mut self, session_id: &str) -> usize {
        let before = self.medications.len();
        self.medications.retain(|m| m.session_id != session_id);
        before - self.medications.len()
    }

    /// Medications across all sessions.
    pub fn len(&self) -> usize {
        self.medications.len()
    }
}

/// Render medications as CSV, confidence as a percentage rounded half to even.
pub fn export_csv(medications: &[StoredMedication]) -> String {
    let mut csv = String::from(CSV_HEADER);
    csv.push('\n');
    for med in medications {
        csv.push_str(&format!(
            "{},{},{},{},{},{},{}\n",
            quote(&med.info.name),
            quote(&med.info.manufacturer),
            quote(&med.info.expiration_date),
            quote(&med.info.lot_number),
            med.info.unit_count,
            (med.info.confidence * 100.0).round_ties_even() as i64,
            quote(&med.timestamp),
        ));
    }
    csv
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}
