use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::datetime::wire_datetime;

/// PostgREST filter matching appointments that can still change state.
pub const ACTIVE_STATUS_FILTER: &str = "in.(pending,confirmed)";

// ==============================================================================
// APPOINTMENTS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: String,
    pub doctor_id: String,
    #[serde(with = "wire_datetime")]
    pub appointment_datetime: NaiveDateTime,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    /// Recognized on the wire; cancel removes the row so none is stored with it.
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, AppointmentStatus::Pending | AppointmentStatus::Confirmed)
    }

    /// Confirming a confirmed appointment is allowed and changes nothing.
    pub fn can_transition_to(&self, target: &AppointmentStatus) -> bool {
        match target {
            AppointmentStatus::Confirmed
            | AppointmentStatus::Completed
            | AppointmentStatus::Cancelled => self.is_active(),
            AppointmentStatus::Pending => false,
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==============================================================================
// REQUESTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct BookAppointmentRequest {
    pub appointment_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AvailableSlotsQuery {
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteAppointmentRequest {
    pub diagnosis: Option<String>,
    #[serde(default)]
    pub medication_list: Vec<Medication>,
}

// ==============================================================================
// PRESCRIPTIONS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Medication {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub timings: String,
}

/// Current prescription of a patient. Saving a new one replaces it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prescription {
    pub patient_id: String,
    pub doctor_id: String,
    pub appointment_id: Uuid,
    pub diagnosis: Option<String>,
    pub medications: Vec<Medication>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_transitions() {
        use AppointmentStatus::*;

        assert!(Pending.can_transition_to(&Confirmed));
        assert!(Confirmed.can_transition_to(&Confirmed));
        assert!(Pending.can_transition_to(&Completed));
        assert!(Confirmed.can_transition_to(&Cancelled));

        assert!(!Completed.can_transition_to(&Confirmed));
        assert!(!Completed.can_transition_to(&Cancelled));
        assert!(!Cancelled.can_transition_to(&Confirmed));
        assert!(!Confirmed.can_transition_to(&Pending));
    }

    #[test]
    fn test_appointment_row_deserializes() {
        let row = json!({
            "id": "1f0e4b9a-3c1d-4a55-9d9e-6f3c2a1b0c7d",
            "patient_id": "patient-7",
            "doctor_id": "doctor-1",
            "appointment_datetime": "2025-03-10T14:00:00",
            "status": "pending",
            "created_at": "2025-03-01T09:00:00+00:00"
        });

        let appointment: Appointment = serde_json::from_value(row).unwrap();
        assert_eq!(appointment.status, AppointmentStatus::Pending);
        assert_eq!(
            serde_json::to_value(&appointment).unwrap()["appointment_datetime"],
            "2025-03-10 14:00:00"
        );
    }

    #[test]
    fn test_complete_request_uses_camel_case() {
        let request: CompleteAppointmentRequest = serde_json::from_value(json!({
            "diagnosis": "Seasonal flu",
            "medicationList": [{ "name": "Paracetamol", "timings": "1-0-1" }]
        }))
        .unwrap();

        assert_eq!(request.medication_list.len(), 1);
        assert_eq!(request.medication_list[0].timings, "1-0-1");
    }
}
