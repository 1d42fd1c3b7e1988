use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::json;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use reminder_cell::ReminderScheduler;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::User;

use crate::error::AppointmentError;
use crate::models::{
    Appointment, AppointmentStatus, CompleteAppointmentRequest, Medication, Prescription,
    ACTIVE_STATUS_FILTER,
};

/// Moves stored appointments through pending, confirmed and completed, or removes them.
pub struct AppointmentLifecycleService {
    supabase: SupabaseClient,
    reminders: Arc<ReminderScheduler>,
    doctor_id: String,
}

impl AppointmentLifecycleService {
    pub fn new(config: &AppConfig, reminders: Arc<ReminderScheduler>) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            reminders,
            doctor_id: config.clinic_doctor_id.clone(),
        }
    }

    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Option<Appointment>, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}{}&limit=1", appointment_id, self.doctor_filter());
        let rows: Vec<Appointment> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;
        Ok(rows.into_iter().next())
    }

    /// Deletes a pending or confirmed appointment and retracts its reminders.
    /// Patients can only reach their own appointments.
    pub async fn cancel_appointment(
        &self,
        appointment_id: Uuid,
        actor: &User,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let scope = if actor.is_doctor() {
            self.doctor_filter()
        } else {
            format!("&patient_id=eq.{}", actor.id)
        };
        let path = format!(
            "/rest/v1/appointments?id=eq.{}&status={}{}",
            appointment_id, ACTIVE_STATUS_FILTER, scope
        );

        let removed: Vec<Appointment> = self.supabase.request_with_headers(
            Method::DELETE,
            &path,
            Some(auth_token),
            None,
            Some(SupabaseClient::representation_headers()),
        ).await?;

        let appointment = removed.into_iter().next().ok_or_else(|| {
            warn!("Cancel of {} by {} matched nothing", appointment_id, actor.id);
            AppointmentError::NotFound("Appointment not found or unauthorized!".to_string())
        })?;
        info!("Appointment {} cancelled by {}", appointment_id, actor.id);

        self.retract_reminders(appointment_id).await;
        Ok(appointment)
    }

    /// pending → confirmed. Confirming twice succeeds.
    pub async fn confirm_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let updated = self
            .update_active_status(appointment_id, AppointmentStatus::Confirmed, auth_token)
            .await?;

        match updated {
            Some(appointment) => {
                info!("Appointment {} confirmed", appointment_id);
                Ok(appointment)
            }
            None => Err(self.explain_missed_update(appointment_id, AppointmentStatus::Confirmed, auth_token).await),
        }
    }

    /// Saves the patient's current prescription and marks the appointment completed.
    pub async fn complete_with_prescription(
        &self,
        appointment_id: Uuid,
        doctor: &User,
        request: CompleteAppointmentRequest,
        auth_token: &str,
    ) -> Result<(Appointment, Prescription), AppointmentError> {
        let appointment = self
            .get_appointment(appointment_id, auth_token)
            .await?
            .ok_or_else(|| AppointmentError::NotFound("Appointment not found!".to_string()))?;

        if !appointment.status.can_transition_to(&AppointmentStatus::Completed) {
            return Err(AppointmentError::InvalidStatusTransition {
                from: appointment.status,
                to: AppointmentStatus::Completed,
            });
        }

        let medications = validate_medications(request.medication_list)?;

        // A cancelled appointment never overwrites the patient's prescription
        let completed = match self
            .update_active_status(appointment_id, AppointmentStatus::Completed, auth_token)
            .await?
        {
            Some(appointment) => appointment,
            None => {
                return Err(self
                    .explain_missed_update(appointment_id, AppointmentStatus::Completed, auth_token)
                    .await)
            }
        };
        let prescription = self
            .save_prescription(&completed, doctor, request.diagnosis, medications, auth_token)
            .await?;
        info!("Appointment {} completed by doctor {}", appointment_id, doctor.id);

        self.retract_reminders(appointment_id).await;
        Ok((completed, prescription))
    }

    async fn save_prescription(
        &self,
        appointment: &Appointment,
        doctor: &User,
        diagnosis: Option<String>,
        medications: Vec<Medication>,
        auth_token: &str,
    ) -> Result<Prescription, AppointmentError> {
        let prescription = Prescription {
            patient_id: appointment.patient_id.clone(),
            doctor_id: doctor.id.clone(),
            appointment_id: appointment.id,
            diagnosis: diagnosis.filter(|d| !d.trim().is_empty()),
            medications,
            updated_at: Some(Utc::now()),
        };

        let body = serde_json::to_value(&prescription).map_err(|e| AppointmentError::Storage(e.into()))?;
        let rows: Vec<Prescription> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/prescriptions?on_conflict=patient_id",
            Some(auth_token),
            Some(body),
            Some(SupabaseClient::upsert_headers()),
        ).await?;

        debug!("Prescription saved for patient {}", appointment.patient_id);
        Ok(rows.into_iter().next().unwrap_or(prescription))
    }

    async fn update_active_status(
        &self,
        appointment_id: Uuid,
        status: AppointmentStatus,
        auth_token: &str,
    ) -> Result<Option<Appointment>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?id=eq.{}&status={}{}",
            appointment_id, ACTIVE_STATUS_FILTER, self.doctor_filter()
        );

        let rows: Vec<Appointment> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(json!({ "status": status.as_str() })),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        Ok(rows.into_iter().next())
    }

    /// An update filtered on active status matched nothing: either the row is
    /// gone or it already left the active states.
    async fn explain_missed_update(
        &self,
        appointment_id: Uuid,
        target: AppointmentStatus,
        auth_token: &str,
    ) -> AppointmentError {
        match self.get_appointment(appointment_id, auth_token).await {
            Ok(Some(appointment)) => {
                warn!("Appointment {} is {}, refusing {}", appointment_id, appointment.status, target);
                AppointmentError::InvalidStatusTransition {
                    from: appointment.status,
                    to: target,
                }
            }
            Ok(None) => AppointmentError::NotFound("Appointment not found!".to_string()),
            Err(e) => e,
        }
    }

    async fn retract_reminders(&self, appointment_id: Uuid) {
        match self.reminders.retract_for(appointment_id).await {
            Ok(count) => debug!("Retracted {} reminders for appointment {}", count, appointment_id),
            Err(e) => error!("Failed to retract reminders for appointment {}: {}", appointment_id, e),
        }
    }

    fn doctor_filter(&self) -> String {
        if self.doctor_id.is_empty() {
            String::new()
        } else {
            format!("&doctor_id=eq.{}", self.doctor_id)
        }
    }
}

/// Every entry needs a name and timings. At least one entry is required.
pub fn validate_medications(medications: Vec<Medication>) -> Result<Vec<Medication>, AppointmentError> {
    if medications.is_empty() {
        return Err(AppointmentError::InvalidInput(
            "medicationList must contain at least one medication.".to_string(),
        ));
    }

    medications
        .into_iter()
        .map(|med| {
            let name = med.name.trim();
            let timings = med.timings.trim();
            if name.is_empty() || timings.is_empty() {
                return Err(AppointmentError::InvalidInput(
                    "Each medication needs a name and timings.".to_string(),
                ));
            }
            Ok(Medication {
                name: name.to_string(),
                timings: timings.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn med(name: &str, timings: &str) -> Medication {
        Medication {
            name: name.to_string(),
            timings: timings.to_string(),
        }
    }

    #[test]
    fn test_medications_are_trimmed() {
        let meds = validate_medications(vec![med(" Paracetamol ", " 1-0-1 ")]).unwrap();
        assert_eq!(meds, vec![med("Paracetamol", "1-0-1")]);
    }

    #[test]
    fn test_incomplete_medication_rejected() {
        assert_matches!(
            validate_medications(vec![med("Paracetamol", "1-0-1"), med("Ibuprofen", "  ")]),
            Err(AppointmentError::InvalidInput(_))
        );
        assert_matches!(
            validate_medications(vec![med("", "after meals")]),
            Err(AppointmentError::InvalidInput(_))
        );
    }

    #[test]
    fn test_empty_medication_list_rejected() {
        assert_matches!(validate_medications(Vec::new()), Err(AppointmentError::InvalidInput(_)));
    }
}
