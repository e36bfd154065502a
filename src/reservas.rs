/// Reserva (gym booking) domain types.
///
/// Reservas carry no business rules beyond ownership: every read and write
/// is scoped to the owning user, except the admin listing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{AppError, ValidationError};
use crate::validators::{is_valid_description, is_valid_holder_name};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservaStatus {
    #[serde(rename = "ACTIVA")]
    Active,
    #[serde(rename = "CANCELADA")]
    Cancelled,
    #[serde(rename = "COMPLETADA")]
    Completed,
}

impl ReservaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservaStatus::Active => "ACTIVA",
            ReservaStatus::Cancelled => "CANCELADA",
            ReservaStatus::Completed => "COMPLETADA",
        }
    }
}

impl Default for ReservaStatus {
    fn default() -> Self {
        ReservaStatus::Active
    }
}

impl fmt::Display for ReservaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReservaStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVA" => Ok(ReservaStatus::Active),
            "CANCELADA" => Ok(ReservaStatus::Cancelled),
            "COMPLETADA" => Ok(ReservaStatus::Completed),
            other => Err(AppError::Internal(format!("Unknown reserva status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reserva {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "nombreUsuario")]
    pub holder_name: String,
    #[serde(rename = "descripcion")]
    pub description: Option<String>,
    #[serde(rename = "estado")]
    pub status: ReservaStatus,
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated input for a new reserva.
#[derive(Debug, Clone)]
pub struct NewReserva {
    pub user_id: Uuid,
    pub holder_name: String,
    pub description: Option<String>,
    pub status: ReservaStatus,
    pub due_date: Option<DateTime<Utc>>,
}

/// Partial update. The outer `Option` of nullable fields means "leave as is";
/// `Some(None)` clears the value.
#[derive(Debug, Clone, Default)]
pub struct ReservaChanges {
    pub holder_name: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<ReservaStatus>,
    pub due_date: Option<Option<DateTime<Utc>>>,
}

impl ReservaChanges {
    pub fn apply(self, reserva: &mut Reserva, now: DateTime<Utc>) {
        if let Some(holder_name) = self.holder_name {
            reserva.holder_name = holder_name;
        }
        if let Some(description) = self.description {
            reserva.description = description;
        }
        if let Some(status) = self.status {
            reserva.status = status;
        }
        if let Some(due_date) = self.due_date {
            reserva.due_date = due_date;
        }
        reserva.updated_at = now;
    }
}

/// POST /reservas body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReservaRequest {
    pub nombre_usuario: String,
    pub descripcion: Option<String>,
    pub estado: Option<ReservaStatus>,
    pub due_date: Option<DateTime<Utc>>,
}

impl CreateReservaRequest {
    pub fn validate(self, user_id: Uuid) -> Result<NewReserva, ValidationError> {
        Ok(NewReserva {
            user_id,
            holder_name: is_valid_holder_name(&self.nombre_usuario)?,
            description: is_valid_description(self.descripcion.as_deref())?,
            status: self.estado.unwrap_or_default(),
            due_date: self.due_date,
        })
    }
}

/// PATCH /reservas/{id} body
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReservaRequest {
    pub nombre_usuario: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub descripcion: Option<Option<String>>,
    pub estado: Option<ReservaStatus>,
    #[serde(default, deserialize_with = "present")]
    pub due_date: Option<Option<DateTime<Utc>>>,
}

impl UpdateReservaRequest {
    pub fn validate(self) -> Result<ReservaChanges, ValidationError> {
        let holder_name = self
            .nombre_usuario
            .as_deref()
            .map(is_valid_holder_name)
            .transpose()?;
        let description = match self.descripcion {
            Some(value) => Some(is_valid_description(value.as_deref())?),
            None => None,
        };

        Ok(ReservaChanges {
            holder_name,
            description,
            status: self.estado,
            due_date: self.due_date,
        })
    }
}

/// Distinguish a field sent as `null` from a missing one.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample(user_id: Uuid) -> Reserva {
        let now = Utc::now();
        Reserva {
            id: Uuid::new_v4(),
            user_id,
            holder_name: "Juan".to_string(),
            description: Some("Spinning".to_string()),
            status: ReservaStatus::Active,
            due_date: Some(now),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(serde_json::to_value(ReservaStatus::Cancelled).unwrap(), json!("CANCELADA"));
        assert_eq!("COMPLETADA".parse::<ReservaStatus>().unwrap(), ReservaStatus::Completed);
        assert!("TODAS".parse::<ReservaStatus>().is_err());
    }

    #[test]
    fn test_create_request_defaults_to_active() {
        let request: CreateReservaRequest =
            serde_json::from_value(json!({ "nombreUsuario": " Ana " })).unwrap();
        let new = request.validate(Uuid::new_v4()).unwrap();

        assert_eq!(new.holder_name, "Ana");
        assert_eq!(new.status, ReservaStatus::Active);
        assert!(new.due_date.is_none());
    }

    #[test]
    fn test_create_request_requires_holder_name() {
        let request: CreateReservaRequest =
            serde_json::from_value(json!({ "nombreUsuario": "" })).unwrap();
        assert!(request.validate(Uuid::new_v4()).is_err());
    }

    #[test]
    fn test_update_distinguishes_null_from_missing() {
        let clear: UpdateReservaRequest =
            serde_json::from_value(json!({ "dueDate": null })).unwrap();
        assert_eq!(clear.due_date, Some(None));

        let keep: UpdateReservaRequest = serde_json::from_value(json!({})).unwrap();
        assert_eq!(keep.due_date, None);
    }

    #[test]
    fn test_changes_apply() {
        let mut reserva = sample(Uuid::new_v4());
        let changes = UpdateReservaRequest {
            estado: Some(ReservaStatus::Completed),
            due_date: Some(None),
            ..Default::default()
        }
        .validate()
        .unwrap();

        changes.apply(&mut reserva, Utc::now());

        assert_eq!(reserva.status, ReservaStatus::Completed);
        assert!(reserva.due_date.is_none());
        assert_eq!(reserva.holder_name, "Juan");
        assert_eq!(reserva.description.as_deref(), Some("Spinning"));
    }

    #[test]
    fn test_reserva_serializes_with_wire_field_names() {
        let value = serde_json::to_value(sample(Uuid::new_v4())).unwrap();
        assert!(value.get("nombreUsuario").is_some());
        assert!(value.get("estado").is_some());
        assert!(value.get("dueDate").is_some());
        assert!(value.get("userId").is_some());
    }
}
