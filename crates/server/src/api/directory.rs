use db::models::{
    caregiver::{Caregiver, CaregiverRole, CreateCaregiver},
    resident::{CreateResident, Resident},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCaregiverRequest {
    pub full_name: String,
    #[serde(default = "default_role")]
    pub role: CaregiverRole,
}

fn default_role() -> CaregiverRole {
    CaregiverRole::Caregiver
}

impl From<CreateCaregiverRequest> for CreateCaregiver {
    fn from(v: CreateCaregiverRequest) -> Self {
        Self {
            full_name: v.full_name.trim().to_string(),
            role: v.role,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateResidentRequest {
    pub full_name: String,
    pub room_number: Option<String>,
}

impl From<CreateResidentRequest> for CreateResident {
    fn from(v: CreateResidentRequest) -> Self {
        Self {
            full_name: v.full_name.trim().to_string(),
            room_number: v.room_number,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaregiverResponse {
    pub caregiver: Caregiver,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResidentResponse {
    pub resident: Resident,
}
