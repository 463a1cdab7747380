use std::sync::Arc;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use base64::{Engine as _, engine::general_purpose};
use serde_json::json;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            ..AppConfig::default()
        }
    }

    /// Same config pointed at a mock store.
    pub fn with_store_url(&self, url: &str) -> AppConfig {
        AppConfig {
            supabase_url: url.to_string(),
            ..self.to_app_config()
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self::staff("staff@valora.mx")
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn staff(email: &str) -> Self {
        Self::new(email, "authenticated")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }
}

/// Canned rows shaped like the clinic's PostgREST tables.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn appointment_row(id: &str, date_time: &str, status: &str) -> serde_json::Value {
        json!({
            "id": id,
            "client_name": "Juan Pérez",
            "client_phone": "33 1234 5678",
            "date_time": date_time,
            "status": status,
            "reason": "Examen de la Vista",
            "created_at": "2025-06-01T15:00:00+00:00"
        })
    }

    pub fn prescription_row(id: &str, patient_name: &str, created_by: &str) -> serde_json::Value {
        json!({
            "id": id,
            "patient_name": patient_name,
            "address": null,
            "phone": "33 8765 4321",
            "age": "54",
            "occupation": null,
            "exam_date": "2025-06-10",
            "history_hypertension": true,
            "history_hypotension": false,
            "history_condition_controlled": true,
            "history_diabetes": false,
            "history_diabetes_controlled": false,
            "history_headache": false,
            "history_eye_injury": false,
            "history_tearing": false,
            "history_burning": false,
            "history_itching": true,
            "va_od": 40,
            "va_oi": 30,
            "pupillary_distance": 62,
            "eye_height": 18,
            "prev_sph_od": "-1.00",
            "prev_cyl_od": null,
            "prev_axis_od": null,
            "prev_add_od": "+1.50",
            "prev_sph_oi": -1.25,
            "prev_cyl_oi": null,
            "prev_axis_oi": null,
            "prev_add_oi": "+1.50",
            "sph_od": "-1.25",
            "cyl_od": "-0.50",
            "axis_od": 90,
            "sph_oi": "-1.50",
            "cyl_oi": null,
            "axis_oi": null,
            "add_power": "+2.00",
            "lens_type": "Progresivo",
            "lens_material": "Policarbonato, Antirreflejante",
            "antiblue": true,
            "tint": false,
            "tint_tone": null,
            "material_final": "Progresivo + Policarbonato + Antirreflejante + Antiblue",
            "notes": "Vista cansada",
            "created_by": created_by,
            "created_at": "2025-06-10T17:30:00+00:00"
        })
    }

    pub fn error_response(message: &str, code: &str) -> serde_json::Value {
        json!({
            "code": code,
            "message": message,
            "details": null,
            "hint": null
        })
    }
}
