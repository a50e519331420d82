use std::sync::Arc;

use assert_matches::assert_matches;
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use tokio_test::assert_ok;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use patient_cell::models::{
    CedulaLookupOutcome, ClinicalListInput, ConsultationSaveRequest, Diagnosis, OfflinePatientDetails,
    PatientError,
};
use patient_cell::patient_routes;
use patient_cell::services::{CedulaIntakeService, ConsultationRecordService};
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};
use verification_cell::{CedulaRegistry, RegistryPerson, VerificationError};

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn request(method: &str, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", format!("Bearer {}", token))
        .header("Content-Type", "application/json");
    match body {
        Some(json) => builder.body(Body::from(json.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

struct FailingRegistry;

#[async_trait]
impl CedulaRegistry for FailingRegistry {
    async fn lookup(&self, _: &str, _: &str) -> Result<Option<RegistryPerson>, VerificationError> {
        Err(VerificationError::Unavailable("timeout".to_string()))
    }
}

#[tokio::test]
async fn prefill_drops_non_numeric_age() {
    let test_config = TestConfig::default();
    let doctor = TestUser::doctor("doc@example.com");
    let token = JwtTestUtils::create_test_token(&doctor, &test_config.jwt_secret, None);
    let app = patient_routes(test_config.to_arc());

    let response = app
        .oneshot(request(
            "GET",
            "/quick-register/prefill?cedula=V-12.345.678&nombre=Ana%20G%C3%B3mez&edad=abc",
            &token,
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["cedula"], "12345678");
    assert_eq!(json["nombre_completo"], "Ana Gómez");
    assert_eq!(json["edad"], Value::Null);
}

#[tokio::test]
async fn prefill_keeps_numeric_age() {
    let test_config = TestConfig::default();
    let doctor = TestUser::doctor("doc@example.com");
    let token = JwtTestUtils::create_test_token(&doctor, &test_config.jwt_secret, None);
    let app = patient_routes(test_config.to_arc());

    let response = app
        .oneshot(request("GET", "/quick-register/prefill?cedula=12345678&edad=35", &token, None))
        .await
        .unwrap();

    let json = body_json(response).await;
    assert_eq!(json["edad"], 35);
}

#[tokio::test]
async fn prefill_keeps_large_and_fractional_ages() {
    let test_config = TestConfig::default();
    let doctor = TestUser::doctor("doc@example.com");
    let token = JwtTestUtils::create_test_token(&doctor, &test_config.jwt_secret, None);

    for (raw, expected) in [("200", 200), ("35.5", 35)] {
        let app = patient_routes(test_config.to_arc());
        let response = app
            .oneshot(request("GET", &format!("/quick-register/prefill?cedula=12345678&edad={}", raw), &token, None))
            .await
            .unwrap();

        let json = body_json(response).await;
        assert_eq!(json["edad"], expected);
    }
}

#[tokio::test]
async fn quick_register_rejects_duplicate_cedula() {
    let mock_server = MockServer::start().await;
    let test_config = TestConfig::with_supabase_url(&mock_server.uri());
    let doctor = TestUser::doctor("doc@example.com");
    let token = JwtTestUtils::create_test_token(&doctor, &test_config.jwt_secret, None);

    Mock::given(method("GET"))
        .and(path("/rest/v1/offline_patients"))
        .and(query_param("doctor_id", format!("eq.{}", doctor.id)))
        .and(query_param("cedula", "eq.12345678"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::offline_patient_response(
                &Uuid::new_v4().to_string(), &doctor.id, "12345678", "Ana Gómez"
            )
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/offline_patients"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let app = patient_routes(test_config.to_arc());
    let response = app
        .oneshot(request(
            "POST",
            "/offline/quick-register",
            &token,
            Some(json!({ "cedula": "V-12.345.678", "nombre_completo": "Ana Gómez" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn patients_cannot_use_doctor_routes() {
    let test_config = TestConfig::default();
    let patient = TestUser::patient("p@example.com");
    let token = JwtTestUtils::create_test_token(&patient, &test_config.jwt_secret, None);
    let app = patient_routes(test_config.to_arc());

    let response = app
        .oneshot(request("GET", "/offline", &token, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn first_time_offline_save_inserts_with_null_lists() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let doctor = Uuid::new_v4();
    let patient_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/offline_patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/offline_patients"))
        .and(body_partial_json(json!({
            "doctor_id": doctor,
            "cedula": "20111222",
            "alergias": null,
            "condiciones_cronicas": ["Hipertensión"],
            "medicamentos_actuales": null,
            "notas_medicas": "Control.\n\nDiagnósticos:\n- I10 - Hipertensión esencial"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::offline_patient_response(
                &patient_id.to_string(), &doctor.to_string(), "20111222", "Luis Rivas"
            )
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = ConsultationRecordService::new(&config);
    let saved = service
        .save(
            doctor,
            ConsultationSaveRequest {
                patient: Some(OfflinePatientDetails {
                    cedula: "20.111.222".to_string(),
                    nombre_completo: "Luis Rivas".to_string(),
                    ..Default::default()
                }),
                alergias: Some(ClinicalListInput::List(vec![])),
                condiciones_cronicas: Some(ClinicalListInput::Text("Hipertensión, ".to_string())),
                medicamentos_actuales: Some(ClinicalListInput::Text("".to_string())),
                notas: Some("Control.".to_string()),
                diagnosticos: vec![Diagnosis {
                    code: Some("I10".to_string()),
                    description: "Hipertensión esencial".to_string(),
                }],
                ..Default::default()
            },
            "token",
        )
        .await;
    let saved = assert_ok!(saved);

    assert!(saved.offline);
    assert!(saved.created);
    assert_eq!(saved.redirect_to, format!("/dashboard/medico/pacientes/offline/{}", patient_id));
}

#[tokio::test]
async fn existing_offline_save_updates_doctors_own_row() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let doctor = Uuid::new_v4();
    let patient_id = Uuid::new_v4();

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/offline_patients"))
        .and(query_param("id", format!("eq.{}", patient_id)))
        .and(query_param("doctor_id", format!("eq.{}", doctor)))
        .and(body_partial_json(json!({ "alergias": ["Penicilina", "Polen"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::offline_patient_response(
                &patient_id.to_string(), &doctor.to_string(), "20111222", "Luis Rivas"
            )
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = ConsultationRecordService::new(&config);
    let saved = service
        .save(
            doctor,
            ConsultationSaveRequest {
                offline_patient_id: Some(patient_id),
                alergias: Some(ClinicalListInput::Text("Penicilina\nPolen".to_string())),
                ..Default::default()
            },
            "token",
        )
        .await;
    let saved = assert_ok!(saved);

    assert!(!saved.created);
    assert_eq!(saved.patient_id, patient_id);
}

#[tokio::test]
async fn updating_another_doctors_patient_is_not_found() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/offline_patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let result = ConsultationRecordService::new(&config)
        .save(
            Uuid::new_v4(),
            ConsultationSaveRequest {
                offline_patient_id: Some(Uuid::new_v4()),
                ..Default::default()
            },
            "token",
        )
        .await;

    assert_matches!(result, Err(PatientError::NotFound));
}

#[tokio::test]
async fn registered_save_creates_medical_record() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let doctor = Uuid::new_v4();
    let patient = Uuid::new_v4();
    let appointment = Uuid::new_v4();
    let record = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/rest/v1/medical_records"))
        .and(body_partial_json(json!({
            "paciente_id": patient,
            "medico_id": doctor,
            "appointment_id": appointment,
            "tipo": "consulta",
            "alergias": null
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{ "id": record }])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let saved = ConsultationRecordService::new(&config)
        .save(
            doctor,
            ConsultationSaveRequest {
                paciente_id: Some(patient),
                appointment_id: Some(appointment),
                notas: Some("Sin novedades".to_string()),
                ..Default::default()
            },
            "token",
        )
        .await;
    let saved = assert_ok!(saved);

    assert!(!saved.offline);
    assert_eq!(saved.medical_record_id, Some(record));
    assert_eq!(saved.redirect_to, format!("/dashboard/medico/pacientes/{}", patient));
}

#[tokio::test]
async fn cedula_lookup_prefers_local_roster() {
    let mock_server = MockServer::start().await;
    let test_config = TestConfig::with_mock_server(&mock_server.uri());
    let doctor = TestUser::doctor("doc@example.com");
    let token = JwtTestUtils::create_test_token(&doctor, &test_config.jwt_secret, None);
    let offline_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/offline_patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::offline_patient_response(
                &offline_id.to_string(), &doctor.id, "12345678", "Ana Gómez"
            )
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/cedula"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "error": true })))
        .expect(0)
        .mount(&mock_server)
        .await;

    let app = patient_routes(test_config.to_arc());
    let response = app
        .oneshot(request("GET", "/cedula/V-12.345.678", &token, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "local_match");
    assert_eq!(json["patient"]["id"], offline_id.to_string());
    assert_eq!(json["patient"]["kind"], "offline");
}

#[tokio::test]
async fn cedula_lookup_falls_back_to_registry() {
    let mock_server = MockServer::start().await;
    let test_config = TestConfig::with_mock_server(&mock_server.uri());
    let doctor = TestUser::doctor("doc@example.com");
    let token = JwtTestUtils::create_test_token(&doctor, &test_config.jwt_secret, None);
    let seen_patient = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/offline_patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "paciente_id": seen_patient },
            { "paciente_id": null }
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .and(query_param("id", format!("in.({})", seen_patient)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::profile_response(&seen_patient.to_string(), "9999999", "Otro Paciente")
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/cedula"))
        .and(query_param("cedula", "12345678"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": false,
            "data": {
                "nacionalidad": "V",
                "cedula": 12345678,
                "primer_nombre": "ANA",
                "primer_apellido": "GOMEZ"
            }
        })))
        .mount(&mock_server)
        .await;

    let app = patient_routes(test_config.to_arc());
    let response = app
        .oneshot(request("GET", "/cedula/12345678", &token, None))
        .await
        .unwrap();

    let json = body_json(response).await;
    assert_eq!(json["status"], "registry_match");
    assert_eq!(json["nombre"], "ANA GOMEZ");
    assert_eq!(
        json["quick_registration_path"],
        "/dashboard/medico/pacientes/registro-rapido?cedula=12345678&nombre=ANA%20GOMEZ"
    );
}

#[tokio::test]
async fn registry_failure_reads_as_not_found() {
    let service = CedulaIntakeService::new(Some(Arc::new(FailingRegistry)));

    assert_eq!(
        service.lookup(&[], "12345678").await,
        CedulaLookupOutcome::NotFound { cedula: "12345678".to_string() }
    );
}

#[tokio::test]
async fn medication_search_uses_catalog() {
    let mock_server = MockServer::start().await;
    let test_config = TestConfig::with_supabase_url(&mock_server.uri());
    let doctor = TestUser::doctor("doc@example.com");
    let token = JwtTestUtils::create_test_token(&doctor, &test_config.jwt_secret, None);

    Mock::given(method("GET"))
        .and(path("/rest/v1/medications"))
        .and(query_param("nombre", "ilike.*ibu*"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": Uuid::new_v4(), "nombre": "Ibuprofeno", "presentacion": "400 mg" }
        ])))
        .mount(&mock_server)
        .await;

    let app = patient_routes(test_config.to_arc());
    let response = app
        .oneshot(request("GET", "/medications/search?q=ibu", &token, None))
        .await
        .unwrap();

    let json = body_json(response).await;
    assert_eq!(json["results"][0]["nombre"], "Ibuprofeno");
}
