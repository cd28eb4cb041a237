//! HTTP API router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//!
//! Middleware stack (outermost → innermost):
//! 1. CORS → 2. Audit logger → 3. Session auth (account routes only)
//!
//! Paths not matched by a route are served from the static directory
//! when one is configured.

use std::sync::Arc;

use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Build the full API router for `core`.
pub fn api_router(core: Arc<CoreState>) -> Router {
    let ctx = ApiContext::new(core);
    build_router(ctx)
}

fn build_router(ctx: ApiContext) -> Router {
    // Session routes: Extension must be outermost so the auth middleware
    // can extract ApiContext.
    //
    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let session = Router::new()
        .route("/auth/logout", post(endpoints::auth::logout))
        .route("/auth/me", get(endpoints::auth::me))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::auth::require_session))
        .layer(axum::Extension(ctx.clone()));

    let public = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/auth/register", post(endpoints::auth::register))
        .route("/auth/login", post(endpoints::auth::login))
        .route("/doctors", get(endpoints::doctors::list))
        .route("/doctors/filter", get(endpoints::doctors::filter))
        .route("/doctors/:id", get(endpoints::doctors::detail))
        .route(
            "/citas",
            post(endpoints::appointments::create).get(endpoints::appointments::list),
        )
        .route(
            "/citas/:id",
            get(endpoints::appointments::detail)
                .put(endpoints::appointments::update)
                .delete(endpoints::appointments::remove),
        )
        .route("/citas/:id/confirmar", patch(endpoints::appointments::confirm))
        .route("/citas/:id/cancelar", patch(endpoints::appointments::cancel))
        .route("/recetas", post(endpoints::prescriptions::create))
        .route(
            "/recetas/cita/:cita_id",
            get(endpoints::prescriptions::by_appointment),
        )
        .route(
            "/recetas/doctor/:doctor_id",
            get(endpoints::prescriptions::by_doctor),
        )
        .route(
            "/recetas/:id",
            get(endpoints::prescriptions::detail)
                .put(endpoints::prescriptions::update)
                .delete(endpoints::prescriptions::remove),
        )
        .with_state(ctx.clone());

    let mut app = Router::new().merge(public).merge(session);
    if let Some(dir) = &ctx.core.settings().static_dir {
        tracing::info!(dir = %dir.display(), "Serving static files");
        app = app.fallback_service(ServeDir::new(dir));
    }

    app.layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(CorsLayer::permissive())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use axum::body::Body;
    use axum::http::{Request, Response, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::config::Settings;
    use crate::notifier::testing::{FailingNotifier, RecordingNotifier};
    use crate::notifier::Notifier;

    const CARDIO_ID: &str = "8e2a7d14-6c3b-4a9f-b5d2-1f0e9c8a7b62";

    fn test_core_state() -> Arc<CoreState> {
        Arc::new(CoreState::in_memory().unwrap())
    }

    fn core_with_notifier(notifier: Arc<dyn Notifier>) -> Arc<CoreState> {
        Arc::new(CoreState::in_memory_with(notifier, Settings::default()).unwrap())
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn empty_request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            builder = builder.header("Authorization", format!("Bearer {t}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn response_json(response: Response<Body>) -> Value {
        let body = axum::body::to_bytes(response.into_body(), 65536)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    async fn send(core: &Arc<CoreState>, req: Request<Body>) -> (StatusCode, Value) {
        let response = api_router(core.clone()).oneshot(req).await.unwrap();
        let status = response.status();
        (status, response_json(response).await)
    }

    fn booking() -> Value {
        json!({
            "nombre": "Ana",
            "correo": "a@b.com",
            "telefono": "5551234",
            "doctorId": CARDIO_ID,
            "especialidad": "Cardiología",
            "modalidad": "presencial",
            "fecha": "2025-05-10",
            "hora": "09:30"
        })
    }

    fn prescription_for(cita_id: &str) -> Value {
        json!({
            "citaId": cita_id,
            "nombrePaciente": "Ana",
            "doctorId": CARDIO_ID,
            "medicamento": "Enalapril",
            "dosis": "10mg",
            "frecuencia": "cada 12 horas",
            "duracion": "30 días"
        })
    }

    async fn wait_for(recorder: &RecordingNotifier, count: usize) {
        for _ in 0..100 {
            if recorder.sent().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn health_is_public() {
        let core = test_core_state();
        let (status, body) = send(&core, empty_request("GET", "/health", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert!(body["version"].is_string());
    }

    #[tokio::test]
    async fn booking_scenario_end_to_end() {
        let recorder = Arc::new(RecordingNotifier::default());
        let core = core_with_notifier(recorder.clone());

        // Register, then duplicate
        let register = json!({"nombre": "Ana", "email": "a@b.com", "password": "secret1"});
        let (status, body) = send(&core, json_request("POST", "/auth/register", register.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["email"], "a@b.com");
        assert!(body["user"].get("passwordHash").is_none());

        let (status, body) = send(&core, json_request("POST", "/auth/register", register)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "correo ya registrado");

        // Five wrong passwords, then the sixth attempt is locked out
        let wrong = json!({"email": "a@b.com", "password": "nope"});
        for _ in 0..5 {
            let (status, _) = send(&core, json_request("POST", "/auth/login", wrong.clone())).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }
        let response = api_router(core.clone())
            .oneshot(json_request("POST", "/auth/login", wrong))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().get("Retry-After").is_some());
        let body = response_json(response).await;
        assert_eq!(body["attempts"], 5);
        assert_eq!(body["maxAttempts"], 5);
        assert!(body["timeRemaining"].as_u64().unwrap() <= 60);

        // Book and confirm
        let (status, body) = send(&core, json_request("POST", "/citas", booking())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["cita"]["estado"], "pending");
        let cita_id = body["cita"]["id"].as_str().unwrap().to_string();

        let (status, body) = send(
            &core,
            empty_request("PATCH", &format!("/citas/{cita_id}/confirmar"), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cita"]["estado"], "confirmed");

        // Prescription, then duplicate
        let (status, body) = send(&core, json_request("POST", "/recetas", prescription_for(&cita_id))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["receta"]["citaId"], cita_id.as_str());

        let (status, body) = send(&core, json_request("POST", "/recetas", prescription_for(&cita_id))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "CONFLICT");

        // Booked, confirmed, prescription issued
        wait_for(&recorder, 3).await;
        let mut subjects: Vec<String> = recorder.sent().into_iter().map(|n| n.subject).collect();
        subjects.sort();
        assert_eq!(
            subjects,
            vec!["Cita confirmada", "Cita registrada", "Nueva receta médica"]
        );
    }

    #[tokio::test]
    async fn session_routes_require_bearer_token() {
        let core = test_core_state();
        let (status, body) = send(&core, empty_request("GET", "/auth/me", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "AUTH_REQUIRED");

        let (status, _) = send(&core, empty_request("POST", "/auth/logout", Some("bogus"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn login_me_logout_flow() {
        let core = test_core_state();
        let register = json!({"nombre": "Luis", "email": "luis@b.com", "password": "secret1"});
        send(&core, json_request("POST", "/auth/register", register)).await;

        let login = json!({"email": "LUIS@b.com", "password": "secret1"});
        let (status, body) = send(&core, json_request("POST", "/auth/login", login)).await;
        assert_eq!(status, StatusCode::OK);
        let token = body["token"].as_str().unwrap().to_string();

        let (status, body) = send(&core, empty_request("GET", "/auth/me", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["nombre"], "Luis");

        let (status, _) = send(&core, empty_request("POST", "/auth/logout", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(&core, empty_request("GET", "/auth/me", Some(&token))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn malformed_json_is_400_with_error_body() {
        let core = test_core_state();
        let req = Request::builder()
            .method("POST")
            .uri("/citas")
            .header("Content-Type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send(&core, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn missing_appointment_field_is_400_and_nothing_stored() {
        let core = test_core_state();
        let mut body = booking();
        body.as_object_mut().unwrap().remove("telefono");
        let (status, _) = send(&core, json_request("POST", "/citas", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(&core, empty_request("GET", "/citas", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn doctor_routes() {
        let core = test_core_state();
        let (status, body) = send(&core, empty_request("GET", "/doctors", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.as_array().unwrap().len() >= 6);

        let (status, body) = send(&core, empty_request("GET", &format!("/doctors/{CARDIO_ID}"), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["especialidad"], "Cardiología");
        assert_eq!(body["modalidades"], json!(["presencial"]));

        let (status, _) = send(&core, empty_request("GET", "/doctors/filter", None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(&core, empty_request("GET", "/doctors/filter?modalidad=virtual", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(!body.as_array().unwrap().is_empty());

        let (status, _) = send(
            &core,
            empty_request("GET", "/doctors/filter?especialidad=Astrolog%C3%ADa", None),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(
            &core,
            empty_request("GET", &format!("/doctors/{}", uuid::Uuid::new_v4()), None),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn appointment_crud_and_transitions() {
        let core = test_core_state();
        let (_, body) = send(&core, json_request("POST", "/citas", booking())).await;
        let cita_id = body["cita"]["id"].as_str().unwrap().to_string();

        let (status, body) = send(
            &core,
            json_request("PUT", &format!("/citas/{cita_id}"), json!({"hora": "10:15", "notas": "Ayuno"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cita"]["hora"], "10:15");
        assert_eq!(body["cita"]["notas"], "Ayuno");
        assert_eq!(body["cita"]["nombre"], "Ana");

        let (status, body) = send(&core, empty_request("GET", "/citas?correo=a@b.com&fecha=2025-05-10", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (status, _) = send(&core, empty_request("PATCH", &format!("/citas/{cita_id}/cancelar"), None)).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&core, empty_request("PATCH", &format!("/citas/{cita_id}/confirmar"), None)).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let unknown = uuid::Uuid::new_v4();
        let (status, _) = send(&core, empty_request("PATCH", &format!("/citas/{unknown}/confirmar"), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&core, empty_request("DELETE", &format!("/citas/{cita_id}"), None)).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&core, empty_request("GET", &format!("/citas/{cita_id}"), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&core, empty_request("GET", "/citas/not-a-uuid", None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn prescription_routes() {
        let core = test_core_state();
        let (_, body) = send(&core, json_request("POST", "/citas", booking())).await;
        let cita_id = body["cita"]["id"].as_str().unwrap().to_string();

        let missing = json!({"citaId": uuid::Uuid::new_v4().to_string(), "nombrePaciente": "Ana",
            "doctorId": CARDIO_ID, "medicamento": "X", "dosis": "1", "frecuencia": "1", "duracion": "1"});
        let (status, _) = send(&core, json_request("POST", "/recetas", missing)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, body) = send(&core, json_request("POST", "/recetas", prescription_for(&cita_id))).await;
        let receta_id = body["receta"]["id"].as_str().unwrap().to_string();

        let (status, body) = send(&core, empty_request("GET", &format!("/recetas/cita/{cita_id}"), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], receta_id.as_str());

        let (status, body) = send(&core, empty_request("GET", &format!("/recetas/doctor/{CARDIO_ID}"), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (status, body) = send(
            &core,
            json_request("PUT", &format!("/recetas/{receta_id}"), json!({"dosis": "20mg"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["receta"]["dosis"], "20mg");

        let (status, _) = send(&core, empty_request("DELETE", &format!("/recetas/{receta_id}"), None)).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&core, empty_request("GET", &format!("/recetas/{receta_id}"), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn notifier_failure_does_not_fail_prescription() {
        let core = core_with_notifier(Arc::new(FailingNotifier));
        let (_, body) = send(&core, json_request("POST", "/citas", booking())).await;
        let cita_id = body["cita"]["id"].as_str().unwrap().to_string();

        let (status, _) = send(&core, json_request("POST", "/recetas", prescription_for(&cita_id))).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, _) = send(&core, empty_request("GET", &format!("/recetas/cita/{cita_id}"), None)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn static_files_served_as_fallback() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("index.html"), "<h1>Citas</h1>").unwrap();
        let settings = Settings {
            static_dir: Some(tmp.path().to_path_buf()),
            ..Settings::default()
        };
        let core = Arc::new(
            CoreState::in_memory_with(Arc::new(crate::notifier::LogNotifier), settings).unwrap(),
        );

        let response = api_router(core.clone())
            .oneshot(empty_request("GET", "/index.html", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"<h1>Citas</h1>");

        // API routes still win over the fallback
        let (status, _) = send(&core, empty_request("GET", "/health", None)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_route_without_static_dir_is_404() {
        let core = test_core_state();
        let response = api_router(core)
            .oneshot(empty_request("GET", "/nonexistent", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
