//! In-process gluco-meter backend for tests
//!
//! Serves the same routes as the real API on an ephemeral localhost port,
//! keeps everything in memory and records what it was asked. Knobs on
//! [`FakeBackend`] switch individual endpoints into failure modes.

use axum::{
    extract::{Path, Query, Request, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::client::ApiClient;
use crate::readings::model::wire_time;
use crate::readings::{HealthMetrics, Reading, ReadingId, ReadingPayload, ReadingType};

type Shared = Arc<Mutex<FakeState>>;

struct FakeUser {
    id: i64,
    full_name: Option<String>,
    password: String,
    role: String,
}

#[derive(Default)]
struct FakeState {
    users: HashMap<String, FakeUser>,
    tokens: HashMap<String, String>,
    next_token: u32,
    readings: Vec<(String, Reading)>,
    next_reading: i64,
    requests: Vec<String>,
    last_query: Option<String>,
    last_login: Option<(String, String)>,
    login_status: Option<StatusCode>,
    refuse_logins: bool,
    reject_profile: bool,
    fail_readings: bool,
    fail_deletes: bool,
    latency: Option<Duration>,
}

impl FakeState {
    fn add_user(&mut self, email: &str, full_name: Option<&str>, password: &str, role: &str) {
        let id = self.users.len() as i64 + 1;
        self.users.insert(
            email.to_string(),
            FakeUser {
                id,
                full_name: full_name.map(str::to_string),
                password: password.to_string(),
                role: role.to_string(),
            },
        );
    }

    fn issue_token(&mut self, email: &str) -> String {
        self.next_token += 1;
        let token = format!("tok{}", self.next_token);
        self.tokens.insert(token.clone(), email.to_string());
        token
    }

    fn insert_reading(&mut self, owner: &str, payload: ReadingPayload) -> Reading {
        self.next_reading += 1;
        let reading = payload.into_reading(ReadingId(self.next_reading));
        self.readings.push((owner.to_string(), reading.clone()));
        reading
    }

    fn position(&self, owner: &str, id: i64) -> Option<usize> {
        self.readings
            .iter()
            .position(|(o, r)| o == owner && r.id == ReadingId(id))
    }
}

/// Error response in the backend's `{"detail": ...}` shape
struct Fail(StatusCode, Option<String>);

impl Fail {
    fn detail(status: StatusCode, detail: &str) -> Self {
        Fail(status, Some(detail.to_string()))
    }

    fn unauthorized() -> Self {
        Fail::detail(StatusCode::UNAUTHORIZED, "Could not validate credentials")
    }

    fn not_found() -> Self {
        Fail::detail(StatusCode::NOT_FOUND, "Reading not found")
    }

    fn unavailable() -> Self {
        Fail::detail(StatusCode::INTERNAL_SERVER_ERROR, "Database unavailable")
    }
}

impl IntoResponse for Fail {
    fn into_response(self) -> Response {
        match self.1 {
            Some(detail) => (self.0, Json(json!({ "detail": detail }))).into_response(),
            None => self.0.into_response(),
        }
    }
}

/// Handle to a running fake backend
pub struct FakeBackend {
    state: Shared,
    base_url: String,
}

impl FakeBackend {
    /// Bind `127.0.0.1:0` and start serving on the current runtime
    pub async fn spawn() -> Self {
        let state: Shared = Arc::new(Mutex::new(FakeState::default()));
        let app = router(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            state,
            base_url: format!("http://{}/api", addr),
        }
    }

    pub fn client(&self) -> ApiClient {
        ApiClient::with_base_url(&self.base_url).unwrap()
    }

    fn with<T>(&self, f: impl FnOnce(&mut FakeState) -> T) -> T {
        f(&mut self.state.lock().unwrap())
    }

    pub fn add_user(&self, email: &str, full_name: Option<&str>, password: &str) {
        self.with(|s| s.add_user(email, full_name, password, "regular"));
    }

    /// Mint a valid token for an existing user without going through `/login`
    pub fn issue_token(&self, email: &str) -> String {
        self.with(|s| s.issue_token(email))
    }

    pub fn registered_role(&self, email: &str) -> Option<String> {
        self.with(|s| s.users.get(email).map(|u| u.role.clone()))
    }

    /// Store a reading directly, bypassing auth
    pub fn seed_reading(&self, email: &str, value: u32, recorded_at: &str) -> ReadingId {
        let payload = ReadingPayload {
            value,
            reading_type: ReadingType::Fasting,
            recorded_at: wire_time::parse(recorded_at).unwrap(),
            notes: None,
            metrics: HealthMetrics::default(),
        };
        self.with(|s| s.insert_reading(email, payload).id)
    }

    pub fn reading_count(&self, email: &str) -> usize {
        self.with(|s| s.readings.iter().filter(|(o, _)| o == email).count())
    }

    /// Requests seen for an exact path, e.g. `/readings` or `/readings/3`
    pub fn request_count(&self, path: &str) -> usize {
        self.with(|s| s.requests.iter().filter(|p| *p == path).count())
    }

    pub fn total_requests(&self) -> usize {
        self.with(|s| s.requests.len())
    }

    /// Raw query string of the most recent request that had one
    pub fn last_query(&self) -> Option<String> {
        self.with(|s| s.last_query.clone())
    }

    /// `(username, password)` of the last `/login` form
    pub fn last_login_form(&self) -> Option<(String, String)> {
        self.with(|s| s.last_login.clone())
    }

    /// Make `/login` answer with `status` and an empty body
    pub fn set_login_status_without_detail(&self, status: u16) {
        let status = StatusCode::from_u16(status).unwrap();
        self.with(|s| s.login_status = Some(status));
    }

    /// Make `/login` reject every credential
    pub fn set_refuse_logins(&self, refuse: bool) {
        self.with(|s| s.refuse_logins = refuse);
    }

    /// Make `/me` reject every token
    pub fn set_reject_profile(&self, reject: bool) {
        self.with(|s| s.reject_profile = reject);
    }

    /// Make list, get, create and update fail with a server error
    pub fn set_fail_readings(&self, fail: bool) {
        self.with(|s| s.fail_readings = fail);
    }

    /// Make deletes fail with a bare 500
    pub fn set_fail_deletes(&self, fail: bool) {
        self.with(|s| s.fail_deletes = fail);
    }

    /// Delay every response
    pub fn set_latency(&self, latency: Duration) {
        self.with(|s| s.latency = Some(latency));
    }
}

fn router(state: Shared) -> Router {
    Router::new()
        .route("/api/login", post(login))
        .route("/api/register", post(register))
        .route("/api/me", get(me))
        .route("/api/readings", get(list_readings).post(create_reading))
        .route(
            "/api/readings/:id",
            get(get_reading).patch(update_reading).delete(delete_reading),
        )
        .layer(middleware::from_fn_with_state(state.clone(), record))
        .with_state(state)
}

async fn record(State(state): State<Shared>, request: Request, next: Next) -> Response {
    let uri = request.uri();
    let path = uri.path();
    let path = path.strip_prefix("/api").unwrap_or(path).to_string();
    let query = uri.query().map(str::to_string);

    let latency = {
        let mut s = state.lock().unwrap();
        s.requests.push(path);
        if query.is_some() {
            s.last_query = query;
        }
        s.latency
    };
    if let Some(latency) = latency {
        tokio::time::sleep(latency).await;
    }

    next.run(request).await
}

/// Email behind the request's bearer token
fn authenticate(state: &FakeState, headers: &HeaderMap) -> Result<String, Fail> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .and_then(|token| state.tokens.get(token))
        .cloned()
        .ok_or_else(Fail::unauthorized)
}

#[derive(Deserialize)]
struct LoginFields {
    username: String,
    password: String,
}

async fn login(
    State(state): State<Shared>,
    Form(fields): Form<LoginFields>,
) -> Result<Json<serde_json::Value>, Fail> {
    let mut s = state.lock().unwrap();
    s.last_login = Some((fields.username.clone(), fields.password.clone()));

    if let Some(status) = s.login_status {
        return Err(Fail(status, None));
    }
    if s.refuse_logins {
        return Err(Fail::detail(StatusCode::UNAUTHORIZED, "Login temporarily disabled"));
    }

    let valid = s
        .users
        .get(&fields.username)
        .is_some_and(|u| u.password == fields.password);
    if !valid {
        return Err(Fail::detail(
            StatusCode::UNAUTHORIZED,
            "Incorrect email or password",
        ));
    }

    let token = s.issue_token(&fields.username);
    Ok(Json(json!({ "access_token": token, "token_type": "bearer" })))
}

#[derive(Deserialize)]
struct RegisterFields {
    full_name: String,
    email: String,
    password: String,
    role: String,
}

async fn register(
    State(state): State<Shared>,
    Json(fields): Json<RegisterFields>,
) -> Result<impl IntoResponse, Fail> {
    let mut s = state.lock().unwrap();
    if s.users.contains_key(&fields.email) {
        return Err(Fail::detail(StatusCode::BAD_REQUEST, "Email already registered"));
    }
    s.add_user(
        &fields.email,
        Some(&fields.full_name),
        &fields.password,
        &fields.role,
    );
    Ok((
        StatusCode::CREATED,
        Json(json!({ "email": fields.email, "full_name": fields.full_name, "role": fields.role })),
    ))
}

async fn me(
    State(state): State<Shared>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, Fail> {
    let s = state.lock().unwrap();
    if s.reject_profile {
        return Err(Fail::unauthorized());
    }
    let email = authenticate(&s, &headers)?;
    let user = s.users.get(&email).ok_or_else(Fail::unauthorized)?;
    Ok(Json(json!({
        "email": email,
        "full_name": user.full_name,
        "role": user.role,
        "id": user.id,
    })))
}

fn metric(reading: &Reading, name: &str) -> Option<f64> {
    let m = &reading.metrics;
    match name {
        "step_count" => m.step_count.map(f64::from),
        "sleep_hours" => m.sleep_hours,
        "exercise_minutes" => m.exercise_minutes.map(f64::from),
        "calorie_count" => m.calorie_count.map(f64::from),
        "protein_intake_g" => m.protein_grams,
        "carb_intake_g" => m.carb_grams,
        _ => None,
    }
}

fn matches_filter(reading: &Reading, params: &HashMap<String, String>) -> bool {
    params.iter().all(|(key, raw)| {
        if key == "reading_type" {
            return reading.reading_type.as_str() == raw;
        }
        if key == "start" || key == "end" {
            let Some(bound) = wire_time::parse(raw) else {
                return false;
            };
            return if key == "start" {
                reading.recorded_at >= bound
            } else {
                reading.recorded_at <= bound
            };
        }
        let Ok(bound) = raw.parse::<f64>() else {
            return true;
        };
        if let Some(name) = key.strip_prefix("min_") {
            metric(reading, name).is_some_and(|v| v >= bound)
        } else if let Some(name) = key.strip_prefix("max_") {
            metric(reading, name).is_some_and(|v| v <= bound)
        } else {
            true
        }
    })
}

async fn list_readings(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(mut params): Query<HashMap<String, String>>,
) -> Result<Json<serde_json::Value>, Fail> {
    let s = state.lock().unwrap();
    let email = authenticate(&s, &headers)?;
    if s.fail_readings {
        return Err(Fail::unavailable());
    }

    let page: usize = params
        .remove("page")
        .and_then(|p| p.parse().ok())
        .unwrap_or(1);
    let size: usize = params
        .remove("size")
        .and_then(|p| p.parse().ok())
        .unwrap_or(10);

    let mut mine: Vec<&Reading> = s
        .readings
        .iter()
        .filter(|(owner, r)| *owner == email && matches_filter(r, &params))
        .map(|(_, r)| r)
        .collect();
    mine.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at).then(b.id.cmp(&a.id)));

    let items: Vec<&Reading> = mine
        .iter()
        .skip(page.saturating_sub(1) * size)
        .take(size)
        .copied()
        .collect();

    Ok(Json(json!({
        "total": mine.len(),
        "page": page,
        "size": size,
        "readings": items,
    })))
}

async fn create_reading(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(payload): Json<ReadingPayload>,
) -> Result<impl IntoResponse, Fail> {
    let mut s = state.lock().unwrap();
    let email = authenticate(&s, &headers)?;
    if s.fail_readings {
        return Err(Fail::unavailable());
    }
    let reading = s.insert_reading(&email, payload);
    Ok((StatusCode::CREATED, Json(reading)))
}

async fn get_reading(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<Reading>, Fail> {
    let s = state.lock().unwrap();
    let email = authenticate(&s, &headers)?;
    if s.fail_readings {
        return Err(Fail::unavailable());
    }
    let index = s.position(&email, id).ok_or_else(Fail::not_found)?;
    Ok(Json(s.readings[index].1.clone()))
}

async fn update_reading(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(payload): Json<ReadingPayload>,
) -> Result<Json<Reading>, Fail> {
    let mut s = state.lock().unwrap();
    let email = authenticate(&s, &headers)?;
    if s.fail_readings {
        return Err(Fail::unavailable());
    }
    let index = s.position(&email, id).ok_or_else(Fail::not_found)?;
    let reading = payload.into_reading(ReadingId(id));
    s.readings[index].1 = reading.clone();
    Ok(Json(reading))
}

async fn delete_reading(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<StatusCode, Fail> {
    let mut s = state.lock().unwrap();
    let email = authenticate(&s, &headers)?;
    if s.fail_deletes {
        return Err(Fail(StatusCode::INTERNAL_SERVER_ERROR, None));
    }
    let index = s.position(&email, id).ok_or_else(Fail::not_found)?;
    s.readings.remove(index);
    Ok(StatusCode::NO_CONTENT)
}
