//! Role session manager.
//!
//! Ties the endpoint resolver, the login transport and the session store
//! together. The UI layer owns a manager and calls it directly; outcomes are
//! reported back through [`LoginUi`].

use std::fmt;

use anyhow::Result;
use tracing::{error, info};

use super::{EndpointResolver, LoginError, LoginForm, LoginTransport};
use crate::config::Config;
use crate::http::build_client;
use crate::role::Role;
use crate::session::{Session, SessionStatus, SessionStore, TOKEN_KEY, mask_token};

/// Shown when the session invariant check fails.
pub const SESSION_EXPIRED_MESSAGE: &str = "Session expired or invalid login. Please log in again.";
/// Shown when the session could not be persisted after a successful login.
pub const UNEXPECTED_ERROR_MESSAGE: &str =
    "An error occurred while trying to log in. Please try again.";

/// Where patients land after logging out.
pub const PATIENT_LOGOUT_PATH: &str = "/pages/patientDashboard.html";

/// Callbacks into the presentation layer.
pub trait LoginUi {
    /// Shows a message to the user.
    fn notify(&mut self, message: &str);
    /// Closes the open login form, if any.
    fn close_modal(&mut self);
    /// Moves to another page.
    fn navigate(&mut self, path: &str);
}

/// Login state machine: `Idle -> Submitting -> {Authenticated, Rejected, Exhausted}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginState {
    Idle,
    Submitting,
    Authenticated {
        role: Role,
        token: String,
        landing: String,
    },
    Rejected(String),
    Exhausted(String),
}

/// Why a role-gated action was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// No session for the required role.
    NotLoggedIn { required: Role },
    /// The stored privileged role had no token and was reset.
    Expired { required: Role, stale: Role },
    /// A session exists but for another role.
    WrongRole { required: Role, actual: Role },
}

impl AccessError {
    pub fn required(&self) -> Role {
        match self {
            AccessError::NotLoggedIn { required }
            | AccessError::Expired { required, .. }
            | AccessError::WrongRole { required, .. } => *required,
        }
    }
}

impl fmt::Display for AccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessError::NotLoggedIn { required } => {
                write!(f, "Not logged in as {}.", required.label())
            }
            AccessError::Expired { .. } => f.write_str(SESSION_EXPIRED_MESSAGE),
            AccessError::WrongRole { required, actual } => write!(
                f,
                "This action needs the {} role (logged in as {}).",
                required.label(),
                actual.label()
            ),
        }
    }
}

impl std::error::Error for AccessError {}

pub struct RoleSessionManager {
    resolver: EndpointResolver,
    transport: LoginTransport,
    store: SessionStore,
    state: LoginState,
}

impl RoleSessionManager {
    pub fn new(resolver: EndpointResolver, transport: LoginTransport, store: SessionStore) -> Self {
        Self {
            resolver,
            transport,
            store,
            state: LoginState::Idle,
        }
    }

    /// Builds a manager from config (env overrides applied) over `store`.
    ///
    /// # Errors
    /// Returns an error if the server URL is invalid or the HTTP client
    /// cannot be built.
    pub fn from_config(config: &Config, store: SessionStore) -> Result<Self> {
        let resolver = EndpointResolver::from_config(config)?;
        let transport = LoginTransport::new(build_client(config.request_timeout())?);
        Ok(Self::new(resolver, transport, store))
    }

    pub fn state(&self) -> &LoginState {
        &self.state
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn resolver(&self) -> &EndpointResolver {
        &self.resolver
    }

    /// Validates the form, probes the role's endpoints and, on success,
    /// persists the session and navigates to the landing page.
    ///
    /// Failures are reported through `ui.notify` and leave the session
    /// untouched. The returned state is the terminal outcome; the manager
    /// itself goes back to `Idle` after a failure.
    pub async fn submit(&mut self, form: LoginForm, ui: &mut dyn LoginUi) -> LoginState {
        let credentials = match form.validate() {
            Ok(credentials) => credentials,
            Err(err) => return self.fail(&err, ui),
        };

        self.state = LoginState::Submitting;
        let role = credentials.role();
        let cached = match role {
            Role::Admin => self.store.last_good_admin_url(),
            Role::Doctor | Role::Patient | Role::LoggedPatient => None,
        };
        let candidates = self.resolver.resolve_candidates(role, cached.as_deref());
        info!(role = role.id(), candidates = candidates.len(), "submitting login");

        let authenticated = match self
            .transport
            .attempt_sequence(&candidates, &credentials)
            .await
        {
            Ok(authenticated) => authenticated,
            Err(err) => return self.fail(&err, ui),
        };

        let session = Session {
            token: authenticated.token,
            role: credentials.session_role(),
        };
        if let Err(err) = self.persist(&session, role, &authenticated.url) {
            error!(error = ?err, "failed to persist session");
            ui.notify(UNEXPECTED_ERROR_MESSAGE);
            self.state = LoginState::Idle;
            return LoginState::Rejected(UNEXPECTED_ERROR_MESSAGE.to_string());
        }

        let landing = credentials.landing_path(&session.token);
        info!(
            role = session.role.id(),
            token = %mask_token(&session.token),
            url = %authenticated.url,
            "login succeeded"
        );
        ui.close_modal();
        ui.navigate(&landing);

        self.state = LoginState::Authenticated {
            role: session.role,
            token: session.token,
            landing,
        };
        self.state.clone()
    }

    fn persist(&mut self, session: &Session, role: Role, url: &str) -> Result<()> {
        self.store.save_session(session)?;
        if role == Role::Admin {
            self.store.remember_admin_url(url)?;
        }
        Ok(())
    }

    fn fail(&mut self, err: &LoginError, ui: &mut dyn LoginUi) -> LoginState {
        info!(reason = %err, "login failed");
        ui.notify(err.message());
        self.state = LoginState::Idle;
        match err {
            LoginError::EndpointNotFound(message) => LoginState::Exhausted(message.clone()),
            LoginError::Validation(message)
            | LoginError::Credentials(message)
            | LoginError::MalformedResponse(message) => LoginState::Rejected(message.clone()),
        }
    }

    /// Applies the session invariant. An expired session is reported to the
    /// user and sent back to the entry page.
    ///
    /// # Errors
    /// Returns an error if the store cannot persist the reset.
    pub fn check_session(&mut self, ui: &mut dyn LoginUi) -> Result<SessionStatus> {
        let status = self.store.check()?;
        if let SessionStatus::Expired(_) = status {
            ui.notify(SESSION_EXPIRED_MESSAGE);
            ui.navigate("/");
        }
        Ok(status)
    }

    /// Checks the session invariant, then requires an active session for
    /// `required`. An expired session is reset and reported as in
    /// [`Self::check_session`].
    ///
    /// # Errors
    /// Returns [`AccessError`] when the action is not allowed, or a storage
    /// error if the reset cannot be persisted.
    pub fn authorize(&mut self, required: Role, ui: &mut dyn LoginUi) -> Result<Session> {
        let denied = match self.check_session(ui)? {
            SessionStatus::Active(session) if session.role == required => return Ok(session),
            SessionStatus::Active(session) => AccessError::WrongRole {
                required,
                actual: session.role,
            },
            SessionStatus::Expired(stale) => AccessError::Expired { required, stale },
            SessionStatus::Anonymous(_) => AccessError::NotLoggedIn { required },
        };
        info!(required = required.id(), reason = %denied, "access denied");
        Err(denied.into())
    }

    /// Ends the session and returns to the entry page.
    ///
    /// # Errors
    /// Returns an error if the store cannot persist the removal.
    pub fn logout(&mut self, ui: &mut dyn LoginUi) -> Result<()> {
        self.store.clear()?;
        self.state = LoginState::Idle;
        ui.navigate("/");
        Ok(())
    }

    /// Drops the patient's token but keeps browsing as an anonymous patient.
    ///
    /// # Errors
    /// Returns an error if the store cannot persist the change.
    pub fn logout_patient(&mut self, ui: &mut dyn LoginUi) -> Result<()> {
        self.store.remove(TOKEN_KEY)?;
        self.store.select_role(Role::Patient)?;
        self.state = LoginState::Idle;
        info!("patient logged out");
        ui.navigate(PATIENT_LOGOUT_PATH);
        Ok(())
    }

    /// Records a role choice made without logging in.
    ///
    /// # Errors
    /// Returns an error if the store cannot persist the role.
    pub fn select_role(&mut self, role: Role) -> Result<()> {
        self.store.select_role(role)
    }

    /// Home page for the stored role.
    pub fn home_path(&self) -> &'static str {
        self.store.role().map_or("/", |role| role.home_path())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::session::{ADMIN_LAST_GOOD_URL_KEY, LEGACY_ROLE_KEY, ROLE_KEY};

    #[derive(Debug, Default)]
    struct RecordingUi {
        notices: Vec<String>,
        modal_closed: usize,
        navigations: Vec<String>,
    }

    impl LoginUi for RecordingUi {
        fn notify(&mut self, message: &str) {
            self.notices.push(message.to_string());
        }

        fn close_modal(&mut self) {
            self.modal_closed += 1;
        }

        fn navigate(&mut self, path: &str) {
            self.navigations.push(path.to_string());
        }
    }

    fn can_bind_localhost() -> bool {
        std::net::TcpListener::bind("127.0.0.1:0").is_ok()
    }

    fn manager(origin: &str, api_path: &str, store: SessionStore) -> RoleSessionManager {
        RoleSessionManager::new(
            EndpointResolver::new(origin, api_path, None),
            LoginTransport::new(reqwest::Client::new()),
            store,
        )
    }

    #[tokio::test]
    async fn test_empty_password_never_hits_network() {
        if !can_bind_localhost() {
            eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "T"})))
            .expect(0)
            .mount(&server)
            .await;

        let mut mgr = manager(&server.uri(), "/api", SessionStore::in_memory());
        let mut ui = RecordingUi::default();
        let state = mgr
            .submit(LoginForm::new(Role::Admin, "a", ""), &mut ui)
            .await;

        assert_eq!(
            state,
            LoginState::Rejected("Please enter both username and password.".into())
        );
        assert_eq!(ui.notices, vec!["Please enter both username and password."]);
        assert!(ui.navigations.is_empty());
        assert_eq!(mgr.state(), &LoginState::Idle);
        assert_eq!(mgr.store().token(), None);
    }

    #[tokio::test]
    async fn test_admin_scenario_falls_back_and_caches_endpoint() {
        if !can_bind_localhost() {
            eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/admin"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/apiadmin"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "T1"})))
            .expect(1)
            .mount(&server)
            .await;

        let mut mgr = manager(&server.uri(), "/api", SessionStore::in_memory());
        let mut ui = RecordingUi::default();
        let state = mgr
            .submit(LoginForm::new(Role::Admin, "a", "b"), &mut ui)
            .await;

        assert_eq!(
            state,
            LoginState::Authenticated {
                role: Role::Admin,
                token: "T1".into(),
                landing: "/adminDashboard/T1".into(),
            }
        );
        let store = mgr.store();
        assert_eq!(store.get(TOKEN_KEY).as_deref(), Some("T1"));
        assert_eq!(store.get(ROLE_KEY).as_deref(), Some("admin"));
        assert_eq!(
            store.get(ADMIN_LAST_GOOD_URL_KEY),
            Some(format!("{}/apiadmin", server.uri()))
        );
        assert_eq!(ui.modal_closed, 1);
        assert_eq!(ui.navigations, vec!["/adminDashboard/T1"]);
        assert!(ui.notices.is_empty());
    }

    #[tokio::test]
    async fn test_cached_endpoint_is_tried_first() {
        if !can_bind_localhost() {
            eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/admin"))
            .respond_with(ResponseTemplate::new(404))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/admin/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"jwt": "J"})))
            .expect(1)
            .mount(&server)
            .await;

        let mut store = SessionStore::in_memory();
        store
            .remember_admin_url(&format!("{}/admin/login", server.uri()))
            .unwrap();
        let mut mgr = manager(&server.uri(), "/api", store);
        let mut ui = RecordingUi::default();
        let state = mgr
            .submit(LoginForm::new(Role::Admin, "a", "b"), &mut ui)
            .await;

        assert!(matches!(state, LoginState::Authenticated { ref token, .. } if token == "J"));
    }

    #[tokio::test]
    async fn test_success_replaces_previous_session() {
        if !can_bind_localhost() {
            eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/doctor/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"accessToken": "D1"})))
            .expect(1)
            .mount(&server)
            .await;

        let mut store = SessionStore::in_memory();
        store.set(TOKEN_KEY, "stale").unwrap();
        store.set(LEGACY_ROLE_KEY, "admin").unwrap();
        let mut mgr = manager(&server.uri(), "", store);
        let mut ui = RecordingUi::default();
        mgr.submit(LoginForm::new(Role::Doctor, "doc@x.test", "pw"), &mut ui)
            .await;

        let store = mgr.store();
        assert_eq!(store.token().as_deref(), Some("D1"));
        assert_eq!(store.role(), Some(Role::Doctor));
        assert_eq!(store.get(LEGACY_ROLE_KEY), None);
        assert_eq!(store.last_good_admin_url(), None);
        assert_eq!(ui.navigations, vec!["/doctorDashboard/D1"]);
    }

    #[tokio::test]
    async fn test_patient_login_lands_without_token_in_path() {
        if !can_bind_localhost() {
            eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/patient/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "P1"})))
            .expect(1)
            .mount(&server)
            .await;

        let mut mgr = manager(&server.uri(), "", SessionStore::in_memory());
        let mut ui = RecordingUi::default();
        mgr.submit(LoginForm::new(Role::Patient, "p@x.test", "pw"), &mut ui)
            .await;

        assert_eq!(mgr.store().role(), Some(Role::LoggedPatient));
        assert_eq!(mgr.store().token().as_deref(), Some("P1"));
        assert_eq!(ui.navigations, vec!["/pages/loggedPatientDashboard.html"]);
        assert_eq!(mgr.home_path(), "/pages/loggedPatientDashboard.html");
    }

    #[tokio::test]
    async fn test_rejection_leaves_session_untouched() {
        if !can_bind_localhost() {
            eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/doctor/login"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let mut store = SessionStore::in_memory();
        store.select_role(Role::Patient).unwrap();
        let mut mgr = manager(&server.uri(), "", store);
        let mut ui = RecordingUi::default();
        let state = mgr
            .submit(LoginForm::new(Role::Doctor, "doc", "bad"), &mut ui)
            .await;

        assert_eq!(state, LoginState::Rejected("Invalid credentials".into()));
        assert_eq!(ui.notices, vec!["Invalid credentials"]);
        assert_eq!(mgr.state(), &LoginState::Idle);
        assert_eq!(mgr.store().role(), Some(Role::Patient));
        assert_eq!(mgr.store().token(), None);
    }

    #[tokio::test]
    async fn test_exhausted_when_no_endpoint_answers() {
        if !can_bind_localhost() {
            eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404))
            .expect(4)
            .mount(&server)
            .await;

        let mut mgr = manager(&server.uri(), "/api", SessionStore::in_memory());
        let mut ui = RecordingUi::default();
        let state = mgr
            .submit(LoginForm::new(Role::Admin, "a", "b"), &mut ui)
            .await;

        assert_eq!(
            state,
            LoginState::Exhausted("Login endpoint not found. Please try again later.".into())
        );
        assert_eq!(mgr.store().last_good_admin_url(), None);
    }

    #[test]
    fn test_check_session_expired_notifies_and_redirects() {
        let mut store = SessionStore::in_memory();
        store.select_role(Role::Admin).unwrap();
        let mut mgr = manager("http://clinic.test", "", store);
        let mut ui = RecordingUi::default();

        let status = mgr.check_session(&mut ui).unwrap();

        assert_eq!(status, SessionStatus::Expired(Role::Admin));
        assert_eq!(ui.notices, vec![SESSION_EXPIRED_MESSAGE]);
        assert_eq!(ui.navigations, vec!["/"]);
        assert_eq!(mgr.home_path(), "/");
    }

    #[test]
    fn test_authorize_returns_matching_session() {
        let mut store = SessionStore::in_memory();
        store
            .save_session(&Session {
                token: "AT".into(),
                role: Role::Admin,
            })
            .unwrap();
        let mut mgr = manager("http://clinic.test", "", store);
        let mut ui = RecordingUi::default();

        let session = mgr.authorize(Role::Admin, &mut ui).unwrap();

        assert_eq!(session.token, "AT");
        assert!(ui.notices.is_empty());
    }

    #[test]
    fn test_authorize_rejects_other_role() {
        let mut store = SessionStore::in_memory();
        store
            .save_session(&Session {
                token: "PT".into(),
                role: Role::LoggedPatient,
            })
            .unwrap();
        let mut mgr = manager("http://clinic.test", "", store);
        let mut ui = RecordingUi::default();

        let err = mgr.authorize(Role::Admin, &mut ui).unwrap_err();

        assert_eq!(
            err.downcast_ref::<AccessError>(),
            Some(&AccessError::WrongRole {
                required: Role::Admin,
                actual: Role::LoggedPatient,
            })
        );
        assert_eq!(mgr.store().token().as_deref(), Some("PT"));
    }

    #[test]
    fn test_authorize_resets_stale_privileged_role() {
        let mut store = SessionStore::in_memory();
        store.select_role(Role::Doctor).unwrap();
        let mut mgr = manager("http://clinic.test", "", store);
        let mut ui = RecordingUi::default();

        let err = mgr.authorize(Role::Doctor, &mut ui).unwrap_err();

        assert_eq!(
            err.downcast_ref::<AccessError>(),
            Some(&AccessError::Expired {
                required: Role::Doctor,
                stale: Role::Doctor,
            })
        );
        assert_eq!(ui.notices, vec![SESSION_EXPIRED_MESSAGE]);
        assert_eq!(ui.navigations, vec!["/"]);
        assert_eq!(mgr.store().role(), None);
    }

    #[test]
    fn test_authorize_anonymous_patient_is_not_logged_in() {
        let mut store = SessionStore::in_memory();
        store.select_role(Role::Patient).unwrap();
        let mut mgr = manager("http://clinic.test", "", store);
        let mut ui = RecordingUi::default();

        let err = mgr.authorize(Role::LoggedPatient, &mut ui).unwrap_err();

        assert_eq!(
            err.downcast_ref::<AccessError>(),
            Some(&AccessError::NotLoggedIn {
                required: Role::LoggedPatient
            })
        );
        assert!(ui.notices.is_empty());
    }

    #[test]
    fn test_logout_clears_session() {
        let mut store = SessionStore::in_memory();
        store
            .save_session(&Session {
                token: "tok".into(),
                role: Role::Doctor,
            })
            .unwrap();
        let mut mgr = manager("http://clinic.test", "", store);
        let mut ui = RecordingUi::default();

        mgr.logout(&mut ui).unwrap();

        assert_eq!(mgr.store().token(), None);
        assert_eq!(mgr.store().role(), None);
        assert_eq!(ui.navigations, vec!["/"]);
    }

    #[test]
    fn test_logout_patient_keeps_patient_role() {
        let mut store = SessionStore::in_memory();
        store
            .save_session(&Session {
                token: "tok".into(),
                role: Role::LoggedPatient,
            })
            .unwrap();
        let mut mgr = manager("http://clinic.test", "", store);
        let mut ui = RecordingUi::default();

        mgr.logout_patient(&mut ui).unwrap();

        assert_eq!(mgr.store().token(), None);
        assert_eq!(mgr.store().role(), Some(Role::Patient));
        assert_eq!(ui.navigations, vec![PATIENT_LOGOUT_PATH]);
        assert_eq!(mgr.home_path(), "/");
    }

    #[test]
    fn test_select_role_and_home_path() {
        let mut mgr = manager("http://clinic.test", "", SessionStore::in_memory());
        assert_eq!(mgr.home_path(), "/");

        mgr.select_role(Role::Doctor).unwrap();
        assert_eq!(mgr.home_path(), "/pages/doctorDashboard.html");
    }
}
