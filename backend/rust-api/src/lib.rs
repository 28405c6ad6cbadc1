use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method},
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod error;
pub mod extractors;
pub mod grading;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod progress;
pub mod services;
pub mod utils;

pub use config::Config;
pub use services::AppState;

use services::upload_service::{MAX_FILES_PER_REQUEST, MAX_FILE_SIZE};

/// Room for multipart framing around the largest accepted batch
const UPLOAD_BODY_LIMIT: usize = MAX_FILE_SIZE * MAX_FILES_PER_REQUEST + 1024 * 1024;

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(tower_http::cors::Any);

    Router::new()
        .route("/", get(handlers::home))
        .route("/health", get(handlers::health_check))
        .route(
            "/metrics",
            get(handlers::metrics_handler).layer(middleware::from_fn_with_state(
                app_state.clone(),
                handlers::metrics_auth_middleware,
            )),
        )
        .nest("/api/auth", auth_routes(app_state.clone()))
        .nest("/api/courses", course_routes(app_state.clone()))
        .nest(
            "/api/students",
            student_routes().route_layer(middleware::from_fn_with_state(
                app_state.clone(),
                middlewares::auth::auth_middleware,
            )),
        )
        .nest(
            "/api/quizzes",
            quiz_routes().route_layer(middleware::from_fn_with_state(
                app_state.clone(),
                middlewares::auth::auth_middleware,
            )),
        )
        .nest(
            "/api/admin",
            admin_routes()
                .route_layer(middleware::from_fn(
                    middlewares::auth::admin_guard_middleware,
                ))
                .route_layer(middleware::from_fn_with_state(
                    app_state.clone(),
                    middlewares::auth::auth_middleware,
                )),
        )
        .nest("/api/uploads", upload_routes(app_state.clone()))
        .with_state(app_state)
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}

fn auth_routes(app_state: Arc<AppState>) -> Router<Arc<AppState>> {
    let register_route = Router::new()
        .route("/register", post(handlers::auth::register))
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            middlewares::rate_limit::register_rate_limit_middleware,
        ));

    let login_route = Router::new()
        .route("/login", post(handlers::auth::login))
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            middlewares::rate_limit::login_rate_limit_middleware,
        ));

    let protected_routes = Router::new()
        .route("/me", get(handlers::auth::me))
        .route("/logout", post(handlers::auth::logout))
        .route_layer(middleware::from_fn_with_state(
            app_state,
            middlewares::auth::auth_middleware,
        ));

    register_route.merge(login_route).merge(protected_routes)
}

fn course_routes(app_state: Arc<AppState>) -> Router<Arc<AppState>> {
    // Catalog reads work anonymously; a token, when sent, unlocks staff views
    let public_routes = Router::new()
        .route("/", get(handlers::courses::list_courses))
        .route("/{id}", get(handlers::courses::get_course))
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            middlewares::auth::optional_auth_middleware,
        ));

    let protected_routes = Router::new()
        .route("/", post(handlers::courses::create_course))
        .route(
            "/{id}",
            put(handlers::courses::update_course).delete(handlers::courses::delete_course),
        )
        .route("/{id}/enroll", post(handlers::courses::enroll))
        .route("/{id}/progress", get(handlers::courses::course_progress))
        .route(
            "/{id}/lessons/{lesson_id}/complete",
            post(handlers::courses::complete_lesson),
        )
        .route("/{id}/modules", post(handlers::courses::create_module))
        .route(
            "/{id}/modules/{module_id}",
            put(handlers::courses::update_module).delete(handlers::courses::delete_module),
        )
        .route(
            "/{id}/modules/{module_id}/lessons",
            post(handlers::courses::create_lesson),
        )
        .route(
            "/{id}/lessons/{lesson_id}",
            put(handlers::courses::update_lesson).delete(handlers::courses::delete_lesson),
        )
        .route_layer(middleware::from_fn_with_state(
            app_state,
            middlewares::auth::auth_middleware,
        ));

    public_routes.merge(protected_routes)
}

fn student_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/dashboard", get(handlers::students::dashboard))
        .route("/courses", get(handlers::students::enrolled_courses))
        .route("/courses/{course_id}", get(handlers::students::course_detail))
        .route(
            "/courses/{course_id}/lessons/{lesson_id}",
            get(handlers::students::lesson_detail),
        )
        .route(
            "/courses/{course_id}/progress",
            get(handlers::students::course_progress),
        )
        .route("/assignments", post(handlers::students::submit_assignment))
        .route(
            "/quizzes/{quiz_id}/submit",
            post(handlers::quizzes::submit_quiz),
        )
        .route(
            "/quizzes/{quiz_id}/results",
            get(handlers::quizzes::quiz_results),
        )
        .route("/profile", put(handlers::students::update_profile))
}

fn quiz_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(handlers::quizzes::create_quiz))
        .route(
            "/{quiz_id}",
            get(handlers::quizzes::get_quiz)
                .put(handlers::quizzes::update_quiz)
                .delete(handlers::quizzes::delete_quiz),
        )
        .route("/{quiz_id}/submit", post(handlers::quizzes::submit_quiz))
        .route("/{quiz_id}/results", get(handlers::quizzes::quiz_results))
        .route(
            "/course/{course_id}/attempts",
            get(handlers::quizzes::my_course_attempts),
        )
        .route(
            "/admin/course/{course_id}/attempts",
            get(handlers::quizzes::course_attempts),
        )
}

fn admin_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/dashboard", get(handlers::admin::dashboard))
        .route("/courses", get(handlers::admin::list_courses))
        .route(
            "/courses/{course_id}/enrollments",
            get(handlers::admin::course_enrollments),
        )
        .route(
            "/courses/{course_id}/batches",
            post(handlers::admin::create_batch),
        )
        .route("/students", get(handlers::admin::list_students))
        .route(
            "/students/{id}",
            put(handlers::admin::update_student).delete(handlers::admin::delete_student),
        )
        .route(
            "/students/{id}/enrollments",
            get(handlers::admin::student_enrollments),
        )
        .route("/assignments", get(handlers::admin::list_assignments))
        .route(
            "/assignments/{id}/review",
            put(handlers::admin::review_assignment),
        )
        .route(
            "/batches/{id}",
            put(handlers::admin::update_batch).delete(handlers::admin::delete_batch),
        )
        .route("/analytics", get(handlers::admin::analytics))
}

fn upload_routes(app_state: Arc<AppState>) -> Router<Arc<AppState>> {
    let public_routes = Router::new()
        .route("/{segment}", get(handlers::uploads::serve_root_file))
        .route(
            "/{segment}/{filename}",
            get(handlers::uploads::serve_folder_file),
        );

    let protected_routes = Router::new()
        .route(
            "/profile-picture",
            post(handlers::uploads::upload_profile_picture),
        )
        .route(
            "/course-thumbnail",
            post(handlers::uploads::upload_course_thumbnail),
        )
        .route(
            "/assignment",
            post(handlers::uploads::upload_assignment_files),
        )
        .route(
            "/lesson-resources",
            post(handlers::uploads::upload_lesson_resources),
        )
        .route_layer(middleware::from_fn_with_state(
            app_state,
            middlewares::auth::auth_middleware,
        ))
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT));

    public_routes.merge(protected_routes)
}
