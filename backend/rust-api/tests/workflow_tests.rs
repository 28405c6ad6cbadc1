//! End-to-end flows against a live MongoDB (`TEST_MONGO_URI`, default
//! `mongodb://localhost:27017`). Run with `cargo test -- --ignored`.

use axum::http::StatusCode;
use serde_json::{json, Value};

mod common;
use common::{create_db_test_app, error_message, TestApp, ADMIN_KEY};

async fn register(app: &TestApp, name: &str, email: &str, role: &str) -> (String, String) {
    let mut body = json!({
        "name": name,
        "email": email,
        "password": "secret123",
        "role": role,
    });
    if role == "admin" {
        body["registrationKey"] = json!(ADMIN_KEY);
    }
    let (status, body) = app.post("/api/auth/register", None, body).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    (
        body["data"]["token"].as_str().unwrap().to_string(),
        body["data"]["user"]["id"].as_str().unwrap().to_string(),
    )
}

fn id_of(body: &Value) -> String {
    body["data"]["id"].as_str().unwrap().to_string()
}

/// Published course with one module, two lessons and a 3 x 1 point quiz.
/// Returns (course, module, lessons, quiz) ids.
async fn build_course(app: &TestApp, instructor: &str) -> (String, String, Vec<String>, String) {
    let (status, body) = app
        .post(
            "/api/courses",
            Some(instructor),
            json!({
                "title": "Rust for Web Developers",
                "description": "From ownership to async web services",
                "category": "Programming",
                "tags": ["rust", "web"],
                "price": 49.0,
                "isPublished": true
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let course = id_of(&body);

    let (status, body) = app
        .post(
            &format!("/api/courses/{}/modules", course),
            Some(instructor),
            json!({
                "title": "Ownership",
                "assignment": { "title": "Borrow checker kata", "description": "Fix the code" }
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let module = id_of(&body);

    let mut lessons = Vec::new();
    for title in ["Moves", "Borrows"] {
        let (status, body) = app
            .post(
                &format!("/api/courses/{}/modules/{}/lessons", course, module),
                Some(instructor),
                json!({ "title": title, "duration": 10 }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        lessons.push(id_of(&body));
    }

    let question = |text: &str| {
        json!({ "question": text, "options": ["a", "b", "c"], "correctAnswer": 0, "points": 1 })
    };
    let (status, body) = app
        .post(
            "/api/quizzes",
            Some(instructor),
            json!({
                "moduleId": module,
                "title": "Ownership checkpoint",
                "questions": [question("q1"), question("q2"), question("q3")],
                "passingScore": 70
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["totalPoints"], 3);
    let quiz = id_of(&body);

    (course, module, lessons, quiz)
}

#[tokio::test]
#[ignore = "requires MongoDB"]
async fn test_student_learning_flow() {
    let app = create_db_test_app().await;
    let (instructor, _) = register(&app, "Ivy Instructor", "ivy@example.com", "instructor").await;
    let (student, _) = register(&app, "Sam Student", "sam@example.com", "student").await;
    let (course, module, lessons, quiz) = build_course(&app, &instructor).await;

    // Not enrolled yet
    let (status, _) = app
        .post(&format!("/api/quizzes/{}/submit", quiz), Some(&student), json!({ "answers": [0, 0, 1] }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .post(&format!("/api/courses/{}/enroll", course), Some(&student), json!({}))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["batch"], "Default Batch");

    let (status, body) = app
        .post(&format!("/api/courses/{}/enroll", course), Some(&student), json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_message(&body), "Already enrolled in this course");

    // Students never see the answer key
    let (status, body) = app.get(&format!("/api/quizzes/{}", quiz), Some(&student)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["questions"][0].get("correctAnswer").is_none());

    // Progress
    let (_, body) = app
        .get(&format!("/api/courses/{}/progress", course), Some(&student))
        .await;
    assert_eq!(body["data"]["progress"], 0);
    for lesson in &lessons {
        let (status, _) = app
            .post(
                &format!("/api/courses/{}/lessons/{}/complete", course, lesson),
                Some(&student),
                json!({}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }
    let (_, body) = app
        .get(&format!("/api/courses/{}/progress", course), Some(&student))
        .await;
    assert_eq!(body["data"]["progress"], 100);
    assert_eq!(body["data"]["completedLessons"], 2);

    // Grading: wrong answer count leaves no attempt behind
    let (status, _) = app
        .post(&format!("/api/quizzes/{}/submit", quiz), Some(&student), json!({ "answers": [0] }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .post(
            &format!("/api/students/quizzes/{}/submit", quiz),
            Some(&student),
            json!({ "answers": [0, 0, 1], "timeTaken": 42 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["attempt"]["score"], 66.67);
    assert_eq!(body["data"]["attempt"]["passed"], false);
    assert_eq!(body["data"]["attempt"]["attemptNumber"], 1);

    // No retakes on this quiz, from either route
    let (status, body) = app
        .post(&format!("/api/quizzes/{}/submit", quiz), Some(&student), json!({ "answers": [0, 0, 0] }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_message(&body), "Quiz already attempted");

    let (status, body) = app
        .get(&format!("/api/quizzes/{}/results", quiz), Some(&student))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["attempts"].as_array().unwrap().len(), 1);

    // Assignments: first submission creates, the second replaces it
    let submission = json!({
        "courseId": course,
        "moduleId": module,
        "submission": "https://github.com/sam/borrow-kata",
        "submissionType": "link"
    });
    let (status, _) = app
        .post("/api/students/assignments", Some(&student), submission.clone())
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = app
        .post("/api/students/assignments", Some(&student), submission)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["resubmitted"], true);

    let (status, body) = app.get("/api/students/dashboard", Some(&student)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["stats"]["totalCourses"], 1);
    assert_eq!(body["data"]["stats"]["completedCourses"], 1);

    app.cleanup().await;
}

#[tokio::test]
#[ignore = "requires MongoDB"]
async fn test_quiz_update_and_retakes() {
    let app = create_db_test_app().await;
    let (instructor, _) = register(&app, "Rita Retake", "rita@example.com", "instructor").await;
    let (student, _) = register(&app, "Tom Trier", "tom@example.com", "student").await;
    let (course, _, _, quiz) = build_course(&app, &instructor).await;

    // New question set: totals are recomputed and retakes switched on
    let (status, body) = app
        .put(
            &format!("/api/quizzes/{}", quiz),
            Some(&instructor),
            json!({
                "questions": [
                    { "question": "q1", "options": ["a", "b"], "correctAnswer": 0, "points": 2 },
                    { "question": "q2", "options": ["a", "b"], "correctAnswer": 1, "points": 3 }
                ],
                "allowRetake": true
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["totalPoints"], 5);
    assert_eq!(body["data"]["allowRetake"], true);
    assert_eq!(body["data"]["questions"].as_array().unwrap().len(), 2);

    let (status, _) = app
        .post(&format!("/api/courses/{}/enroll", course), Some(&student), json!({}))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let submit = format!("/api/quizzes/{}/submit", quiz);
    let (status, body) = app
        .post(&submit, Some(&student), json!({ "answers": [0, 0] }))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["attempt"]["score"], 40.0);
    assert_eq!(body["data"]["attempt"]["passed"], false);
    assert_eq!(body["data"]["attempt"]["attemptNumber"], 1);

    let (status, body) = app
        .post(&submit, Some(&student), json!({ "answers": [0, 1] }))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["attempt"]["score"], 100.0);
    assert_eq!(body["data"]["attempt"]["passed"], true);
    assert_eq!(body["data"]["attempt"]["attemptNumber"], 2);

    let (_, body) = app
        .get(&format!("/api/quizzes/{}/results", quiz), Some(&student))
        .await;
    assert_eq!(body["data"]["attempts"].as_array().unwrap().len(), 2);

    app.cleanup().await;
}

#[tokio::test]
#[ignore = "requires MongoDB"]
async fn test_catalog_visibility_and_ownership() {
    let app = create_db_test_app().await;
    let (owner, _) = register(&app, "Olga Owner", "olga@example.com", "instructor").await;
    let (other, _) = register(&app, "Otto Other", "otto@example.com", "instructor").await;

    let (status, body) = app
        .post(
            "/api/courses",
            Some(&owner),
            json!({
                "title": "Unreleased Course",
                "description": "Still being recorded",
                "category": "Drafts",
                "price": 0
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let course = id_of(&body);

    // Drafts stay out of the public catalog
    let (status, _) = app.get(&format!("/api/courses/{}", course), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, body) = app.get("/api/courses", None).await;
    assert_eq!(body["pagination"]["total"], 0);

    let (status, _) = app.get(&format!("/api/courses/{}", course), Some(&owner)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .put(&format!("/api/courses/{}", course), Some(&other), json!({ "price": 1 }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error_message(&body), "Not authorized to manage this course");

    let (status, _) = app
        .put(&format!("/api/courses/{}", course), Some(&owner), json!({ "isPublished": true }))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = app.get("/api/courses?search=unreleased", None).await;
    assert_eq!(body["pagination"]["total"], 1);

    let (status, _) = app.delete(&format!("/api/courses/{}", course), Some(&owner)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get(&format!("/api/courses/{}", course), Some(&owner)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    app.cleanup().await;
}

#[tokio::test]
#[ignore = "requires MongoDB"]
async fn test_admin_batches_and_review() {
    let app = create_db_test_app().await;
    let (admin, _) = register(&app, "Ada Admin", "ada@example.com", "admin").await;
    let (instructor, _) = register(&app, "Ivan Instructor", "ivan@example.com", "instructor").await;
    let (student, student_id) = register(&app, "Stella Student", "stella@example.com", "student").await;
    let (course, module, _, _) = build_course(&app, &instructor).await;

    let batch_uri = format!("/api/admin/courses/{}/batches", course);
    let (status, body) = app
        .post(&batch_uri, Some(&admin), json!({ "name": "Evening", "maxStudents": 1 }))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let batch = id_of(&body);

    let (status, body) = app
        .post(&batch_uri, Some(&admin), json!({ "name": "Evening" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_message(&body), "Batch name already exists");

    let (status, _) = app
        .post(
            &format!("/api/courses/{}/enroll", course),
            Some(&student),
            json!({ "batch": "Evening" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app.delete(&format!("/api/admin/batches/{}", batch), Some(&admin)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        error_message(&body),
        "Cannot delete batch with 1 enrolled students"
    );

    // Renaming carries the enrollment along
    let (status, _) = app
        .put(&format!("/api/admin/batches/{}", batch), Some(&admin), json!({ "name": "Late" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = app
        .get(&format!("/api/admin/courses/{}/enrollments?batch=Late", course), Some(&admin))
        .await;
    assert_eq!(body["pagination"]["total"], 1);

    // Review queue
    let (status, _) = app
        .post(
            "/api/students/assignments",
            Some(&student),
            json!({
                "courseId": course,
                "moduleId": module,
                "submission": "My essay about lifetimes",
                "submissionType": "text"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = app.get("/api/admin/assignments?status=pending", Some(&admin)).await;
    let pending = body["data"]["assignments"].as_array().unwrap();
    assert_eq!(pending.len(), 1);
    let assignment = pending[0]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .put(
            &format!("/api/admin/assignments/{}/review", assignment),
            Some(&admin),
            json!({ "grade": 88, "feedback": "Solid" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["graded"], true);

    let (_, body) = app.get("/api/admin/assignments?status=pending", Some(&admin)).await;
    assert!(body["data"]["assignments"].as_array().unwrap().is_empty());

    // Removing the student clears their enrollment
    let (status, _) = app
        .delete(&format!("/api/admin/students/{}", student_id), Some(&admin))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.delete(&format!("/api/admin/batches/{}", batch), Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.get("/api/admin/analytics?timeframe=week", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["timeframe"], "week");

    app.cleanup().await;
}

#[tokio::test]
#[ignore = "requires MongoDB"]
async fn test_auth_flow() {
    let app = create_db_test_app().await;
    let (token, _) = register(&app, "Lena Learner", "lena@example.com", "student").await;

    let (status, body) = app
        .post(
            "/api/auth/register",
            None,
            json!({ "name": "Lena Again", "email": "LENA@example.com", "password": "secret123" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_message(&body), "User already exists");

    let (status, body) = app
        .post(
            "/api/auth/register",
            None,
            json!({ "name": "Mallory", "email": "mallory@example.com", "password": "secret123", "role": "admin" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error_message(&body), "Invalid admin registration key");

    let (status, body) = app
        .post(
            "/api/auth/login",
            None,
            json!({ "email": "lena@example.com", "password": "wrong-password" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_message(&body), "Invalid credentials");

    let (status, body) = app.get("/api/auth/me", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "lena@example.com");

    app.cleanup().await;
}
