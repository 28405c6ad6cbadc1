//! Wipes the configured database and loads a small demo catalog.
//!
//! Usage: `cargo run --bin seed`

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use coursemaster_api::{
    config::Config,
    grading,
    models::{
        course::{Batch, Course, SyllabusEntry, DEFAULT_BATCH},
        enrollment::Enrollment,
        lesson::{Lesson, Resource},
        module::{CourseModule, ModuleAssignment},
        quiz::{Question, Quiz},
        user::{EnrolledCourse, User, UserRole},
        ASSIGNMENTS, COURSES, ENROLLMENTS, LESSONS, MODULES, QUIZZES, QUIZ_ATTEMPTS, USERS,
    },
    services::{auth_service::AuthService, indexes},
};
use mongodb::{
    bson::{doc, oid::ObjectId, Document},
    Database,
};

struct LessonSeed {
    title: &'static str,
    minutes: u32,
    preview: bool,
}

struct ModuleSeed {
    title: &'static str,
    description: &'static str,
    lessons: &'static [LessonSeed],
}

struct CourseSeed {
    title: &'static str,
    description: &'static str,
    category: &'static str,
    tags: &'static [&'static str],
    price: f64,
    rating: f64,
    modules: &'static [ModuleSeed],
}

const CATALOG: &[CourseSeed] = &[
    CourseSeed {
        title: "Complete Web Development Bootcamp",
        description: "HTML, CSS, JavaScript and a backend, from first page to deployed app.",
        category: "Web Development",
        tags: &["html", "css", "javascript"],
        price: 89.99,
        rating: 4.7,
        modules: &[
            ModuleSeed {
                title: "HTML Fundamentals",
                description: "Structure of a web page",
                lessons: &[
                    LessonSeed { title: "Introduction to HTML", minutes: 15, preview: true },
                    LessonSeed { title: "Forms and Inputs", minutes: 25, preview: false },
                ],
            },
            ModuleSeed {
                title: "CSS Styling",
                description: "Layout, flexbox and grid",
                lessons: &[
                    LessonSeed { title: "Selectors and the Cascade", minutes: 20, preview: false },
                    LessonSeed { title: "Flexbox Layouts", minutes: 30, preview: false },
                ],
            },
        ],
    },
    CourseSeed {
        title: "Data Science with Python",
        description: "Pandas, visualisation and a first look at machine learning.",
        category: "Data Science",
        tags: &["python", "pandas", "ml"],
        price: 0.0,
        rating: 4.5,
        modules: &[ModuleSeed {
            title: "Python Refresher",
            description: "Just enough Python for data work",
            lessons: &[
                LessonSeed { title: "Data Types", minutes: 18, preview: true },
                LessonSeed { title: "Working with Pandas", minutes: 35, preview: false },
            ],
        }],
    },
];

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "seed=info,coursemaster_api=info".into()),
        )
        .init();

    let config = Config::load().context("Failed to load configuration")?;
    let client = mongodb::Client::with_uri_str(&config.mongo_uri)
        .await
        .context("Failed to connect to MongoDB")?;
    let db = client.database(&config.mongo_database);

    wipe(&db).await?;
    indexes::ensure_indexes(&db).await?;

    let admin = insert_user(&db, "System Administrator", "admin@coursemaster.com", "Admin123!", UserRole::Admin).await?;
    let instructor = insert_user(&db, "Dr. Sarah Johnson", "sarah@example.com", "Instructor123!", UserRole::Instructor).await?;
    let mut students = Vec::new();
    for (name, email) in [("John Doe", "john@example.com"), ("Jane Smith", "jane@example.com")] {
        students.push(insert_user(&db, name, email, "Student123!", UserRole::Student).await?);
    }
    tracing::info!("Created admin {} and {} students", admin, students.len());

    let mut first_course = None;
    for seed in CATALOG {
        let course_id = insert_course(&db, seed, instructor).await?;
        first_course.get_or_insert(course_id);
    }

    if let (Some(course_id), Some(student)) = (first_course, students.first()) {
        enroll(&db, *student, course_id).await?;
    }

    tracing::info!("Seed complete: {} courses", CATALOG.len());
    Ok(())
}

async fn wipe(db: &Database) -> Result<()> {
    for name in [USERS, COURSES, MODULES, LESSONS, QUIZZES, QUIZ_ATTEMPTS, ENROLLMENTS, ASSIGNMENTS] {
        db.collection::<Document>(name)
            .delete_many(doc! {})
            .await
            .with_context(|| format!("Failed to clear {}", name))?;
    }
    tracing::info!("Cleared existing data");
    Ok(())
}

async fn insert_user(db: &Database, name: &str, email: &str, password: &str, role: UserRole) -> Result<ObjectId> {
    let user = User {
        id: None,
        name: name.to_string(),
        email: email.to_string(),
        password_hash: AuthService::hash_password(password)?,
        role,
        avatar: format!(
            "https://ui-avatars.com/api/?name={}&background=4F46E5&color=fff",
            name.replace(' ', "+")
        ),
        bio: String::new(),
        phone: String::new(),
        enrolled_courses: Vec::new(),
        created_at: Utc::now(),
    };
    let result = db
        .collection::<User>(USERS)
        .insert_one(&user)
        .await
        .with_context(|| format!("Failed to insert user {}", email))?;
    result
        .inserted_id
        .as_object_id()
        .context("Inserted user has no ObjectId")
}

fn sample_quiz(module: ObjectId, topic: &str) -> Quiz {
    let questions = vec![
        Question {
            question: format!("Which statement about {} is true?", topic),
            options: vec![
                "It is covered in this module".to_string(),
                "It is never used in practice".to_string(),
            ],
            correct_answer: 0,
            points: 1,
        },
        Question {
            question: "How many options does this question have?".to_string(),
            options: vec!["One".to_string(), "Two".to_string(), "Three".to_string()],
            correct_answer: 2,
            points: 2,
        },
    ];
    Quiz {
        id: None,
        title: format!("{} Checkpoint", topic),
        module,
        total_points: grading::total_points(&questions),
        questions,
        passing_score: 70.0,
        time_limit: 15,
        allow_retake: true,
    }
}

async fn insert_course(db: &Database, seed: &CourseSeed, instructor: ObjectId) -> Result<ObjectId> {
    let course_id = ObjectId::new();
    let now = Utc::now();

    let mut module_ids = Vec::new();
    for (index, module_seed) in seed.modules.iter().enumerate() {
        let module_id = ObjectId::new();

        let lessons: Vec<Lesson> = module_seed
            .lessons
            .iter()
            .enumerate()
            .map(|(order, lesson)| Lesson {
                id: Some(ObjectId::new()),
                title: lesson.title.to_string(),
                description: format!("{} walkthrough", lesson.title),
                module: module_id,
                video_url: "https://www.youtube.com/embed/dQw4w9WgXcQ".to_string(),
                duration: lesson.minutes,
                order: order as i32 + 1,
                is_preview: lesson.preview,
                resources: vec![Resource {
                    title: "Slides".to_string(),
                    url: "https://example.com/slides.pdf".to_string(),
                    kind: "pdf".to_string(),
                }],
            })
            .collect();
        db.collection::<Lesson>(LESSONS)
            .insert_many(&lessons)
            .await
            .context("Failed to insert lessons")?;

        // Only the first module of each course gets a quiz
        let quiz = if index == 0 {
            let result = db
                .collection::<Quiz>(QUIZZES)
                .insert_one(sample_quiz(module_id, module_seed.title))
                .await
                .context("Failed to insert quiz")?;
            result.inserted_id.as_object_id()
        } else {
            None
        };

        let module = CourseModule {
            id: Some(module_id),
            title: module_seed.title.to_string(),
            description: module_seed.description.to_string(),
            course: course_id,
            order: index as i32 + 1,
            lessons: lessons.iter().filter_map(|l| l.id).collect(),
            quiz,
            assignment: Some(ModuleAssignment {
                title: format!("{} project", module_seed.title),
                description: "Submit a link to your work".to_string(),
                due_date: Some(now + Duration::days(14 * (index as i64 + 1))),
            }),
        };
        db.collection::<CourseModule>(MODULES)
            .insert_one(&module)
            .await
            .context("Failed to insert module")?;
        module_ids.push(module_id);
    }

    let course = Course {
        id: Some(course_id),
        title: seed.title.to_string(),
        description: seed.description.to_string(),
        instructor,
        category: seed.category.to_string(),
        tags: seed.tags.iter().map(|t| t.to_string()).collect(),
        price: seed.price,
        thumbnail: String::new(),
        syllabus: seed
            .modules
            .iter()
            .enumerate()
            .map(|(week, m)| SyllabusEntry {
                week: week as u32 + 1,
                topic: m.title.to_string(),
                description: m.description.to_string(),
            })
            .collect(),
        modules: module_ids,
        batches: vec![
            Batch {
                id: ObjectId::new(),
                name: DEFAULT_BATCH.to_string(),
                start_date: None,
                end_date: None,
                max_students: 0,
            },
            Batch {
                id: ObjectId::new(),
                name: "Evening Cohort".to_string(),
                start_date: Some(now + Duration::days(7)),
                end_date: Some(now + Duration::days(97)),
                max_students: 30,
            },
        ],
        rating: seed.rating,
        total_students: 0,
        is_published: true,
        created_at: now,
    };
    db.collection::<Course>(COURSES)
        .insert_one(&course)
        .await
        .with_context(|| format!("Failed to insert course {}", seed.title))?;

    tracing::info!("Seeded course {} with {} modules", seed.title, seed.modules.len());
    Ok(course_id)
}

async fn enroll(db: &Database, student: ObjectId, course: ObjectId) -> Result<()> {
    let now = Utc::now();
    let enrollment = Enrollment {
        id: None,
        student,
        course,
        batch: DEFAULT_BATCH.to_string(),
        progress: 0,
        completed_lessons: Vec::new(),
        enrolled_at: now,
        last_accessed: None,
        completed_at: None,
    };
    db.collection::<Enrollment>(ENROLLMENTS)
        .insert_one(&enrollment)
        .await
        .context("Failed to insert enrollment")?;

    let entry = EnrolledCourse {
        course,
        progress: 0,
        completed_lessons: Vec::new(),
        enrollment_date: now,
        batch: DEFAULT_BATCH.to_string(),
    };
    let entry = mongodb::bson::to_bson(&entry).context("Failed to encode enrolled course")?;
    db.collection::<Document>(USERS)
        .update_one(doc! { "_id": student }, doc! { "$push": { "enrolledCourses": entry } })
        .await
        .context("Failed to update student")?;
    db.collection::<Document>(COURSES)
        .update_one(doc! { "_id": course }, doc! { "$inc": { "totalStudents": 1 } })
        .await
        .context("Failed to update course")?;

    tracing::info!("Enrolled student {} in course {}", student, course);
    Ok(())
}
