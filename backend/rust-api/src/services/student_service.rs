use std::collections::{HashMap, HashSet};
use std::future::IntoFuture;

use anyhow::Context;
use chrono::{DateTime, Utc};
use mongodb::bson::{doc, oid::ObjectId, Document};
use mongodb::options::ReturnDocument;
use mongodb::{Collection, Database};

use crate::error::{AppError, AppResult};
use crate::middlewares::auth::AuthUser;
use crate::models::api::{PageParams, Pagination};
use crate::models::assignment::AssignmentView;
use crate::models::course::{CourseBrief, CourseDetail, CourseView};
use crate::models::enrollment::{
    DashboardStats, Enrollment, EnrollmentView, LessonDetail, ModuleProgress, ProgressStatus,
    RecentActivity, StudentCourseDetail, StudentCoursesQuery, StudentDashboard, StudentProgress,
    UpcomingAssignment,
};
use crate::models::lesson::{LessonLink, LessonView};
use crate::models::module::{CourseModule, ModuleView, ModuleWithProgress};
use crate::models::user::{UpdateProfileRequest, User, UserProfile};
use crate::models::{ASSIGNMENTS, ENROLLMENTS, MODULES, USERS};
use crate::progress;
use crate::services::assignment_service::AssignmentService;
use crate::services::course_service::{CourseService, CourseTree};
use crate::services::enrollment_service::EnrollmentService;
use crate::services::lookup;
use crate::services::quiz_service::QuizService;
use crate::utils::mongo::{collect, number};
use crate::utils::time::chrono_to_bson;

const DASHBOARD_ENROLLMENTS: i64 = 5;
const DASHBOARD_ASSIGNMENTS: usize = 5;
const RECENT_ACTIVITY: i64 = 10;
const DEFAULT_PAGE_SIZE: u64 = 10;

fn status_filter(student: &ObjectId, status: Option<ProgressStatus>) -> Document {
    let mut filter = doc! { "student": student };
    match status {
        Some(ProgressStatus::Completed) => {
            filter.insert("progress", 100);
        }
        Some(ProgressStatus::InProgress) => {
            filter.insert("progress", doc! { "$gt": 0, "$lt": 100 });
        }
        Some(ProgressStatus::NotStarted) => {
            filter.insert("progress", 0);
        }
        None => {}
    }
    filter
}

/// Module assignments still open at `now` that the student has not handed in,
/// soonest first.
fn pending_assignments(
    modules: &[CourseModule],
    submitted: &HashSet<ObjectId>,
    course_titles: &HashMap<ObjectId, String>,
    now: DateTime<Utc>,
    limit: Option<usize>,
) -> Vec<UpcomingAssignment> {
    let mut upcoming: Vec<UpcomingAssignment> = modules
        .iter()
        .filter(|m| m.id.is_some_and(|id| !submitted.contains(&id)))
        .filter_map(|m| {
            let assignment = m.assignment.as_ref()?;
            let due = assignment.due_date.filter(|due| *due > now)?;
            Some(UpcomingAssignment {
                course_id: m.course.to_hex(),
                course_title: course_titles.get(&m.course).cloned().unwrap_or_default(),
                module_id: m.id.map(|id| id.to_hex()).unwrap_or_default(),
                module_title: m.title.clone(),
                title: assignment.title.clone(),
                description: assignment.description.clone(),
                due_date: Some(due),
            })
        })
        .collect();
    upcoming.sort_by_key(|a| a.due_date);
    if let Some(limit) = limit {
        upcoming.truncate(limit);
    }
    upcoming
}

fn module_progress(tree: &CourseTree, completed: &[ObjectId]) -> Vec<ModuleProgress> {
    tree.modules
        .iter()
        .map(|module| {
            let module_id = module.id.unwrap_or_default();
            let lesson_ids: Vec<ObjectId> =
                tree.lessons_of(&module_id).iter().filter_map(|l| l.id).collect();
            let snapshot = progress::compute(&lesson_ids, completed);
            ModuleProgress {
                module_id: module_id.to_hex(),
                module_title: module.title.clone(),
                completed_lessons: snapshot.completed_lessons,
                total_lessons: snapshot.total_lessons,
                progress: snapshot.progress,
            }
        })
        .collect()
}

fn recent_activity(doc: &Document) -> Option<RecentActivity> {
    let to_chrono = |key: &str| {
        doc.get_datetime(key)
            .ok()
            .and_then(|dt| DateTime::from_timestamp_millis(dt.timestamp_millis()))
    };
    Some(RecentActivity {
        course_id: doc.get_object_id("courseId").ok()?.to_hex(),
        course_title: doc.get_str("courseTitle").unwrap_or_default().to_string(),
        progress: number(doc, "progress") as u32,
        enrolled_at: to_chrono("enrolledAt")?,
        last_accessed: to_chrono("lastAccessed"),
    })
}

pub struct StudentService {
    mongo: Database,
}

impl StudentService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    fn enrollments(&self) -> Collection<Enrollment> {
        self.mongo.collection::<Enrollment>(ENROLLMENTS)
    }

    fn enrollment_service(&self) -> EnrollmentService {
        EnrollmentService::new(self.mongo.clone())
    }

    /// Enrollment views with a course brief carrying the instructor's name.
    pub async fn with_courses(&self, enrollments: Vec<Enrollment>) -> AppResult<Vec<EnrollmentView>> {
        let courses =
            lookup::courses_by_id(&self.mongo, enrollments.iter().map(|e| e.course)).await?;
        let instructors =
            lookup::users_by_id(&self.mongo, courses.values().map(|c| c.instructor)).await?;

        Ok(enrollments
            .into_iter()
            .map(|enrollment| {
                let brief = courses.get(&enrollment.course).map(|course| {
                    let instructor = instructors.get(&course.instructor).map(|u| u.name.clone());
                    CourseBrief::new(course, instructor)
                });
                EnrollmentView::from(enrollment).with_course(brief)
            })
            .collect())
    }

    /// Open module assignments across `courses` without a submission from `student`.
    async fn upcoming_assignments(
        &self,
        student: &ObjectId,
        courses: &[ObjectId],
        limit: Option<usize>,
    ) -> AppResult<Vec<UpcomingAssignment>> {
        if courses.is_empty() {
            return Ok(Vec::new());
        }

        let now = Utc::now();
        let cursor = self
            .mongo
            .collection::<CourseModule>(MODULES)
            .find(doc! {
                "course": { "$in": courses.to_vec() },
                "assignment.dueDate": { "$gt": chrono_to_bson(now) },
            })
            .await
            .context("Failed to query module assignments")?;
        let modules = collect(cursor, "modules").await?;
        if modules.is_empty() {
            return Ok(Vec::new());
        }

        let cursor = self
            .mongo
            .collection::<Document>(ASSIGNMENTS)
            .find(doc! { "student": student, "course": { "$in": courses.to_vec() }, "submitted": true })
            .projection(doc! { "module": 1 })
            .await
            .context("Failed to query submissions")?;
        let submitted: HashSet<ObjectId> = collect(cursor, "assignments")
            .await?
            .iter()
            .filter_map(|d| d.get_object_id("module").ok())
            .collect();

        let titles = lookup::course_titles(&self.mongo, modules.iter().map(|m| m.course)).await?;
        Ok(pending_assignments(&modules, &submitted, &titles, now, limit))
    }

    pub async fn dashboard(&self, user: &AuthUser) -> AppResult<StudentDashboard> {
        let student = user.id;

        let cursor = self
            .enrollments()
            .find(doc! { "student": student })
            .sort(doc! { "enrolledAt": -1 })
            .limit(DASHBOARD_ENROLLMENTS)
            .await
            .context("Failed to query enrollments")?;
        let recent = collect(cursor, "enrollments").await?;

        let enrollments = self.enrollments();
        let (total_courses, completed_courses, in_progress_courses) = futures::try_join!(
            enrollments
                .count_documents(status_filter(&student, None))
                .into_future(),
            enrollments
                .count_documents(status_filter(&student, Some(ProgressStatus::Completed)))
                .into_future(),
            enrollments
                .count_documents(status_filter(&student, Some(ProgressStatus::InProgress)))
                .into_future(),
        )
        .context("Failed to count enrollments")?;

        let cursor = self
            .mongo
            .collection::<Document>(ENROLLMENTS)
            .find(doc! { "student": student })
            .projection(doc! { "course": 1 })
            .await
            .context("Failed to query enrolled courses")?;
        let course_ids: Vec<ObjectId> = collect(cursor, "enrollments")
            .await?
            .iter()
            .filter_map(|d| d.get_object_id("course").ok())
            .collect();
        let assignments = self
            .upcoming_assignments(&student, &course_ids, Some(DASHBOARD_ASSIGNMENTS))
            .await?;

        let pipeline = vec![
            doc! { "$match": { "student": student } },
            doc! {
                "$lookup": {
                    "from": "courses",
                    "localField": "course",
                    "foreignField": "_id",
                    "as": "course",
                }
            },
            doc! { "$unwind": "$course" },
            doc! {
                "$project": {
                    "courseId": "$course._id",
                    "courseTitle": "$course.title",
                    "progress": 1,
                    "enrolledAt": 1,
                    "lastAccessed": 1,
                }
            },
            doc! { "$sort": { "lastAccessed": -1 } },
            doc! { "$limit": RECENT_ACTIVITY },
        ];
        let cursor = self
            .enrollments()
            .aggregate(pipeline)
            .await
            .context("Failed to aggregate recent activity")?;
        let recent_activity = collect(cursor, "recent activity")
            .await?
            .iter()
            .filter_map(recent_activity)
            .collect();

        Ok(StudentDashboard {
            enrollments: self.with_courses(recent).await?,
            stats: DashboardStats {
                total_courses,
                completed_courses,
                in_progress_courses,
            },
            assignments,
            recent_activity,
        })
    }

    pub async fn enrolled_courses(
        &self,
        user: &AuthUser,
        query: StudentCoursesQuery,
    ) -> AppResult<(Vec<EnrollmentView>, Pagination)> {
        let params = PageParams::new(query.page, query.limit, DEFAULT_PAGE_SIZE);
        let status = query.status.as_deref().and_then(ProgressStatus::parse);
        let filter = status_filter(&user.id, status);

        let cursor = self
            .enrollments()
            .find(filter.clone())
            .sort(doc! { "enrolledAt": -1 })
            .skip(params.skip())
            .limit(params.limit_i64())
            .await
            .context("Failed to query enrollments")?;
        let enrollments = collect(cursor, "enrollments").await?;

        let total = self
            .enrollments()
            .count_documents(filter)
            .await
            .context("Failed to count enrollments")?;

        Ok((self.with_courses(enrollments).await?, params.paginate(total)))
    }

    /// Full course content for an enrolled student, with per-module progress,
    /// their submissions and their quiz attempts.
    pub async fn course_detail(&self, user: &AuthUser, course_id: &ObjectId) -> AppResult<StudentCourseDetail> {
        let enrollment = self
            .enrollment_service()
            .require(&user.id, course_id, AppError::Forbidden)
            .await?;

        let courses = CourseService::new(self.mongo.clone());
        let course = courses.find_course(course_id).await?;
        let tree = courses.load_tree(course_id).await?;
        let instructor = courses.instructor_summary(&course.instructor).await?;

        let modules = tree
            .module_views(true)
            .into_iter()
            .zip(module_progress(&tree, &enrollment.completed_lessons))
            .map(|(module, progress): (ModuleView, ModuleProgress)| ModuleWithProgress {
                module,
                progress: progress.progress,
                completed_lessons: progress.completed_lessons,
                total_lessons: progress.total_lessons,
            })
            .collect();

        let submissions = AssignmentService::new(self.mongo.clone())
            .submissions_of(&user.id, course_id)
            .await?;
        let module_titles: HashMap<ObjectId, String> = tree
            .modules
            .iter()
            .filter_map(|m| m.id.map(|id| (id, m.title.clone())))
            .collect();
        let assignments = submissions
            .into_iter()
            .map(|a| {
                let title = module_titles.get(&a.module).cloned();
                AssignmentView::from(a).with_context(None, None, title)
            })
            .collect();

        let quizzes = QuizService::new(self.mongo.clone());
        let attempts = quizzes.attempts_of(&user.id, course_id).await?;
        let quiz_attempts = quizzes.with_titles(attempts).await?;

        Ok(StudentCourseDetail {
            course: CourseDetail::new(CourseView::new(course, instructor), modules),
            enrollment: EnrollmentView::from(enrollment),
            assignments,
            quiz_attempts,
        })
    }

    /// A lesson with its neighbours inside the module. Touches `lastAccessed`.
    pub async fn lesson_detail(
        &self,
        user: &AuthUser,
        course_id: &ObjectId,
        lesson_id: &ObjectId,
    ) -> AppResult<LessonDetail> {
        let enrollments = self.enrollment_service();
        let enrollment = enrollments
            .require(&user.id, course_id, AppError::Forbidden)
            .await?;

        let courses = CourseService::new(self.mongo.clone());
        let (lesson, module) = courses.course_lesson(course_id, lesson_id).await?;
        let tree = courses.load_tree(course_id).await?;
        let siblings = tree.lessons_of(&lesson.module);

        let position = siblings.iter().position(|l| l.id == Some(*lesson_id));
        let previous_lesson = position
            .and_then(|idx| idx.checked_sub(1))
            .and_then(|idx| siblings.get(idx))
            .map(LessonLink::from);
        let next_lesson = position
            .and_then(|idx| siblings.get(idx + 1))
            .map(LessonLink::from);

        enrollments.touch(enrollment.id).await?;

        Ok(LessonDetail {
            is_completed: enrollment.has_completed(lesson_id),
            lesson: LessonView::full(lesson),
            previous_lesson,
            next_lesson,
            module: module.title,
        })
    }

    pub async fn student_progress(&self, user: &AuthUser, course_id: &ObjectId) -> AppResult<StudentProgress> {
        let enrollment = self
            .enrollment_service()
            .require(&user.id, course_id, AppError::NotFound)
            .await?;

        let tree = CourseService::new(self.mongo.clone())
            .load_tree(course_id)
            .await?;
        let overall = progress::compute(&tree.lesson_ids(), &enrollment.completed_lessons);

        let assignments = self
            .upcoming_assignments(&user.id, &[*course_id], None)
            .await?;

        let quizzes = QuizService::new(self.mongo.clone());
        let attempts = quizzes.attempts_of(&user.id, course_id).await?;

        Ok(StudentProgress {
            overall_progress: overall.progress,
            module_progress: module_progress(&tree, &enrollment.completed_lessons),
            completed_lessons: overall.completed_lessons,
            total_lessons: overall.total_lessons,
            assignments,
            quiz_attempts: quizzes.with_titles(attempts).await?,
            enrolled_at: enrollment.enrolled_at,
            last_accessed: enrollment.last_accessed,
        })
    }

    pub async fn update_profile(&self, user: &AuthUser, req: UpdateProfileRequest) -> AppResult<UserProfile> {
        let mut set = Document::new();
        let fields = [
            ("name", req.name),
            ("avatar", req.avatar),
            ("bio", req.bio),
            ("phone", req.phone),
        ];
        for (key, value) in fields {
            if let Some(value) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
                set.insert(key, value);
            }
        }

        let users = self.mongo.collection::<User>(USERS);
        let updated = if set.is_empty() {
            users
                .find_one(doc! { "_id": user.id })
                .await
                .context("Failed to query user")?
        } else {
            users
                .find_one_and_update(doc! { "_id": user.id }, doc! { "$set": set })
                .return_document(ReturnDocument::After)
                .await
                .context("Failed to update profile")?
        };

        updated
            .map(UserProfile::from)
            .ok_or_else(|| AppError::not_found("User not found"))
    }
}
