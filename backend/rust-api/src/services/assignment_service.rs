use anyhow::Context;
use chrono::Utc;
use mongodb::bson::{doc, oid::ObjectId, Document};
use mongodb::options::ReturnDocument;
use mongodb::{Collection, Database};
use validator::ValidateUrl;

use crate::error::{AppError, AppResult};
use crate::metrics::{ASSIGNMENTS_REVIEWED_TOTAL, ASSIGNMENT_SUBMISSIONS_TOTAL};
use crate::middlewares::auth::AuthUser;
use crate::models::api::{PageParams, Pagination};
use crate::models::assignment::{
    AdminAssignmentsQuery, Assignment, AssignmentQueue, AssignmentView, CourseOption,
    ReviewAssignmentRequest, ReviewStatus, SubmissionType, SubmitAssignmentRequest,
};
use crate::models::user::UserSummary;
use crate::models::{ASSIGNMENTS, COURSES};
use crate::services::course_service::CourseService;
use crate::services::enrollment_service::EnrollmentService;
use crate::services::lookup;
use crate::utils::mongo::{collect, is_duplicate_key, parse_object_id};
use crate::utils::time::bson_now;

const DEFAULT_QUEUE_PAGE_SIZE: u64 = 20;

fn check_submission(submission: &str, kind: SubmissionType) -> AppResult<()> {
    if submission.trim().is_empty() {
        return Err(AppError::bad_request("Submission is required"));
    }
    if kind == SubmissionType::Link && !submission.trim().validate_url() {
        return Err(AppError::bad_request("Submission link must be a valid URL"));
    }
    Ok(())
}

fn queue_filter(
    status: ReviewStatus,
    course: Option<ObjectId>,
    student: Option<ObjectId>,
) -> Document {
    let mut filter = doc! { "submitted": true };
    if let Some(course) = course {
        filter.insert("course", course);
    }
    if let Some(student) = student {
        filter.insert("student", student);
    }
    match status {
        ReviewStatus::Pending => {
            filter.insert("graded", false);
        }
        ReviewStatus::Graded => {
            filter.insert("graded", true);
        }
        ReviewStatus::All => {}
    }
    filter
}

pub struct AssignmentService {
    mongo: Database,
}

impl AssignmentService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    fn assignments(&self) -> Collection<Assignment> {
        self.mongo.collection::<Assignment>(ASSIGNMENTS)
    }

    /// Submit a module assignment. Returns the stored submission and whether
    /// it was newly created; a second submission rewrites the first.
    pub async fn submit(
        &self,
        user: &AuthUser,
        req: SubmitAssignmentRequest,
    ) -> AppResult<(AssignmentView, bool)> {
        let course_id = parse_object_id(&req.course_id, "course")?;
        let module_id = parse_object_id(&req.module_id, "module")?;
        check_submission(&req.submission, req.submission_type)?;

        EnrollmentService::new(self.mongo.clone())
            .require(&user.id, &course_id, AppError::Forbidden)
            .await?;

        let module = CourseService::new(self.mongo.clone())
            .find_module(&module_id)
            .await?;
        if module.course != course_id {
            return Err(AppError::not_found("Module not found"));
        }

        let submission = req.submission.trim().to_string();
        let kind = req.submission_type;

        if let Some(updated) = self.resubmit(&user.id, &course_id, &module_id, &submission, kind).await? {
            return Ok((AssignmentView::from(updated), false));
        }

        let mut assignment = Assignment {
            id: None,
            student: user.id,
            course: course_id,
            module: module_id,
            submission: submission.clone(),
            submission_type: kind,
            submitted: true,
            submitted_at: Some(Utc::now()),
            resubmitted: false,
            graded: false,
            grade: None,
            feedback: None,
            graded_at: None,
            graded_by: None,
        };

        match self.assignments().insert_one(&assignment).await {
            Ok(result) => {
                assignment.id = result.inserted_id.as_object_id();
            }
            // Lost a race with a concurrent first submission
            Err(e) if is_duplicate_key(&e) => {
                let updated = self
                    .resubmit(&user.id, &course_id, &module_id, &submission, kind)
                    .await?
                    .ok_or_else(|| anyhow::anyhow!("Assignment vanished during resubmission"))?;
                return Ok((AssignmentView::from(updated), false));
            }
            Err(e) => {
                return Err(anyhow::Error::new(e)
                    .context("Failed to insert assignment")
                    .into())
            }
        }

        ASSIGNMENT_SUBMISSIONS_TOTAL
            .with_label_values(&[kind.as_str()])
            .inc();
        tracing::info!("Assignment submitted by {} for module {}", user.id, module_id);

        Ok((AssignmentView::from(assignment), true))
    }

    async fn resubmit(
        &self,
        student: &ObjectId,
        course: &ObjectId,
        module: &ObjectId,
        submission: &str,
        kind: SubmissionType,
    ) -> AppResult<Option<Assignment>> {
        let updated = self
            .assignments()
            .find_one_and_update(
                doc! { "student": student, "course": course, "module": module },
                doc! {
                    "$set": {
                        "submission": submission,
                        "submissionType": kind.as_str(),
                        "submitted": true,
                        "submittedAt": bson_now(),
                        "resubmitted": true,
                    }
                },
            )
            .return_document(ReturnDocument::After)
            .await
            .context("Failed to update assignment")?;

        if updated.is_some() {
            ASSIGNMENT_SUBMISSIONS_TOTAL
                .with_label_values(&[kind.as_str()])
                .inc();
            tracing::info!("Assignment resubmitted by {} for module {}", student, module);
        }
        Ok(updated)
    }

    /// Student's own submissions in a course
    pub async fn submissions_of(&self, student: &ObjectId, course: &ObjectId) -> AppResult<Vec<Assignment>> {
        let cursor = self
            .assignments()
            .find(doc! { "student": student, "course": course })
            .sort(doc! { "submittedAt": -1 })
            .await
            .context("Failed to query assignments")?;
        collect(cursor, "assignments").await
    }

    async fn with_context(&self, assignments: Vec<Assignment>) -> AppResult<Vec<AssignmentView>> {
        let students =
            lookup::users_by_id(&self.mongo, assignments.iter().map(|a| a.student)).await?;
        let courses =
            lookup::course_titles(&self.mongo, assignments.iter().map(|a| a.course)).await?;
        let modules =
            lookup::module_titles(&self.mongo, assignments.iter().map(|a| a.module)).await?;

        Ok(assignments
            .into_iter()
            .map(|a| {
                let student = students.get(&a.student).map(UserSummary::from);
                let course = courses.get(&a.course).cloned();
                let module = modules.get(&a.module).cloned();
                AssignmentView::from(a).with_context(student, course, module)
            })
            .collect())
    }

    /// Review queue: submitted work, newest first, plus every course for the filter.
    pub async fn list_for_review(&self, query: AdminAssignmentsQuery) -> AppResult<(AssignmentQueue, Pagination)> {
        let params = PageParams::new(query.page, query.limit, DEFAULT_QUEUE_PAGE_SIZE);

        let course = match query.course_id.as_deref().filter(|s| !s.is_empty()) {
            Some(id) => Some(parse_object_id(id, "course")?),
            None => None,
        };
        let student = match query.student_id.as_deref().filter(|s| !s.is_empty()) {
            Some(id) => Some(parse_object_id(id, "student")?),
            None => None,
        };
        let filter = queue_filter(ReviewStatus::parse(query.status.as_deref()), course, student);

        let cursor = self
            .assignments()
            .find(filter.clone())
            .sort(doc! { "submittedAt": -1 })
            .skip(params.skip())
            .limit(params.limit_i64())
            .await
            .context("Failed to query assignments")?;
        let assignments = collect(cursor, "assignments").await?;

        let total = self
            .assignments()
            .count_documents(filter)
            .await
            .context("Failed to count assignments")?;

        let cursor = self
            .mongo
            .collection::<Document>(COURSES)
            .find(doc! {})
            .projection(doc! { "title": 1 })
            .sort(doc! { "title": 1 })
            .await
            .context("Failed to query courses")?;
        let courses = collect(cursor, "courses")
            .await?
            .into_iter()
            .filter_map(|d| {
                Some(CourseOption {
                    id: d.get_object_id("_id").ok()?.to_hex(),
                    title: d.get_str("title").unwrap_or_default().to_string(),
                })
            })
            .collect();

        Ok((
            AssignmentQueue {
                assignments: self.with_context(assignments).await?,
                courses,
            },
            params.paginate(total),
        ))
    }

    pub async fn review(
        &self,
        reviewer: &AuthUser,
        assignment_id: &ObjectId,
        req: ReviewAssignmentRequest,
    ) -> AppResult<AssignmentView> {
        let mut set = doc! {
            "grade": req.grade,
            "graded": true,
            "gradedAt": bson_now(),
            "gradedBy": reviewer.id,
        };
        if let Some(feedback) = req.feedback {
            set.insert("feedback", feedback);
        }

        let assignment = self
            .assignments()
            .find_one_and_update(doc! { "_id": assignment_id }, doc! { "$set": set })
            .return_document(ReturnDocument::After)
            .await
            .context("Failed to review assignment")?
            .ok_or_else(|| AppError::not_found("Assignment not found"))?;

        ASSIGNMENTS_REVIEWED_TOTAL.inc();
        tracing::info!("Assignment {} graded {} by {}", assignment_id, req.grade, reviewer.id);

        let mut views = self.with_context(vec![assignment]).await?;
        views
            .pop()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Reviewed assignment missing")))
    }
}
