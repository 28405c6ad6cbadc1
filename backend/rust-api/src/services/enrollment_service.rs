use anyhow::Context;
use chrono::Utc;
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::options::ReturnDocument;
use mongodb::{Collection, Database};

use crate::error::{AppError, AppResult};
use crate::metrics::{ENROLLMENTS_TOTAL, LESSONS_COMPLETED_TOTAL};
use crate::middlewares::auth::AuthUser;
use crate::models::course::{Course, DEFAULT_BATCH};
use crate::models::enrollment::{CourseProgress, Enrollment, EnrollmentView};
use crate::models::user::EnrolledCourse;
use crate::models::{COURSES, ENROLLMENTS, USERS};
use crate::progress::{self, ProgressSnapshot};
use crate::services::course_service::CourseService;
use crate::utils::mongo::is_duplicate_key;
use crate::utils::time::{bson_now, chrono_to_bson};

pub struct EnrollmentService {
    mongo: Database,
}

impl EnrollmentService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    fn enrollments(&self) -> Collection<Enrollment> {
        self.mongo.collection::<Enrollment>(ENROLLMENTS)
    }

    pub async fn find(&self, student: &ObjectId, course: &ObjectId) -> AppResult<Option<Enrollment>> {
        let enrollment = self
            .enrollments()
            .find_one(doc! { "student": student, "course": course })
            .await
            .context("Failed to query enrollment")?;
        Ok(enrollment)
    }

    /// Enrollment the caller must hold. Missing enrollments are reported with
    /// `missing`, so callers pick 403 or 404.
    pub async fn require(
        &self,
        student: &ObjectId,
        course: &ObjectId,
        missing: fn(String) -> AppError,
    ) -> AppResult<Enrollment> {
        self.find(student, course)
            .await?
            .ok_or_else(|| missing("Not enrolled in this course".to_string()))
    }

    pub async fn enroll(
        &self,
        user: &AuthUser,
        course_id: &ObjectId,
        batch: Option<String>,
    ) -> AppResult<EnrollmentView> {
        let course = CourseService::new(self.mongo.clone()).find_course(course_id).await?;
        if !course.is_published && !user.is_staff() {
            return Err(AppError::not_found("Course not found"));
        }

        if self.find(&user.id, course_id).await?.is_some() {
            return Err(AppError::conflict("Already enrolled in this course"));
        }

        let batch = self.pick_batch(&course, batch).await?;
        let now = Utc::now();

        let mut enrollment = Enrollment {
            id: None,
            student: user.id,
            course: *course_id,
            batch: batch.clone(),
            progress: 0,
            completed_lessons: Vec::new(),
            enrolled_at: now,
            last_accessed: Some(now),
            completed_at: None,
        };

        let insert_result = match self.enrollments().insert_one(&enrollment).await {
            Ok(result) => result,
            Err(e) if is_duplicate_key(&e) => {
                return Err(AppError::conflict("Already enrolled in this course"))
            }
            Err(e) => {
                return Err(anyhow::Error::new(e)
                    .context("Failed to insert enrollment")
                    .into())
            }
        };
        enrollment.id = insert_result.inserted_id.as_object_id();

        let entry = EnrolledCourse {
            course: *course_id,
            progress: 0,
            completed_lessons: Vec::new(),
            enrollment_date: now,
            batch,
        };
        self.mongo
            .collection::<mongodb::bson::Document>(USERS)
            .update_one(
                doc! { "_id": user.id },
                doc! { "$push": { "enrolledCourses": mongodb::bson::to_bson(&entry).context("Failed to encode enrollment")? } },
            )
            .await
            .context("Failed to record enrollment on user")?;
        self.mongo
            .collection::<Course>(COURSES)
            .update_one(doc! { "_id": course_id }, doc! { "$inc": { "totalStudents": 1 } })
            .await
            .context("Failed to update course student count")?;

        ENROLLMENTS_TOTAL.inc();
        tracing::info!("Student {} enrolled in course {}", user.id, course_id);

        Ok(EnrollmentView::from(enrollment))
    }

    /// Resolve the requested batch against the course's batches and their capacity.
    async fn pick_batch(&self, course: &Course, requested: Option<String>) -> AppResult<String> {
        let name = requested
            .map(|b| b.trim().to_string())
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| DEFAULT_BATCH.to_string());

        match course.batch(&name) {
            Some(batch) => {
                let enrolled = self
                    .enrollments()
                    .count_documents(doc! { "course": course.id, "batch": &name })
                    .await
                    .context("Failed to count batch enrollments")?;
                if batch.is_full(enrolled) {
                    return Err(AppError::bad_request("Batch is full"));
                }
            }
            None if name == DEFAULT_BATCH => {}
            None => return Err(AppError::bad_request("Batch not found")),
        }

        Ok(name)
    }

    pub async fn course_progress(&self, user: &AuthUser, course_id: &ObjectId) -> AppResult<CourseProgress> {
        let enrollment = self.require(&user.id, course_id, AppError::NotFound).await?;
        let lesson_ids = CourseService::new(self.mongo.clone())
            .lesson_ids(course_id)
            .await?;
        let snapshot = progress::compute(&lesson_ids, &enrollment.completed_lessons);
        Ok(progress_view(enrollment, snapshot))
    }

    /// Mark a lesson complete, then recompute and persist the course progress.
    pub async fn complete_lesson(
        &self,
        user: &AuthUser,
        course_id: &ObjectId,
        lesson_id: &ObjectId,
    ) -> AppResult<CourseProgress> {
        let enrollment = self.require(&user.id, course_id, AppError::NotFound).await?;
        let courses = CourseService::new(self.mongo.clone());
        courses.course_lesson(course_id, lesson_id).await?;

        let newly_completed = !enrollment.has_completed(lesson_id);

        let enrollment = self
            .enrollments()
            .find_one_and_update(
                doc! { "student": user.id, "course": course_id },
                doc! {
                    "$addToSet": { "completedLessons": lesson_id },
                    "$set": { "lastAccessed": bson_now() },
                },
            )
            .return_document(ReturnDocument::After)
            .await
            .context("Failed to record lesson completion")?
            .ok_or_else(|| AppError::not_found("Not enrolled in this course"))?;

        let lesson_ids = courses.lesson_ids(course_id).await?;
        let snapshot = progress::compute(&lesson_ids, &enrollment.completed_lessons);

        let mut set = doc! { "progress": snapshot.progress };
        if snapshot.progress == 100 && enrollment.completed_at.is_none() {
            set.insert("completedAt", chrono_to_bson(Utc::now()));
        }
        let enrollment = self
            .enrollments()
            .find_one_and_update(doc! { "_id": enrollment.id }, doc! { "$set": set })
            .return_document(ReturnDocument::After)
            .await
            .context("Failed to update progress")?
            .ok_or_else(|| AppError::not_found("Not enrolled in this course"))?;

        self.mongo
            .collection::<mongodb::bson::Document>(USERS)
            .update_one(
                doc! { "_id": user.id, "enrolledCourses.course": course_id },
                doc! {
                    "$set": { "enrolledCourses.$.progress": snapshot.progress },
                    "$addToSet": { "enrolledCourses.$.completedLessons": lesson_id },
                },
            )
            .await
            .context("Failed to mirror progress on user")?;

        if newly_completed {
            LESSONS_COMPLETED_TOTAL.inc();
        }
        tracing::debug!(
            "Lesson {} completed by {} ({}%)",
            lesson_id,
            user.id,
            snapshot.progress
        );

        Ok(progress_view(enrollment, snapshot))
    }

    pub async fn touch(&self, enrollment_id: Option<ObjectId>) -> AppResult<()> {
        self.enrollments()
            .update_one(
                doc! { "_id": enrollment_id },
                doc! { "$set": { "lastAccessed": bson_now() } },
            )
            .await
            .context("Failed to update last access")?;
        Ok(())
    }
}

fn progress_view(mut enrollment: Enrollment, snapshot: ProgressSnapshot) -> CourseProgress {
    enrollment.progress = snapshot.progress;
    CourseProgress {
        enrollment: EnrollmentView::from(enrollment),
        progress: snapshot.progress,
        completed_lessons: snapshot.completed_lessons,
        total_lessons: snapshot.total_lessons,
    }
}
