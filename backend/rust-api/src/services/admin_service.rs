use std::collections::HashMap;
use std::future::IntoFuture;

use anyhow::Context;
use chrono::Utc;
use mongodb::bson::{self, doc, oid::ObjectId, Document};
use mongodb::options::ReturnDocument;
use mongodb::{Collection, Database};

use crate::error::{AppError, AppResult};
use crate::models::analytics::{
    AdminDashboard, Analytics, AnalyticsQuery, CompletionStats, CourseHeader, CourseRoster,
    DailyCount, DailyRevenue, PopularCourse, RosterQuery, StudentEnrollments, TopCourse,
};
use crate::models::api::{PageParams, PageQuery, Pagination};
use crate::models::course::{
    AdminCoursesQuery, Batch, BatchView, Course, CourseView, CourseWithStats, CreateBatchRequest,
    UpdateBatchRequest,
};
use crate::models::enrollment::{Enrollment, EnrollmentView};
use crate::models::user::{
    ListStudentsQuery, StudentWithStats, UpdateStudentRequest, User, UserProfile, UserRole,
    UserSummary,
};
use crate::models::{ASSIGNMENTS, COURSES, ENROLLMENTS, QUIZ_ATTEMPTS, USERS};
use crate::services::lookup;
use crate::services::student_service::StudentService;
use crate::utils::mongo::{collect, count, is_duplicate_key, number, search_regex};
use crate::utils::time::{chrono_to_bson, timeframe_start};

const DEFAULT_PAGE_SIZE: u64 = 20;
const STUDENT_ENROLLMENTS_PAGE_SIZE: u64 = 10;
const RECENT_ENROLLMENTS: i64 = 10;
const TOP_COURSES: i64 = 5;
const POPULAR_COURSES: i64 = 10;

fn student_sort(sort_by: Option<&str>, sort_order: Option<&str>) -> Document {
    let direction = if sort_order == Some("asc") { 1 } else { -1 };
    let field = match sort_by {
        Some(field @ ("name" | "email" | "createdAt")) => field,
        _ => "createdAt",
    };
    doc! { field: direction, "_id": 1 }
}

fn completion_rate(stats: &mut CompletionStats) {
    stats.completion_rate = if stats.total_enrollments == 0 {
        0.0
    } else {
        crate::grading::round2(
            stats.completed_enrollments as f64 / stats.total_enrollments as f64 * 100.0,
        )
    };
}

/// `{$group by key}` counts keyed by ObjectId
fn counts_by(rows: &[Document], value: &str) -> HashMap<ObjectId, u64> {
    rows.iter()
        .filter_map(|row| Some((row.get_object_id("_id").ok()?, count(row, value))))
        .collect()
}

pub struct AdminService {
    mongo: Database,
}

impl AdminService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    fn users(&self) -> Collection<User> {
        self.mongo.collection::<User>(USERS)
    }

    fn courses(&self) -> Collection<Course> {
        self.mongo.collection::<Course>(COURSES)
    }

    fn enrollments(&self) -> Collection<Enrollment> {
        self.mongo.collection::<Enrollment>(ENROLLMENTS)
    }

    async fn aggregate(&self, collection: &str, pipeline: Vec<Document>) -> AppResult<Vec<Document>> {
        let cursor = self
            .mongo
            .collection::<Document>(collection)
            .aggregate(pipeline)
            .await
            .with_context(|| format!("Failed to aggregate {}", collection))?;
        collect(cursor, collection).await
    }

    /// Enrollment views with both the course brief and the student filled in.
    async fn enrollment_views(&self, enrollments: Vec<Enrollment>) -> AppResult<Vec<EnrollmentView>> {
        let students =
            lookup::users_by_id(&self.mongo, enrollments.iter().map(|e| e.student)).await?;
        let student_ids: Vec<ObjectId> = enrollments.iter().map(|e| e.student).collect();
        let views = StudentService::new(self.mongo.clone())
            .with_courses(enrollments)
            .await?;
        Ok(views
            .into_iter()
            .zip(student_ids)
            .map(|(view, student)| view.with_student(students.get(&student).map(UserSummary::from)))
            .collect())
    }

    pub async fn dashboard(&self) -> AppResult<AdminDashboard> {
        let (users, courses, enrollments) = (self.users(), self.courses(), self.enrollments());
        let (total_students, total_courses, total_enrollments) = futures::try_join!(
            users
                .count_documents(doc! { "role": UserRole::Student.as_str() })
                .into_future(),
            courses.count_documents(doc! {}).into_future(),
            enrollments.count_documents(doc! {}).into_future(),
        )
        .context("Failed to count dashboard totals")?;

        let revenue = self
            .aggregate(
                ENROLLMENTS,
                vec![
                    doc! {
                        "$lookup": {
                            "from": COURSES,
                            "localField": "course",
                            "foreignField": "_id",
                            "as": "course",
                        }
                    },
                    doc! { "$unwind": "$course" },
                    doc! { "$group": { "_id": null, "total": { "$sum": "$course.price" } } },
                ],
            )
            .await?;
        let total_revenue = revenue.first().map(|row| number(row, "total")).unwrap_or(0.0);

        let cursor = self
            .enrollments()
            .find(doc! {})
            .sort(doc! { "enrolledAt": -1 })
            .limit(RECENT_ENROLLMENTS)
            .await
            .context("Failed to query recent enrollments")?;
        let recent = collect(cursor, "enrollments").await?;

        let cursor = self
            .courses()
            .find(doc! { "isPublished": true })
            .sort(doc! { "totalStudents": -1, "_id": 1 })
            .limit(TOP_COURSES)
            .await
            .context("Failed to query top courses")?;
        let active_courses = collect(cursor, "courses")
            .await?
            .into_iter()
            .map(|course| TopCourse {
                id: course.id.map(|id| id.to_hex()).unwrap_or_default(),
                title: course.title,
                total_students: course.total_students,
                rating: course.rating,
            })
            .collect();

        Ok(AdminDashboard {
            total_students,
            total_courses,
            total_enrollments,
            total_revenue,
            recent_enrollments: self.enrollment_views(recent).await?,
            active_courses,
        })
    }

    /// Every course, drafts included, with enrollment and pending-review counts.
    pub async fn list_courses(&self, query: AdminCoursesQuery) -> AppResult<(Vec<CourseWithStats>, Pagination)> {
        let params = PageParams::new(query.page, query.limit, DEFAULT_PAGE_SIZE);
        let mut filter = Document::new();

        if let Some(term) = query.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let regex = search_regex(term);
            filter.insert(
                "$or",
                vec![doc! { "title": regex.clone() }, doc! { "description": regex }],
            );
        }
        match query.status.as_deref() {
            Some("published") => {
                filter.insert("isPublished", true);
            }
            Some("draft") => {
                filter.insert("isPublished", false);
            }
            _ => {}
        }

        let cursor = self
            .courses()
            .find(filter.clone())
            .sort(doc! { "createdAt": -1, "_id": 1 })
            .skip(params.skip())
            .limit(params.limit_i64())
            .await
            .context("Failed to query courses")?;
        let courses = collect(cursor, "courses").await?;
        let total = self
            .courses()
            .count_documents(filter)
            .await
            .context("Failed to count courses")?;

        let ids: Vec<ObjectId> = courses.iter().filter_map(|c| c.id).collect();
        let enrollments = self
            .aggregate(
                ENROLLMENTS,
                vec![
                    doc! { "$match": { "course": { "$in": ids.clone() } } },
                    doc! { "$group": { "_id": "$course", "count": { "$sum": 1 } } },
                ],
            )
            .await?;
        let pending = self
            .aggregate(
                ASSIGNMENTS,
                vec![
                    doc! { "$match": { "course": { "$in": ids }, "submitted": true, "graded": false } },
                    doc! { "$group": { "_id": "$course", "count": { "$sum": 1 } } },
                ],
            )
            .await?;
        let enrollments = counts_by(&enrollments, "count");
        let pending = counts_by(&pending, "count");

        let instructors =
            lookup::users_by_id(&self.mongo, courses.iter().map(|c| c.instructor)).await?;

        let rows = courses
            .into_iter()
            .map(|course| {
                let id = course.id.unwrap_or_default();
                let instructor = instructors.get(&course.instructor).map(UserSummary::from);
                CourseWithStats {
                    total_enrollments: enrollments.get(&id).copied().unwrap_or(0),
                    pending_assignments: pending.get(&id).copied().unwrap_or(0),
                    course: CourseView::new(course, instructor),
                }
            })
            .collect();

        Ok((rows, params.paginate(total)))
    }

    pub async fn list_students(&self, query: ListStudentsQuery) -> AppResult<(Vec<StudentWithStats>, Pagination)> {
        let params = PageParams::new(query.page, query.limit, DEFAULT_PAGE_SIZE);
        let mut filter = doc! { "role": UserRole::Student.as_str() };

        if let Some(term) = query.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let regex = search_regex(term);
            filter.insert(
                "$or",
                vec![doc! { "name": regex.clone() }, doc! { "email": regex }],
            );
        }

        let cursor = self
            .users()
            .find(filter.clone())
            .sort(student_sort(query.sort_by.as_deref(), query.sort_order.as_deref()))
            .skip(params.skip())
            .limit(params.limit_i64())
            .await
            .context("Failed to query students")?;
        let students = collect(cursor, "students").await?;
        let total = self
            .users()
            .count_documents(filter)
            .await
            .context("Failed to count students")?;

        let ids: Vec<ObjectId> = students.iter().filter_map(|s| s.id).collect();
        let stats = self
            .aggregate(
                ENROLLMENTS,
                vec![
                    doc! { "$match": { "student": { "$in": ids } } },
                    doc! {
                        "$group": {
                            "_id": "$student",
                            "total": { "$sum": 1 },
                            "completed": { "$sum": { "$cond": [{ "$eq": ["$progress", 100] }, 1, 0] } },
                        }
                    },
                ],
            )
            .await?;
        let totals = counts_by(&stats, "total");
        let completed = counts_by(&stats, "completed");

        let rows = students
            .into_iter()
            .map(|student| {
                let id = student.id.unwrap_or_default();
                StudentWithStats {
                    total_enrollments: totals.get(&id).copied().unwrap_or(0),
                    completed_courses: completed.get(&id).copied().unwrap_or(0),
                    profile: UserProfile::from(student),
                }
            })
            .collect();

        Ok((rows, params.paginate(total)))
    }

    async fn find_student(&self, student_id: &ObjectId) -> AppResult<User> {
        self.users()
            .find_one(doc! { "_id": student_id, "role": UserRole::Student.as_str() })
            .await
            .context("Failed to query student")?
            .ok_or_else(|| AppError::not_found("Student not found"))
    }

    pub async fn student_enrollments(
        &self,
        student_id: &ObjectId,
        query: PageQuery,
    ) -> AppResult<(StudentEnrollments, Pagination)> {
        let student = self.find_student(student_id).await?;
        let params = PageParams::new(query.page, query.limit, STUDENT_ENROLLMENTS_PAGE_SIZE);

        let cursor = self
            .enrollments()
            .find(doc! { "student": student_id })
            .sort(doc! { "enrolledAt": -1 })
            .skip(params.skip())
            .limit(params.limit_i64())
            .await
            .context("Failed to query enrollments")?;
        let enrollments = collect(cursor, "enrollments").await?;
        let total = self
            .enrollments()
            .count_documents(doc! { "student": student_id })
            .await
            .context("Failed to count enrollments")?;

        let enrollments = StudentService::new(self.mongo.clone())
            .with_courses(enrollments)
            .await?;

        Ok((
            StudentEnrollments {
                student: UserSummary::from(&student),
                enrollments,
            },
            params.paginate(total),
        ))
    }

    pub async fn update_student(&self, student_id: &ObjectId, req: UpdateStudentRequest) -> AppResult<UserProfile> {
        let mut set = Document::new();
        if let Some(name) = req.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()) {
            set.insert("name", name);
        }
        if let Some(email) = req.email.map(|e| e.trim().to_lowercase()).filter(|e| !e.is_empty()) {
            set.insert("email", email);
        }

        if set.is_empty() {
            return self.find_student(student_id).await.map(UserProfile::from);
        }

        let updated = match self
            .users()
            .find_one_and_update(
                doc! { "_id": student_id, "role": UserRole::Student.as_str() },
                doc! { "$set": set },
            )
            .return_document(ReturnDocument::After)
            .await
        {
            Ok(updated) => updated,
            Err(e) if is_duplicate_key(&e) => {
                return Err(AppError::conflict("Email already in use"))
            }
            Err(e) => return Err(anyhow::Error::new(e).context("Failed to update student").into()),
        };

        updated
            .map(UserProfile::from)
            .ok_or_else(|| AppError::not_found("Student not found"))
    }

    /// Removes the student with their enrollments, attempts and submissions.
    pub async fn delete_student(&self, student_id: &ObjectId) -> AppResult<()> {
        self.find_student(student_id).await?;

        let cursor = self
            .mongo
            .collection::<Document>(ENROLLMENTS)
            .find(doc! { "student": student_id })
            .projection(doc! { "course": 1 })
            .await
            .context("Failed to query enrollments")?;
        let course_ids: Vec<ObjectId> = collect(cursor, "enrollments")
            .await?
            .iter()
            .filter_map(|d| d.get_object_id("course").ok())
            .collect();

        if !course_ids.is_empty() {
            self.courses()
                .update_many(
                    doc! { "_id": { "$in": course_ids } },
                    doc! { "$inc": { "totalStudents": -1 } },
                )
                .await
                .context("Failed to update course student counts")?;
        }

        for collection in [ENROLLMENTS, QUIZ_ATTEMPTS, ASSIGNMENTS] {
            self.mongo
                .collection::<Document>(collection)
                .delete_many(doc! { "student": student_id })
                .await
                .with_context(|| format!("Failed to delete student {}", collection))?;
        }
        self.users()
            .delete_one(doc! { "_id": student_id })
            .await
            .context("Failed to delete student")?;

        tracing::info!("Student {} deleted", student_id);
        Ok(())
    }

    pub async fn course_roster(
        &self,
        course_id: &ObjectId,
        query: RosterQuery,
    ) -> AppResult<(CourseRoster, Pagination)> {
        let course = self
            .courses()
            .find_one(doc! { "_id": course_id })
            .await
            .context("Failed to query course")?
            .ok_or_else(|| AppError::not_found("Course not found"))?;

        let params = PageParams::new(query.page, query.limit, DEFAULT_PAGE_SIZE);
        let mut filter = doc! { "course": course_id };
        if let Some(batch) = query.batch.as_deref().filter(|b| !b.is_empty()) {
            filter.insert("batch", batch);
        }

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

        let students =
            lookup::users_by_id(&self.mongo, enrollments.iter().map(|e| e.student)).await?;
        let enrollments = enrollments
            .into_iter()
            .map(|e| {
                let student = students.get(&e.student).map(UserSummary::from);
                EnrollmentView::from(e).with_student(student)
            })
            .collect();

        Ok((
            CourseRoster {
                course: CourseHeader {
                    id: course_id.to_hex(),
                    title: course.title.clone(),
                },
                enrollments,
                batches: course.batches.iter().map(BatchView::from).collect(),
            },
            params.paginate(total),
        ))
    }

    pub async fn create_batch(&self, course_id: &ObjectId, req: CreateBatchRequest) -> AppResult<BatchView> {
        let course = self
            .courses()
            .find_one(doc! { "_id": course_id })
            .await
            .context("Failed to query course")?
            .ok_or_else(|| AppError::not_found("Course not found"))?;

        let name = req.name.trim().to_string();
        if course.batch(&name).is_some() {
            return Err(AppError::conflict("Batch name already exists"));
        }
        check_dates(req.start_date, req.end_date)?;

        let batch = Batch {
            id: ObjectId::new(),
            name: name.clone(),
            start_date: req.start_date,
            end_date: req.end_date,
            max_students: req.max_students.unwrap_or(0),
        };

        // The name guard makes concurrent creates with the same name collapse
        let result = self
            .courses()
            .update_one(
                doc! { "_id": course_id, "batches.name": { "$ne": &name } },
                doc! { "$push": { "batches": bson::to_bson(&batch).context("Failed to encode batch")? } },
            )
            .await
            .context("Failed to create batch")?;
        if result.matched_count == 0 {
            return Err(AppError::conflict("Batch name already exists"));
        }

        tracing::info!("Batch '{}' created for course {}", name, course_id);
        Ok(BatchView::from(&batch))
    }

    async fn course_with_batch(&self, batch_id: &ObjectId) -> AppResult<Course> {
        self.courses()
            .find_one(doc! { "batches._id": batch_id })
            .await
            .context("Failed to query batch")?
            .ok_or_else(|| AppError::not_found("Batch not found"))
    }

    /// Update a batch. A rename is carried over to every enrollment in it.
    pub async fn update_batch(&self, batch_id: &ObjectId, req: UpdateBatchRequest) -> AppResult<BatchView> {
        let course = self.course_with_batch(batch_id).await?;
        let course_id = course.id.unwrap_or_default();
        let current = course
            .batches
            .iter()
            .find(|b| &b.id == batch_id)
            .cloned()
            .ok_or_else(|| AppError::not_found("Batch not found"))?;

        let new_name = req
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty() && *n != current.name);
        if let Some(name) = &new_name {
            if course.batch(name).is_some() {
                return Err(AppError::conflict("Batch name already exists"));
            }
        }
        check_dates(
            req.start_date.or(current.start_date),
            req.end_date.or(current.end_date),
        )?;

        let mut set = Document::new();
        if let Some(name) = &new_name {
            set.insert("batches.$.name", name.as_str());
        }
        if let Some(start) = req.start_date {
            set.insert("batches.$.startDate", chrono_to_bson(start));
        }
        if let Some(end) = req.end_date {
            set.insert("batches.$.endDate", chrono_to_bson(end));
        }
        if let Some(max) = req.max_students {
            set.insert("batches.$.maxStudents", max);
        }

        if set.is_empty() {
            return Ok(BatchView::from(&current));
        }

        let updated = self
            .courses()
            .find_one_and_update(doc! { "batches._id": batch_id }, doc! { "$set": set })
            .return_document(ReturnDocument::After)
            .await
            .context("Failed to update batch")?
            .ok_or_else(|| AppError::not_found("Batch not found"))?;

        if let Some(name) = &new_name {
            self.enrollments()
                .update_many(
                    doc! { "course": course_id, "batch": &current.name },
                    doc! { "$set": { "batch": name.as_str() } },
                )
                .await
                .context("Failed to move enrollments to renamed batch")?;
            self.users()
                .update_many(
                    doc! { "enrolledCourses": { "$elemMatch": { "course": course_id, "batch": &current.name } } },
                    doc! { "$set": { "enrolledCourses.$[entry].batch": name.as_str() } },
                )
                .array_filters(vec![doc! { "entry.course": course_id, "entry.batch": &current.name }])
                .await
                .context("Failed to rename batch on users")?;
            tracing::info!("Batch '{}' renamed to '{}'", current.name, name);
        }

        updated
            .batches
            .iter()
            .find(|b| &b.id == batch_id)
            .map(BatchView::from)
            .ok_or_else(|| AppError::not_found("Batch not found"))
    }

    pub async fn delete_batch(&self, batch_id: &ObjectId) -> AppResult<()> {
        let course = self.course_with_batch(batch_id).await?;
        let batch = course
            .batches
            .iter()
            .find(|b| &b.id == batch_id)
            .ok_or_else(|| AppError::not_found("Batch not found"))?;

        let enrolled = self
            .enrollments()
            .count_documents(doc! { "course": course.id, "batch": &batch.name })
            .await
            .context("Failed to count batch enrollments")?;
        if enrolled > 0 {
            return Err(AppError::bad_request(format!(
                "Cannot delete batch with {} enrolled students",
                enrolled
            )));
        }

        self.courses()
            .update_one(
                doc! { "_id": course.id },
                doc! { "$pull": { "batches": { "_id": batch_id } } },
            )
            .await
            .context("Failed to delete batch")?;

        tracing::info!("Batch '{}' deleted from course {:?}", batch.name, course.id);
        Ok(())
    }

    pub async fn analytics(&self, query: AnalyticsQuery) -> AppResult<Analytics> {
        let timeframe = match query.timeframe.as_deref() {
            Some(tf @ ("week" | "month" | "year")) => tf.to_string(),
            _ => "month".to_string(),
        };
        let since = chrono_to_bson(timeframe_start(Utc::now(), &timeframe));
        let by_day = doc! { "$dateToString": { "format": "%Y-%m-%d", "date": "$enrolledAt" } };
        let join_course = doc! {
            "$lookup": {
                "from": COURSES,
                "localField": "course",
                "foreignField": "_id",
                "as": "course",
            }
        };

        let enrollment_analytics = self
            .aggregate(
                ENROLLMENTS,
                vec![
                    doc! { "$match": { "enrolledAt": { "$gte": since } } },
                    doc! { "$group": { "_id": by_day.clone(), "count": { "$sum": 1 } } },
                    doc! { "$sort": { "_id": 1 } },
                ],
            )
            .await?
            .into_iter()
            .map(bson::from_document::<DailyCount>)
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to decode enrollment analytics")?;

        let revenue_analytics = self
            .aggregate(
                ENROLLMENTS,
                vec![
                    doc! { "$match": { "enrolledAt": { "$gte": since } } },
                    join_course.clone(),
                    doc! { "$unwind": "$course" },
                    doc! { "$group": { "_id": by_day, "revenue": { "$sum": { "$toDouble": "$course.price" } } } },
                    doc! { "$sort": { "_id": 1 } },
                ],
            )
            .await?
            .into_iter()
            .map(bson::from_document::<DailyRevenue>)
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to decode revenue analytics")?;

        let popular_courses = self
            .aggregate(
                ENROLLMENTS,
                vec![
                    doc! { "$group": { "_id": "$course", "enrollments": { "$sum": 1 } } },
                    doc! { "$sort": { "enrollments": -1, "_id": 1 } },
                    doc! { "$limit": POPULAR_COURSES },
                    doc! {
                        "$lookup": {
                            "from": COURSES,
                            "localField": "_id",
                            "foreignField": "_id",
                            "as": "course",
                        }
                    },
                    doc! { "$unwind": "$course" },
                    doc! {
                        "$project": {
                            "_id": 0,
                            "courseId": { "$toString": "$course._id" },
                            "title": "$course.title",
                            "enrollments": 1,
                            "rating": { "$toDouble": "$course.rating" },
                        }
                    },
                ],
            )
            .await?
            .into_iter()
            .map(bson::from_document::<PopularCourse>)
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to decode popular courses")?;

        let completion = self
            .aggregate(
                ENROLLMENTS,
                vec![doc! {
                    "$group": {
                        "_id": null,
                        "totalEnrollments": { "$sum": 1 },
                        "completedEnrollments": { "$sum": { "$cond": [{ "$eq": ["$progress", 100] }, 1, 0] } },
                    }
                }],
            )
            .await?;
        let mut completion_stats = completion
            .first()
            .map(|row| CompletionStats {
                total_enrollments: count(row, "totalEnrollments"),
                completed_enrollments: count(row, "completedEnrollments"),
                completion_rate: 0.0,
            })
            .unwrap_or_default();
        completion_rate(&mut completion_stats);

        Ok(Analytics {
            timeframe,
            enrollment_analytics,
            revenue_analytics,
            popular_courses,
            completion_stats,
        })
    }
}

fn check_dates(
    start: Option<chrono::DateTime<Utc>>,
    end: Option<chrono::DateTime<Utc>>,
) -> AppResult<()> {
    match (start, end) {
        (Some(start), Some(end)) if end < start => {
            Err(AppError::bad_request("End date must be after start date"))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_student_sort_whitelist() {
        assert_eq!(student_sort(None, None), doc! { "createdAt": -1, "_id": 1 });
        assert_eq!(
            student_sort(Some("name"), Some("asc")),
            doc! { "name": 1, "_id": 1 }
        );
        assert_eq!(
            student_sort(Some("password"), Some("asc")),
            doc! { "createdAt": 1, "_id": 1 }
        );
    }

    #[test]
    fn test_completion_rate() {
        let mut stats = CompletionStats {
            total_enrollments: 3,
            completed_enrollments: 1,
            completion_rate: 0.0,
        };
        completion_rate(&mut stats);
        assert_eq!(stats.completion_rate, 33.33);

        let mut empty = CompletionStats::default();
        completion_rate(&mut empty);
        assert_eq!(empty.completion_rate, 0.0);
    }

    #[test]
    fn test_counts_by_group_rows() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        let rows = vec![
            doc! { "_id": a, "count": 2_i32 },
            doc! { "_id": b, "count": 5_i64 },
            doc! { "_id": null, "count": 9_i32 },
        ];
        let counts = counts_by(&rows, "count");
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[&a], 2);
        assert_eq!(counts[&b], 5);
    }

    #[test]
    fn test_check_dates() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        assert!(check_dates(Some(start), Some(end)).is_ok());
        assert!(check_dates(Some(start), None).is_ok());
        assert_eq!(
            check_dates(Some(end), Some(start)).unwrap_err().to_string(),
            "End date must be after start date"
        );
    }
}
