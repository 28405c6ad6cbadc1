use std::collections::HashMap;

use anyhow::Context;
use chrono::Utc;
use mongodb::bson::{self, doc, oid::ObjectId, Document};
use mongodb::options::ReturnDocument;
use mongodb::{Collection, Database};

use crate::error::{AppError, AppResult};
use crate::middlewares::auth::AuthUser;
use crate::models::api::{PageParams, Pagination};
use crate::models::course::{
    Course, CourseDetail, CourseView, CreateCourseRequest, ListCoursesQuery, UpdateCourseRequest,
};
use crate::models::lesson::{CreateLessonRequest, Lesson, LessonView, UpdateLessonRequest};
use crate::models::module::{
    CourseModule, CreateModuleRequest, ModuleView, QuizBrief, UpdateModuleRequest,
};
use crate::models::quiz::Quiz;
use crate::models::user::{User, UserSummary};
use crate::models::{
    ASSIGNMENTS, COURSES, ENROLLMENTS, LESSONS, MODULES, QUIZZES, QUIZ_ATTEMPTS, USERS,
};
use crate::services::lookup;
use crate::utils::mongo::{collect, search_regex};

const DEFAULT_PAGE_SIZE: u64 = 10;

/// Staff may manage a course they own; admins may manage any course.
pub fn ensure_can_manage(user: &AuthUser, course: &Course) -> AppResult<()> {
    user.ensure_staff()?;
    if user.is_admin() || course.is_owned_by(&user.id) {
        Ok(())
    } else {
        Err(AppError::forbidden("Not authorized to manage this course"))
    }
}

pub fn quiz_brief(quiz: &Quiz) -> QuizBrief {
    QuizBrief {
        id: quiz.id.map(|id| id.to_hex()).unwrap_or_default(),
        title: quiz.title.clone(),
        time_limit: quiz.time_limit,
        question_count: quiz.questions.len(),
    }
}

/// `sortBy`/`sortOrder` for the public catalog; newest first by default.
fn catalog_sort(sort_by: Option<&str>, sort_order: Option<&str>) -> Document {
    let direction = if sort_order == Some("desc") { -1 } else { 1 };
    match sort_by {
        Some(field @ ("price" | "rating" | "title")) => doc! { field: direction, "_id": 1 },
        _ => doc! { "createdAt": -1, "_id": 1 },
    }
}

/// A course's modules with their lessons and quiz summaries, in display order.
pub struct CourseTree {
    pub modules: Vec<CourseModule>,
    lessons: HashMap<ObjectId, Vec<Lesson>>,
    quizzes: HashMap<ObjectId, QuizBrief>,
}

impl CourseTree {
    pub fn lessons_of(&self, module_id: &ObjectId) -> &[Lesson] {
        self.lessons
            .get(module_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn quiz_of(&self, module_id: &ObjectId) -> Option<QuizBrief> {
        self.quizzes.get(module_id).cloned()
    }

    /// Every lesson id of the course, module by module
    pub fn lesson_ids(&self) -> Vec<ObjectId> {
        self.modules
            .iter()
            .filter_map(|m| m.id)
            .flat_map(|module_id| self.lessons_of(&module_id).iter().filter_map(|l| l.id))
            .collect()
    }

    /// Render modules; `full_lessons` exposes every video URL.
    pub fn module_views(&self, full_lessons: bool) -> Vec<ModuleView> {
        self.modules
            .iter()
            .map(|module| {
                let module_id = module.id.unwrap_or_default();
                let lessons = self
                    .lessons_of(&module_id)
                    .iter()
                    .cloned()
                    .map(|lesson| {
                        if full_lessons {
                            LessonView::full(lesson)
                        } else {
                            LessonView::public(lesson)
                        }
                    })
                    .collect();
                ModuleView::new(module.clone(), lessons, self.quiz_of(&module_id))
            })
            .collect()
    }
}

pub struct CourseService {
    mongo: Database,
}

impl CourseService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    fn courses(&self) -> Collection<Course> {
        self.mongo.collection::<Course>(COURSES)
    }

    fn modules(&self) -> Collection<CourseModule> {
        self.mongo.collection::<CourseModule>(MODULES)
    }

    fn lessons(&self) -> Collection<Lesson> {
        self.mongo.collection::<Lesson>(LESSONS)
    }

    pub async fn find_course(&self, course_id: &ObjectId) -> AppResult<Course> {
        self.courses()
            .find_one(doc! { "_id": course_id })
            .await
            .context("Failed to query course")?
            .ok_or_else(|| AppError::not_found("Course not found"))
    }

    pub async fn find_module(&self, module_id: &ObjectId) -> AppResult<CourseModule> {
        self.modules()
            .find_one(doc! { "_id": module_id })
            .await
            .context("Failed to query module")?
            .ok_or_else(|| AppError::not_found("Module not found"))
    }

    /// Module that must belong to `course_id`; anything else reads as missing.
    async fn course_module(&self, course_id: &ObjectId, module_id: &ObjectId) -> AppResult<CourseModule> {
        self.modules()
            .find_one(doc! { "_id": module_id, "course": course_id })
            .await
            .context("Failed to query module")?
            .ok_or_else(|| AppError::not_found("Module not found"))
    }

    /// Lesson that must sit in a module of `course_id`.
    pub async fn course_lesson(
        &self,
        course_id: &ObjectId,
        lesson_id: &ObjectId,
    ) -> AppResult<(Lesson, CourseModule)> {
        let lesson = self
            .lessons()
            .find_one(doc! { "_id": lesson_id })
            .await
            .context("Failed to query lesson")?
            .ok_or_else(|| AppError::not_found("Lesson not found"))?;
        let module = self
            .modules()
            .find_one(doc! { "_id": lesson.module, "course": course_id })
            .await
            .context("Failed to query module")?
            .ok_or_else(|| AppError::not_found("Lesson not found"))?;
        Ok((lesson, module))
    }

    pub async fn load_tree(&self, course_id: &ObjectId) -> AppResult<CourseTree> {
        let cursor = self
            .modules()
            .find(doc! { "course": course_id })
            .sort(doc! { "order": 1, "_id": 1 })
            .await
            .context("Failed to query modules")?;
        let modules = collect(cursor, "modules").await?;
        let module_ids: Vec<ObjectId> = modules.iter().filter_map(|m| m.id).collect();

        let mut lessons: HashMap<ObjectId, Vec<Lesson>> = HashMap::new();
        let mut quizzes = HashMap::new();

        if !module_ids.is_empty() {
            let cursor = self
                .lessons()
                .find(doc! { "module": { "$in": module_ids.clone() } })
                .sort(doc! { "order": 1, "_id": 1 })
                .await
                .context("Failed to query lessons")?;
            for lesson in collect(cursor, "lessons").await? {
                lessons.entry(lesson.module).or_default().push(lesson);
            }

            let cursor = self
                .mongo
                .collection::<Quiz>(QUIZZES)
                .find(doc! { "module": { "$in": module_ids.clone() } })
                .await
                .context("Failed to query quizzes")?;
            for quiz in collect(cursor, "quizzes").await? {
                quizzes.insert(quiz.module, quiz_brief(&quiz));
            }
        }

        Ok(CourseTree {
            modules,
            lessons,
            quizzes,
        })
    }

    /// Ids of all lessons in the course
    pub async fn lesson_ids(&self, course_id: &ObjectId) -> AppResult<Vec<ObjectId>> {
        let module_ids = self.module_ids(course_id).await?;
        if module_ids.is_empty() {
            return Ok(Vec::new());
        }
        let cursor = self
            .mongo
            .collection::<Document>(LESSONS)
            .find(doc! { "module": { "$in": module_ids } })
            .projection(doc! { "_id": 1 })
            .await
            .context("Failed to query lessons")?;
        let docs = collect(cursor, "lessons").await?;
        Ok(docs
            .iter()
            .filter_map(|d| d.get_object_id("_id").ok())
            .collect())
    }

    async fn module_ids(&self, course_id: &ObjectId) -> AppResult<Vec<ObjectId>> {
        let cursor = self
            .mongo
            .collection::<Document>(MODULES)
            .find(doc! { "course": course_id })
            .projection(doc! { "_id": 1 })
            .await
            .context("Failed to query modules")?;
        let docs = collect(cursor, "modules").await?;
        Ok(docs
            .iter()
            .filter_map(|d| d.get_object_id("_id").ok())
            .collect())
    }

    pub async fn instructor_summary(&self, instructor: &ObjectId) -> AppResult<Option<UserSummary>> {
        let user = self
            .mongo
            .collection::<User>(USERS)
            .find_one(doc! { "_id": instructor })
            .await
            .context("Failed to query instructor")?;
        Ok(user.as_ref().map(UserSummary::from))
    }

    /// Published catalog with search, category, price range and sorting
    pub async fn list_courses(&self, query: ListCoursesQuery) -> AppResult<(Vec<CourseView>, Pagination)> {
        let params = PageParams::new(query.page, query.limit, DEFAULT_PAGE_SIZE);
        let mut filter = doc! { "isPublished": true };

        if let Some(term) = query.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let regex = search_regex(term);

            // Instructor names live on users; match them first and filter by id
            let cursor = self
                .mongo
                .collection::<Document>(USERS)
                .find(doc! { "name": regex.clone() })
                .projection(doc! { "_id": 1 })
                .await
                .context("Failed to search instructors")?;
            let instructor_ids: Vec<ObjectId> = collect(cursor, "users")
                .await?
                .iter()
                .filter_map(|d| d.get_object_id("_id").ok())
                .collect();

            filter.insert(
                "$or",
                vec![
                    doc! { "title": regex.clone() },
                    doc! { "description": regex.clone() },
                    doc! { "tags": regex },
                    doc! { "instructor": { "$in": instructor_ids } },
                ],
            );
        }

        if let Some(category) = query.category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            filter.insert("category", category);
        }

        let mut price = Document::new();
        if let Some(min) = query.min_price {
            price.insert("$gte", min);
        }
        if let Some(max) = query.max_price {
            price.insert("$lte", max);
        }
        if !price.is_empty() {
            filter.insert("price", price);
        }

        let cursor = self
            .courses()
            .find(filter.clone())
            .sort(catalog_sort(query.sort_by.as_deref(), query.sort_order.as_deref()))
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

        let instructors =
            lookup::users_by_id(&self.mongo, courses.iter().map(|c| c.instructor)).await?;
        let views = courses
            .into_iter()
            .map(|course| {
                let instructor = instructors.get(&course.instructor).map(UserSummary::from);
                CourseView::new(course, instructor)
            })
            .collect();

        Ok((views, params.paginate(total)))
    }

    /// Course with instructor, modules and lessons. Drafts are visible to staff only.
    pub async fn get_course_detail(
        &self,
        course_id: &ObjectId,
        viewer: Option<&AuthUser>,
    ) -> AppResult<CourseDetail> {
        let course = self.find_course(course_id).await?;
        let is_staff = viewer.is_some_and(AuthUser::is_staff);
        if !course.is_published && !is_staff {
            return Err(AppError::not_found("Course not found"));
        }

        let tree = self.load_tree(course_id).await?;
        let instructor = self.instructor_summary(&course.instructor).await?;

        Ok(CourseDetail::new(
            CourseView::new(course, instructor),
            tree.module_views(is_staff),
        ))
    }

    pub async fn create_course(&self, user: &AuthUser, req: CreateCourseRequest) -> AppResult<CourseView> {
        user.ensure_staff()?;

        let mut course = Course {
            id: None,
            title: req.title.trim().to_string(),
            description: req.description,
            instructor: user.id,
            category: req.category.trim().to_string(),
            tags: clean_tags(req.tags),
            price: req.price,
            thumbnail: req.thumbnail.unwrap_or_default(),
            syllabus: req.syllabus,
            modules: Vec::new(),
            batches: Vec::new(),
            rating: 0.0,
            total_students: 0,
            is_published: req.is_published,
            created_at: Utc::now(),
        };

        let insert_result = self
            .courses()
            .insert_one(&course)
            .await
            .context("Failed to insert course")?;
        course.id = insert_result.inserted_id.as_object_id();

        tracing::info!("Course created: {:?} by {}", course.id, user.id);
        Ok(CourseView::from(course))
    }

    pub async fn update_course(
        &self,
        user: &AuthUser,
        course_id: &ObjectId,
        req: UpdateCourseRequest,
    ) -> AppResult<CourseView> {
        let course = self.find_course(course_id).await?;
        ensure_can_manage(user, &course)?;

        let mut set = Document::new();
        if let Some(title) = req.title {
            set.insert("title", title.trim());
        }
        if let Some(description) = req.description {
            set.insert("description", description);
        }
        if let Some(category) = req.category {
            set.insert("category", category.trim());
        }
        if let Some(tags) = req.tags {
            set.insert("tags", clean_tags(tags));
        }
        if let Some(price) = req.price {
            set.insert("price", price);
        }
        if let Some(thumbnail) = req.thumbnail {
            set.insert("thumbnail", thumbnail);
        }
        if let Some(syllabus) = req.syllabus {
            set.insert(
                "syllabus",
                bson::to_bson(&syllabus).context("Failed to encode syllabus")?,
            );
        }
        if let Some(is_published) = req.is_published {
            set.insert("isPublished", is_published);
        }

        if set.is_empty() {
            return Ok(CourseView::from(course));
        }

        let updated = self
            .courses()
            .find_one_and_update(doc! { "_id": course_id }, doc! { "$set": set })
            .return_document(ReturnDocument::After)
            .await
            .context("Failed to update course")?
            .ok_or_else(|| AppError::not_found("Course not found"))?;

        Ok(CourseView::from(updated))
    }

    /// Removes the course together with everything that hangs off it.
    pub async fn delete_course(&self, user: &AuthUser, course_id: &ObjectId) -> AppResult<()> {
        let course = self.find_course(course_id).await?;
        ensure_can_manage(user, &course)?;

        let module_ids = self.module_ids(course_id).await?;

        self.lessons()
            .delete_many(doc! { "module": { "$in": module_ids.clone() } })
            .await
            .context("Failed to delete lessons")?;
        self.mongo
            .collection::<Document>(QUIZZES)
            .delete_many(doc! { "module": { "$in": module_ids.clone() } })
            .await
            .context("Failed to delete quizzes")?;
        self.mongo
            .collection::<Document>(QUIZ_ATTEMPTS)
            .delete_many(doc! { "course": course_id })
            .await
            .context("Failed to delete quiz attempts")?;
        self.mongo
            .collection::<Document>(ASSIGNMENTS)
            .delete_many(doc! { "course": course_id })
            .await
            .context("Failed to delete assignments")?;
        self.mongo
            .collection::<Document>(ENROLLMENTS)
            .delete_many(doc! { "course": course_id })
            .await
            .context("Failed to delete enrollments")?;
        self.mongo
            .collection::<Document>(USERS)
            .update_many(
                doc! { "enrolledCourses.course": course_id },
                doc! { "$pull": { "enrolledCourses": { "course": course_id } } },
            )
            .await
            .context("Failed to detach course from users")?;
        self.modules()
            .delete_many(doc! { "course": course_id })
            .await
            .context("Failed to delete modules")?;
        self.courses()
            .delete_one(doc! { "_id": course_id })
            .await
            .context("Failed to delete course")?;

        tracing::info!("Course deleted: {} by {}", course_id, user.id);
        Ok(())
    }

    pub async fn create_module(
        &self,
        user: &AuthUser,
        course_id: &ObjectId,
        req: CreateModuleRequest,
    ) -> AppResult<ModuleView> {
        let course = self.find_course(course_id).await?;
        ensure_can_manage(user, &course)?;

        let order = match req.order {
            Some(order) => order,
            None => {
                let existing = self
                    .modules()
                    .count_documents(doc! { "course": course_id })
                    .await
                    .context("Failed to count modules")?;
                existing as i32 + 1
            }
        };

        let mut module = CourseModule {
            id: None,
            title: req.title.trim().to_string(),
            description: req.description,
            course: *course_id,
            order,
            lessons: Vec::new(),
            quiz: None,
            assignment: req.assignment,
        };

        let insert_result = self
            .modules()
            .insert_one(&module)
            .await
            .context("Failed to insert module")?;
        let module_id = insert_result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| anyhow::anyhow!("Failed to get inserted module ID"))?;
        module.id = Some(module_id);

        self.courses()
            .update_one(doc! { "_id": course_id }, doc! { "$push": { "modules": module_id } })
            .await
            .context("Failed to attach module to course")?;

        Ok(ModuleView::new(module, Vec::new(), None))
    }

    pub async fn update_module(
        &self,
        user: &AuthUser,
        course_id: &ObjectId,
        module_id: &ObjectId,
        req: UpdateModuleRequest,
    ) -> AppResult<ModuleView> {
        let course = self.find_course(course_id).await?;
        ensure_can_manage(user, &course)?;
        let module = self.course_module(course_id, module_id).await?;

        let mut set = Document::new();
        if let Some(title) = req.title {
            set.insert("title", title.trim());
        }
        if let Some(description) = req.description {
            set.insert("description", description);
        }
        if let Some(order) = req.order {
            set.insert("order", order);
        }
        if let Some(assignment) = req.assignment {
            set.insert(
                "assignment",
                bson::to_bson(&assignment).context("Failed to encode assignment")?,
            );
        }

        let module = if set.is_empty() {
            module
        } else {
            self.modules()
                .find_one_and_update(doc! { "_id": module_id }, doc! { "$set": set })
                .return_document(ReturnDocument::After)
                .await
                .context("Failed to update module")?
                .ok_or_else(|| AppError::not_found("Module not found"))?
        };

        let tree = self.load_tree(course_id).await?;
        let lessons = tree
            .lessons_of(module_id)
            .iter()
            .cloned()
            .map(LessonView::full)
            .collect();
        Ok(ModuleView::new(module, lessons, tree.quiz_of(module_id)))
    }

    /// Deletes the module, its lessons, its quiz with attempts, and its submissions.
    pub async fn delete_module(
        &self,
        user: &AuthUser,
        course_id: &ObjectId,
        module_id: &ObjectId,
    ) -> AppResult<()> {
        let course = self.find_course(course_id).await?;
        ensure_can_manage(user, &course)?;
        let module = self.course_module(course_id, module_id).await?;

        if let Some(quiz_id) = module.quiz {
            self.mongo
                .collection::<Document>(QUIZ_ATTEMPTS)
                .delete_many(doc! { "quiz": quiz_id })
                .await
                .context("Failed to delete quiz attempts")?;
        }
        self.mongo
            .collection::<Document>(QUIZZES)
            .delete_many(doc! { "module": module_id })
            .await
            .context("Failed to delete quiz")?;

        let lesson_ids = self.ids_in(LESSONS, doc! { "module": module_id }).await?;
        self.lessons()
            .delete_many(doc! { "module": module_id })
            .await
            .context("Failed to delete lessons")?;
        self.forget_lessons(course_id, &lesson_ids).await?;

        self.mongo
            .collection::<Document>(ASSIGNMENTS)
            .delete_many(doc! { "module": module_id })
            .await
            .context("Failed to delete assignments")?;
        self.modules()
            .delete_one(doc! { "_id": module_id })
            .await
            .context("Failed to delete module")?;
        self.courses()
            .update_one(doc! { "_id": course_id }, doc! { "$pull": { "modules": module_id } })
            .await
            .context("Failed to detach module from course")?;

        Ok(())
    }

    pub async fn create_lesson(
        &self,
        user: &AuthUser,
        course_id: &ObjectId,
        module_id: &ObjectId,
        req: CreateLessonRequest,
    ) -> AppResult<LessonView> {
        let course = self.find_course(course_id).await?;
        ensure_can_manage(user, &course)?;
        let module = self.course_module(course_id, module_id).await?;

        let mut lesson = Lesson {
            id: None,
            title: req.title.trim().to_string(),
            description: req.description,
            module: *module_id,
            video_url: req.video_url.unwrap_or_default(),
            duration: req.duration,
            order: req.order.unwrap_or(module.lessons.len() as i32 + 1),
            is_preview: req.is_preview,
            resources: req.resources,
        };

        let insert_result = self
            .lessons()
            .insert_one(&lesson)
            .await
            .context("Failed to insert lesson")?;
        let lesson_id = insert_result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| anyhow::anyhow!("Failed to get inserted lesson ID"))?;
        lesson.id = Some(lesson_id);

        self.modules()
            .update_one(doc! { "_id": module_id }, doc! { "$push": { "lessons": lesson_id } })
            .await
            .context("Failed to attach lesson to module")?;

        Ok(LessonView::full(lesson))
    }

    pub async fn update_lesson(
        &self,
        user: &AuthUser,
        course_id: &ObjectId,
        lesson_id: &ObjectId,
        req: UpdateLessonRequest,
    ) -> AppResult<LessonView> {
        let course = self.find_course(course_id).await?;
        ensure_can_manage(user, &course)?;
        let (lesson, _) = self.course_lesson(course_id, lesson_id).await?;

        let mut set = Document::new();
        if let Some(title) = req.title {
            set.insert("title", title.trim());
        }
        if let Some(description) = req.description {
            set.insert("description", description);
        }
        if let Some(video_url) = req.video_url {
            set.insert("videoUrl", video_url);
        }
        if let Some(duration) = req.duration {
            set.insert("duration", duration);
        }
        if let Some(order) = req.order {
            set.insert("order", order);
        }
        if let Some(is_preview) = req.is_preview {
            set.insert("isPreview", is_preview);
        }
        if let Some(resources) = req.resources {
            set.insert(
                "resources",
                bson::to_bson(&resources).context("Failed to encode resources")?,
            );
        }

        if set.is_empty() {
            return Ok(LessonView::full(lesson));
        }

        let updated = self
            .lessons()
            .find_one_and_update(doc! { "_id": lesson_id }, doc! { "$set": set })
            .return_document(ReturnDocument::After)
            .await
            .context("Failed to update lesson")?
            .ok_or_else(|| AppError::not_found("Lesson not found"))?;

        Ok(LessonView::full(updated))
    }

    pub async fn delete_lesson(
        &self,
        user: &AuthUser,
        course_id: &ObjectId,
        lesson_id: &ObjectId,
    ) -> AppResult<()> {
        let course = self.find_course(course_id).await?;
        ensure_can_manage(user, &course)?;
        let (lesson, _) = self.course_lesson(course_id, lesson_id).await?;

        self.lessons()
            .delete_one(doc! { "_id": lesson_id })
            .await
            .context("Failed to delete lesson")?;
        self.modules()
            .update_one(
                doc! { "_id": lesson.module },
                doc! { "$pull": { "lessons": lesson_id } },
            )
            .await
            .context("Failed to detach lesson from module")?;
        self.forget_lessons(course_id, &[*lesson_id]).await?;

        Ok(())
    }

    async fn ids_in(&self, collection: &str, filter: Document) -> AppResult<Vec<ObjectId>> {
        let cursor = self
            .mongo
            .collection::<Document>(collection)
            .find(filter)
            .projection(doc! { "_id": 1 })
            .await
            .with_context(|| format!("Failed to query {}", collection))?;
        Ok(collect(cursor, collection)
            .await?
            .iter()
            .filter_map(|d| d.get_object_id("_id").ok())
            .collect())
    }

    /// Drop removed lessons from every enrollment's completion list.
    async fn forget_lessons(&self, course_id: &ObjectId, lesson_ids: &[ObjectId]) -> AppResult<()> {
        if lesson_ids.is_empty() {
            return Ok(());
        }
        self.mongo
            .collection::<Document>(ENROLLMENTS)
            .update_many(
                doc! { "course": course_id },
                doc! { "$pull": { "completedLessons": { "$in": lesson_ids.to_vec() } } },
            )
            .await
            .context("Failed to update enrollments")?;
        Ok(())
    }
}

fn clean_tags(tags: Vec<String>) -> Vec<String> {
    tags.into_iter()
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::UserRole;

    fn user(role: UserRole) -> AuthUser {
        AuthUser {
            id: ObjectId::new(),
            role,
            token: String::new(),
            expires_at: 0,
        }
    }

    fn course_owned_by(instructor: ObjectId) -> Course {
        Course {
            id: Some(ObjectId::new()),
            title: "Rust for everyone".into(),
            description: "desc".into(),
            instructor,
            category: "programming".into(),
            tags: vec![],
            price: 0.0,
            thumbnail: String::new(),
            syllabus: vec![],
            modules: vec![],
            batches: vec![],
            rating: 0.0,
            total_students: 0,
            is_published: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_ensure_can_manage() {
        let owner = user(UserRole::Instructor);
        let other = user(UserRole::Instructor);
        let admin = user(UserRole::Admin);
        let student = user(UserRole::Student);
        let course = course_owned_by(owner.id);

        assert!(ensure_can_manage(&owner, &course).is_ok());
        assert!(ensure_can_manage(&admin, &course).is_ok());
        assert_eq!(
            ensure_can_manage(&other, &course).unwrap_err().to_string(),
            "Not authorized to manage this course"
        );
        assert!(ensure_can_manage(&student, &course).is_err());
    }

    #[test]
    fn test_catalog_sort() {
        assert_eq!(
            catalog_sort(Some("price"), Some("desc")),
            doc! { "price": -1, "_id": 1 }
        );
        assert_eq!(catalog_sort(Some("rating"), None), doc! { "rating": 1, "_id": 1 });
        assert_eq!(
            catalog_sort(Some("password"), Some("desc")),
            doc! { "createdAt": -1, "_id": 1 }
        );
        assert_eq!(catalog_sort(None, None), doc! { "createdAt": -1, "_id": 1 });
    }

    #[test]
    fn test_clean_tags() {
        assert_eq!(
            clean_tags(vec![" rust ".into(), "".into(), "web".into()]),
            vec!["rust".to_string(), "web".to_string()]
        );
    }

    #[test]
    fn test_course_tree_lesson_order() {
        let module_a = ObjectId::new();
        let module_b = ObjectId::new();
        let lesson = |module: ObjectId, order: i32, preview: bool| Lesson {
            id: Some(ObjectId::new()),
            title: format!("Lesson {}", order),
            description: String::new(),
            module,
            video_url: "https://video.example/1".into(),
            duration: 5,
            order,
            is_preview: preview,
            resources: vec![],
        };
        let module = |id: ObjectId, order: i32| CourseModule {
            id: Some(id),
            title: format!("Module {}", order),
            description: String::new(),
            course: ObjectId::new(),
            order,
            lessons: vec![],
            quiz: None,
            assignment: None,
        };

        let a1 = lesson(module_a, 1, true);
        let b1 = lesson(module_b, 1, false);
        let tree = CourseTree {
            modules: vec![module(module_a, 1), module(module_b, 2)],
            lessons: HashMap::from([(module_a, vec![a1.clone()]), (module_b, vec![b1.clone()])]),
            quizzes: HashMap::new(),
        };

        assert_eq!(tree.lesson_ids(), vec![a1.id.unwrap(), b1.id.unwrap()]);

        let public = tree.module_views(false);
        assert!(public[0].lessons[0].video_url.is_some());
        assert!(public[1].lessons[0].video_url.is_none());

        let full = tree.module_views(true);
        assert!(full[1].lessons[0].video_url.is_some());
        assert!(tree.lessons_of(&ObjectId::new()).is_empty());
    }
}
