use anyhow::Context;
use chrono::Utc;
use mongodb::bson::{self, doc, oid::ObjectId, Document};
use mongodb::options::ReturnDocument;
use mongodb::{Collection, Database};

use crate::error::{AppError, AppResult};
use crate::grading::{self, round2};
use crate::metrics::QUIZ_ATTEMPTS_TOTAL;
use crate::middlewares::auth::AuthUser;
use crate::models::api::{PageParams, Pagination};
use crate::models::module::CourseModule;
use crate::models::quiz::{
    AttemptStatistics, AttemptView, CourseAttempts, CourseAttemptsQuery, CreateQuizRequest,
    DetailedResult, LatestAttempt, Quiz, QuizAttempt, QuizHeader, QuizResults, QuizView,
    StudentAttempts, SubmitQuizRequest, SubmitQuizResponse, UpdateQuizRequest,
    DEFAULT_PASSING_SCORE, DEFAULT_TIME_LIMIT,
};
use crate::models::user::UserSummary;
use crate::models::{MODULES, QUIZZES, QUIZ_ATTEMPTS};
use crate::services::course_service::{ensure_can_manage, CourseService};
use crate::services::enrollment_service::EnrollmentService;
use crate::services::lookup;
use crate::utils::mongo::{collect, count, is_duplicate_key, number, parse_object_id};

const DEFAULT_ATTEMPTS_PAGE_SIZE: u64 = 20;

/// Totals over a set of attempts. Average score and pass rate are percentages
/// rounded to two decimals.
pub fn attempt_statistics(total_attempts: u64, total_passed: u64, score_sum: f64) -> AttemptStatistics {
    if total_attempts == 0 {
        return AttemptStatistics::default();
    }
    AttemptStatistics {
        total_attempts,
        total_passed,
        average_score: round2(score_sum / total_attempts as f64),
        pass_rate: round2(total_passed as f64 / total_attempts as f64 * 100.0),
    }
}

fn summarize(attempts: &[QuizAttempt]) -> AttemptStatistics {
    let passed = attempts.iter().filter(|a| a.passed).count() as u64;
    let score_sum = attempts.iter().map(|a| a.score).sum();
    attempt_statistics(attempts.len() as u64, passed, score_sum)
}

/// Replay an attempt's answers against the quiz's current answer key.
fn detailed_results(quiz: &Quiz, answers: &[i32]) -> Vec<DetailedResult> {
    quiz.questions
        .iter()
        .enumerate()
        .map(|(idx, question)| {
            let user_answer = answers.get(idx).copied();
            DetailedResult {
                question: question.question.clone(),
                options: question.options.clone(),
                correct_answer: question.correct_answer,
                user_answer,
                is_correct: user_answer == Some(question.correct_answer),
            }
        })
        .collect()
}

pub struct QuizService {
    mongo: Database,
}

impl QuizService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    fn quizzes(&self) -> Collection<Quiz> {
        self.mongo.collection::<Quiz>(QUIZZES)
    }

    fn attempts(&self) -> Collection<QuizAttempt> {
        self.mongo.collection::<QuizAttempt>(QUIZ_ATTEMPTS)
    }

    fn modules(&self) -> Collection<CourseModule> {
        self.mongo.collection::<CourseModule>(MODULES)
    }

    async fn find_quiz(&self, quiz_id: &ObjectId) -> AppResult<Quiz> {
        self.quizzes()
            .find_one(doc! { "_id": quiz_id })
            .await
            .context("Failed to query quiz")?
            .ok_or_else(|| AppError::not_found("Quiz not found"))
    }

    /// The quiz together with the module it belongs to.
    async fn quiz_with_module(&self, quiz_id: &ObjectId) -> AppResult<(Quiz, CourseModule)> {
        let quiz = self.find_quiz(quiz_id).await?;
        let module = self
            .modules()
            .find_one(doc! { "_id": quiz.module })
            .await
            .context("Failed to query module")?
            .ok_or_else(|| AppError::not_found("Module not found"))?;
        Ok((quiz, module))
    }

    async fn managed_quiz(&self, user: &AuthUser, quiz_id: &ObjectId) -> AppResult<(Quiz, CourseModule)> {
        user.ensure_staff()?;
        let (quiz, module) = self.quiz_with_module(quiz_id).await?;
        let course = CourseService::new(self.mongo.clone())
            .find_course(&module.course)
            .await?;
        ensure_can_manage(user, &course)?;
        Ok((quiz, module))
    }

    pub async fn create_quiz(&self, user: &AuthUser, req: CreateQuizRequest) -> AppResult<QuizView> {
        user.ensure_staff()?;
        let module_id = parse_object_id(&req.module_id, "module")?;

        let courses = CourseService::new(self.mongo.clone());
        let module = courses.find_module(&module_id).await?;
        let course = courses.find_course(&module.course).await?;
        ensure_can_manage(user, &course)?;

        if module.quiz.is_some() {
            return Err(AppError::bad_request("Module already has a quiz"));
        }

        let mut quiz = Quiz {
            id: None,
            title: req.title.trim().to_string(),
            module: module_id,
            total_points: grading::total_points(&req.questions),
            questions: req.questions,
            passing_score: req.passing_score.unwrap_or(DEFAULT_PASSING_SCORE),
            time_limit: req.time_limit.unwrap_or(DEFAULT_TIME_LIMIT),
            allow_retake: req.allow_retake,
        };

        let insert_result = self
            .quizzes()
            .insert_one(&quiz)
            .await
            .context("Failed to insert quiz")?;
        let quiz_id = insert_result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| anyhow::anyhow!("Failed to get inserted quiz ID"))?;
        quiz.id = Some(quiz_id);

        self.modules()
            .update_one(doc! { "_id": module_id }, doc! { "$set": { "quiz": quiz_id } })
            .await
            .context("Failed to attach quiz to module")?;

        tracing::info!("Quiz {} created for module {} by {}", quiz_id, module_id, user.id);
        Ok(QuizView::new(quiz, Some(module.title), true))
    }

    /// Students must be enrolled and never see the answer key.
    pub async fn get_quiz(&self, user: &AuthUser, quiz_id: &ObjectId) -> AppResult<QuizView> {
        let (quiz, module) = self.quiz_with_module(quiz_id).await?;

        if !user.is_staff() {
            EnrollmentService::new(self.mongo.clone())
                .require(&user.id, &module.course, AppError::Forbidden)
                .await?;
        }

        Ok(QuizView::new(quiz, Some(module.title), user.is_staff()))
    }

    pub async fn update_quiz(
        &self,
        user: &AuthUser,
        quiz_id: &ObjectId,
        req: UpdateQuizRequest,
    ) -> AppResult<QuizView> {
        let (quiz, module) = self.managed_quiz(user, quiz_id).await?;

        let mut set = Document::new();
        if let Some(title) = req.title {
            set.insert("title", title.trim());
        }
        if let Some(questions) = req.questions {
            set.insert("totalPoints", grading::total_points(&questions));
            set.insert(
                "questions",
                bson::to_bson(&questions).context("Failed to encode questions")?,
            );
        }
        if let Some(passing_score) = req.passing_score {
            set.insert("passingScore", passing_score);
        }
        if let Some(time_limit) = req.time_limit {
            set.insert("timeLimit", time_limit);
        }
        if let Some(allow_retake) = req.allow_retake {
            set.insert("allowRetake", allow_retake);
        }

        let quiz = if set.is_empty() {
            quiz
        } else {
            self.quizzes()
                .find_one_and_update(doc! { "_id": quiz_id }, doc! { "$set": set })
                .return_document(ReturnDocument::After)
                .await
                .context("Failed to update quiz")?
                .ok_or_else(|| AppError::not_found("Quiz not found"))?
        };

        Ok(QuizView::new(quiz, Some(module.title), true))
    }

    pub async fn delete_quiz(&self, user: &AuthUser, quiz_id: &ObjectId) -> AppResult<()> {
        let (_, module) = self.managed_quiz(user, quiz_id).await?;

        self.attempts()
            .delete_many(doc! { "quiz": quiz_id })
            .await
            .context("Failed to delete quiz attempts")?;
        self.modules()
            .update_one(doc! { "_id": module.id }, doc! { "$unset": { "quiz": "" } })
            .await
            .context("Failed to detach quiz from module")?;
        self.quizzes()
            .delete_one(doc! { "_id": quiz_id })
            .await
            .context("Failed to delete quiz")?;

        tracing::info!("Quiz {} deleted by {}", quiz_id, user.id);
        Ok(())
    }

    /// Grade a submission and record exactly one attempt.
    ///
    /// A second attempt is refused unless the quiz allows retakes; the unique
    /// `(student, quiz, attemptNumber)` index turns concurrent duplicates into
    /// the same refusal.
    pub async fn submit(
        &self,
        user: &AuthUser,
        quiz_id: &ObjectId,
        req: SubmitQuizRequest,
    ) -> AppResult<SubmitQuizResponse> {
        let (quiz, module) = self.quiz_with_module(quiz_id).await?;

        EnrollmentService::new(self.mongo.clone())
            .require(&user.id, &module.course, AppError::Forbidden)
            .await?;

        let report = grading::grade(&quiz.questions, &req.answers, quiz.passing_score)
            .map_err(|e| AppError::bad_request(e.to_string()))?;

        let previous = self
            .attempts()
            .count_documents(doc! { "student": user.id, "quiz": quiz_id })
            .await
            .context("Failed to count previous attempts")?;
        if previous > 0 && !quiz.allow_retake {
            return Err(AppError::bad_request("Quiz already attempted"));
        }

        let now = Utc::now();
        let mut attempt = QuizAttempt {
            id: None,
            student: user.id,
            quiz: *quiz_id,
            course: module.course,
            module: quiz.module,
            answers: req.answers,
            score: report.summary.score,
            passed: report.summary.passed,
            attempt_number: previous as u32 + 1,
            time_taken: req.time_taken,
            attempted_at: now,
            completed_at: Some(now),
        };

        let insert_result = match self.attempts().insert_one(&attempt).await {
            Ok(result) => result,
            Err(e) if is_duplicate_key(&e) => {
                return Err(AppError::conflict("Quiz already attempted"))
            }
            Err(e) => {
                return Err(anyhow::Error::new(e)
                    .context("Failed to record quiz attempt")
                    .into())
            }
        };
        attempt.id = insert_result.inserted_id.as_object_id();

        QUIZ_ATTEMPTS_TOTAL
            .with_label_values(&[if attempt.passed { "true" } else { "false" }])
            .inc();
        tracing::info!(
            "Quiz {} attempt #{} by {}: {} ({})",
            quiz_id,
            attempt.attempt_number,
            user.id,
            attempt.score,
            if attempt.passed { "passed" } else { "failed" }
        );

        Ok(SubmitQuizResponse {
            attempt: AttemptView::from(attempt),
            results: report.results,
            summary: report.summary,
        })
    }

    /// The caller's attempts on a quiz, newest first, with the latest one
    /// broken down per question.
    pub async fn results(&self, user: &AuthUser, quiz_id: &ObjectId) -> AppResult<QuizResults> {
        let quiz = self.find_quiz(quiz_id).await?;

        let cursor = self
            .attempts()
            .find(doc! { "student": user.id, "quiz": quiz_id })
            .sort(doc! { "attemptedAt": -1, "attemptNumber": -1 })
            .await
            .context("Failed to query attempts")?;
        let attempts = collect(cursor, "attempts").await?;

        let Some(latest) = attempts.first().cloned() else {
            return Err(AppError::not_found("No attempts found for this quiz"));
        };

        let detailed_results = detailed_results(&quiz, &latest.answers);
        Ok(QuizResults {
            quiz: QuizHeader::from(&quiz),
            attempts: attempts.into_iter().map(AttemptView::from).collect(),
            latest_attempt: LatestAttempt {
                attempt: AttemptView::from(latest),
                detailed_results,
            },
        })
    }

    /// Every attempt the caller made in a course, with a performance summary.
    pub async fn student_course_attempts(
        &self,
        user: &AuthUser,
        course_id: &ObjectId,
    ) -> AppResult<StudentAttempts> {
        EnrollmentService::new(self.mongo.clone())
            .require(&user.id, course_id, AppError::Forbidden)
            .await?;

        let attempts = self.attempts_of(&user.id, course_id).await?;
        let performance = summarize(&attempts);
        let attempts = self.with_titles(attempts).await?;

        Ok(StudentAttempts {
            attempts,
            performance,
        })
    }

    /// Newest-first attempts of a student in a course
    pub async fn attempts_of(&self, student: &ObjectId, course_id: &ObjectId) -> AppResult<Vec<QuizAttempt>> {
        let cursor = self
            .attempts()
            .find(doc! { "student": student, "course": course_id })
            .sort(doc! { "attemptedAt": -1 })
            .await
            .context("Failed to query attempts")?;
        collect(cursor, "attempts").await
    }

    pub async fn with_titles(&self, attempts: Vec<QuizAttempt>) -> AppResult<Vec<AttemptView>> {
        let quiz_titles = lookup::quiz_titles(&self.mongo, attempts.iter().map(|a| a.quiz)).await?;
        let module_titles =
            lookup::module_titles(&self.mongo, attempts.iter().map(|a| a.module)).await?;

        Ok(attempts
            .into_iter()
            .map(|attempt| {
                let quiz_title = quiz_titles.get(&attempt.quiz).cloned();
                let module_title = module_titles.get(&attempt.module).cloned();
                AttemptView::from(attempt).with_titles(quiz_title, module_title)
            })
            .collect())
    }

    /// Staff view over all attempts in a course, filterable by student or module.
    pub async fn course_attempts(
        &self,
        user: &AuthUser,
        course_id: &ObjectId,
        query: CourseAttemptsQuery,
    ) -> AppResult<(CourseAttempts, Pagination)> {
        user.ensure_staff()?;
        let courses = CourseService::new(self.mongo.clone());
        let course = courses.find_course(course_id).await?;
        ensure_can_manage(user, &course)?;

        let params = PageParams::new(query.page, query.limit, DEFAULT_ATTEMPTS_PAGE_SIZE);
        let mut filter = doc! { "course": course_id };

        if let Some(student) = query.student_id.as_deref().filter(|s| !s.is_empty()) {
            filter.insert("student", parse_object_id(student, "student")?);
        }
        if let Some(module) = query.module_id.as_deref().filter(|s| !s.is_empty()) {
            filter.insert("module", parse_object_id(module, "module")?);
        }

        let cursor = self
            .attempts()
            .find(filter.clone())
            .sort(doc! { "attemptedAt": -1 })
            .skip(params.skip())
            .limit(params.limit_i64())
            .await
            .context("Failed to query attempts")?;
        let attempts = collect(cursor, "attempts").await?;

        let total = self
            .attempts()
            .count_documents(filter.clone())
            .await
            .context("Failed to count attempts")?;

        let pipeline = vec![
            doc! { "$match": filter },
            doc! {
                "$group": {
                    "_id": null,
                    "totalAttempts": { "$sum": 1 },
                    "totalPassed": { "$sum": { "$cond": ["$passed", 1, 0] } },
                    "scoreSum": { "$sum": "$score" },
                }
            },
        ];
        let cursor = self
            .attempts()
            .aggregate(pipeline)
            .await
            .context("Failed to aggregate attempt statistics")?;
        let groups = collect(cursor, "attempt statistics").await?;
        let statistics = groups
            .first()
            .map(|g| {
                attempt_statistics(
                    count(g, "totalAttempts"),
                    count(g, "totalPassed"),
                    number(g, "scoreSum"),
                )
            })
            .unwrap_or_default();

        let students =
            lookup::users_by_id(&self.mongo, attempts.iter().map(|a| a.student)).await?;
        let student_ids: Vec<ObjectId> = attempts.iter().map(|a| a.student).collect();
        let views = self
            .with_titles(attempts)
            .await?
            .into_iter()
            .zip(student_ids)
            .map(|(view, student)| view.with_student(students.get(&student).map(UserSummary::from)))
            .collect();

        Ok((
            CourseAttempts {
                attempts: views,
                statistics,
            },
            params.paginate(total),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::quiz::Question;

    fn quiz(correct: &[i32]) -> Quiz {
        Quiz {
            id: Some(ObjectId::new()),
            title: "Week 1 quiz".into(),
            module: ObjectId::new(),
            questions: correct
                .iter()
                .map(|&c| Question {
                    question: format!("Q{}", c),
                    options: vec!["a".into(), "b".into(), "c".into()],
                    correct_answer: c,
                    points: 1,
                })
                .collect(),
            total_points: correct.len() as u32,
            passing_score: 70.0,
            time_limit: 30,
            allow_retake: false,
        }
    }

    fn attempt(score: f64, passed: bool) -> QuizAttempt {
        QuizAttempt {
            id: Some(ObjectId::new()),
            student: ObjectId::new(),
            quiz: ObjectId::new(),
            course: ObjectId::new(),
            module: ObjectId::new(),
            answers: vec![],
            score,
            passed,
            attempt_number: 1,
            time_taken: 0,
            attempted_at: Utc::now(),
            completed_at: None,
        }
    }

    #[test]
    fn test_attempt_statistics() {
        let stats = attempt_statistics(3, 1, 66.67 + 100.0 + 33.33);
        assert_eq!(stats.total_attempts, 3);
        assert_eq!(stats.total_passed, 1);
        assert_eq!(stats.average_score, 66.67);
        assert_eq!(stats.pass_rate, 33.33);
    }

    #[test]
    fn test_attempt_statistics_empty() {
        assert_eq!(attempt_statistics(0, 0, 0.0), AttemptStatistics::default());
        assert_eq!(summarize(&[]), AttemptStatistics::default());
    }

    #[test]
    fn test_summarize_attempts() {
        let stats = summarize(&[attempt(100.0, true), attempt(50.0, false)]);
        assert_eq!(stats.average_score, 75.0);
        assert_eq!(stats.pass_rate, 50.0);
    }

    #[test]
    fn test_detailed_results_replay_answers() {
        let quiz = quiz(&[0, 1, 2]);
        let details = detailed_results(&quiz, &[0, 2]);
        assert_eq!(details.len(), 3);
        assert!(details[0].is_correct);
        assert!(!details[1].is_correct);
        assert_eq!(details[1].user_answer, Some(2));
        assert_eq!(details[2].user_answer, None);
        assert!(!details[2].is_correct);
    }
}
