//! Quiz scoring.
//!
//! Everything here is pure: the service layer loads the quiz, calls [`grade`] and
//! persists whatever comes back. Nothing is written when grading fails.

use serde::Serialize;

use crate::models::quiz::Question;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GradingError {
    #[error("Expected {expected} answers, got {actual}")]
    AnswerCountMismatch { expected: usize, actual: usize },
}

/// Outcome for a single question.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResult {
    pub question: String,
    pub user_answer: i32,
    pub correct_answer: i32,
    pub is_correct: bool,
    pub points: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GradeSummary {
    pub score: f64,
    pub passed: bool,
    /// Sum of points awarded, not the number of correct questions.
    pub correct_answers: u32,
    pub total_questions: usize,
    pub total_points: u32,
    pub passing_score: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GradeReport {
    pub results: Vec<QuestionResult>,
    pub summary: GradeSummary,
}

pub fn total_points(questions: &[Question]) -> u32 {
    questions.iter().map(|q| q.points).sum()
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Percentage of `awarded` out of `total`, rounded to two decimals. Zero when
/// there is nothing to score.
pub fn percentage(awarded: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round2(f64::from(awarded) / f64::from(total) * 100.0)
}

pub fn grade(
    questions: &[Question],
    answers: &[i32],
    passing_score: f64,
) -> Result<GradeReport, GradingError> {
    if answers.len() != questions.len() {
        return Err(GradingError::AnswerCountMismatch {
            expected: questions.len(),
            actual: answers.len(),
        });
    }

    let results: Vec<QuestionResult> = questions
        .iter()
        .zip(answers)
        .map(|(question, &answer)| {
            let is_correct = answer == question.correct_answer;
            QuestionResult {
                question: question.question.clone(),
                user_answer: answer,
                correct_answer: question.correct_answer,
                is_correct,
                points: if is_correct { question.points } else { 0 },
            }
        })
        .collect();

    let awarded: u32 = results.iter().map(|r| r.points).sum();
    let total = total_points(questions);
    let score = percentage(awarded, total);

    Ok(GradeReport {
        results,
        summary: GradeSummary {
            score,
            passed: score >= passing_score,
            correct_answers: awarded,
            total_questions: questions.len(),
            total_points: total,
            passing_score,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(correct: i32, points: u32) -> Question {
        Question {
            question: format!("Q{}", correct),
            options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            correct_answer: correct,
            points,
        }
    }

    #[test]
    fn test_two_of_three_correct_does_not_pass() {
        let questions = vec![question(0, 1), question(1, 1), question(2, 1)];
        let report = grade(&questions, &[0, 1, 3], 70.0).unwrap();

        assert_eq!(report.summary.score, 66.67);
        assert!(!report.summary.passed);
        assert_eq!(report.summary.correct_answers, 2);
        assert_eq!(report.summary.total_questions, 3);
        assert_eq!(report.summary.total_points, 3);
        assert!(!report.results[2].is_correct);
        assert_eq!(report.results[2].points, 0);
    }

    #[test]
    fn test_weighted_points() {
        let questions = vec![question(0, 3), question(1, 1)];
        let report = grade(&questions, &[0, 2], 70.0).unwrap();

        assert_eq!(report.summary.score, 75.0);
        assert!(report.summary.passed);
        assert_eq!(report.summary.correct_answers, 3);
    }

    #[test]
    fn test_passing_boundary_is_inclusive() {
        let questions = vec![question(0, 1), question(0, 1)];
        let report = grade(&questions, &[0, 1], 50.0).unwrap();
        assert_eq!(report.summary.score, 50.0);
        assert!(report.summary.passed);
    }

    #[test]
    fn test_answer_count_mismatch() {
        let questions = vec![question(0, 1), question(1, 1)];
        let err = grade(&questions, &[0], 70.0).unwrap_err();
        assert_eq!(err.to_string(), "Expected 2 answers, got 1");
    }

    #[test]
    fn test_zero_point_quiz_scores_zero() {
        let questions = vec![question(0, 0)];
        let report = grade(&questions, &[0], 0.0).unwrap();
        assert_eq!(report.summary.score, 0.0);
        assert!(report.summary.passed);
    }

    #[test]
    fn test_total_points() {
        assert_eq!(total_points(&[question(0, 2), question(1, 5)]), 7);
        assert_eq!(total_points(&[]), 0);
    }
}
