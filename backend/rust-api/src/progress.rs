use std::collections::HashSet;

use mongodb::bson::oid::ObjectId;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub completed_lessons: usize,
    pub total_lessons: usize,
    pub progress: u32,
}

/// Share of `lessons` present in `completed`, as a rounded percentage.
///
/// Completed ids outside `lessons` are ignored, so lessons that were removed from
/// a course after being completed don't inflate the figure.
pub fn compute(lessons: &[ObjectId], completed: &[ObjectId]) -> ProgressSnapshot {
    let done: HashSet<&ObjectId> = completed.iter().collect();
    let unique: HashSet<&ObjectId> = lessons.iter().collect();

    let total_lessons = unique.len();
    let completed_lessons = unique.iter().filter(|id| done.contains(*id)).count();

    ProgressSnapshot {
        completed_lessons,
        total_lessons,
        progress: percent(completed_lessons, total_lessons),
    }
}

pub fn percent(completed: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (completed as f64 / total as f64 * 100.0).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<ObjectId> {
        (0..n).map(|_| ObjectId::new()).collect()
    }

    #[test]
    fn test_all_and_none() {
        let lessons = ids(4);
        assert_eq!(compute(&lessons, &lessons).progress, 100);
        assert_eq!(compute(&lessons, &[]).progress, 0);
    }

    #[test]
    fn test_rounds_to_nearest() {
        let lessons = ids(3);
        let snap = compute(&lessons, &lessons[..1]);
        assert_eq!(snap.progress, 33);
        assert_eq!(snap.completed_lessons, 1);
        assert_eq!(snap.total_lessons, 3);
        assert_eq!(compute(&lessons, &lessons[..2]).progress, 67);
    }

    #[test]
    fn test_ignores_foreign_lessons() {
        let lessons = ids(2);
        let mut completed = ids(3);
        completed.push(lessons[0]);
        let snap = compute(&lessons, &completed);
        assert_eq!(snap.completed_lessons, 1);
        assert_eq!(snap.progress, 50);
    }

    #[test]
    fn test_empty_course() {
        let snap = compute(&[], &ids(2));
        assert_eq!(snap.progress, 0);
        assert_eq!(snap.total_lessons, 0);
    }
}
