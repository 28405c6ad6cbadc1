use serde::{Deserialize, Serialize};

use super::{course::BatchView, enrollment::EnrollmentView, user::UserSummary};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopCourse {
    pub id: String,
    pub title: String,
    pub total_students: i64,
    pub rating: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminDashboard {
    pub total_students: u64,
    pub total_courses: u64,
    pub total_enrollments: u64,
    pub total_revenue: f64,
    pub recent_enrollments: Vec<EnrollmentView>,
    pub active_courses: Vec<TopCourse>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AnalyticsQuery {
    pub timeframe: Option<String>,
}

// Rows below come straight out of aggregation pipelines, hence the `_id` renames.

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyCount {
    #[serde(rename(deserialize = "_id"))]
    pub date: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyRevenue {
    #[serde(rename(deserialize = "_id"))]
    pub date: String,
    pub revenue: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PopularCourse {
    pub course_id: String,
    pub title: String,
    pub enrollments: u64,
    #[serde(default)]
    pub rating: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompletionStats {
    pub total_enrollments: u64,
    pub completed_enrollments: u64,
    /// Percentage, two decimals
    #[serde(default)]
    pub completion_rate: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub timeframe: String,
    pub enrollment_analytics: Vec<DailyCount>,
    pub revenue_analytics: Vec<DailyRevenue>,
    pub popular_courses: Vec<PopularCourse>,
    pub completion_stats: CompletionStats,
}

#[derive(Debug, Serialize)]
pub struct StudentEnrollments {
    pub student: UserSummary,
    pub enrollments: Vec<EnrollmentView>,
}

#[derive(Debug, Serialize)]
pub struct CourseRoster {
    pub course: CourseHeader,
    pub enrollments: Vec<EnrollmentView>,
    pub batches: Vec<BatchView>,
}

#[derive(Debug, Serialize)]
pub struct CourseHeader {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct RosterQuery {
    pub batch: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::{self, doc};

    #[test]
    fn test_daily_rows_read_group_key() {
        let row: DailyCount =
            bson::from_document(doc! { "_id": "2024-03-01", "count": 3_i32 }).unwrap();
        assert_eq!(row.date, "2024-03-01");
        assert_eq!(row.count, 3);

        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["date"], "2024-03-01");

        let revenue: DailyRevenue =
            bson::from_document(doc! { "_id": "2024-03-01", "revenue": 49.5 }).unwrap();
        assert_eq!(revenue.revenue, 49.5);
    }
}
