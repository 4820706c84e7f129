use iems::academics::{
    AcademicServices, AggregationMethod, ExamType, InMemoryAcademicStore, InMemoryAuditLog,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub(crate) type ApiServices = AcademicServices<InMemoryAcademicStore, InMemoryAuditLog>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) fn parse_exam_type(raw: &str) -> Result<ExamType, String> {
    ExamType::parse(raw).ok_or_else(|| {
        format!(
            "unknown exam type '{raw}' (expected internal1, internal2, external, or assignment)"
        )
    })
}

pub(crate) fn parse_method(raw: &str) -> Result<AggregationMethod, String> {
    AggregationMethod::parse(raw).ok_or_else(|| {
        format!("unknown aggregation method '{raw}' (expected best, avg, or weighted)")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_parsers_accept_known_spellings() {
        assert_eq!(parse_exam_type("Internal_2"), Ok(ExamType::Internal2));
        assert_eq!(parse_method("average"), Ok(AggregationMethod::Average));
    }

    #[test]
    fn value_parsers_explain_rejections() {
        let err = parse_exam_type("quiz").expect_err("quiz is not an exam type");
        assert!(err.contains("'quiz'"));
        let err = parse_method("median").expect_err("median is not supported");
        assert!(err.contains("best, avg, or weighted"));
    }
}
