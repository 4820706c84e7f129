use std::sync::Arc;

use super::attainment::{AttainmentCalculator, AttainmentSettings};
use super::clock::Clock;
use super::exams::ExamService;
use super::marks::{MarksPolicy, MarksService};
use super::repository::{AcademicStore, AuditSink};

/// The exam, marks, and attainment services sharing one store and clock.
pub struct AcademicServices<S, A> {
    pub exams: ExamService<S>,
    pub marks: MarksService<S, A>,
    pub attainment: AttainmentCalculator<S>,
}

impl<S, A> AcademicServices<S, A>
where
    S: AcademicStore + 'static,
    A: AuditSink + 'static,
{
    pub fn new(
        store: Arc<S>,
        audit: Arc<A>,
        clock: Arc<dyn Clock>,
        policy: MarksPolicy,
        settings: AttainmentSettings,
    ) -> Self {
        Self {
            exams: ExamService::new(store.clone(), clock.clone()),
            marks: MarksService::new(store.clone(), audit, clock, policy),
            attainment: AttainmentCalculator::new(store, settings),
        }
    }
}
