use std::sync::Arc;

use super::{
    AmbiguityChecker, AnswerSynthesizer, ChartAdvisor, DiagnosisGenerator, IntentClassifier,
    QueryExecutor, QueryGenerator, QueryReasoner, SchemaSelector,
};
use crate::error::{OrchestratorError, Result};

/// Collaborator handles shared read-only by every session.
///
/// Built once per process; cloning only bumps reference counts.
#[derive(Clone)]
pub struct CollaboratorRegistry {
    pub intent: Arc<dyn IntentClassifier>,
    pub ambiguity: Option<Arc<dyn AmbiguityChecker>>,
    pub schema: Arc<dyn SchemaSelector>,
    pub reasoner: Option<Arc<dyn QueryReasoner>>,
    pub query: Arc<dyn QueryGenerator>,
    pub executor: Arc<dyn QueryExecutor>,
    pub chart: Arc<dyn ChartAdvisor>,
    pub diagnosis: Arc<dyn DiagnosisGenerator>,
    pub answer: Arc<dyn AnswerSynthesizer>,
}

impl CollaboratorRegistry {
    pub fn builder() -> CollaboratorRegistryBuilder {
        CollaboratorRegistryBuilder::default()
    }

    /// Use one object for every text-generation role and a separate executor
    pub fn from_agents<A>(agents: Arc<A>, executor: Arc<dyn QueryExecutor>) -> Self
    where
        A: IntentClassifier
            + AmbiguityChecker
            + SchemaSelector
            + QueryReasoner
            + QueryGenerator
            + ChartAdvisor
            + DiagnosisGenerator
            + AnswerSynthesizer
            + 'static,
    {
        Self {
            intent: agents.clone(),
            ambiguity: Some(agents.clone()),
            schema: agents.clone(),
            reasoner: Some(agents.clone()),
            query: agents.clone(),
            executor,
            chart: agents.clone(),
            diagnosis: agents.clone(),
            answer: agents,
        }
    }
}

impl std::fmt::Debug for CollaboratorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollaboratorRegistry")
            .field("ambiguity", &self.ambiguity.is_some())
            .field("reasoner", &self.reasoner.is_some())
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
pub struct CollaboratorRegistryBuilder {
    intent: Option<Arc<dyn IntentClassifier>>,
    ambiguity: Option<Arc<dyn AmbiguityChecker>>,
    schema: Option<Arc<dyn SchemaSelector>>,
    reasoner: Option<Arc<dyn QueryReasoner>>,
    query: Option<Arc<dyn QueryGenerator>>,
    executor: Option<Arc<dyn QueryExecutor>>,
    chart: Option<Arc<dyn ChartAdvisor>>,
    diagnosis: Option<Arc<dyn DiagnosisGenerator>>,
    answer: Option<Arc<dyn AnswerSynthesizer>>,
}

impl CollaboratorRegistryBuilder {
    pub fn intent(mut self, classifier: Arc<dyn IntentClassifier>) -> Self {
        self.intent = Some(classifier);
        self
    }

    pub fn ambiguity(mut self, checker: Arc<dyn AmbiguityChecker>) -> Self {
        self.ambiguity = Some(checker);
        self
    }

    pub fn schema(mut self, selector: Arc<dyn SchemaSelector>) -> Self {
        self.schema = Some(selector);
        self
    }

    pub fn reasoner(mut self, reasoner: Arc<dyn QueryReasoner>) -> Self {
        self.reasoner = Some(reasoner);
        self
    }

    pub fn query(mut self, generator: Arc<dyn QueryGenerator>) -> Self {
        self.query = Some(generator);
        self
    }

    pub fn executor(mut self, executor: Arc<dyn QueryExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn chart(mut self, advisor: Arc<dyn ChartAdvisor>) -> Self {
        self.chart = Some(advisor);
        self
    }

    pub fn diagnosis(mut self, generator: Arc<dyn DiagnosisGenerator>) -> Self {
        self.diagnosis = Some(generator);
        self
    }

    pub fn answer(mut self, synthesizer: Arc<dyn AnswerSynthesizer>) -> Self {
        self.answer = Some(synthesizer);
        self
    }

    /// Fails if any collaborator of the main path is missing.
    /// The ambiguity checker and reasoner are optional.
    pub fn build(self) -> Result<CollaboratorRegistry> {
        Ok(CollaboratorRegistry {
            intent: self
                .intent
                .ok_or(OrchestratorError::MissingCollaborator("intent"))?,
            ambiguity: self.ambiguity,
            schema: self
                .schema
                .ok_or(OrchestratorError::MissingCollaborator("schema"))?,
            reasoner: self.reasoner,
            query: self
                .query
                .ok_or(OrchestratorError::MissingCollaborator("query"))?,
            executor: self
                .executor
                .ok_or(OrchestratorError::MissingCollaborator("executor"))?,
            chart: self
                .chart
                .ok_or(OrchestratorError::MissingCollaborator("chart"))?,
            diagnosis: self
                .diagnosis
                .ok_or(OrchestratorError::MissingCollaborator("diagnosis"))?,
            answer: self
                .answer
                .ok_or(OrchestratorError::MissingCollaborator("answer"))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_reports_first_missing_collaborator() {
        let err = CollaboratorRegistry::builder().build().unwrap_err();
        assert!(matches!(err, OrchestratorError::MissingCollaborator("intent")));
    }
}
