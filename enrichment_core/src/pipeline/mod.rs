//! Multi-stage agent pipeline.
//!
//! A pipeline is a fixed list of stages, each holding agents that may depend
//! on one another by name. A run works as follows:
//!
//! 1. Build the retrieved context once, from the input content and the
//!    entities being enriched.
//! 2. For each stage in declared order, sort its agents so dependencies run
//!    first. Agents on a dependency cycle are skipped and reported.
//! 3. Run the sorted agents one after another. Each sees the items of earlier
//!    stages, never those of its own stage. A failing agent is logged and its
//!    contribution dropped; the rest of the stage still runs.
//! 4. Tag every item with its agent's name, then stamp final positions and
//!    the job id.
//!
//! The run itself never fails.

mod topology;

pub use topology::*;

use async_trait::async_trait;
use campaign_model::{CampaignId, ContentAnalysisItem, Entity, JobId, Relationship};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::context_builder::{ContextBuilder, RetrievedContext};
use crate::error::Result;
use crate::retrieval::{EntityStore, StoreError};

/// Problems with a pipeline's declared agent graph, found at construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineConfigError {
    #[error("agent name {0:?} is used more than once")]
    DuplicateAgent(String),

    #[error("agent {agent:?} in stage {stage:?} depends on {dependency:?}, which no earlier or same-stage agent provides")]
    UnresolvedDependency {
        stage: String,
        agent: String,
        dependency: String,
    },
}

/// Everything an agent can see while it runs.
pub struct AgentContext<'a> {
    pub input: &'a PipelineInput,
    /// Shared for the whole run.
    pub retrieved: &'a RetrievedContext,
    /// Items produced by earlier stages, in output order.
    pub prior_items: &'a [ContentAnalysisItem],
    pub cancel: &'a CancellationToken,
}

/// A unit of work inside a stage.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Unique name across the pipeline. Stamped on every item the agent emits.
    fn name(&self) -> &str;

    /// Names of agents that must run before this one.
    fn dependencies(&self) -> &[String] {
        &[]
    }

    async fn run(&self, ctx: &AgentContext<'_>) -> Result<Vec<ContentAnalysisItem>>;
}

/// A named group of agents.
#[derive(Clone)]
pub struct Stage {
    pub name: String,
    pub agents: Vec<Arc<dyn Agent>>,
}

impl Stage {
    /// Create an empty stage.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            agents: Vec::new(),
        }
    }

    pub fn with_agent(mut self, agent: Arc<dyn Agent>) -> Self {
        self.agents.push(agent);
        self
    }
}

/// An entity to enrich, with the relationships it already has.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentTarget {
    pub entity: Entity,
    pub relationships: Vec<Relationship>,
}

/// The content a run analyses and the entities it concerns.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineInput {
    pub job_id: JobId,
    pub campaign_id: CampaignId,
    pub content: String,
    /// Game-system schema to load into the retrieved context.
    pub schema_code: Option<String>,
    /// Entities mentioned in the content, in input order.
    pub targets: Vec<EnrichmentTarget>,
    /// Every entity the campaign already tracks.
    pub known_entities: Vec<Entity>,
}

impl PipelineInput {
    /// Create an input with no targets and no known entities.
    pub fn new(job_id: JobId, campaign_id: CampaignId, content: impl Into<String>) -> Self {
        Self {
            job_id,
            campaign_id,
            content: content.into(),
            schema_code: None,
            targets: Vec::new(),
            known_entities: Vec::new(),
        }
    }

    pub fn with_schema_code(mut self, code: impl Into<String>) -> Self {
        self.schema_code = Some(code.into());
        self
    }

    pub fn with_target(mut self, entity: Entity, relationships: Vec<Relationship>) -> Self {
        self.targets.push(EnrichmentTarget { entity, relationships });
        self
    }

    pub fn with_known_entities(mut self, entities: Vec<Entity>) -> Self {
        self.known_entities = entities;
        self
    }

    /// The target entities, without their relationships.
    pub fn target_entities(&self) -> Vec<Entity> {
        self.targets.iter().map(|t| t.entity.clone()).collect()
    }

    /// Assemble an input from the entity store.
    ///
    /// Every campaign entity becomes a known entity; those whose name appears
    /// in `content` become targets, each with its stored relationships.
    pub async fn load(
        store: &dyn EntityStore,
        job_id: JobId,
        campaign_id: CampaignId,
        content: impl Into<String>,
    ) -> std::result::Result<Self, StoreError> {
        let mut input = Self::new(job_id, campaign_id, content);
        let entities = store.list_entities(campaign_id).await?;

        for entity in &entities {
            if !entity.is_mentioned_in(&input.content) {
                continue;
            }
            let relationships = store.get_relationships(entity.id).await?;
            input.targets.push(EnrichmentTarget {
                entity: entity.clone(),
                relationships,
            });
        }

        debug!(
            %campaign_id,
            known = entities.len(),
            targets = input.targets.len(),
            "pipeline input loaded"
        );
        input.known_entities = entities;
        Ok(input)
    }
}

/// Outcome of a run, including which agents did not contribute.
#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    pub items: Vec<ContentAnalysisItem>,
    /// Agents left out because they sit on a dependency cycle.
    pub skipped: Vec<String>,
    /// Agents that returned an error.
    pub failed: Vec<String>,
}

/// Runs stages of agents over one piece of content.
pub struct Pipeline {
    stages: Vec<Stage>,
    context_builder: ContextBuilder,
}

impl Pipeline {
    /// Create a pipeline, validating the declared agent graph.
    ///
    /// Agent names must be unique, and every dependency must name an agent of
    /// the same or an earlier stage. Dependency cycles within a stage pass
    /// validation with a warning; those agents are skipped at run time.
    pub fn new(stages: Vec<Stage>) -> std::result::Result<Self, PipelineConfigError> {
        validate(&stages)?;
        Ok(Self {
            stages,
            context_builder: ContextBuilder::disabled(),
        })
    }

    pub fn with_context_builder(mut self, context_builder: ContextBuilder) -> Self {
        self.context_builder = context_builder;
        self
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Run every stage and return the combined items.
    pub async fn run(&self, input: &PipelineInput, cancel: &CancellationToken) -> Vec<ContentAnalysisItem> {
        self.run_with_report(input, cancel).await.items
    }

    /// Run every stage, reporting skipped and failed agents alongside the items.
    pub async fn run_with_report(&self, input: &PipelineInput, cancel: &CancellationToken) -> PipelineReport {
        let mut report = PipelineReport::default();

        // Step 1: Shared context
        let entities = input.target_entities();
        let retrieved = self
            .context_builder
            .build_context(
                input.campaign_id,
                &input.content,
                input.schema_code.as_deref(),
                &entities,
                cancel,
            )
            .await;

        let mut items: Vec<ContentAnalysisItem> = Vec::new();
        for stage in &self.stages {
            if cancel.is_cancelled() {
                debug!(stage = %stage.name, "run cancelled, remaining stages skipped");
                break;
            }

            debug!(stage = %stage.name, agents = stage.agents.len(), "stage started");

            // Step 2: Order the stage
            let sorted = topological_order(stage.agents.iter().map(|a| (a.name(), a.dependencies())));
            for &i in &sorted.cyclic {
                let name = stage.agents[i].name();
                warn!(stage = %stage.name, agent = %name, "agent is on a dependency cycle, skipping");
                report.skipped.push(name.to_string());
            }

            // Step 3: Run it against the items of earlier stages
            let mut stage_items = Vec::new();
            for &i in &sorted.order {
                let agent = &stage.agents[i];
                if cancel.is_cancelled() {
                    break;
                }
                let ctx = AgentContext {
                    input,
                    retrieved: &retrieved,
                    prior_items: &items,
                    cancel,
                };
                match agent.run(&ctx).await {
                    Ok(mut produced) => {
                        debug!(stage = %stage.name, agent = %agent.name(), items = produced.len(), "agent finished");
                        for item in &mut produced {
                            item.agent_name = agent.name().to_string();
                        }
                        stage_items.extend(produced);
                    }
                    Err(e) => {
                        warn!(stage = %stage.name, agent = %agent.name(), error = %e, "agent failed");
                        report.failed.push(agent.name().to_string());
                    }
                }
            }
            items.extend(stage_items);
        }

        // Step 4: Identity
        for (position, item) in items.iter_mut().enumerate() {
            item.position = position;
            item.job_id = input.job_id;
        }

        info!(
            job_id = %input.job_id,
            items = items.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "pipeline run complete"
        );
        report.items = items;
        report
    }
}

fn validate(stages: &[Stage]) -> std::result::Result<(), PipelineConfigError> {
    let mut declared: HashSet<&str> = HashSet::new();

    for stage in stages {
        for agent in &stage.agents {
            if !declared.insert(agent.name()) {
                return Err(PipelineConfigError::DuplicateAgent(agent.name().to_string()));
            }
        }
        for agent in &stage.agents {
            if let Some(dependency) = agent.dependencies().iter().find(|d| !declared.contains(d.as_str())) {
                return Err(PipelineConfigError::UnresolvedDependency {
                    stage: stage.name.clone(),
                    agent: agent.name().to_string(),
                    dependency: dependency.clone(),
                });
            }
        }

        let sorted = topological_order(stage.agents.iter().map(|a| (a.name(), a.dependencies())));
        for &i in &sorted.cyclic {
            warn!(stage = %stage.name, agent = %stage.agents[i].name(), "dependency cycle, agent will be skipped");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetrievalConfig;
    use crate::error::EnrichmentError;
    use crate::llm::LlmError;
    use crate::retrieval::testing::{result, FakeRetrieval, FakeStore};
    use crate::retrieval::NoSchema;
    use campaign_model::{DetectionType, EntityType};
    use std::sync::Mutex;

    /// What an agent saw when it ran.
    #[derive(Debug, Clone, PartialEq)]
    struct Observed {
        prior_items: Vec<String>,
        retrieved: usize,
    }

    struct StubAgent {
        name: String,
        dependencies: Vec<String>,
        emits: Vec<String>,
        fails: bool,
        observed: Mutex<Vec<Observed>>,
    }

    impl StubAgent {
        fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                dependencies: Vec::new(),
                emits: Vec::new(),
                fails: false,
                observed: Mutex::new(Vec::new()),
            }
        }

        fn after(mut self, dependency: &str) -> Self {
            self.dependencies.push(dependency.to_string());
            self
        }

        fn emitting(mut self, texts: &[&str]) -> Self {
            self.emits = texts.iter().map(|t| t.to_string()).collect();
            self
        }

        fn failing(mut self) -> Self {
            self.fails = true;
            self
        }

        fn observed(&self) -> Vec<Observed> {
            self.observed.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Agent for StubAgent {
        fn name(&self) -> &str {
            &self.name
        }

        fn dependencies(&self) -> &[String] {
            &self.dependencies
        }

        async fn run(&self, ctx: &AgentContext<'_>) -> Result<Vec<ContentAnalysisItem>> {
            self.observed.lock().unwrap().push(Observed {
                prior_items: ctx.prior_items.iter().map(|i| i.matched_text.clone()).collect(),
                retrieved: ctx.retrieved.results.len(),
            });
            if self.fails {
                return Err(EnrichmentError::Llm(LlmError::Request("model offline".to_string())));
            }
            Ok(self
                .emits
                .iter()
                .map(|t| ContentAnalysisItem::detection(DetectionType::UntaggedMention, t.as_str(), None))
                .collect())
        }
    }

    fn input() -> PipelineInput {
        PipelineInput::new(JobId::new(), CampaignId::new(), "Kael rode north with Mira.")
    }

    fn texts(items: &[ContentAnalysisItem]) -> Vec<&str> {
        items.iter().map(|i| i.matched_text.as_str()).collect()
    }

    #[tokio::test]
    async fn test_failed_agent_is_isolated() {
        let extract = Arc::new(StubAgent::new("extract").failing());
        let score = Arc::new(StubAgent::new("score").emitting(&["a", "b"]));
        let pipeline = Pipeline::new(vec![
            Stage::new("identify").with_agent(extract),
            Stage::new("enrich").with_agent(score),
            Stage::new("review"),
        ])
        .unwrap();
        let input = input();

        let report = pipeline.run_with_report(&input, &CancellationToken::new()).await;

        assert_eq!(texts(&report.items), vec!["a", "b"]);
        assert!(report.items.iter().all(|i| i.agent_name == "score"));
        assert!(report.items.iter().all(|i| i.job_id == input.job_id));
        assert_eq!(report.items.iter().map(|i| i.position).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(report.failed, vec!["extract"]);
        assert!(report.skipped.is_empty());
    }

    #[tokio::test]
    async fn test_later_agents_in_stage_run_after_failure() {
        let first = Arc::new(StubAgent::new("first").failing());
        let second = Arc::new(StubAgent::new("second").emitting(&["kept"]));
        let pipeline = Pipeline::new(vec![Stage::new("only").with_agent(first).with_agent(second)]).unwrap();

        let items = pipeline.run(&input(), &CancellationToken::new()).await;

        assert_eq!(texts(&items), vec!["kept"]);
    }

    #[tokio::test]
    async fn test_prior_items_come_from_earlier_stages_only() {
        let a = Arc::new(StubAgent::new("a").emitting(&["from_a"]));
        let b = Arc::new(StubAgent::new("b").after("a").emitting(&["from_b"]));
        let c = Arc::new(StubAgent::new("c").emitting(&["from_c"]));
        let pipeline = Pipeline::new(vec![
            Stage::new("one").with_agent(a.clone()).with_agent(b.clone()),
            Stage::new("two").with_agent(c.clone()),
        ])
        .unwrap();

        let items = pipeline.run(&input(), &CancellationToken::new()).await;

        assert_eq!(texts(&items), vec!["from_a", "from_b", "from_c"]);
        assert!(a.observed()[0].prior_items.is_empty());
        assert!(b.observed()[0].prior_items.is_empty());
        assert_eq!(c.observed()[0].prior_items, vec!["from_a", "from_b"]);
    }

    #[tokio::test]
    async fn test_dependencies_reorder_agents() {
        let summary = Arc::new(StubAgent::new("summary").after("facts").emitting(&["s"]));
        let facts = Arc::new(StubAgent::new("facts").emitting(&["f1", "f2"]));
        let pipeline = Pipeline::new(vec![Stage::new("one").with_agent(summary).with_agent(facts)]).unwrap();

        let items = pipeline.run(&input(), &CancellationToken::new()).await;

        assert_eq!(texts(&items), vec!["f1", "f2", "s"]);
        assert_eq!(items[2].agent_name, "summary");
        assert_eq!(items[2].position, 2);
    }

    #[tokio::test]
    async fn test_cyclic_agents_are_skipped_and_reported() {
        let x = Arc::new(StubAgent::new("x").after("y").emitting(&["x"]));
        let y = Arc::new(StubAgent::new("y").after("x").emitting(&["y"]));
        let z = Arc::new(StubAgent::new("z").emitting(&["z"]));
        let pipeline = Pipeline::new(vec![Stage::new("one").with_agent(x.clone()).with_agent(y).with_agent(z)]).unwrap();

        let report = pipeline.run_with_report(&input(), &CancellationToken::new()).await;

        assert_eq!(texts(&report.items), vec!["z"]);
        let mut skipped = report.skipped.clone();
        skipped.sort();
        assert_eq!(skipped, vec!["x", "y"]);
        assert!(x.observed().is_empty());
    }

    #[tokio::test]
    async fn test_context_is_built_once_and_shared() {
        let retrieval = FakeRetrieval {
            results: vec![(
                "Kael".to_string(),
                vec![result("sessions", "1", "Kael swore an oath.", 0.9)],
            )],
            ..FakeRetrieval::available()
        };
        let retrieval = Arc::new(retrieval);
        let builder = ContextBuilder::new(retrieval.clone(), Arc::new(NoSchema), RetrievalConfig::default());
        let first = Arc::new(StubAgent::new("first"));
        let second = Arc::new(StubAgent::new("second"));
        let pipeline = Pipeline::new(vec![Stage::new("one").with_agent(first.clone()), Stage::new("two").with_agent(second.clone())])
            .unwrap()
            .with_context_builder(builder);

        let campaign = CampaignId::new();
        let input = PipelineInput::new(JobId::new(), campaign, "Kael rode north.")
            .with_target(Entity::new(campaign, "Kael", EntityType::Character), Vec::new());
        let queries_before = retrieval.seen_queries().len();

        pipeline.run(&input, &CancellationToken::new()).await;

        assert_eq!(first.observed()[0].retrieved, 1);
        assert_eq!(second.observed()[0].retrieved, 1);
        let queries = retrieval.seen_queries().len() - queries_before;
        assert!(queries > 0);

        pipeline.run(&input, &CancellationToken::new()).await;
        assert_eq!(retrieval.seen_queries().len() - queries_before, queries * 2);
    }

    #[tokio::test]
    async fn test_cancelled_run_returns_no_items() {
        let agent = Arc::new(StubAgent::new("a").emitting(&["x"]));
        let pipeline = Pipeline::new(vec![Stage::new("one").with_agent(agent.clone())]).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let items = pipeline.run(&input(), &cancel).await;

        assert!(items.is_empty());
        assert!(agent.observed().is_empty());
    }

    #[test]
    fn test_duplicate_agent_names_rejected() {
        let err = Pipeline::new(vec![
            Stage::new("one").with_agent(Arc::new(StubAgent::new("dup"))),
            Stage::new("two").with_agent(Arc::new(StubAgent::new("dup"))),
        ])
        .err()
        .unwrap();

        assert_eq!(err, PipelineConfigError::DuplicateAgent("dup".to_string()));
    }

    #[test]
    fn test_dependency_on_later_stage_rejected() {
        let err = Pipeline::new(vec![
            Stage::new("one").with_agent(Arc::new(StubAgent::new("early").after("late"))),
            Stage::new("two").with_agent(Arc::new(StubAgent::new("late"))),
        ])
        .err()
        .unwrap();

        assert_eq!(
            err,
            PipelineConfigError::UnresolvedDependency {
                stage: "one".to_string(),
                agent: "early".to_string(),
                dependency: "late".to_string(),
            }
        );
    }

    #[test]
    fn test_valid_graphs_accepted() {
        let pipeline = Pipeline::new(vec![
            Stage::new("one").with_agent(Arc::new(StubAgent::new("early"))),
            Stage::new("two")
                .with_agent(Arc::new(StubAgent::new("late").after("early")))
                .with_agent(Arc::new(StubAgent::new("x").after("y")))
                .with_agent(Arc::new(StubAgent::new("y").after("x"))),
        ]);

        assert!(pipeline.is_ok());
        assert_eq!(pipeline.unwrap().stages().len(), 2);
    }

    #[tokio::test]
    async fn test_load_input_from_store() {
        let campaign = CampaignId::new();
        let kael = Entity::new(campaign, "Kael", EntityType::Character);
        let mira = Entity::new(campaign, "Mira", EntityType::Character);
        let vex = Entity::new(campaign, "Vex", EntityType::Creature);
        let outsider = Entity::new(CampaignId::new(), "Kael", EntityType::Character);
        let store = FakeStore {
            entities: vec![kael.clone(), mira.clone(), vex.clone(), outsider],
            relationships: vec![
                Relationship::new((kael.id, "Kael"), (vex.id, "Vex"), "hunts"),
                Relationship::new((vex.id, "Vex"), (mira.id, "Mira"), "fears"),
            ],
        };

        let input = PipelineInput::load(&store, JobId::new(), campaign, "kael and MIRA made camp.")
            .await
            .unwrap();

        let targets: Vec<&str> = input.targets.iter().map(|t| t.entity.name.as_str()).collect();
        assert_eq!(targets, vec!["Kael", "Mira"]);
        assert_eq!(input.targets[0].relationships.len(), 1);
        assert_eq!(input.targets[0].relationships[0].relationship_type, "hunts");
        assert_eq!(input.targets[1].relationships[0].relationship_type, "fears");
        assert_eq!(input.known_entities.len(), 3);
        assert!(input.schema_code.is_none());
    }
}
