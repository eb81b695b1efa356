use super::*;
use crate::metrics::{set_resolve_metrics, ResolveMetrics};
use profile::{FieldRule, FieldRuleKind, MemoryProfileStore};
use search::{FieldKind, MemoryBackend};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn person_profile() -> SimilarityProfile {
    SimilarityProfile::new()
        .with_rule(FieldRule::new("firstName", FieldRuleKind::text()))
        .with_rule(FieldRule::new("lastName", FieldRuleKind::text()).with_boost(2.0))
        .with_rule(FieldRule::new("ssn", FieldRuleKind::Keyword).with_boost(3.0))
}

fn person(id: &str, first: &str, last: &str, ssn: &str) -> Document {
    Document::new()
        .with("id", id)
        .with("entityType", "Person")
        .with("firstName", first)
        .with("lastName", last)
        .with("ssn", ssn)
}

fn person_mappings() -> HashMap<String, FieldKind> {
    HashMap::from([
        ("firstName".to_string(), FieldKind::Text),
        ("lastName".to_string(), FieldKind::Text),
        ("ssn".to_string(), FieldKind::Keyword),
    ])
}

/// Three persisted people: `a` and `b` are close namesakes, `c` is not.
fn seed(backend: &MemoryBackend) {
    backend.create_index("entities", person_mappings()).unwrap();
    backend
        .bulk_index(
            "entities",
            &[
                person("a", "John", "Smith", "111-22-3333"),
                person("b", "Jon", "Smith", "999-88-7777"),
                person("c", "Mary", "Jones", "444-55-6666"),
            ],
        )
        .unwrap();
}

fn stack() -> (Resolver, Arc<MemoryBackend>, Arc<ProfileRegistry>) {
    let backend = Arc::new(MemoryBackend::new());
    seed(&backend);
    let registry = Arc::new(ProfileRegistry::new(Arc::new(MemoryProfileStore::new())));
    registry.put("Person", person_profile()).unwrap();
    let resolver = Resolver::new(backend.clone(), registry.clone(), ResolverConfig::new());
    (resolver, backend, registry)
}

fn marked_count(backend: &MemoryBackend, index: &str) -> usize {
    backend
        .documents(index)
        .unwrap()
        .iter()
        .filter(|doc| doc.batch_marker().is_some())
        .count()
}

#[test]
fn duplicate_resolves_at_full_score() {
    let (resolver, _, _) = stack();
    let probe = person("probe", "Jon", "Smith", "999-88-7777");

    let resolution = resolver.resolve(&probe, &ResolveOptions::new()).unwrap();
    assert_eq!(resolution.id, "probe");
    assert_eq!(resolution.hits[0].id, "b");
    assert!((resolution.hits[0].score - 1.0).abs() < 1e-6);
}

#[test]
fn near_duplicate_scores_strictly_between_zero_and_one() {
    let (resolver, _, _) = stack();
    // Jon Smith against the persisted John Smith.
    let probe = person("probe", "Jon", "Smith", "999-88-7777");

    let resolution = resolver.resolve(&probe, &ResolveOptions::new()).unwrap();
    let near = resolution.hits.iter().find(|hit| hit.id == "a").unwrap();
    assert!(near.score > 0.0);
    assert!(near.score < 1.0);
}

#[test]
fn mismatched_ssn_still_matches_on_the_other_clauses() {
    let (resolver, _, _) = stack();
    let probe = person("probe", "John", "Smith", "000-00-0000");

    let resolution = resolver.resolve(&probe, &ResolveOptions::new()).unwrap();
    let ids: Vec<&str> = resolution.hits.iter().map(|hit| hit.id.as_str()).collect();
    // The name clauses carry it; best first.
    assert_eq!(ids, vec!["a", "b"]);
    assert!(resolution.hits[0].score < 1.0);
}

#[test]
fn input_never_matches_itself() {
    let (resolver, _, _) = stack();
    let probe = person("probe", "Jon", "Smith", "999-88-7777");

    let resolution = resolver.resolve(&probe, &ResolveOptions::new()).unwrap();
    assert!(!resolution.hits.is_empty());
    for hit in &resolution.hits {
        assert_ne!(hit.id, "probe");
        assert!(["a", "b", "c"].contains(&hit.id.as_str()));
    }
}

#[test]
fn min_score_floors_the_hit_list() {
    let (resolver, _, _) = stack();
    let probe = person("probe", "Jon", "Smith", "999-88-7777");

    let resolution = resolver
        .resolve(&probe, &ResolveOptions::new().with_min_score(0.5))
        .unwrap();
    let ids: Vec<&str> = resolution.hits.iter().map(|hit| hit.id.as_str()).collect();
    // `a` normalizes below 0.5 against this probe and drops out.
    assert_eq!(ids, vec!["b"]);
}

#[test]
fn max_results_caps_the_hit_list() {
    let (resolver, _, _) = stack();
    let probe = person("probe", "John", "Smith", "000-00-0000");

    let resolution = resolver
        .resolve(&probe, &ResolveOptions::new().with_max_results(1))
        .unwrap();
    assert_eq!(resolution.hits.len(), 1);
    assert_eq!(resolution.hits[0].id, "a");
}

#[test]
fn resolve_leaves_no_staged_documents() {
    let (resolver, backend, _) = stack();
    let probe = person("probe", "Jon", "Smith", "999-88-7777");

    resolver.resolve(&probe, &ResolveOptions::new()).unwrap();
    assert_eq!(backend.doc_count("entities").unwrap(), 3);
    assert_eq!(marked_count(&backend, "entities"), 0);
}

#[test]
fn batch_residue_is_swept_at_the_threshold() {
    let backend = Arc::new(MemoryBackend::new());
    seed(&backend);
    let registry = Arc::new(ProfileRegistry::new(Arc::new(MemoryProfileStore::new())));
    registry.put("Person", person_profile()).unwrap();
    let resolver = Resolver::new(
        backend.clone(),
        registry,
        ResolverConfig::new().with_sweep_threshold(2),
    );

    // Two staged documents, but the narrow delete removes only one.
    let batch = [
        person("z1", "Zara", "Qwerty", "000-11-2222"),
        person("z2", "Zara", "Qwerty", "000-11-2222"),
    ];
    resolver.resolve_all(&batch, &ResolveOptions::new()).unwrap();
    assert_eq!(backend.doc_count("entities").unwrap(), 4);
    assert_eq!(marked_count(&backend, "entities"), 1);

    // The second call hits the threshold and sweeps everything marked.
    let probe = person("z3", "Zara", "Qwerty", "000-11-2222");
    resolver.resolve(&probe, &ResolveOptions::new()).unwrap();
    assert_eq!(backend.doc_count("entities").unwrap(), 3);
    assert_eq!(marked_count(&backend, "entities"), 0);
}

#[test]
fn siblings_are_hidden_unless_within_input() {
    let batch = [
        person("z1", "Zara", "Qwerty", "000-11-2222"),
        person("z2", "Zara", "Qwerty", "000-11-2222"),
    ];

    // Fresh stacks per half: the first call leaves one marked leftover
    // behind, which would otherwise surface as a hit in the second.
    let (resolver, _, _) = stack();
    let resolutions = resolver
        .resolve_all(&batch, &ResolveOptions::new())
        .unwrap();
    assert!(resolutions.iter().all(|r| r.hits.is_empty()));

    let (resolver, _, _) = stack();
    let resolutions = resolver
        .resolve_all(&batch, &ResolveOptions::new().with_within_input(true))
        .unwrap();
    assert_eq!(resolutions[0].hits.len(), 1);
    assert_eq!(resolutions[0].hits[0].id, "z2");
    assert_eq!(resolutions[1].hits[0].id, "z1");
}

#[test]
fn sibling_hits_come_back_with_their_outside_identity() {
    let (resolver, _, _) = stack();
    let batch = [
        person("z1", "Zara", "Qwerty", "000-11-2222"),
        person("z2", "Zara", "Qwerty", "000-11-2222"),
    ];

    let resolutions = resolver
        .resolve_all(&batch, &ResolveOptions::new().with_within_input(true))
        .unwrap();
    let sibling = &resolutions[0].hits[0];
    assert_eq!(sibling.document.id(), Some("z2"));
    assert_eq!(sibling.document.batch_marker(), None);
    assert_eq!(sibling.document.original_id(), None);
    assert!((sibling.score - 1.0).abs() < 1e-6);
}

#[test]
fn unregistered_type_falls_back_to_generic_matching() {
    let (resolver, backend, _) = stack();
    backend
        .bulk_index(
            "entities",
            &[Document::new()
                .with("id", "r1")
                .with("entityType", "Robot")
                .with("designation", "Optimus")],
        )
        .unwrap();

    let probe = Document::new()
        .with("id", "probe")
        .with("entityType", "Robot")
        .with("designation", "Optimus");
    let resolution = resolver.resolve(&probe, &ResolveOptions::new()).unwrap();
    assert_eq!(resolution.hits[0].id, "r1");
}

#[test]
fn profile_bound_index_wins_over_the_default() {
    let (resolver, backend, registry) = stack();
    registry
        .put(
            "Company",
            SimilarityProfile::new()
                .with_index("companies")
                .with_rule(FieldRule::new("name", FieldRuleKind::text())),
        )
        .unwrap();
    backend
        .bulk_index(
            "companies",
            &[Document::new()
                .with("id", "acme")
                .with("entityType", "Company")
                .with("name", "Acme Corporation")],
        )
        .unwrap();

    let probe = Document::new()
        .with("id", "probe")
        .with("entityType", "Company")
        .with("name", "Acme Corporation");
    let resolution = resolver.resolve(&probe, &ResolveOptions::new()).unwrap();
    assert_eq!(resolution.hits[0].id, "acme");
    // The person index never saw the staging traffic.
    assert_eq!(backend.doc_count("entities").unwrap(), 3);
    assert_eq!(backend.doc_count("companies").unwrap(), 1);
}

#[test]
fn override_profile_replaces_the_registered_one() {
    let (resolver, _, _) = stack();
    // Only the ssn matters under this override.
    let options = ResolveOptions::new().with_override(
        SimilarityProfile::new().with_rule(FieldRule::new("ssn", FieldRuleKind::Keyword)),
    );

    let probe = person("probe", "Totally", "Different", "999-88-7777");
    let resolution = resolver.resolve(&probe, &options).unwrap();
    let ids: Vec<&str> = resolution.hits.iter().map(|hit| hit.id.as_str()).collect();
    assert_eq!(ids, vec!["b"]);
}

#[test]
fn override_bound_index_wins_over_everything() {
    let (resolver, backend, _) = stack();
    backend
        .create_index(
            "special",
            HashMap::from([("lastName".to_string(), FieldKind::Text)]),
        )
        .unwrap();
    backend
        .bulk_index(
            "special",
            &[person("s1", "Ned", "Flanders", "555-66-7777")],
        )
        .unwrap();

    let options = ResolveOptions::new().with_override(
        SimilarityProfile::new()
            .with_index("special")
            .with_rule(FieldRule::new("lastName", FieldRuleKind::text())),
    );
    let probe = person("probe", "Maude", "Flanders", "555-66-8888");
    let resolution = resolver.resolve(&probe, &options).unwrap();
    assert_eq!(resolution.hits[0].id, "s1");
    assert_eq!(backend.doc_count("entities").unwrap(), 3);
}

#[test]
fn invalid_override_is_rejected_before_staging() {
    let (resolver, backend, _) = stack();
    let options = ResolveOptions::new().with_override(
        SimilarityProfile::new().with_rule(FieldRule::new("nickname", FieldRuleKind::text())),
    );

    let probe = person("probe", "Jon", "Smith", "999-88-7777");
    let err = resolver.resolve(&probe, &options).unwrap_err();
    assert!(matches!(
        err,
        ResolveError::InvalidOverride { field, .. } if field == "nickname"
    ));
    // Nothing was staged, so nothing is left to clean up.
    assert_eq!(backend.doc_count("entities").unwrap(), 3);
    assert_eq!(marked_count(&backend, "entities"), 0);
}

#[test]
fn mistyped_override_rule_is_rejected() {
    let (resolver, _, _) = stack();
    // ssn is mapped keyword, the rule claims text.
    let options = ResolveOptions::new().with_override(
        SimilarityProfile::new().with_rule(FieldRule::new("ssn", FieldRuleKind::text())),
    );

    let probe = person("probe", "Jon", "Smith", "999-88-7777");
    let err = resolver.resolve(&probe, &options).unwrap_err();
    assert!(matches!(
        err,
        ResolveError::InvalidOverride { field, expected } if field == "ssn" && expected == "text"
    ));
}

#[test]
fn unresolvable_document_is_a_hard_error() {
    let (resolver, backend, _) = stack();
    // Reserved properties only, so the profile finds nothing to score.
    let probe = Document::new().with("id", "probe").with("entityType", "Person");

    let err = resolver.resolve(&probe, &ResolveOptions::new()).unwrap_err();
    assert!(matches!(err, ResolveError::NoQuery { id } if id == "probe"));
    // Cleanup still ran after the failed call.
    assert_eq!(backend.doc_count("entities").unwrap(), 3);
    assert_eq!(marked_count(&backend, "entities"), 0);
}

#[test]
fn caller_documents_are_never_mutated() {
    let (resolver, _, _) = stack();
    let probe = person("probe", "Jon", "Smith", "999-88-7777");
    let pristine = probe.clone();

    resolver.resolve(&probe, &ResolveOptions::new()).unwrap();
    assert_eq!(probe, pristine);
}

#[test]
fn empty_batch_is_a_no_op() {
    let (resolver, backend, _) = stack();
    let resolutions = resolver.resolve_all(&[], &ResolveOptions::new()).unwrap();
    assert!(resolutions.is_empty());
    assert_eq!(backend.doc_count("entities").unwrap(), 3);
}

#[test]
fn invalid_options_are_rejected_up_front() {
    let (resolver, backend, _) = stack();
    let probe = person("probe", "Jon", "Smith", "999-88-7777");

    let err = resolver
        .resolve(&probe, &ResolveOptions::new().with_max_results(0))
        .unwrap_err();
    assert!(matches!(err, ResolveError::InvalidRequest(_)));

    let err = resolver
        .resolve(&probe, &ResolveOptions::new().with_min_score(-1.0))
        .unwrap_err();
    assert!(matches!(err, ResolveError::InvalidRequest(_)));

    assert_eq!(backend.doc_count("entities").unwrap(), 3);
}

/// Counts calls only; the slot is process-global, so other tests feed
/// it too once installed.
#[derive(Default)]
struct CountingMetrics {
    resolves: AtomicUsize,
    cleanups: AtomicUsize,
    last_latency: std::sync::Mutex<Option<Duration>>,
}

impl ResolveMetrics for CountingMetrics {
    fn record_resolve(
        &self,
        _entity_type: Option<&str>,
        latency: Duration,
        _documents: usize,
        _hits: usize,
    ) {
        self.resolves.fetch_add(1, Ordering::SeqCst);
        *self.last_latency.lock().unwrap() = Some(latency);
    }

    fn record_cleanup(&self, _swept: bool, _deleted: u64) {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn installed_metrics_observe_resolution_calls() {
    let recorder = Arc::new(CountingMetrics::default());
    set_resolve_metrics(recorder.clone());

    let (resolver, _, _) = stack();
    let probe = person("probe", "Jon", "Smith", "999-88-7777");
    resolver.resolve(&probe, &ResolveOptions::new()).unwrap();

    assert!(recorder.resolves.load(Ordering::SeqCst) >= 1);
    assert!(recorder.cleanups.load(Ordering::SeqCst) >= 1);
    assert!(recorder.last_latency.lock().unwrap().is_some());
}
