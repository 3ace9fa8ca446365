//! Position resolver: list refs in a file and describe the ref under a byte offset.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::Error;
use crate::graph::{self, Graph};
use crate::remote::{DefGetOptions, DefinitionService, ExampleListOptions};
use crate::repo::Repository;
use crate::store::ArtifactStore;
use crate::types::{DefLocator, DescribedDef, Description, Example, Ref, ResolvedDescription, SourceUnit};
use crate::units;

/// Per-call options for `describe`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DescribeOptions {
    /// Skip the usage example fetch.
    pub suppress_examples: bool,
}

/// A ref under the cursor together with the unit it was found in.
struct FoundRef {
    /// The matching ref, unmodified.
    reference: Ref,
    /// Unit whose graph contained the ref.
    unit: SourceUnit,
}

/// Answers positional queries against one repository's built artifacts.
pub struct PositionResolver {
    /// Remote definition service, used when local resolution fails.
    client: Arc<dyn DefinitionService>,
    /// Page size for usage examples.
    examples_per_page: u32,
    /// Repository the queries are about.
    repo: Repository,
    /// Store holding the repository's artifacts.
    store: ArtifactStore,
}

impl PositionResolver {
    /// Resolver over `repo`'s artifacts in `store`.
    pub fn new(
        repo: Repository,
        store: ArtifactStore,
        client: Arc<dyn DefinitionService>,
        examples_per_page: u32,
    ) -> Self {
        return Self { client, examples_per_page, repo, store };
    }

    /// Candidate units for a repo-relative file, with a debug trace of the outcome.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the store cannot be read.
    fn candidate_units(&self, file: &str) -> Result<Vec<SourceUnit>, Error> {
        let units = units::units_containing(&self.store, &self.repo.commit_id, file)?;
        if units.is_empty() {
            debug!("file {file} is not in any source units");
        } else {
            let ids: Vec<String> = units.iter().map(SourceUnit::id).collect();
            debug!("file {file} is in {} source units {ids:?}", units.len());
        }
        return Ok(units);
    }

    /// Describe the ref covering `offset` in `file`: its def, resolved locally
    /// when possible and remotely otherwise, plus usage examples.
    ///
    /// Local store failures propagate. Remote failures only leave the
    /// corresponding field empty.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPath` if `file` is outside the repository,
    /// or `Error::Io` if the store cannot be read.
    pub async fn describe(&self, file: &Path, offset: u32, opts: DescribeOptions) -> Result<Description, Error> {
        let file = self.repo.relative_path(file)?;
        let units = self.candidate_units(&file)?;

        let Some(found) = self.find_ref_at(&units, &file, offset)? else {
            debug!("no ref found at {file}:{offset}");
            return Ok(Description::NoReference {});
        };

        let locator = self.target_locator(&found);
        let local = self.resolve_local(&locator);

        let def_task = async {
            if local.is_some() {
                return local;
            }
            return self.fetch_remote_def(&locator).await;
        };
        let examples_task = async {
            if opts.suppress_examples {
                return Vec::new();
            }
            return self.fetch_examples(&locator).await;
        };
        let (def, examples) = tokio::join!(def_task, examples_task);

        return Ok(Description::Resolved(ResolvedDescription { def, examples, locator }));
    }

    /// Fetch a usage example page. Failures are logged and yield no examples.
    async fn fetch_examples(&self, locator: &DefLocator) -> Vec<Example> {
        let opts = ExampleListOptions { formatted: true, per_page: self.examples_per_page };
        return match self.client.list_examples(locator, opts).await {
            Err(e) => {
                warn!("couldn't fetch examples for {locator}: {e}");
                Vec::new()
            },
            Ok(examples) => examples,
        };
    }

    /// Fetch the def from the remote service. Failures are logged and yield none.
    async fn fetch_remote_def(&self, locator: &DefLocator) -> Option<DescribedDef> {
        return match self.client.get_definition(locator, DefGetOptions { doc: true }).await {
            Err(e) => {
                warn!("couldn't fetch definition {locator}: {e}");
                None
            },
            Ok(def) => Some(def),
        };
    }

    /// First ref, across units in index order and refs in artifact order,
    /// that lies in `file` and covers `offset`. Units whose graph is missing
    /// or malformed are skipped.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if a graph cannot be read.
    fn find_ref_at(&self, units: &[SourceUnit], file: &str, offset: u32) -> Result<Option<FoundRef>, Error> {
        for unit in units {
            let Some(graph) = self.load_candidate(unit)? else {
                continue;
            };
            if let Some(reference) = graph.refs_in(file).find(|r| return r.covers(offset)) {
                return Ok(Some(FoundRef { reference: reference.clone(), unit: unit.clone() }));
            }
        }
        return Ok(None);
    }

    /// Every ref located in `file`, across all units containing it, in unit
    /// then artifact order. Units whose graph is missing or malformed are skipped.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPath` if `file` is outside the repository,
    /// or `Error::Io` if the store cannot be read.
    pub fn list_refs(&self, file: &Path) -> Result<Vec<Ref>, Error> {
        let file = self.repo.relative_path(file)?;
        let mut refs = Vec::new();

        for unit in &self.candidate_units(&file)? {
            let Some(graph) = self.load_candidate(unit)? else {
                continue;
            };
            refs.extend(graph.refs_in(&file).cloned());
        }

        return Ok(refs);
    }

    /// Load a candidate unit's graph, turning skippable failures into `None`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` for read failures other than a missing artifact.
    fn load_candidate(&self, unit: &SourceUnit) -> Result<Option<Graph>, Error> {
        return match graph::load_graph(&self.store, &self.repo.commit_id, unit) {
            Err(e) if e.is_skippable_unit_failure() => {
                warn!("skipping unit {}: {e}", unit.id());
                Ok(None)
            },
            Err(e) => Err(e),
            Ok(g) => Ok(Some(g)),
        };
    }

    /// Look the def up in this repository's own artifacts. Any failure,
    /// including a foreign repository, yields `None` so the caller can fall
    /// back to the remote service.
    fn resolve_local(&self, locator: &DefLocator) -> Option<DescribedDef> {
        if locator.repo != self.repo.uri {
            return None;
        }

        let target_unit = SourceUnit {
            name: locator.unit.clone(),
            unit_type: locator.unit_type.clone(),
            ..SourceUnit::default()
        };
        let graph = match graph::load_graph(&self.store, &self.repo.commit_id, &target_unit) {
            Err(e) => {
                debug!("local graph for {} unavailable: {e}", target_unit.id());
                return None;
            },
            Ok(g) => g,
        };

        let Some(def) = graph.def(&locator.path) else {
            debug!(
                "no definition found with path {:?} in unit {:?} type {:?}",
                locator.path, locator.unit, locator.unit_type
            );
            return None;
        };

        let mut def = def.clone();
        def.file = self.repo.root.join(&def.file).to_string_lossy().into_owned();
        let doc_html = graph.doc(&locator.path).map(|d| return d.data.clone()).unwrap_or_default();
        return Some(DescribedDef { def, doc_html });
    }

    /// The ref's target locator with defaults filled in: an empty unit or unit
    /// type means the referencing unit, an empty repository means this one.
    fn target_locator(&self, found: &FoundRef) -> DefLocator {
        let r = &found.reference;
        let or_default = |value: &str, default: &str| {
            if value.is_empty() {
                return default.to_string();
            }
            return value.to_string();
        };
        return DefLocator {
            path: r.def_path.clone(),
            repo: or_default(&r.def_repo, &self.repo.uri),
            unit: or_default(&r.def_unit, &found.unit.name),
            unit_type: or_default(&r.def_unit_type, &found.unit.unit_type),
        };
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::test_helpers::{Fixture, REPO_URI, def, local_ref};
    use crate::types::{Def, Doc};

    /// Scripted remote service that records every locator it is asked about.
    #[derive(Default)]
    struct FakeService {
        def: Option<DescribedDef>,
        def_delay: Option<Duration>,
        def_requests: Mutex<Vec<DefLocator>>,
        examples: Option<Vec<Example>>,
        examples_delay: Option<Duration>,
        example_requests: Mutex<Vec<(DefLocator, u32, bool)>>,
    }

    #[async_trait::async_trait]
    impl DefinitionService for FakeService {
        async fn get_definition(&self, locator: &DefLocator, opts: DefGetOptions) -> Result<DescribedDef, Error> {
            assert!(opts.doc, "definitions are always fetched with docs");
            self.def_requests.lock().unwrap().push(locator.clone());
            if let Some(delay) = self.def_delay {
                tokio::time::sleep(delay).await;
            }
            return self.def.clone().ok_or_else(|| Error::DefinitionNotFound { locator: locator.to_string() });
        }

        async fn list_examples(&self, locator: &DefLocator, opts: ExampleListOptions) -> Result<Vec<Example>, Error> {
            self.example_requests.lock().unwrap().push((locator.clone(), opts.per_page, opts.formatted));
            if let Some(delay) = self.examples_delay {
                tokio::time::sleep(delay).await;
            }
            return self.examples.clone().ok_or_else(|| Error::Network { reason: "down".to_string() });
        }
    }

    fn resolver(fx: &Fixture, service: Arc<FakeService>) -> PositionResolver {
        return PositionResolver::new(fx.repo.clone(), fx.store.clone(), service, 4);
    }

    fn no_examples() -> DescribeOptions {
        return DescribeOptions { suppress_examples: true };
    }

    fn resolved(description: Description) -> ResolvedDescription {
        match description {
            Description::Resolved(r) => return r,
            Description::NoReference {} => panic!("expected a resolved description"),
        }
    }

    fn remote_def(path: &str) -> DescribedDef {
        return DescribedDef { def: def(path, "remote.go"), doc_html: "<p>remote</p>".to_string() };
    }

    /// Unit `A` holding `a.py` with one same-unit ref over bytes 10..=20 to `a/f`.
    fn single_ref_fixture() -> Fixture {
        let fx = Fixture::new();
        let unit = fx.write_unit("A", "PipPackage", &["a.py"]);
        let doc = Doc { path: "a/f".to_string(), data: "<p>f docs</p>".to_string(), ..Doc::default() };
        fx.write_graph(&unit, &[def("a/f", "a.py")], &[local_ref("a.py", 10, 20, "a/f")], &[doc]);
        return fx;
    }

    #[tokio::test]
    async fn offset_boundaries_are_inclusive() {
        let fx = single_ref_fixture();
        let r = resolver(&fx, Arc::new(FakeService::default()));
        let file = fx.abs("a.py");

        for offset in [10, 15, 20] {
            let d = r.describe(&file, offset, no_examples()).await.unwrap();
            assert!(matches!(d, Description::Resolved(_)), "offset {offset} should match");
        }
        for offset in [9, 21] {
            let d = r.describe(&file, offset, no_examples()).await.unwrap();
            assert_eq!(d, Description::NoReference {}, "offset {offset} should not match");
        }
    }

    #[tokio::test]
    async fn no_ref_and_no_unit_are_empty_results() {
        let fx = single_ref_fixture();
        std::fs::write(fx.abs("loose.py"), "").unwrap();
        let r = resolver(&fx, Arc::new(FakeService::default()));

        let d = r.describe(&fx.abs("loose.py"), 0, DescribeOptions::default()).await.unwrap();
        assert_eq!(d, Description::NoReference {});
        assert!(r.list_refs(&fx.abs("loose.py")).unwrap().is_empty());
    }

    #[tokio::test]
    async fn local_def_gets_absolute_file_and_docs() {
        let fx = single_ref_fixture();
        let service = Arc::new(FakeService::default());
        let r = resolver(&fx, Arc::clone(&service));

        let d = resolved(r.describe(&fx.abs("a.py"), 12, no_examples()).await.unwrap());
        let described = d.def.unwrap();
        assert_eq!(Path::new(&described.def.file), fx.abs("a.py"));
        assert!(Path::new(&described.def.file).is_absolute());
        assert_eq!(described.doc_html, "<p>f docs</p>");
        assert!(service.def_requests.lock().unwrap().is_empty(), "local hit must not go remote");
        assert!(service.example_requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_def_fields_default_to_referencing_unit_and_repo() {
        let fx = single_ref_fixture();
        let r = resolver(&fx, Arc::new(FakeService::default()));

        let d = resolved(r.describe(&fx.abs("a.py"), 10, no_examples()).await.unwrap());
        assert_eq!(
            d.locator,
            DefLocator {
                path: "a/f".to_string(),
                repo: REPO_URI.to_string(),
                unit: "A".to_string(),
                unit_type: "PipPackage".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn cross_unit_ref_resolves_in_defining_unit() {
        let fx = Fixture::new();
        let a = fx.write_unit("A", "PipPackage", &["a.py"]);
        let b = fx.write_unit("B", "PipPackage", &["b.py"]);
        let reference = Ref { def_unit: "B".to_string(), def_unit_type: "PipPackage".to_string(), ..local_ref("a.py", 0, 5, "b/g") };
        fx.write_graph(&a, &[], &[reference], &[]);
        fx.write_graph(&b, &[def("b/g", "b.py")], &[], &[]);
        let r = resolver(&fx, Arc::new(FakeService::default()));

        let d = resolved(r.describe(&fx.abs("a.py"), 3, no_examples()).await.unwrap());
        assert_eq!(d.locator.unit, "B");
        assert_eq!(Path::new(&d.def.unwrap().def.file), fx.abs("b.py"));
    }

    #[tokio::test]
    async fn missing_local_def_falls_through_to_remote() {
        let fx = Fixture::new();
        let unit = fx.write_unit("A", "PipPackage", &["a.py"]);
        fx.write_graph(&unit, &[], &[local_ref("a.py", 10, 20, "a/missing")], &[]);
        let service = Arc::new(FakeService { def: Some(remote_def("a/missing")), ..FakeService::default() });
        let r = resolver(&fx, Arc::clone(&service));

        let d = resolved(r.describe(&fx.abs("a.py"), 10, no_examples()).await.unwrap());
        assert_eq!(d.def.unwrap().def.file, "remote.go", "remote defs keep their file as-is");
        assert_eq!(service.def_requests.lock().unwrap().as_slice(), [d.locator]);
    }

    #[tokio::test]
    async fn unloadable_target_unit_falls_through_to_remote() {
        let fx = Fixture::new();
        let unit = fx.write_unit("A", "PipPackage", &["a.py"]);
        let reference = Ref { def_unit: "Gone".to_string(), ..local_ref("a.py", 0, 5, "x") };
        fx.write_graph(&unit, &[], &[reference], &[]);
        let r = resolver(&fx, Arc::new(FakeService::default()));

        let d = resolved(r.describe(&fx.abs("a.py"), 0, no_examples()).await.unwrap());
        assert!(d.def.is_none(), "remote miss leaves the def absent");
        assert_eq!(d.locator.unit_type, "PipPackage");
    }

    #[tokio::test]
    async fn foreign_repo_goes_remote_with_examples() {
        let fx = Fixture::new();
        let unit = fx.write_unit("A", "GoPackage", &["a.go"]);
        let reference = Ref {
            def_repo: "github.com/other/lib".to_string(),
            def_unit: "github.com/other/lib/http".to_string(),
            def_unit_type: "GoPackage".to_string(),
            ..local_ref("a.go", 4, 8, "Client/Do")
        };
        fx.write_graph(&unit, &[], &[reference], &[]);
        let example = Example { file: "x.go".to_string(), ..Example::default() };
        let service = Arc::new(FakeService {
            def: Some(remote_def("Client/Do")),
            examples: Some(vec![example.clone()]),
            ..FakeService::default()
        });
        let r = resolver(&fx, Arc::clone(&service));

        let d = resolved(r.describe(&fx.abs("a.go"), 8, DescribeOptions::default()).await.unwrap());
        assert_eq!(d.def.unwrap().doc_html, "<p>remote</p>");
        assert_eq!(d.examples, [example]);
        let requests = service.example_requests.lock().unwrap();
        assert_eq!(requests.as_slice(), [(d.locator.clone(), 4, true)]);
        assert_eq!(d.locator.repo, "github.com/other/lib");
    }

    #[tokio::test]
    async fn slow_def_and_failing_examples_still_respond() {
        let fx = Fixture::new();
        let unit = fx.write_unit("A", "GoPackage", &["a.go"]);
        let reference = Ref { def_repo: "github.com/other/lib".to_string(), ..local_ref("a.go", 0, 3, "F") };
        fx.write_graph(&unit, &[], &[reference], &[]);
        let service = Arc::new(FakeService {
            def: Some(remote_def("F")),
            def_delay: Some(Duration::from_millis(200)),
            examples: None,
            ..FakeService::default()
        });
        let r = resolver(&fx, service);

        let d = resolved(r.describe(&fx.abs("a.go"), 1, DescribeOptions::default()).await.unwrap());
        assert!(d.def.is_some());
        assert!(d.examples.is_empty());
    }

    #[tokio::test]
    async fn failing_def_and_slow_examples_still_respond() {
        let fx = Fixture::new();
        let unit = fx.write_unit("A", "GoPackage", &["a.go"]);
        let reference = Ref { def_repo: "github.com/other/lib".to_string(), ..local_ref("a.go", 0, 3, "F") };
        fx.write_graph(&unit, &[], &[reference], &[]);
        let service = Arc::new(FakeService {
            def: None,
            examples: Some(vec![Example::default()]),
            examples_delay: Some(Duration::from_millis(200)),
            ..FakeService::default()
        });
        let r = resolver(&fx, service);

        let d = resolved(r.describe(&fx.abs("a.go"), 1, DescribeOptions::default()).await.unwrap());
        assert!(d.def.is_none());
        assert_eq!(d.examples.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn remote_fetches_run_concurrently() {
        let fx = Fixture::new();
        let unit = fx.write_unit("A", "GoPackage", &["a.go"]);
        let reference = Ref { def_repo: "github.com/other/lib".to_string(), ..local_ref("a.go", 0, 3, "F") };
        fx.write_graph(&unit, &[], &[reference], &[]);
        let service = Arc::new(FakeService {
            def: Some(remote_def("F")),
            def_delay: Some(Duration::from_secs(10)),
            examples: Some(Vec::new()),
            examples_delay: Some(Duration::from_secs(10)),
            ..FakeService::default()
        });
        let r = resolver(&fx, service);

        let started = tokio::time::Instant::now();
        r.describe(&fx.abs("a.go"), 1, DescribeOptions::default()).await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(15), "fetches were serialized");
    }

    #[tokio::test]
    async fn first_match_wins_across_units_without_narrowest_tiebreak() {
        let fx = Fixture::new();
        let a = fx.write_unit("A", "PipPackage", &["a.py"]);
        let b = fx.write_unit("B", "PipPackage", &["a.py"]);
        fx.write_graph(&a, &[], &[local_ref("a.py", 0, 100, "wide"), local_ref("a.py", 40, 45, "narrow")], &[]);
        fx.write_graph(&b, &[], &[local_ref("a.py", 42, 43, "narrowest")], &[]);
        let r = resolver(&fx, Arc::new(FakeService::default()));

        let d = resolved(r.describe(&fx.abs("a.py"), 42, no_examples()).await.unwrap());
        assert_eq!(d.locator.path, "wide");
        assert_eq!(d.locator.unit, "A");
    }

    #[tokio::test]
    async fn malformed_candidate_graph_is_skipped() {
        let fx = Fixture::new();
        fx.write_unit("A", "PipPackage", &["a.py"]);
        fx.write_raw("A/PipPackage.graph.json", "[[[");
        let b = fx.write_unit("B", "PipPackage", &["a.py"]);
        fx.write_graph(&b, &[Def { path: "b/h".to_string(), ..Def::default() }], &[local_ref("a.py", 1, 2, "b/h")], &[]);
        let r = resolver(&fx, Arc::new(FakeService::default()));

        let d = resolved(r.describe(&fx.abs("a.py"), 1, no_examples()).await.unwrap());
        assert_eq!(d.locator.unit, "B");
        assert_eq!(r.list_refs(&fx.abs("a.py")).unwrap().len(), 1);
    }

    #[test]
    fn list_refs_keeps_unit_then_artifact_order_and_is_idempotent() {
        let fx = Fixture::new();
        let a = fx.write_unit("A", "PipPackage", &["a.py", "b.py"]);
        let b = fx.write_unit("B", "PipPackage", &["a.py"]);
        fx.write_graph(
            &a,
            &[],
            &[local_ref("a.py", 30, 31, "a2"), local_ref("b.py", 0, 1, "other"), local_ref("a.py", 5, 6, "a1")],
            &[],
        );
        fx.write_graph(&b, &[], &[local_ref("a.py", 0, 1, "b1")], &[]);
        let r = resolver(&fx, Arc::new(FakeService::default()));

        let first = r.list_refs(&fx.abs("a.py")).unwrap();
        let paths: Vec<&str> = first.iter().map(|r| r.def_path.as_str()).collect();
        assert_eq!(paths, ["a2", "a1", "b1"]);
        assert_eq!(first, r.list_refs(&fx.abs("a.py")).unwrap());
    }

    #[test]
    fn list_refs_rejects_paths_outside_the_repository() {
        let fx = Fixture::new();
        let r = resolver(&fx, Arc::new(FakeService::default()));
        assert!(matches!(r.list_refs(Path::new("/definitely/elsewhere.py")), Err(Error::InvalidPath { .. })));
    }
}
