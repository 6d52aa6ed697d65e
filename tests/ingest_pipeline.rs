mod common;

use common::Repo;
use std::collections::BTreeSet;

fn callers(repo: &Repo, callee_id: i64) -> BTreeSet<String> {
    repo.db()
        .callers_of(repo.project_id(), &[callee_id])
        .unwrap()
        .into_iter()
        .map(|edge| edge.caller.name)
        .collect()
}

#[test]
fn ingest_stores_symbols_imports_and_calls() {
    let repo = Repo::new("py_graph");
    let summary = repo.ingest();

    assert_eq!(summary.files_scanned, 4);
    assert_eq!(summary.files_processed, 4);
    assert_eq!(summary.files_failed, 0);
    assert_eq!(summary.conflicts, 0);
    assert_eq!(summary.orphans_skipped, 0);

    let overview = repo
        .db()
        .overview(repo.db().require_project(common::REPO_URL).unwrap())
        .unwrap();
    assert_eq!(overview.files, 4);
    assert_eq!(overview.symbols_by_kind.get("module"), Some(&4));
    assert_eq!(overview.symbols_by_kind.get("class"), Some(&1));
    assert_eq!(overview.symbols_by_kind.get("method"), Some(&3));
    assert_eq!(overview.imports.total, 2);
}

#[test]
fn from_import_resolves_to_the_defining_file() {
    let repo = Repo::new("py_graph");
    let summary = repo.ingest();
    assert_eq!(summary.imports.total, 2);
    assert_eq!(summary.imports.resolved, 2);

    let parse = repo.symbol("parse", "libs/utils.py");
    let imports = repo.db().imports_in_file(repo.project_id(), "app.py").unwrap();
    assert_eq!(imports.len(), 1);
    assert_eq!(imports[0].module, "libs.utils");
    assert_eq!(imports[0].name, "parse");
    assert!(imports[0].is_resolved);
    assert_eq!(imports[0].resolved_symbol_id, Some(parse.id));
}

#[test]
fn calls_resolve_across_files_and_through_self() {
    let repo = Repo::new("py_graph");
    repo.ingest();

    let parse = repo.symbol("parse", "libs/utils.py");
    assert_eq!(
        callers(&repo, parse.id),
        BTreeSet::from(["h".to_string(), "test_parse".to_string()])
    );

    let reset = repo.symbol("reset", "libs/utils.py");
    assert_eq!(callers(&repo, reset.id), BTreeSet::from(["__init__".to_string()]));

    let tokenize = repo.symbol("tokenize", "libs/utils.py");
    assert_eq!(callers(&repo, tokenize.id), BTreeSet::from(["parse".to_string()]));

    let f = repo.symbol("f", "app.py");
    assert_eq!(callers(&repo, f.id), BTreeSet::from(["app".to_string()]));
}

#[test]
fn reingesting_unchanged_files_changes_nothing() {
    let repo = Repo::new("py_graph");
    let first = repo.ingest();
    let project = repo.db().require_project(common::REPO_URL).unwrap();
    let before = repo.db().overview(project.clone()).unwrap();
    let parse_before = repo.symbol("parse", "libs/utils.py");

    let second = repo.ingest();
    let after = repo.db().overview(project).unwrap();

    assert_eq!(second.symbols, first.symbols);
    assert_eq!(after.symbols, before.symbols);
    assert_eq!(after.imports, before.imports);
    assert_eq!(after.calls, before.calls);
    assert_eq!(second.imports.newly_resolved, 0);
    assert_eq!(second.calls.newly_resolved, 0);
    assert_eq!(second.calls.resolved, first.calls.resolved);
    assert_eq!(repo.symbol("parse", "libs/utils.py").id, parse_before.id);
}

#[test]
fn resolutions_survive_later_ingests() {
    let repo = Repo::new("py_graph");
    let first = repo.ingest();
    let parse = repo.symbol("parse", "libs/utils.py");

    // the defining file loses `parse`; stored rows are never deleted
    repo.write("libs/utils.py", "def tokenize(data):\n    return data.split()\n");
    repo.write("extra.py", "from libs.utils import tokenize\n\ndef go():\n    tokenize('x')\n");
    let second = repo.ingest();

    assert!(second.calls.resolved >= first.calls.resolved);
    assert!(second.imports.resolved >= first.imports.resolved);
    assert!(callers(&repo, parse.id).contains("h"));
    let tokenize = repo.symbol("tokenize", "libs/utils.py");
    assert!(callers(&repo, tokenize.id).contains("go"));
}

#[test]
fn syntax_errors_skip_only_the_broken_file() {
    let repo = Repo::new("py_graph");
    repo.write("broken.py", "def broken(:\n    pass\n");
    let summary = repo.ingest();

    assert_eq!(summary.files_scanned, 5);
    assert_eq!(summary.files_processed, 4);
    assert_eq!(summary.files_failed, 1);
    assert!(repo.db().symbols_in_file(repo.project_id(), "broken.py").unwrap().is_empty());
    assert_eq!(repo.symbol("parse", "libs/utils.py").kind, "function");
}

#[test]
fn kind_conflicts_skip_the_symbol_and_its_children() {
    let repo = Repo::new("py_graph");
    repo.write(
        "dup.py",
        "def thing():\n    pass\n\nclass thing:\n    def inner(self):\n        pass\n",
    );
    let summary = repo.ingest();

    assert_eq!(summary.conflicts, 1);
    assert_eq!(summary.orphans_skipped, 1);
    let stored = repo.db().symbols_in_file(repo.project_id(), "dup.py").unwrap();
    let names: Vec<_> = stored.iter().map(|s| (s.kind.as_str(), s.name.as_str())).collect();
    assert_eq!(names, vec![("module", "dup"), ("function", "thing")]);
}

#[test]
fn javascript_imports_and_calls_resolve() {
    let repo = Repo::new("js_graph");
    let summary = repo.ingest();
    assert_eq!(summary.files_processed, 2);
    assert_eq!(summary.imports.total, 2);
    assert_eq!(summary.imports.resolved, 2);

    let format_name = repo.symbol("formatName", "web/util.js");
    assert_eq!(callers(&repo, format_name.id), BTreeSet::from(["run".to_string()]));

    let greeter = repo.symbol("Greeter", "web/util.js");
    assert_eq!(greeter.kind, "class");
    assert_eq!(callers(&repo, greeter.id), BTreeSet::from(["run".to_string()]));

    let run = repo.symbol("run", "web/main.js");
    assert_eq!(callers(&repo, run.id), BTreeSet::from(["main".to_string()]));
}

#[test]
fn bare_calls_skip_class_members_for_imports() {
    let repo = Repo::new("py_graph");
    repo.write(
        "svc.py",
        "from libs.utils import parse\n\n\nclass Reader:\n    def parse(self):\n        return None\n\n\ndef run():\n    return parse('x')\n",
    );
    repo.ingest();

    let parse = repo.symbol("parse", "libs/utils.py");
    assert!(callers(&repo, parse.id).contains("run"));
    let method = repo.symbol("parse", "svc.py");
    assert_eq!(method.kind, "method");
    assert!(callers(&repo, method.id).is_empty());
}

#[test]
fn unmatched_imports_and_calls_stay_unresolved() {
    let repo = Repo::new("py_graph");
    repo.write(
        "ghost.py",
        "from nowhere.mod import ghost\n\n\ndef haunt():\n    return ghost()\n",
    );
    let summary = repo.ingest();
    let project_id = repo.project_id();

    let imports = repo.db().imports_in_file(project_id, "ghost.py").unwrap();
    let state: Vec<_> = imports
        .iter()
        .map(|i| (i.is_resolved, i.resolved_symbol_id))
        .collect();
    assert_eq!(state, vec![(false, None)]);
    assert_eq!(summary.imports.total, summary.imports.resolved + 1);

    assert!(summary.calls.total > summary.calls.resolved);
    let unresolved = repo.db().unresolved_calls_batch(project_id, 0, 1000).unwrap();
    let ghost_call = unresolved
        .iter()
        .find(|call| call.file_path == "ghost.py")
        .unwrap();
    assert_eq!(ghost_call.callee_name, "ghost");
    assert_eq!(ghost_call.resolved_symbol_id, None);

    let haunt = repo.symbol("haunt", "ghost.py");
    assert!(callers(&repo, haunt.id).is_empty());
    let report = codeseer::impact::analyze_impact(
        repo.db(),
        project_id,
        &codeseer::impact::ImpactQuery::new("haunt"),
    )
    .unwrap()
    .into_result()
    .unwrap();
    assert!(report.entries.is_empty());
}

#[test]
fn dotted_module_imports_bind_the_full_path() {
    let repo = Repo::new("py_graph");
    repo.write(
        "dotted.py",
        "import libs.utils\n\n\ndef use_it():\n    return libs.utils.helper(1)\n",
    );
    repo.ingest();

    let imports = repo.db().imports_in_file(repo.project_id(), "dotted.py").unwrap();
    assert_eq!(imports.len(), 1);
    assert_eq!(imports[0].name, "utils");
    assert_eq!(imports[0].binding.as_deref(), Some("libs.utils"));
    assert_eq!(imports[0].local_name(), "libs.utils");
    assert!(imports[0].is_resolved);

    let helper = repo.symbol("helper", "libs/utils.py");
    assert_eq!(callers(&repo, helper.id), BTreeSet::from(["use_it".to_string()]));
}
