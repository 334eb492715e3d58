use algodrill::{Catalog, StaticCatalog, compile};

use super::test_judge;

#[tokio::test]
async fn test_reference_solutions_pass() {
    let catalog = StaticCatalog::builtin().unwrap();
    let judge = test_judge();

    for problem in catalog.problems().iter().filter(|p| p.has_tests()) {
        let report = judge.run(&problem.request(problem.reference.clone())).await;
        assert!(
            report.all_passed(),
            "reference solution of '{}' failed: {report:?}",
            problem.id
        );
    }
}

#[test]
fn test_stubs_and_references_compile() {
    let catalog = StaticCatalog::builtin().unwrap();
    for problem in catalog.problems() {
        if let Err(e) = compile(&problem.stub) {
            panic!("stub of '{}' does not compile: {e}", problem.id);
        }
        if let Err(e) = compile(&problem.reference) {
            panic!("reference of '{}' does not compile: {e}", problem.id);
        }
    }
}

#[tokio::test]
async fn test_stubs_do_not_pass() {
    let catalog = StaticCatalog::builtin().unwrap();
    let judge = test_judge();
    let problem = catalog.get("binary-search").unwrap();

    let report = judge.run(&problem.request(problem.stub.clone())).await;
    let outcomes = report.outcomes().expect("stub should run");
    assert_eq!(outcomes.len(), 3);
    assert!(!report.all_passed());
}
